use tsvdb::*;

fn main() -> Result<()> {
    println!("File-backed Database Demo\n");

    // Databases live under a scratch root
    let root = tempfile::tempdir().map_err(|e| DbError::io("create demo root", e))?;
    let engine = Engine::open(root.path())?;
    let mut context = SessionContext::new();

    let statements = [
        "CREATE DATABASE school;",
        "USE school;",
        "CREATE TABLE students (name, age);",
        "CREATE TABLE classes (title, student);",
        "INSERT INTO students VALUES ('Alice', 30);",
        "INSERT INTO students VALUES ('Bob', 19);",
        "INSERT INTO students VALUES ('Charlie', 25);",
        "INSERT INTO classes VALUES ('Maths', 'Alice');",
        "INSERT INTO classes VALUES ('Physics', 'Charlie');",
    ];
    for statement in statements {
        context = engine.perform_statement(&context, statement)?.context;
        println!("ok  {statement}");
    }

    let queries = [
        "SELECT * FROM students;",
        "SELECT name FROM students WHERE (age >= 25);",
        "JOIN students AND classes ON name AND student;",
    ];
    for query in queries {
        let response = engine.perform_statement(&context, query)?;
        println!("\n{query}");
        print!("{}", response.text.unwrap_or_default());
    }

    // Mutations need a condition
    println!();
    for statement in [
        "UPDATE students SET age=20 WHERE (name = 'Bob');",
        "DELETE FROM students WHERE (age > 28);",
    ] {
        context = engine.perform_statement(&context, statement)?.context;
        println!("ok  {statement}");
    }
    print!(
        "{}",
        engine
            .perform_statement(&context, "SELECT * FROM students;")?
            .text
            .unwrap_or_default()
    );

    match engine.perform_statement(&context, "DELETE FROM students;") {
        Ok(_) => println!("\nunexpected: unconditional delete succeeded"),
        Err(e) => println!("\nrejected: {e}"),
    }

    Ok(())
}
