use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ast::{
    AlterAction, AlterTable, CreateTable, Delete, InsertInto, Join, Select, Statement, Update,
};
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::parser::parse_statement;
use crate::table::Table;

/// Per-session state carried from one statement to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    working_database: Option<Database>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The database selected by the last successful `USE`, if any.
    pub fn working_database(&self) -> Option<&Database> {
        self.working_database.as_ref()
    }
}

/// Outcome of a successful statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Formatted rows for SELECT and JOIN; `None` for everything else.
    pub text: Option<String>,
    /// The context to pass to the next statement.
    pub context: SessionContext,
}

/// A parsed statement whose session requirements have been checked.
#[derive(Debug)]
pub struct PreparedCommand {
    statement: Statement,
    /// Set for every table-scoped statement.
    database: Option<Database>,
}

impl PreparedCommand {
    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

/// Runs statements against the databases under one root directory.
///
/// Statements are serialized: each one holds the engine lock from load to
/// persist, so concurrent sessions never interleave rewrites of the same files.
pub struct Engine {
    root: PathBuf,
    lock: Mutex<()>,
}

impl Engine {
    /// Opens an engine rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns a storage error if the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| DbError::io(format!("creating {}", root.display()), e))?;
        info!(root = %root.display(), "engine opened");
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parses, checks and runs one statement.
    ///
    /// On success the returned [Response] carries the optional result text
    /// and the context for the next statement. On failure the caller keeps
    /// its current context.
    ///
    /// # Example
    /// ```
    /// # use tsvdb::engine::{Engine, SessionContext};
    /// # let dir = tempfile::tempdir().unwrap();
    /// let engine = Engine::open(dir.path()).unwrap();
    /// let mut context = SessionContext::new();
    /// for statement in ["CREATE DATABASE shop;", "USE shop;", "CREATE TABLE items (name);"] {
    ///     context = engine.perform_statement(&context, statement).unwrap().context;
    /// }
    /// engine.perform_statement(&context, "INSERT INTO items VALUES ('pen');").unwrap();
    ///
    /// let response = engine.perform_statement(&context, "SELECT name FROM items;").unwrap();
    /// assert_eq!(response.text.as_deref(), Some("name\n'pen'\n"));
    /// ```
    pub fn perform_statement(&self, context: &SessionContext, text: &str) -> Result<Response> {
        let _guard = self.lock.lock();
        debug!(statement = text.trim(), "statement received");

        let result = self
            .prepare(context, text)
            .and_then(|command| self.execute(command, context.clone()));

        if let Err(e) = &result {
            warn!(error = %e, kind = ?e.kind(), statement = text.trim(), "statement failed");
        }
        result
    }

    /// Parses a statement and checks it against the session.
    ///
    /// # Errors
    /// Any syntax error, or [DbError::NoWorkingDatabase] /
    /// [DbError::DatabaseNotFound] for a table-scoped statement without a
    /// usable working database.
    pub fn prepare(&self, context: &SessionContext, text: &str) -> Result<PreparedCommand> {
        let statement = parse_statement(text)?;

        let database = if statement.is_table_scoped() {
            let database = context
                .working_database()
                .ok_or(DbError::NoWorkingDatabase)?;
            if !database.exists() {
                return Err(DbError::DatabaseNotFound(database.name.clone()));
            }
            Some(database.clone())
        } else {
            None
        };

        debug!(verb = statement.verb(), "command prepared");
        Ok(PreparedCommand {
            statement,
            database,
        })
    }

    /// Runs a prepared command and returns the result text and the next context.
    pub fn execute(&self, command: PreparedCommand, context: SessionContext) -> Result<Response> {
        let PreparedCommand {
            statement,
            database,
        } = command;

        match (statement, database) {
            (Statement::Use(name), _) => self.run_use(&name),
            (Statement::CreateDatabase(name), _) => {
                Database::new(&self.root, &name).create()?;
                Ok(Self::silent(context))
            }
            (Statement::DropDatabase(name), _) => self.run_drop_database(&name, context),
            (statement, Some(database)) => {
                let text = run_table_statement(&database, statement)?;
                Ok(Response { text, context })
            }
            (statement, None) => Err(DbError::UnknownCommand(statement.verb().to_string())),
        }
    }

    fn silent(context: SessionContext) -> Response {
        Response {
            text: None,
            context,
        }
    }

    fn run_use(&self, name: &str) -> Result<Response> {
        let database = Database::open(&self.root, name)?;
        debug!(database = %database.name, "working database selected");
        Ok(Response {
            text: None,
            context: SessionContext {
                working_database: Some(database),
            },
        })
    }

    fn run_drop_database(&self, name: &str, mut context: SessionContext) -> Result<Response> {
        let database = Database::open(&self.root, name)?;
        let tables = database.list_tables()?;
        database.remove()?;
        debug!(database = name, tables = tables.len(), "database files removed");

        if context.working_database.as_ref().is_some_and(|db| db.name == name) {
            context.working_database = None;
        }
        Ok(Self::silent(context))
    }
}

/// Runs a statement that operates on tables of `database`.
fn run_table_statement(database: &Database, statement: Statement) -> Result<Option<String>> {
    match statement {
        Statement::CreateTable(create) => run_create_table(database, create).map(|_| None),
        Statement::DropTable(name) => database.table(&name).remove_files().map(|_| None),
        Statement::AlterTable(alter) => run_alter(database, alter).map(|_| None),
        Statement::InsertInto(insert) => run_insert(database, insert).map(|_| None),
        Statement::Select(select) => run_select(database, select).map(Some),
        Statement::Update(update) => run_update(database, update).map(|_| None),
        Statement::Delete(delete) => run_delete(database, delete).map(|_| None),
        Statement::Join(join) => run_join(database, join).map(Some),
        other => Err(DbError::UnknownCommand(other.verb().to_string())),
    }
}

fn run_create_table(database: &Database, create: CreateTable) -> Result<()> {
    let mut table = database.table(&create.name);
    for attribute in &create.attributes {
        table.append_attribute(attribute)?;
    }
    table.create()
}

fn run_alter(database: &Database, alter: AlterTable) -> Result<()> {
    let mut table = database.load_table(&alter.table)?;
    match &alter.action {
        AlterAction::Add(name) => table.append_attribute(name)?,
        AlterAction::Drop(name) => table.remove_attribute(name)?,
    }
    table.persist()
}

fn run_insert(database: &Database, insert: InsertInto) -> Result<()> {
    let mut table = database.load_table(&insert.table)?;
    let id = table.insert(insert.values)?;
    table.persist()?;
    debug!(table = %table.name, id, "row inserted");
    Ok(())
}

/// Executes a `SELECT` and returns the formatted projection.
///
/// 1. **Loads** the table from disk.
/// 2. **Resolves** the projected attributes.
/// 3. **Filters** rows through the `WHERE` condition, when there is one.
/// 4. **Renders** the header and the kept rows.
fn run_select(database: &Database, select: Select) -> Result<String> {
    let table = database.load_table(&select.table)?;
    let projection = table.projection_indices(&select.columns)?;
    let mask = match &select.where_clause {
        Some(condition) => Some(condition.filter(&table)?),
        None => None,
    };
    Ok(table.render(&projection, mask.as_deref()))
}

/// Executes an `UPDATE`.
///
/// The table is filtered first, then every assignment is applied to the
/// selected rows and the files are rewritten.
fn run_update(database: &Database, update: Update) -> Result<()> {
    let mut table = database.load_table(&update.table)?;
    let mask = update.where_clause.filter(&table)?;
    let changed = table.update(&mask, &update.assignments)?;
    table.persist()?;
    debug!(table = %table.name, changed, "rows updated");
    Ok(())
}

fn run_delete(database: &Database, delete: Delete) -> Result<()> {
    let mut table = database.load_table(&delete.table)?;
    let mask = delete.where_clause.filter(&table)?;
    let removed = table.delete(&mask);
    table.persist()?;
    debug!(table = %table.name, removed, "rows deleted");
    Ok(())
}

fn run_join(database: &Database, join: Join) -> Result<String> {
    let primary = database.load_table(&join.primary_table)?;
    let secondary = database.load_table(&join.secondary_table)?;
    let joined = Table::join(
        &primary,
        &join.primary_attribute,
        &secondary,
        &join.secondary_attribute,
    )?;
    let projection: Vec<usize> = (0..joined.schema.len()).collect();
    Ok(joined.render(&projection, None))
}
