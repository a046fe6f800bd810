use crate::condition::Condition;

/// One parsed statement. Each variant carries only what its verb needs.
#[derive(Debug, PartialEq)]
pub enum Statement {
    Use(String),
    CreateDatabase(String),
    CreateTable(CreateTable),
    DropDatabase(String),
    DropTable(String),
    AlterTable(AlterTable),
    InsertInto(InsertInto),
    Select(Select),
    Update(Update),
    Delete(Delete),
    Join(Join),
}

impl Statement {
    /// The verb keyword, for logs and error messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Use(_) => "USE",
            Self::CreateDatabase(_) | Self::CreateTable(_) => "CREATE",
            Self::DropDatabase(_) | Self::DropTable(_) => "DROP",
            Self::AlterTable(_) => "ALTER",
            Self::InsertInto(_) => "INSERT",
            Self::Select(_) => "SELECT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
            Self::Join(_) => "JOIN",
        }
    }

    /// Whether the statement needs a working database.
    pub fn is_table_scoped(&self) -> bool {
        !matches!(
            self,
            Self::Use(_) | Self::CreateDatabase(_) | Self::DropDatabase(_)
        )
    }
}

#[derive(Debug, PartialEq)]
pub struct CreateTable {
    pub name: String,
    /// Attributes after the implicit `id`. May be empty.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    Add(String),
    Drop(String),
}

#[derive(Debug, PartialEq)]
pub struct AlterTable {
    pub table: String,
    pub action: AlterAction,
}

#[derive(Debug, PartialEq)]
pub struct InsertInto {
    pub table: String,
    /// Literal values for every attribute except `id`, as written.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnsSelect {
    Star,
    ColumnsNames(Vec<String>),
}

#[derive(Debug, PartialEq)]
pub struct Select {
    pub columns: ColumnsSelect,
    pub table: String,
    pub where_clause: Option<Condition>,
}

/// One `attr=value` pair of an UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Condition,
}

#[derive(Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub where_clause: Condition,
}

#[derive(Debug, PartialEq)]
pub struct Join {
    pub primary_table: String,
    pub secondary_table: String,
    pub primary_attribute: String,
    pub secondary_attribute: String,
}
