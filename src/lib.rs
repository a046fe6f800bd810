pub mod ast;
pub mod condition;
pub mod config;
pub mod data_type;
pub mod database;
pub mod engine;
pub mod error;
pub mod list;
pub mod logging;
pub mod parser;
pub mod row;
pub mod server;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use condition::Condition;
pub use data_type::DataType;
pub use database::Database;
pub use engine::{Engine, Response, SessionContext};
pub use error::{DbError, ErrorKind, Result};
pub use row::Row;
pub use table::{Attribute, Schema, Table};
pub use value::Value;
