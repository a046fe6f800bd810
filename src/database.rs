use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DbError, Result};
use crate::table::{SCHEMA_EXTENSION, Table};

/// A database: one directory under the root, holding the files of its tables.
///
/// The handle is cheap and holds no table state; tables are loaded fresh for
/// every statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    path: PathBuf,
}

impl Database {
    pub fn new(root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: root.join(name),
        }
    }

    /// Resolves an existing database.
    ///
    /// # Errors
    /// Returns [DbError::DatabaseNotFound] if the directory does not exist.
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let database = Self::new(root, name);
        if !database.exists() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        Ok(database)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A database exists exactly when its directory does.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Creates the database directory.
    ///
    /// # Errors
    /// Returns [DbError::DatabaseExists] if it is already there.
    pub fn create(&self) -> Result<()> {
        if self.path.exists() {
            return Err(DbError::DatabaseExists(self.name.clone()));
        }
        fs::create_dir(&self.path)
            .map_err(|e| DbError::io(format!("creating {}", self.path.display()), e))?;
        info!(database = %self.name, "database created");
        Ok(())
    }

    /// Deletes every table file and then the directory itself.
    ///
    /// # Errors
    /// Returns [DbError::DatabaseNotFound] if the directory does not exist.
    pub fn remove(&self) -> Result<()> {
        if !self.exists() {
            return Err(DbError::DatabaseNotFound(self.name.clone()));
        }
        fs::remove_dir_all(&self.path)
            .map_err(|e| DbError::io(format!("removing {}", self.path.display()), e))?;
        info!(database = %self.name, "database dropped");
        Ok(())
    }

    /// An empty, unsaved table owned by this database.
    pub fn table(&self, name: &str) -> Table {
        Table::new(&self.path, name)
    }

    /// Loads a table of this database from its files.
    pub fn load_table(&self, name: &str) -> Result<Table> {
        Table::load(&self.path, name)
    }

    /// Returns the names of all tables, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.path)
            .map_err(|e| DbError::io(format!("listing {}", self.path.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| DbError::io(format!("listing {}", self.path.display()), e))?
                .path();
            if path.extension().is_some_and(|ext| ext == SCHEMA_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
