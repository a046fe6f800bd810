use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use allocative::Allocative;
use bitvec::prelude::*;
use tracing::debug;

use crate::ast::{Assignment, ColumnsSelect};
use crate::error::{DbError, Result};
use crate::list::ID_ATTRIBUTE;
use crate::row::Row;
use crate::value::{Value, cells_equal};

/// Extension of the schema file: one attribute name per line.
pub const SCHEMA_EXTENSION: &str = "txt";
/// Extension of the row file: one tab-delimited row per line.
pub const ROWS_EXTENSION: &str = "tsv";
/// Extension of the file holding the last id handed out.
pub const SEQUENCE_EXTENSION: &str = "seq";
/// Cell written into existing rows when an attribute is added.
pub const NULL_PLACEHOLDER: &str = "''";

/// Attribute definition in the schema. Attributes are untyped.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct Attribute {
    pub name: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Ordered, name-unique attribute list, always starting with `id`.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
}

impl Schema {
    /// A schema holding only the implicit `id` attribute.
    pub fn seeded() -> Self {
        Self {
            attributes: vec![Attribute::new(ID_ATTRIBUTE)],
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A table held in memory between a load and a persist.
///
/// Mutating methods only touch the in-memory copy; callers persist once the
/// whole statement has been applied.
#[derive(Debug, Allocative)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub rows: Vec<Row>,
    /// Highest id ever handed out, including ids of deleted rows.
    last_id: u64,
    #[allocative(skip)]
    schema_path: PathBuf,
    #[allocative(skip)]
    rows_path: PathBuf,
    #[allocative(skip)]
    sequence_path: PathBuf,
}

impl Table {
    /// A fresh table in `database_path` with only the `id` attribute and no rows.
    /// Nothing is written until [Table::create] or [Table::persist].
    pub fn new(database_path: &Path, name: &str) -> Self {
        let file = |extension: &str| database_path.join(format!("{name}.{extension}"));
        Self {
            name: name.to_string(),
            schema: Schema::seeded(),
            rows: Vec::new(),
            last_id: 0,
            schema_path: file(SCHEMA_EXTENSION),
            rows_path: file(ROWS_EXTENSION),
            sequence_path: file(SEQUENCE_EXTENSION),
        }
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn rows_path(&self) -> &Path {
        &self.rows_path
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Returns `true` if either backing file is on disk.
    pub fn exists(&self) -> bool {
        self.schema_path.exists() || self.rows_path.exists()
    }

    /// Writes the backing files of a new table.
    ///
    /// # Errors
    /// Returns [DbError::TableExists] if a schema or row file is already there.
    pub fn create(&self) -> Result<()> {
        if self.exists() {
            return Err(DbError::TableExists(self.name.clone()));
        }
        self.persist()?;
        debug!(table = %self.name, attributes = self.schema.len(), "table created");
        Ok(())
    }

    /// Deletes every backing file of the table.
    ///
    /// # Errors
    /// Returns [DbError::TableNotFound] if the table has no files.
    pub fn remove_files(&self) -> Result<()> {
        if !self.exists() {
            return Err(DbError::TableNotFound(self.name.clone()));
        }
        for path in [&self.schema_path, &self.rows_path, &self.sequence_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => {
                    return Err(DbError::io(format!("removing {}", path.display()), e));
                }
            }
        }
        debug!(table = %self.name, "table dropped");
        Ok(())
    }

    /// Reads the schema, rows and id sequence of an existing table.
    ///
    /// # Errors
    /// Returns [DbError::TableNotFound] if the schema file is absent and
    /// [DbError::CorruptTable] if the files do not describe a valid table.
    pub fn load(database_path: &Path, name: &str) -> Result<Self> {
        let mut table = Self::new(database_path, name);
        if !table.schema_path.exists() {
            return Err(DbError::TableNotFound(name.to_string()));
        }

        let schema_text = read(&table.schema_path)?;
        let attributes: Vec<Attribute> = schema_text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Attribute::new(line.trim()))
            .collect();
        if attributes.first().map(|a| a.name.as_str()) != Some(ID_ATTRIBUTE) {
            return Err(table.corrupt_schema("first attribute must be id"));
        }
        table.schema = Schema { attributes };

        let rows_text = read(&table.rows_path)?;
        let mut highest_id = 0;
        for (line_no, line) in rows_text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let row = Row::from_line(line);
            if row.len() != table.schema.len() {
                return Err(table.corrupt_rows(format!(
                    "line {} has {} cells, schema has {} attributes",
                    line_no + 1,
                    row.len(),
                    table.schema.len()
                )));
            }
            let id: u64 = row.id().parse().map_err(|_| {
                table.corrupt_rows(format!("line {} has id {:?}", line_no + 1, row.id()))
            })?;
            highest_id = highest_id.max(id);
            table.rows.push(row);
        }

        let recorded = match fs::read_to_string(&table.sequence_path) {
            Ok(text) => text.trim().parse::<u64>().map_err(|_| DbError::CorruptTable {
                path: table.sequence_path.clone(),
                reason: format!("{:?} is not an id", text.trim()),
            })?,
            Err(e) if e.kind() == IoErrorKind::NotFound => 0,
            Err(e) => {
                return Err(DbError::io(
                    format!("reading {}", table.sequence_path.display()),
                    e,
                ));
            }
        };
        table.last_id = recorded.max(highest_id);

        debug!(
            table = %table.name,
            attributes = table.schema.len(),
            rows = table.rows.len(),
            footprint = allocative::size_of_unique_allocated_data(&table),
            "table loaded"
        );
        Ok(table)
    }

    /// Rewrites the schema, row and sequence files from memory.
    ///
    /// Each file is written beside its target and renamed over it.
    pub fn persist(&self) -> Result<()> {
        let mut schema_text = String::new();
        for name in self.schema.names() {
            schema_text.push_str(name);
            schema_text.push('\n');
        }

        let mut rows_text = String::new();
        for row in &self.rows {
            rows_text.push_str(&row.to_line());
            rows_text.push('\n');
        }

        write_atomic(&self.schema_path, &schema_text)?;
        write_atomic(&self.rows_path, &rows_text)?;
        write_atomic(&self.sequence_path, &format!("{}\n", self.last_id))?;

        debug!(table = %self.name, rows = self.rows.len(), "table persisted");
        Ok(())
    }

    /// Index of `name` in the schema.
    ///
    /// # Errors
    /// Returns [DbError::AttributeNotFound] if the table has no such attribute.
    pub fn attribute_index(&self, name: &str) -> Result<usize> {
        self.schema
            .position(name)
            .ok_or_else(|| DbError::AttributeNotFound {
                table: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// Schema indices selected by a projection, in projection order.
    pub fn projection_indices(&self, projection: &ColumnsSelect) -> Result<Vec<usize>> {
        match projection {
            ColumnsSelect::Star => Ok((0..self.schema.len()).collect()),
            ColumnsSelect::ColumnsNames(names) => names
                .iter()
                .map(|name| self.attribute_index(name))
                .collect(),
        }
    }

    /// Appends a row built from every attribute except `id`, which is assigned.
    ///
    /// # Errors
    /// Returns [DbError::WidthMismatch] if the value count is not the attribute
    /// count minus one, and [DbError::InvalidLiteral] for a malformed value.
    pub fn insert(&mut self, values: Vec<String>) -> Result<u64> {
        let expected = self.schema.len() - 1;
        if values.len() != expected {
            return Err(DbError::WidthMismatch {
                expected,
                found: values.len(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !Value::is_literal(v)) {
            return Err(DbError::InvalidLiteral(bad.clone()));
        }

        let id = self.last_id + 1;
        let mut cells = Vec::with_capacity(values.len() + 1);
        cells.push(id.to_string());
        cells.extend(values);
        self.rows.push(Row::new(cells));
        self.last_id = id;
        Ok(id)
    }

    /// Applies every assignment to the rows selected by `mask`.
    /// Returns the number of rows changed.
    ///
    /// # Errors
    /// Fails before touching any row if an assignment targets `id` or an
    /// unknown attribute.
    pub fn update(&mut self, mask: &BitSlice, assignments: &[Assignment]) -> Result<usize> {
        let mut resolved = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if assignment.attribute == ID_ATTRIBUTE {
                return Err(DbError::ProtectedAttribute(assignment.attribute.clone()));
            }
            let index = self.attribute_index(&assignment.attribute)?;
            resolved.push((index, assignment.value.as_str()));
        }

        let mut changed = 0;
        for row_idx in mask.iter_ones() {
            let Some(row) = self.rows.get_mut(row_idx) else {
                continue;
            };
            for (index, value) in &resolved {
                row.set(*index, value)?;
            }
            changed += 1;
        }
        Ok(changed)
    }

    /// Removes the rows selected by `mask` and returns how many were removed.
    pub fn delete(&mut self, mask: &BitSlice) -> usize {
        let before = self.rows.len();
        let mut row_idx = 0;
        self.rows.retain(|_| {
            let remove = mask.get(row_idx).is_some_and(|bit| *bit);
            row_idx += 1;
            !remove
        });
        before - self.rows.len()
    }

    /// Adds an attribute at the end of the schema and a placeholder cell to every row.
    pub fn append_attribute(&mut self, name: &str) -> Result<()> {
        if self.schema.position(name).is_some() {
            return Err(DbError::DuplicateAttribute(name.to_string()));
        }
        self.schema.attributes.push(Attribute::new(name));
        for row in &mut self.rows {
            row.push_cell(NULL_PLACEHOLDER.to_string());
        }
        Ok(())
    }

    /// Drops an attribute from the schema and its cell from every row.
    pub fn remove_attribute(&mut self, name: &str) -> Result<()> {
        if name == ID_ATTRIBUTE {
            return Err(DbError::ProtectedAttribute(name.to_string()));
        }
        let index = self.attribute_index(name)?;
        self.schema.attributes.remove(index);
        for row in &mut self.rows {
            row.remove_cell(index)?;
        }
        Ok(())
    }

    /// Inner equality join of two loaded tables.
    ///
    /// The result is never persisted. Its attributes are a fresh `id`, then
    /// `primary.attr` for every primary attribute except `id` and the join
    /// attribute, then the same for the secondary table. Rows come out in
    /// primary order, and for each primary row in secondary order.
    ///
    /// # Errors
    /// Returns [DbError::AttributeNotFound] if either join attribute is missing
    /// from its own table.
    pub fn join(
        primary: &Table,
        primary_attribute: &str,
        secondary: &Table,
        secondary_attribute: &str,
    ) -> Result<Table> {
        let primary_key = primary.attribute_index(primary_attribute)?;
        let secondary_key = secondary.attribute_index(secondary_attribute)?;

        let carried = |table: &Table, key: usize| -> Vec<usize> {
            (1..table.schema.len()).filter(|&i| i != key).collect()
        };
        let primary_cells = carried(primary, primary_key);
        let secondary_cells = carried(secondary, secondary_key);

        let mut joined = Table::new(Path::new(""), &format!("{}_{}", primary.name, secondary.name));
        for (table, indices) in [(primary, &primary_cells), (secondary, &secondary_cells)] {
            for &i in indices {
                let name = &table.schema.attributes[i].name;
                joined
                    .schema
                    .attributes
                    .push(Attribute::new(format!("{}.{}", table.name, name)));
            }
        }

        for left in &primary.rows {
            let Some(left_key) = left.cell(primary_key) else {
                continue;
            };
            for right in &secondary.rows {
                let Some(right_key) = right.cell(secondary_key) else {
                    continue;
                };
                if !cells_equal(left_key, right_key) {
                    continue;
                }
                let mut cells = Vec::with_capacity(joined.schema.len());
                cells.push((joined.last_id + 1).to_string());
                cells.extend(
                    primary_cells
                        .iter()
                        .filter_map(|&i| left.cell(i))
                        .map(str::to_string),
                );
                cells.extend(
                    secondary_cells
                        .iter()
                        .filter_map(|&i| right.cell(i))
                        .map(str::to_string),
                );
                joined.rows.push(Row::new(cells));
                joined.last_id += 1;
            }
        }

        debug!(
            primary = %primary.name,
            secondary = %secondary.name,
            rows = joined.rows.len(),
            "tables joined"
        );
        Ok(joined)
    }

    /// Formats the selected attributes of the rows kept by `mask` (all rows
    /// when `None`): a header line of names, then one tab-delimited line per row.
    pub fn render(&self, projection: &[usize], mask: Option<&BitSlice>) -> String {
        let mut out = String::new();

        let header: Vec<&str> = projection
            .iter()
            .filter_map(|&i| self.schema.attributes.get(i))
            .map(|a| a.name.as_str())
            .collect();
        out.push_str(&header.join("\t"));
        out.push('\n');

        for (row_idx, row) in self.rows.iter().enumerate() {
            if mask.is_some_and(|m| !m.get(row_idx).is_some_and(|bit| *bit)) {
                continue;
            }
            let cells: Vec<&str> = projection.iter().filter_map(|&i| row.cell(i)).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }

    fn corrupt_schema(&self, reason: impl Into<String>) -> DbError {
        DbError::CorruptTable {
            path: self.schema_path.clone(),
            reason: reason.into(),
        }
    }

    fn corrupt_rows(&self, reason: impl Into<String>) -> DbError {
        DbError::CorruptTable {
            path: self.rows_path.clone(),
            reason: reason.into(),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| DbError::io(format!("reading {}", path.display()), e))
}

/// Writes `contents` to a sibling temporary file and renames it over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).map_err(|e| DbError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path).map_err(|e| {
        DbError::io(
            format!("replacing {} with {}", path.display(), tmp.display()),
            e,
        )
    })
}
