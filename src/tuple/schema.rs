use std::fmt;
use std::slice;
use std::str::FromStr;

use crate::common::{Result, StorageError};

use super::DataType;

/// One named, typed attribute of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)
    }
}

/// Attributes of a relation in storage order.
///
/// Records of a schema are encoded attribute by attribute in this order, so
/// a schema must not change once records have been written with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Position of the first attribute called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn columns(&self) -> slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Bytes taken by a record's offset directory: one entry per column plus
    /// the trailing end offset.
    pub fn offset_directory_size(&self) -> usize {
        4 * (self.columns.len() + 1)
    }

    /// Largest encoded size of a record of this schema.
    pub fn max_record_size(&self) -> usize {
        self.offset_directory_size()
            + self
                .columns
                .iter()
                .map(|c| c.data_type.max_size())
                .sum::<usize>()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", column)?;
        }
        write!(f, ")")
    }
}

/// Parses a comma separated attribute list such as
/// `id INT, name VARCHAR(20), born DATE`.
impl FromStr for Schema {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s.trim();
        let body = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .unwrap_or(body);

        let mut builder = Schema::builder();
        for part in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, data_type) = part.split_once(char::is_whitespace).ok_or_else(|| {
                StorageError::Config(format!("attribute {:?} has no type", part))
            })?;
            builder = builder.column(name, data_type.trim().parse()?);
        }
        Ok(builder.build())
    }
}

/// Collects attributes one at a time.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }
}
