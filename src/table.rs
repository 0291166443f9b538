//! Tabular result type
//!
//! Every endpoint response ends up as a [`Table`]: rows keyed by a Europe/Rome
//! timestamp (or by year, or by position when the records carry neither),
//! with named columns of loosely typed [`Cell`]s.

use std::collections::HashMap;
use std::fmt;
use std::io;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::ParseError;

/// One value in a table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    /// Null renders as an empty string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Bool(value) => write!(f, "{}", value),
            Cell::Text(value) => f.write_str(value),
        }
    }
}

/// Row index value
///
/// Ordering follows the variant first, then the value, so a table mixing
/// kinds (which the parser never produces) still sorts deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Timestamp(DateTime<Tz>),
    Year(i32),
    Position(usize),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            RowKey::Year(year) => write!(f, "{}", year),
            RowKey::Position(pos) => write!(f, "{}", pos),
        }
    }
}

/// What the row keys of a table represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    Timestamp,
    Year,
    #[default]
    Position,
}

impl IndexKind {
    /// Header of the index column in CSV output
    pub fn column_name(&self) -> &'static str {
        match self {
            IndexKind::Timestamp => "timestamp",
            IndexKind::Year => "year",
            IndexKind::Position => "row",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: RowKey,

    /// Same length and order as the table's columns
    pub cells: Vec<Cell>,
}

/// Timestamp-indexed table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: IndexKind,
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl Table {
    pub fn new(index: IndexKind, columns: Vec<String>) -> Self {
        Self {
            index,
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, key: RowKey, mut cells: Vec<Cell>) {
        cells.resize(self.columns.len(), Cell::Null);
        self.rows.push(TableRow { key, cells });
    }

    pub fn index(&self) -> IndexKind {
        self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.iter().map(|row| &row.key)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// All cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row.cells[idx]).collect())
    }

    /// Column as numbers; non-numeric cells come back as `None`
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(Cell::as_f64).collect())
    }

    /// Stable sort by row key
    pub fn sort_by_key(&mut self) {
        self.rows.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Concatenate tables, aligning columns by name
    ///
    /// Columns are the union in first-seen order; cells a table lacks are
    /// null. Timestamp-indexed rows are stably re-sorted by key. Other rows
    /// keep the order of `tables`, and position keys are renumbered so they
    /// stay unique across the result.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();

        let index = tables
            .iter()
            .find(|table| !table.is_empty())
            .or_else(|| tables.first())
            .map(Table::index)
            .unwrap_or_default();

        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut result = Table::new(index, columns);
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|column| result.column_index(column))
                .collect();

            for row in table.rows {
                let mut cells = vec![Cell::Null; result.columns.len()];
                for (cell, target) in row.cells.into_iter().zip(&mapping) {
                    cells[*target] = cell;
                }
                let key = match (index, row.key) {
                    (IndexKind::Position, RowKey::Position(_)) => {
                        RowKey::Position(result.rows.len())
                    }
                    (_, key) => key,
                };
                result.rows.push(TableRow { key, cells });
            }
        }

        if index == IndexKind::Timestamp {
            result.sort_by_key();
        }
        result
    }

    /// Reshape long records into one column per category
    ///
    /// Produces one row per distinct key and one column per distinct value
    /// of `category` (first-seen order), filled from `value`. When a key and
    /// category repeat, the later record wins.
    pub fn pivot(&self, category: &str, value: &str) -> Result<Table, ParseError> {
        let category_idx = self
            .column_index(category)
            .ok_or_else(|| ParseError::MissingColumn(category.to_string()))?;
        let value_idx = self
            .column_index(value)
            .ok_or_else(|| ParseError::MissingColumn(value.to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        let mut keys: Vec<RowKey> = Vec::new();
        let mut row_of_key: HashMap<RowKey, usize> = HashMap::new();
        let mut entries: Vec<(usize, usize, Cell)> = Vec::new();

        for row in &self.rows {
            let name = row.cells[category_idx].to_string();
            let column = match columns.iter().position(|c| *c == name) {
                Some(pos) => pos,
                None => {
                    columns.push(name);
                    columns.len() - 1
                }
            };
            let row_idx = *row_of_key.entry(row.key.clone()).or_insert_with(|| {
                keys.push(row.key.clone());
                keys.len() - 1
            });
            entries.push((row_idx, column, row.cells[value_idx].clone()));
        }

        let mut grid = vec![vec![Cell::Null; columns.len()]; keys.len()];
        for (row_idx, column, cell) in entries {
            grid[row_idx][column] = cell;
        }

        let mut result = Table::new(self.index, columns);
        for (key, cells) in keys.into_iter().zip(grid) {
            result.push_row(key, cells);
        }
        result.sort_by_key();
        Ok(result)
    }

    /// Write the table as CSV with the index as first column
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.index.column_name().to_string());
        header.extend(self.columns.iter().cloned());
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.cells.len() + 1);
            record.push(row.key.to_string());
            record.extend(row.cells.iter().map(Cell::to_string));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}
