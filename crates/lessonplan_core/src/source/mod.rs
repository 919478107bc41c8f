//! Tabular dataset sources.
//!
//! # Responsibility
//! - Load flat tables (header + rows) from local CSV files or CSV export URLs.
//! - Map dataset headers onto canonical column ids through alias tables.
//!
//! # Invariants
//! - Every row of a loaded `Table` has exactly `headers.len()` cells.
//! - Sources never mutate the data they read.

pub mod columns;
mod csv_table;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub use csv_table::{parse_csv, CsvFileSource, HttpCsvSource, HTTP_TIMEOUT};

pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while locating, fetching or decoding a table.
#[derive(Debug)]
pub enum SourceError {
    /// Location string is neither an http(s) URL nor a usable path.
    InvalidLocation(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Request could not be sent or the body could not be read.
    Http { url: String, message: String },
    /// Server answered with a non-success status.
    Status { url: String, status: u16 },
    /// CSV payload could not be decoded.
    Malformed(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocation(value) => write!(f, "invalid dataset location `{value}`"),
            Self::Io { path, source } => {
                write!(f, "failed to read dataset `{}`: {source}", path.display())
            }
            Self::Http { url, message } => write!(f, "failed to fetch `{url}`: {message}"),
            Self::Status { url, status } => {
                write!(f, "dataset request to `{url}` returned status {status}")
            }
            Self::Malformed(message) => write!(f, "malformed dataset: {message}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// In-memory flat table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table, padding or cutting rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read-only provider of one tabular dataset.
pub trait TableSource {
    /// Human-readable location for logs and error messages.
    fn describe(&self) -> String;
    /// Loads a fresh copy of the whole table.
    fn load_table(&self) -> SourceResult<Table>;
}

impl<T: TableSource + ?Sized> TableSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn load_table(&self) -> SourceResult<Table> {
        (**self).load_table()
    }
}

/// Fixed table held in memory; used for seeded data and tests.
#[derive(Debug, Clone)]
pub struct StaticTableSource {
    table: Table,
}

impl StaticTableSource {
    pub fn new(table: Table) -> Self {
        Self { table }
    }
}

impl TableSource for StaticTableSource {
    fn describe(&self) -> String {
        format!("memory:{}rows", self.table.len())
    }

    fn load_table(&self) -> SourceResult<Table> {
        Ok(self.table.clone())
    }
}

/// Parsed dataset location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Path(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// Classifies a configured location string.
    pub fn parse(raw: &str) -> SourceResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SourceError::InvalidLocation(raw.to_string()));
        }
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Ok(Self::Url(trimmed.to_string()));
        }
        if lowered.contains("://") {
            return Err(SourceError::InvalidLocation(trimmed.to_string()));
        }
        Ok(Self::Path(PathBuf::from(trimmed)))
    }

    /// Opens the matching source implementation.
    pub fn open(&self) -> SourceResult<Box<dyn TableSource>> {
        match self {
            Self::Path(path) => Ok(Box::new(CsvFileSource::new(path.clone()))),
            Self::Url(url) => Ok(Box::new(HttpCsvSource::new(url.clone())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SourceError, SourceLocation, Table};
    use std::path::PathBuf;

    #[test]
    fn location_parse_distinguishes_urls_and_paths() {
        assert_eq!(
            SourceLocation::parse(" https://example.com/export?format=csv ").unwrap(),
            SourceLocation::Url("https://example.com/export?format=csv".to_string())
        );
        assert_eq!(
            SourceLocation::parse("data/curriculum.csv").unwrap(),
            SourceLocation::Path(PathBuf::from("data/curriculum.csv"))
        );
    }

    #[test]
    fn location_parse_rejects_blank_and_unknown_schemes() {
        assert!(matches!(
            SourceLocation::parse("   "),
            Err(SourceError::InvalidLocation(_))
        ));
        assert!(matches!(
            SourceLocation::parse("ftp://example.com/a.csv"),
            Err(SourceError::InvalidLocation(_))
        ));
    }

    #[test]
    fn table_rows_are_resized_to_header_width() {
        let table = Table::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert!(table.rows.iter().all(|row| row.len() == 2));
        assert_eq!(table.rows[0][1], "");
    }
}
