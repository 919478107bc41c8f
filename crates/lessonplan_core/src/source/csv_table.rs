//! CSV-backed table sources (local file and HTTP export URL).

use super::{SourceError, SourceResult, Table, TableSource};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Client-level timeout applied to every dataset request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

const UTF8_BOM: char = '\u{feff}';

/// Decodes a CSV payload whose first record is the header row.
///
/// Ragged rows are tolerated and padded to the header width.
pub fn parse_csv(bytes: &[u8]) -> SourceResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|err| SourceError::Malformed(err.to_string()))?
        .iter()
        .map(|value| value.trim_start_matches(UTF8_BOM).trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| SourceError::Malformed(err.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(Table::new(headers, rows))
}

/// Table read from a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for CsvFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_table(&self) -> SourceResult<Table> {
        let bytes = std::fs::read(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_csv(&bytes)
    }
}

/// Table fetched from a CSV export URL with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpCsvSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpCsvSource {
    pub fn new(url: impl Into<String>) -> SourceResult<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| SourceError::Http {
                url: url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { url, client })
    }
}

impl TableSource for HttpCsvSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn load_table(&self) -> SourceResult<Table> {
        let started_at = Instant::now();
        let response = self.client.get(&self.url).send().map_err(|err| {
            error!(
                "event=dataset_fetch module=source status=error duration_ms={} error_code=transport",
                started_at.elapsed().as_millis()
            );
            SourceError::Http {
                url: self.url.clone(),
                message: err.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "event=dataset_fetch module=source status=error duration_ms={} http_status={}",
                started_at.elapsed().as_millis(),
                status.as_u16()
            );
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|err| SourceError::Http {
            url: self.url.clone(),
            message: err.to_string(),
        })?;
        info!(
            "event=dataset_fetch module=source status=ok duration_ms={} bytes={}",
            started_at.elapsed().as_millis(),
            bytes.len()
        );
        parse_csv(&bytes)
    }
}
