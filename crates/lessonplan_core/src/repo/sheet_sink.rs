//! Remote spreadsheet append sink.
//!
//! # Responsibility
//! - Append one note row through a spreadsheet values-append endpoint.
//! - Resolve the bearer token out-of-band (environment variable or caller).
//!
//! # Invariants
//! - One request carries exactly one row, already in the sheet's column
//!   order; the service applies it whole.
//! - No retry on failure; the caller keeps the submitted content.
//! - Tokens and row contents are never logged.

use crate::repo::note_repo::{RowSink, WriteError};
use crate::source::HTTP_TIMEOUT;
use log::{error, info};
use serde_json::json;
use std::time::Instant;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Where the bearer token comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// Read from this environment variable on every append.
    Env(String),
    /// Fixed token supplied by the caller.
    Static(String),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(name) => f.debug_tuple("Env").field(name).finish(),
            Self::Static(_) => f.debug_tuple("Static").field(&"<redacted>").finish(),
        }
    }
}

impl TokenSource {
    fn resolve(&self) -> Result<String, WriteError> {
        let token = match self {
            Self::Env(name) => std::env::var(name).map_err(|_| {
                WriteError::Unauthorized(format!("environment variable `{name}` is not set"))
            })?,
            Self::Static(value) => value.clone(),
        };
        if token.trim().is_empty() {
            return Err(WriteError::Unauthorized("empty access token".to_string()));
        }
        Ok(token.trim().to_string())
    }
}

/// Appends rows through an HTTP values-append API.
#[derive(Debug, Clone)]
pub struct SheetAppendSink {
    endpoint: String,
    token: TokenSource,
    client: reqwest::blocking::Client,
}

impl SheetAppendSink {
    pub fn new(endpoint: impl Into<String>, token: TokenSource) -> Result<Self, WriteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| WriteError::Transport(err.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            token,
            client,
        })
    }

    /// Request body for one row.
    pub fn request_body(row: &[String]) -> serde_json::Value {
        json!({
            "majorDimension": "ROWS",
            "values": [row],
        })
    }
}

impl RowSink for SheetAppendSink {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    fn append_row(&self, row: &[String]) -> Result<(), WriteError> {
        let started_at = Instant::now();
        let token = self.token.resolve()?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&Self::request_body(row))
            .send()
            .map_err(|err| {
                error!(
                    "event=sheet_append module=repo status=error duration_ms={} error_code=transport",
                    started_at.elapsed().as_millis()
                );
                WriteError::Transport(err.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            info!(
                "event=sheet_append module=repo status=ok duration_ms={} cells={}",
                started_at.elapsed().as_millis(),
                row.len()
            );
            return Ok(());
        }

        error!(
            "event=sheet_append module=repo status=error duration_ms={} http_status={}",
            started_at.elapsed().as_millis(),
            status.as_u16()
        );
        let body = response
            .text()
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(WriteError::Unauthorized(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }
        Err(WriteError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
