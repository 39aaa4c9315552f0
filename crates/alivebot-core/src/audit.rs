//! Append-only audit trail for security-relevant events.
//!
//! One JSON object per line. Disabled entirely when no path is configured.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};

use chrono::Utc;
use serde::Serialize;

use crate::Result;

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

impl AuditEvent {
    pub fn denied(user_id: i64, username: Option<&str>, command: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "denied".to_string(),
            user_id: Some(user_id),
            username: username.map(|s| s.to_string()),
            command: Some(command.to_string()),
            target: None,
            outcome: None,
            delivered: None,
            failed: None,
        }
    }

    pub fn roster_change(
        user_id: i64,
        username: Option<&str>,
        command: &str,
        target: i64,
        outcome: &str,
    ) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "roster_change".to_string(),
            user_id: Some(user_id),
            username: username.map(|s| s.to_string()),
            command: Some(command.to_string()),
            target: Some(target),
            outcome: Some(outcome.to_string()),
            delivered: None,
            failed: None,
        }
    }

    pub fn dispatch(delivered: usize, failed: usize) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "dispatch".to_string(),
            user_id: None,
            username: None,
            command: None,
            target: None,
            outcome: None,
            delivered: Some(delivered),
            failed: Some(failed),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: Option<PathBuf>,
}

impl AuditLogger {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn write(&self, event: AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
