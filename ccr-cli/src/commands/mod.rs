//! Subcommand implementations. Each module exposes a clap enum and a `run`.

pub mod agent;
pub mod lookup;
pub mod project;
pub mod workflow;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Parse an optional `--expect-updated-at` value.
pub(crate) fn parse_expected(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .with_context(|| format!("'{v}' is not an RFC 3339 timestamp"))
        })
        .transpose()
}
