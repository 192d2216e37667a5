//! Run identifier format and validation.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

const MAX_RUN_ID_LEN: usize = 128;

/// Build a time-ordered run id: `run_<YYYYMMDD>_<HHMMSS>_<suffix>`.
pub fn format_run_id(now: DateTime<Utc>, suffix: &str) -> String {
    format!("run_{}_{suffix}", now.format("%Y%m%d_%H%M%S"))
}

/// Validate that a run id is safe to use as a file stem.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() {
        return Err(anyhow!("run id must not be empty"));
    }
    if run_id.len() > MAX_RUN_ID_LEN {
        return Err(anyhow!("run id must be at most {MAX_RUN_ID_LEN} characters"));
    }
    if run_id
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    {
        return Err(anyhow!("run id must be [A-Za-z0-9_-] only (got '{run_id}')"));
    }
    Ok(())
}
