/// Replay files: recorded deliveries as JSON lines
///
/// ```text
/// # comment
/// {"subscription":"as_sender","records":[{"changeKind":"ADDED", ...}]}
/// {"subscription":"as_receiver","error":"permission denied"}
/// ```
use crate::change::ChangeRecord;
use crate::error::{Result, SyncError};
use crate::source::{Delivery, SourceError, Subscription};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::error;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeliveryLine {
    subscription: Subscription,
    #[serde(default)]
    records: Vec<ChangeRecord>,
    #[serde(default)]
    error: Option<String>,
}

impl From<DeliveryLine> for Delivery {
    fn from(line: DeliveryLine) -> Self {
        let batch = match line.error {
            Some(message) => Err(SourceError::new(message)),
            None => Ok(line.records),
        };
        Delivery {
            subscription: line.subscription,
            batch,
        }
    }
}

/// Parse one line; `line_no` is 1-based and only used for logging.
/// Blank lines and `#` comments yield `None`.
pub fn parse_delivery_line(line: &str, line_no: usize) -> Result<Option<Delivery>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let parsed: DeliveryLine = serde_json::from_str(line).map_err(|e| {
        error!("Replay line {} is not a valid delivery: {}", line_no, e);
        SyncError::Serialization(e)
    })?;
    Ok(Some(parsed.into()))
}

/// Parse replay text into deliveries, in file order
pub fn parse_deliveries(text: &str) -> Result<Vec<Delivery>> {
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if let Some(delivery) = parse_delivery_line(line, n + 1)? {
            out.push(delivery);
        }
    }
    Ok(out)
}

/// Load a replay file from disk
pub fn load_deliveries(path: &Path) -> Result<Vec<Delivery>> {
    let raw = fs::read_to_string(path).map_err(SyncError::Io)?;
    parse_deliveries(&raw)
}
