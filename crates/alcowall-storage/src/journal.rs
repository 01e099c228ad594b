//! Append-only JSONL journals.
//!
//! The kiosk keeps a local audit trail independent of the retry queue:
//! `alcohol_results.json` gets one line per concluded measurement and
//! `coinInserted.json` one line per credited coin.

use crate::error::StorageResult;
use alcowall_core::{CoinInsertion, DeviceId, Measurement};
use alcowall_network::backend::wire_timestamp;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Line of `alcohol_results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlcoholResultEntry {
    pub device_id: DeviceId,
    pub alcohol_level: f64,
    pub datetime: NaiveDateTime,
}

impl From<&Measurement> for AlcoholResultEntry {
    fn from(measurement: &Measurement) -> Self {
        Self {
            device_id: measurement.device_id.clone(),
            alcohol_level: measurement.alcohol_level,
            datetime: wire_timestamp(measurement.timestamp),
        }
    }
}

/// Line of `coinInserted.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinJournalEntry {
    pub device_id: DeviceId,
    pub cash_value: i64,
    pub date: NaiveDateTime,
}

impl From<&CoinInsertion> for CoinJournalEntry {
    fn from(coin: &CoinInsertion) -> Self {
        Self {
            device_id: coin.device_id.clone(),
            cash_value: coin.cash_value,
            date: wire_timestamp(coin.timestamp),
        }
    }
}

/// A JSONL file holding entries of type `T`.
#[derive(Debug, Clone)]
pub struct Journal<T> {
    path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

pub type AlcoholResultsJournal = Journal<AlcoholResultEntry>;
pub type CoinJournal = Journal<CoinJournalEntry>;

impl<T: Serialize + DeserializeOwned> Journal<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a line.
    pub async fn append(&self, entry: &T) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read all entries. Unparseable lines are skipped.
    pub async fn read_all(&self) -> StorageResult<Vec<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %self.path.display(), line = number + 1, error = %e, "skipping journal line")
                }
            }
        }
        Ok(entries)
    }
}
