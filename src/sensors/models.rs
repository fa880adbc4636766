use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Index into `count` that holds the number of samples stored on the device.
pub const STORED_COUNT_INDEX: usize = 1;

/// Latest decoded state of one Rabboni device, exactly as it came off the stream.
///
/// Wire format (JSON text frame):
///
/// ```json
/// { "name": "RAB", "acc": [1, 2, 3], "gyr": [4, 5, 6], "trigger": true, "count": [0, 7] }
/// ```
///
/// Unknown fields are ignored. `acc` and `gyr` must have exactly three
/// elements and `count` at least two, otherwise the whole frame is rejected.
/// Counters are plain JSON numbers; fractional and negative values are kept
/// as sent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    pub name: String,
    #[serde(rename = "acc")]
    pub accelerometer: [f64; 3],
    #[serde(rename = "gyr")]
    pub gyroscope: [f64; 3],
    pub trigger: bool,
    #[serde(rename = "count")]
    pub sample_counters: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a valid reading: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reading has an empty device name")]
    EmptyName,
    #[error("reading carries {len} sample counter(s), expected at least {}", STORED_COUNT_INDEX + 1)]
    MissingStoredCount { len: usize },
}

impl Reading {
    /// Decode a raw stream payload. Nothing is partially accepted: any shape
    /// problem rejects the whole payload.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let reading: Reading = serde_json::from_str(raw)?;

        if reading.name.is_empty() {
            return Err(DecodeError::EmptyName);
        }
        if reading.sample_counters.len() <= STORED_COUNT_INDEX {
            return Err(DecodeError::MissingStoredCount {
                len: reading.sample_counters.len(),
            });
        }

        Ok(reading)
    }

    pub fn stored_count(&self) -> f64 {
        // `decode` guarantees the index exists; readings built by hand fall back to 0.
        self.sample_counters
            .get(STORED_COUNT_INDEX)
            .copied()
            .unwrap_or_default()
    }

    /// Human-readable summary, e.g. `Acc: 1,2,3, Gyr: 4,5,6`.
    pub fn summary(&self) -> String {
        format!(
            "Acc: {}, Gyr: {}",
            Triple(&self.accelerometer),
            Triple(&self.gyroscope)
        )
    }
}

/// Comma-joined rendering of an axis triple.
struct Triple<'a>(&'a [f64; 3]);

impl fmt::Display for Triple<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "{x},{y},{z}")
    }
}
