use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};

use crate::sensors::models::{DecodeError, Reading};

#[derive(Debug, Clone)]
struct Entry {
    reading: Reading,
    received_at: DateTime<Utc>,
}

/// In-memory store of the most recent `Reading` per device name.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared between the
/// stream task and query callers. Uses a blocking `std::sync::RwLock` so
/// lookups stay synchronous; the lock is only held for a map insert or a
/// clone, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `raw` and, if it is a complete reading, replace the entry for its
    /// device. On error the cache is left untouched.
    pub fn apply(&self, raw: &str) -> Result<String, DecodeError> {
        let reading = Reading::decode(raw)?;
        let name = reading.name.clone();
        self.update(reading);
        Ok(name)
    }

    /// Overwrite the cached reading for `reading.name`.
    pub fn update(&self, reading: Reading) {
        let entry = Entry {
            reading,
            received_at: Utc::now(),
        };
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.reading.name.clone(), entry);
    }

    /// Return the latest reading for `name`, if one has ever arrived.
    pub fn get(&self, name: &str) -> Option<Reading> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|e| e.reading.clone())
    }

    /// Return a snapshot of all latest readings.
    pub fn all(&self) -> Vec<Reading> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.reading.clone())
            .collect()
    }

    /// `(name, received_at)` for every cached device, sorted by name.
    pub fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| (e.reading.name.clone(), e.received_at))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
