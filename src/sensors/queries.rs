use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{reading_cache::ReadingCache, sensors::models::Reading};

/// Returned in place of a value when no reading has arrived for a device yet.
pub const NOT_READY: &str = "NOT_READY";

/// Device queried when the caller does not name one.
pub const DEFAULT_DEVICE_NAME: &str = "RAB";

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Accelerometer,
    Gyroscope,
}

/// One entry of the `accX|accY|accZ|gyrX|gyrY|gyrZ` menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub sensor: Sensor,
    pub axis: Axis,
}

impl Selector {
    pub const ALL: [Selector; 6] = [
        Selector::acc(Axis::X),
        Selector::acc(Axis::Y),
        Selector::acc(Axis::Z),
        Selector::gyr(Axis::X),
        Selector::gyr(Axis::Y),
        Selector::gyr(Axis::Z),
    ];

    pub const fn acc(axis: Axis) -> Self {
        Self { sensor: Sensor::Accelerometer, axis }
    }

    pub const fn gyr(axis: Axis) -> Self {
        Self { sensor: Sensor::Gyroscope, axis }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::acc(Axis::X)
    }
}

impl FromStr for Selector {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sensor, axis) = match s.get(..3).zip(s.get(3..)) {
            Some(parts) => parts,
            None => return Err(QueryError::UnknownSelector(s.to_owned())),
        };
        let sensor = match sensor {
            "acc" => Sensor::Accelerometer,
            "gyr" => Sensor::Gyroscope,
            _ => return Err(QueryError::UnknownSelector(s.to_owned())),
        };
        let axis = match axis {
            "X" => Axis::X,
            "Y" => Axis::Y,
            "Z" => Axis::Z,
            _ => return Err(QueryError::UnknownSelector(s.to_owned())),
        };
        Ok(Self { sensor, axis })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sensor = match self.sensor {
            Sensor::Accelerometer => "acc",
            Sensor::Gyroscope => "gyr",
        };
        let axis = match self.axis {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        write!(f, "{sensor}{axis}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown selector {0:?}, expected one of accX, accY, accZ, gyrX, gyrY, gyrZ")]
    UnknownSelector(String),
}

// ---------------------------------------------------------------------------
// QueryValue
// ---------------------------------------------------------------------------

/// Result of a façade query. Serialises to the bare JSON value, with
/// `NotReady` rendered as the `"NOT_READY"` string.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(f64),
    Bool(bool),
    NotReady,
}

impl QueryValue {
    pub fn is_ready(&self) -> bool {
        !matches!(self, QueryValue::NotReady)
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(s) => f.write_str(s),
            QueryValue::Number(n) => write!(f, "{n}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::NotReady => f.write_str(NOT_READY),
        }
    }
}

impl Serialize for QueryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryValue::Text(s) => serializer.serialize_str(s),
            QueryValue::Number(n) => serializer.serialize_f64(*n),
            QueryValue::Bool(b) => serializer.serialize_bool(*b),
            QueryValue::NotReady => serializer.serialize_str(NOT_READY),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Synchronous lookups over a `ReadingCache`.
///
/// Every query answers `QueryValue::NotReady` for a device that has not
/// reported yet instead of failing, so it is safe to poll repeatedly.
#[derive(Debug, Clone)]
pub struct Queries {
    cache: ReadingCache,
}

impl Queries {
    pub fn new(cache: ReadingCache) -> Self {
        Self { cache }
    }

    fn with_reading(&self, name: &str, f: impl FnOnce(&Reading) -> QueryValue) -> QueryValue {
        match self.cache.get(name) {
            Some(reading) => f(&reading),
            None => QueryValue::NotReady,
        }
    }

    /// `Acc: x,y,z, Gyr: x,y,z`
    pub fn status(&self, name: &str) -> QueryValue {
        self.with_reading(name, |r| QueryValue::Text(r.summary()))
    }

    pub fn axis(&self, name: &str, selector: Selector) -> QueryValue {
        self.with_reading(name, |r| {
            let triple = match selector.sensor {
                Sensor::Accelerometer => &r.accelerometer,
                Sensor::Gyroscope => &r.gyroscope,
            };
            QueryValue::Number(triple[selector.axis.index()])
        })
    }

    /// Like [`Queries::axis`] but takes the raw menu value, rejecting
    /// anything outside the menu.
    pub fn axis_by_name(&self, name: &str, selector: &str) -> Result<QueryValue, QueryError> {
        Ok(self.axis(name, selector.parse()?))
    }

    pub fn accelerometer(&self, name: &str, axis: Axis) -> QueryValue {
        self.axis(name, Selector::acc(axis))
    }

    pub fn gyroscope(&self, name: &str, axis: Axis) -> QueryValue {
        self.axis(name, Selector::gyr(axis))
    }

    pub fn trigger(&self, name: &str) -> QueryValue {
        self.with_reading(name, |r| QueryValue::Bool(r.trigger))
    }

    pub fn stored_count(&self, name: &str) -> QueryValue {
        self.with_reading(name, |r| QueryValue::Number(r.stored_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries_with_rab() -> Queries {
        let cache = ReadingCache::new();
        cache
            .apply(r#"{"name":"RAB","acc":[1,2,3],"gyr":[4,5,6],"trigger":true,"count":[0,7]}"#)
            .unwrap();
        Queries::new(cache)
    }

    #[test]
    fn rab_scenario() {
        let q = queries_with_rab();
        assert_eq!(q.stored_count("RAB"), QueryValue::Number(7.0));
        assert_eq!(q.axis_by_name("RAB", "accY").unwrap(), QueryValue::Number(2.0));
        assert_eq!(q.trigger("RAB"), QueryValue::Bool(true));

        let status = q.status("RAB").to_string();
        assert!(status.contains("1,2,3"));
        assert!(status.contains("4,5,6"));
    }

    #[test]
    fn every_selector_maps_to_its_component() {
        let q = queries_with_rab();
        let got: Vec<_> = Selector::ALL.iter().map(|s| q.axis("RAB", *s)).collect();
        let want: Vec<_> = (1..=6).map(|v| QueryValue::Number(v as f64)).collect();
        assert_eq!(got, want);

        assert_eq!(q.gyroscope("RAB", Axis::Z), QueryValue::Number(6.0));
        assert_eq!(q.accelerometer("RAB", Axis::X), QueryValue::Number(1.0));
    }

    #[test]
    fn unknown_device_is_not_ready_everywhere() {
        let q = queries_with_rab();
        assert_eq!(q.status("UNKNOWN"), QueryValue::NotReady);
        assert_eq!(q.trigger("UNKNOWN"), QueryValue::NotReady);
        assert_eq!(q.stored_count("UNKNOWN"), QueryValue::NotReady);
        for s in Selector::ALL {
            assert_eq!(q.axis("UNKNOWN", s), QueryValue::NotReady);
        }
        assert_eq!(q.status("UNKNOWN").to_string(), NOT_READY);
    }

    #[test]
    fn unknown_selector_is_an_explicit_error() {
        let q = queries_with_rab();
        for bad in ["accW", "acc", "ACCX", "gyr", "", "temperature", "accXY"] {
            assert_eq!(
                q.axis_by_name("RAB", bad),
                Err(QueryError::UnknownSelector(bad.to_owned()))
            );
        }
    }

    #[test]
    fn selector_display_round_trips_through_from_str() {
        for s in Selector::ALL {
            assert_eq!(s.to_string().parse::<Selector>().unwrap(), s);
        }
        assert_eq!(Selector::default().to_string(), "accX");
    }

    #[test]
    fn later_reading_replaces_earlier_one() {
        let q = queries_with_rab();
        q.cache
            .apply(r#"{"name":"RAB","acc":[0,0,0],"gyr":[0,0,0],"trigger":false,"count":[5,0]}"#)
            .unwrap();
        assert_eq!(q.stored_count("RAB"), QueryValue::Number(0.0));
        assert_eq!(q.trigger("RAB"), QueryValue::Bool(false));
        assert_eq!(q.axis_by_name("RAB", "gyrZ").unwrap(), QueryValue::Number(0.0));
    }

    #[test]
    fn query_value_serialises_to_bare_json() {
        assert_eq!(serde_json::to_value(QueryValue::Number(7.0)).unwrap(), serde_json::json!(7.0));
        assert_eq!(serde_json::to_value(QueryValue::Bool(true)).unwrap(), serde_json::json!(true));
        assert_eq!(serde_json::to_value(QueryValue::Number(2.5)).unwrap(), serde_json::json!(2.5));
        assert_eq!(
            serde_json::to_value(QueryValue::NotReady).unwrap(),
            serde_json::json!(NOT_READY)
        );
        assert!(!QueryValue::NotReady.is_ready());
        assert!(QueryValue::Text("x".into()).is_ready());
    }
}
