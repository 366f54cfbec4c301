//! Connection metadata and health reporting.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LifecycleState, TransportKind};

/// A single connection-info value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    /// Boolean flag.
    Flag(bool),
    /// Integer quantity (ports, counts, seconds).
    Number(i64),
    /// Free-form text (URLs, names).
    Text(String),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for InfoValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<u16> for InfoValue {
    fn from(value: u16) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<u64> for InfoValue {
    fn from(value: u64) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for InfoValue {
    fn from(value: usize) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for InfoValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for InfoValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for InfoValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<TransportKind> for InfoValue {
    fn from(value: TransportKind) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<LifecycleState> for InfoValue {
    fn from(value: LifecycleState) -> Self {
        Self::Text(value.to_string())
    }
}

/// Descriptive record of a live binding, for diagnostics and health output.
///
/// Produced fresh on every query. The `protocol` key is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionInfo(BTreeMap<String, InfoValue>);

impl ConnectionInfo {
    /// Start a record for `protocol`.
    pub fn new(protocol: TransportKind) -> Self {
        let mut map = BTreeMap::new();
        map.insert("protocol".to_string(), InfoValue::from(protocol));
        Self(map)
    }

    /// Add or replace a key, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<InfoValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<InfoValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look a key up.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.0.get(key)
    }

    /// Look a text key up.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(InfoValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Look an integer key up.
    pub fn get_number(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(InfoValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// The protocol name.
    pub fn protocol(&self) -> Option<&str> {
        self.get_str("protocol")
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The binding is running.
    Healthy,
    /// The binding is not serving.
    Unhealthy,
}

/// Health document served by the health routes and reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Verdict; `healthy` iff the binding is running.
    pub status: HealthStatus,
    /// Transport kind.
    pub transport: TransportKind,
    /// Lifecycle state at the time of the report.
    pub state: LifecycleState,
    /// Connection metadata.
    pub connection: ConnectionInfo,
}

impl HealthReport {
    /// Build a report; the verdict is derived from `state`.
    pub fn new(transport: TransportKind, state: LifecycleState, connection: ConnectionInfo) -> Self {
        let status = if state == LifecycleState::Running {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self {
            status,
            transport,
            state,
            connection,
        }
    }

    /// Whether the verdict is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
