//! Types for discovered sources and their change events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// A source record exactly as a backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSource {
    /// Announced source name
    pub name: String,

    /// Connection endpoint, usually `ip:port`
    pub address: String,
}

impl RawSource {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// A discovered source.
///
/// Sources are rebuilt from backend records on every poll cycle and never
/// change afterwards. Two sources describe the same endpoint when their
/// names are equal; the address is informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    name: String,
    address: String,
}

impl Source {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Full announced name, e.g. `STUDIO-PC (Camera 1)`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection endpoint as reported by the backend
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Machine part of a `MACHINE (STREAM)` name
    pub fn machine_name(&self) -> Option<&str> {
        self.split_name().map(|(machine, _)| machine)
    }

    /// Stream part of a `MACHINE (STREAM)` name
    pub fn stream_name(&self) -> Option<&str> {
        self.split_name().map(|(_, stream)| stream)
    }

    /// The address parsed as a socket address, when it is one
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.address.parse().ok()
    }

    fn split_name(&self) -> Option<(&str, &str)> {
        let inner = self.name.strip_suffix(')')?;
        let open = inner.find(" (")?;
        let machine = &inner[..open];
        let stream = &inner[open + 2..];
        if machine.is_empty() || stream.is_empty() {
            return None;
        }
        Some((machine, stream))
    }
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        Self::new(raw.name, raw.address)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} @ {}", self.name, self.address)
        }
    }
}

/// Event emitted to async subscribers when a source appears or disappears
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Event type
    pub kind: SourceEventKind,

    /// The source that triggered the event
    pub source: Source,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl SourceEvent {
    pub fn new(kind: SourceEventKind, source: Source) -> Self {
        Self {
            kind,
            source,
            timestamp: Utc::now(),
        }
    }
}

/// Types of source events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEventKind {
    /// Source appeared since the previous snapshot
    Found,

    /// Source disappeared since the previous snapshot
    Lost,
}

impl SourceEventKind {
    pub fn description(&self) -> &str {
        match self {
            SourceEventKind::Found => "Source found on network",
            SourceEventKind::Lost => "Source no longer available",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_raw() {
        let source = Source::from(RawSource::new("STUDIO-PC (Camera 1)", "192.168.1.20:5961"));
        assert_eq!(source.name(), "STUDIO-PC (Camera 1)");
        assert_eq!(source.address(), "192.168.1.20:5961");
    }

    #[test]
    fn test_name_parts() {
        let source = Source::new("STUDIO-PC (Camera (wide))", "");
        assert_eq!(source.machine_name(), Some("STUDIO-PC"));
        assert_eq!(source.stream_name(), Some("Camera (wide)"));

        let plain = Source::new("just-a-name", "");
        assert_eq!(plain.machine_name(), None);
        assert_eq!(plain.stream_name(), None);
    }

    #[test]
    fn test_socket_addr() {
        let source = Source::new("A (1)", "10.0.0.5:5961");
        assert_eq!(source.socket_addr(), Some("10.0.0.5:5961".parse().unwrap()));
        assert_eq!(Source::new("A (1)", "studio.local").socket_addr(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Source::new("A (1)", "10.0.0.5:5961").to_string(), "A (1) @ 10.0.0.5:5961");
        assert_eq!(Source::new("A (1)", "").to_string(), "A (1)");
    }

    #[test]
    fn test_event_serialization() {
        let event = SourceEvent::new(SourceEventKind::Lost, Source::new("A (1)", "10.0.0.5:5961"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"lost\""));
        assert!(json.contains("A (1)"));
    }
}
