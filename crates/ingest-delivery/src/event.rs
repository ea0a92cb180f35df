// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Structured events as seen by the delivery pipeline.
//!
//! Events are produced upstream and never mutated by the pipeline. The only
//! rendering offered here is [`Event::render_line`], which the downstream
//! batcher uses to obtain one newline-terminated compact JSON record per event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Severity of an event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown level '{}'", self.0)
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "trace" => Ok(Level::Verbose),
            "debug" => Ok(Level::Debug),
            "information" | "info" => Ok(Level::Information),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" | "critical" => Ok(Level::Fatal),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// An immutable structured event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: OffsetDateTime,
    pub level: Level,
    pub message_template: String,
    pub properties: BTreeMap<String, Value>,
    pub error: Option<String>,
}

impl Event {
    /// Creates an event stamped with the current UTC time.
    #[must_use]
    pub fn new(level: Level, message_template: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            level,
            message_template: message_template.into(),
            properties: BTreeMap::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Renders the event as one compact JSON object followed by `\n`.
    ///
    /// Reserved fields are `@t`, `@mt`, `@l` (omitted for `Information`) and
    /// `@x`. Property names that start with `@` are escaped by doubling it.
    #[must_use]
    pub fn render_line(&self) -> String {
        let mut record = Map::new();
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        record.insert("@t".to_string(), Value::String(timestamp));
        record.insert(
            "@mt".to_string(),
            Value::String(self.message_template.clone()),
        );
        if self.level != Level::Information {
            record.insert("@l".to_string(), Value::String(self.level.to_string()));
        }
        if let Some(error) = &self.error {
            record.insert("@x".to_string(), Value::String(error.clone()));
        }
        for (name, value) in &self.properties {
            let key = if name.starts_with('@') {
                format!("@{name}")
            } else {
                name.clone()
            };
            record.insert(key, value.clone());
        }

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fixed_event(level: Level) -> Event {
        Event {
            timestamp: datetime!(2024-05-01 10:30:00 UTC),
            ..Event::new(level, "Processed {Count} orders")
        }
    }

    #[test]
    fn test_level_parsing_accepts_aliases() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::Information);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Verbose".parse::<Level>().unwrap(), Level::Verbose);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Verbose < Level::Information);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_render_information_omits_level() {
        let line = fixed_event(Level::Information)
            .with_property("Count", 3)
            .render_line();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["@t"], "2024-05-01T10:30:00Z");
        assert_eq!(value["@mt"], "Processed {Count} orders");
        assert_eq!(value["Count"], 3);
        assert!(value.get("@l").is_none());
        assert!(value.get("@x").is_none());
    }

    #[test]
    fn test_render_error_with_exception_and_escaped_property() {
        let line = fixed_event(Level::Error)
            .with_error("System.TimeoutException")
            .with_property("@source", "queue")
            .render_line();
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["@l"], "Error");
        assert_eq!(value["@x"], "System.TimeoutException");
        assert_eq!(value["@@source"], "queue");
    }
}
