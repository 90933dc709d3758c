use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Placeholder used by the context resolvers when a value could not be determined.
pub const UNKNOWN: &str = "Unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Runtime facts a personalization rule is evaluated against.
///
/// Built fresh for every request by the caller; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    /// Wall-clock instant of the request, in the requester's local time.
    pub time: NaiveDateTime,
    #[serde(default = "unknown")]
    pub weather: String,
    #[serde(default = "unknown")]
    pub location: String,
    /// Prior scans by the requesting identity. Absent means zero.
    #[serde(default)]
    pub scan_count: Option<u32>,
}

impl UserContext {
    pub fn at(time: NaiveDateTime) -> Self {
        Self {
            time,
            weather: unknown(),
            location: unknown(),
            scan_count: None,
        }
    }

    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn with_weather(mut self, weather: impl Into<String>) -> Self {
        self.weather = weather.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_scan_count(mut self, scan_count: u32) -> Self {
        self.scan_count = Some(scan_count);
        self
    }

    /// Zero-padded 24-hour `HH:MM` rendering of [`UserContext::time`].
    pub fn clock(&self) -> String {
        self.time.format("%H:%M").to_string()
    }

    pub fn scan_count(&self) -> u32 {
        self.scan_count.unwrap_or(0)
    }

    pub fn has_known_location(&self) -> bool {
        let location = self.location.trim();
        !location.is_empty() && location != UNKNOWN
    }
}

/// Profile data of the requester, as far as personalization cares.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
        }
    }

    /// Display name, if one is set and not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> UserContext {
        let time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp");
        UserContext::at(time)
    }

    #[test]
    fn clock_is_zero_padded() {
        assert_eq!(at(8, 5).clock(), "08:05");
        assert_eq!(at(23, 59).clock(), "23:59");
    }

    #[test]
    fn missing_scan_count_reads_as_zero() {
        assert_eq!(at(9, 0).scan_count(), 0);
        assert_eq!(at(9, 0).with_scan_count(4).scan_count(), 4);
    }

    #[test]
    fn unknown_and_blank_locations_are_not_known() {
        assert!(!at(9, 0).has_known_location());
        assert!(!at(9, 0).with_location("  ").has_known_location());
        assert!(at(9, 0).with_location("Kyoto").has_known_location());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let ctx: UserContext =
            serde_json::from_str(r#"{"time":"2024-03-01T07:30:00","scanCount":2}"#)
                .expect("context parses");
        assert_eq!(ctx.weather, UNKNOWN);
        assert_eq!(ctx.location, UNKNOWN);
        assert_eq!(ctx.scan_count(), 2);
        assert_eq!(ctx.clock(), "07:30");
    }

    #[test]
    fn blank_display_names_are_ignored() {
        assert_eq!(Identity::named("   ").display_name(), None);
        assert_eq!(Identity::named("Mei").display_name(), Some("Mei"));
        assert_eq!(Identity::anonymous().display_name(), None);
    }
}
