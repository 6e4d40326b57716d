use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UsernameError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

/// A username that passed the local join guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Trims `raw` and checks length before charset, so a length failure
    /// masks a charset failure.
    pub fn parse(raw: &str) -> Result<Self, UsernameError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(UsernameError::Length { len });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(UsernameError::Charset);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Local wall-clock `HH:MM`, empty when the value is out of chrono's range.
    pub fn time_label(self) -> String {
        self.to_utc()
            .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Timestamp as it appears on the wire: a number of epoch millis or a
/// date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(f64),
    Text(String),
}

impl WireTimestamp {
    pub fn normalize(&self) -> Option<Timestamp> {
        match self {
            Self::Millis(ms) if ms.is_finite() => Some(Timestamp(ms.trunc() as i64)),
            Self::Millis(_) => None,
            Self::Text(raw) => parse_text_timestamp(raw.trim()),
        }
    }
}

fn parse_text_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp(parsed.timestamp_millis()));
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(Timestamp(ms));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Timestamp(naive.and_utc().timestamp_millis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_usernames_within_bounds() {
        for raw in ["abc", "alice_01", "A_B_C_D_E_F_G_H_I_J_", "  bob  "] {
            assert!(Username::parse(raw).is_ok(), "{raw} should be valid");
        }
        assert_eq!(Username::parse("  bob  ").expect("valid").as_str(), "bob");
    }

    #[test]
    fn length_is_checked_before_charset() {
        assert_eq!(
            Username::parse("a!"),
            Err(UsernameError::Length { len: 2 })
        );
        assert_eq!(
            Username::parse(&"x".repeat(21)),
            Err(UsernameError::Length { len: 21 })
        );
        assert_eq!(Username::parse("   "), Err(UsernameError::Length { len: 0 }));
        assert_eq!(Username::parse("bad name"), Err(UsernameError::Charset));
        assert_eq!(Username::parse("émile"), Err(UsernameError::Charset));
    }

    #[test]
    fn normalizes_number_and_string_timestamps_to_the_same_millis() {
        let expected = Timestamp(1_704_067_200_000);
        assert_eq!(
            WireTimestamp::Millis(1_704_067_200_000.0).normalize(),
            Some(expected)
        );
        assert_eq!(
            WireTimestamp::Text("2024-01-01T00:00:00Z".into()).normalize(),
            Some(expected)
        );
        assert_eq!(
            WireTimestamp::Text("2024-01-01T00:00:00.000".into()).normalize(),
            Some(expected)
        );
        assert_eq!(
            WireTimestamp::Text("1704067200000".into()).normalize(),
            Some(expected)
        );
        assert_eq!(WireTimestamp::Text("yesterday".into()).normalize(), None);
    }

    #[test]
    fn wire_timestamp_deserializes_untagged() {
        let number: WireTimestamp = serde_json::from_str("1700000000000").expect("number");
        let text: WireTimestamp =
            serde_json::from_str("\"2023-11-14T22:13:20Z\"").expect("text");
        assert_eq!(number.normalize(), text.normalize());
    }
}
