//! Sidecar metadata stored next to every snapshot as `<target>-meta.json`
//!
//! Empty fields are left out of the file. Files written by older versions
//! may lack `snap_type`, or carry an empty `trigger`.

use serde::{Deserialize, Deserializer, Serialize};
use sk_core::SnapType;
use std::fmt;
use tracing::warn;

/// Why a snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// Periodic timer
    #[serde(rename = "S")]
    Scheduled,
    /// Package manager pre-update hook
    #[serde(rename = "I")]
    Install,
    /// Explicit user request
    #[serde(rename = "U")]
    User,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Scheduled, Trigger::Install, Trigger::User];

    /// Single letter used on disk and in listings
    pub fn indicator(&self) -> char {
        match self {
            Trigger::Scheduled => 'S',
            Trigger::Install => 'I',
            Trigger::User => 'U',
        }
    }

    pub fn from_indicator(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "S" => Some(Trigger::Scheduled),
            "I" => Some(Trigger::Install),
            "U" => Some(Trigger::User),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.indicator())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Backend that produced the snapshot
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_snap_type"
    )]
    pub snap_type: Option<SnapType>,

    /// Path the snapshot was taken from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_trigger"
    )]
    pub trigger: Option<Trigger>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// Unix time (seconds) after which the snapshot is removed
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_expiry"
    )]
    pub expiry: Option<i64>,
}

impl Metadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse file contents. Corrupt files yield empty metadata.
    pub fn from_json(text: &str, origin: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Unable to parse metadata file {}: {}", origin, e);
                Self::default()
            }
        }
    }
}

fn lenient_trigger<'de, D>(deserializer: D) -> Result<Option<Trigger>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None | Some("") => None,
        Some(text) => {
            let trigger = Trigger::from_indicator(text);
            if trigger.is_none() {
                warn!("Unknown trigger {:?} in metadata", text);
            }
            trigger
        }
    })
}

/// Older writers stored fractional seconds
fn lenient_expiry<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw.map(|secs| secs.floor() as i64))
}

fn lenient_snap_type<'de, D>(deserializer: D) -> Result<Option<SnapType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None | Some("") => None,
        Some(text) => match text.parse() {
            Ok(snap_type) => Some(snap_type),
            Err(e) => {
                warn!("Ignoring snap_type in metadata: {}", e);
                None
            }
        },
    })
}
