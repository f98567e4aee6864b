use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote-authoritative build state.
///
/// `created → building → {complete | error | failed | timeout}`. Values the
/// rack may add later decode as [`BuildStatus::Unknown`], which is never
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Created,
    Building,
    Complete,
    Error,
    Failed,
    Timeout,
    #[serde(other)]
    Unknown,
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Complete | Self::Error | Self::Failed | Self::Timeout => true,
            Self::Created | Self::Building | Self::Unknown => false,
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Building => "building",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Read-only projection of a build owned by the rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    #[serde(default)]
    pub app: String,
    pub status: BuildStatus,
    /// Release produced by a completed build.
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,
}
