//! Response types for the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Domain;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Outcome class of an executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Failure,
    InProgress,
}

/// Result of `ExecuteCommand`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommandResponse {
    pub status: CommandStatus,
    pub message: String,
}

impl CommandResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
        }
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::InProgress,
            message: message.into(),
        }
    }
}

/// Effective inventory configuration, as reported by the dump
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigSummary {
    pub enabled: bool,
    pub interval_secs: u64,
    pub scan_on_start: bool,
    pub ports_all: bool,
    pub database_path: String,
    pub normalizer_config_path: Option<String>,
    pub normalizer_type: String,
}

/// Per-domain state, as reported by the dump
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DomainStatus {
    pub domain: Domain,
    pub enabled: bool,
    /// Whether the baseline for this domain has already been emitted
    pub first_scan_done: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_row_count: Option<usize>,
    pub last_event_count: Option<usize>,
    pub last_error: Option<String>,
}

/// Read-only diagnostics snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryDump {
    pub config: ConfigSummary,
    /// Current loop state (`idle`, `scanning`, ...)
    pub loop_state: String,
    pub last_pass: Option<DateTime<Utc>>,
    pub domains: Vec<DomainStatus>,
}
