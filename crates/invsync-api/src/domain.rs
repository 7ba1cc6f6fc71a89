//! Inventory domains

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// One category of host inventory
///
/// The serialized form doubles as the snapshot table name and as the
/// `collector` tag on emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Hardware,
    System,
    Networks,
    Packages,
    Ports,
    Processes,
    Hotfixes,
}

impl Domain {
    /// All domains in scan order
    pub const ALL: [Domain; 7] = [
        Domain::Hardware,
        Domain::System,
        Domain::Networks,
        Domain::Packages,
        Domain::Ports,
        Domain::Processes,
        Domain::Hotfixes,
    ];

    /// Snapshot table name for this domain
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Domain::Hardware => "hardware",
            Domain::System => "system",
            Domain::Networks => "networks",
            Domain::Packages => "packages",
            Domain::Ports => "ports",
            Domain::Processes => "processes",
            Domain::Hotfixes => "hotfixes",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Returned when parsing a name that is not a known domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown inventory domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.table().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}
