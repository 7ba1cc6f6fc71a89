//! Request types for the API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Administrative command addressed to the inventory engine
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandRequest {
    /// Command name (`scan`, `reset`)
    pub command: String,
    /// Command parameters
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: Value,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, parameters: Value) -> Self {
        Self {
            command: command.into(),
            parameters,
        }
    }
}
