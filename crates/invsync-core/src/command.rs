//! Administrative commands

use serde_json::Value;

use invsync_api::Domain;

/// Commands understood by `ExecuteCommand`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Out-of-cycle pass; `wait` blocks until it has finished
    Scan { wait: bool },
    /// Clear snapshot and first-scan marker; `None` means every domain
    Reset { domain: Option<Domain> },
}

impl Command {
    /// Parse a command name and its JSON parameters
    ///
    /// # Errors
    /// Returns a message suitable for a failure response.
    pub fn parse(name: &str, parameters: &Value) -> Result<Self, String> {
        match name.trim() {
            "scan" => {
                let wait = match parameters.get("wait") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(wait)) => *wait,
                    Some(_) => return Err("parameter 'wait' must be a boolean".to_string()),
                };
                Ok(Command::Scan { wait })
            }
            "reset" => {
                let domain = match parameters.get("domain") {
                    Some(Value::String(name)) if name.eq_ignore_ascii_case("all") => None,
                    Some(Value::String(name)) => {
                        Some(name.parse::<Domain>().map_err(|e| e.to_string())?)
                    }
                    Some(_) => return Err("parameter 'domain' must be a string".to_string()),
                    None => return Err("missing parameter 'domain'".to_string()),
                };
                Ok(Command::Reset { domain })
            }
            _ => Err("unsupported command".to_string()),
        }
    }
}
