//! invsync-api: Shared wire types
//!
//! Contains the inventory domain enum, the event and push-message shapes handed
//! to the upstream pipeline, and the command/diagnostics types used by the
//! admin API.

pub mod domain;
pub mod events;
pub mod requests;
pub mod responses;

pub use domain::{Domain, UnknownDomain};
pub use events::{DeltaEvent, Event, MessageKind, Operation, PushMessage, StatelessEvent};
pub use requests::CommandRequest;
pub use responses::{
    CommandResponse, CommandStatus, ConfigSummary, DomainStatus, HealthResponse, InventoryDump,
};
