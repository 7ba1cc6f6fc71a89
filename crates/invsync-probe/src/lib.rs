//! invsync-probe: host state probes
//!
//! Defines the [`Probe`] collaborator queried once per inventory domain, and an
//! osquery-backed implementation of it.

pub mod error;
pub mod osquery;
pub mod query;
pub mod traits;
pub mod types;

pub use error::ProbeError;
pub use osquery::OsqueryProbe;
pub use traits::Probe;
pub use types::RawDocument;
