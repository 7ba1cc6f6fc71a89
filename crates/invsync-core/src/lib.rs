//! invsync-core: inventory engine and actor
//!
//! Scans host state through a [`invsync_probe::Probe`], diffs it against the
//! last persisted snapshot, and pushes delta and discovery events upstream.
//! The engine runs inside the `InventoryActor`; a [`SyncLoop`] triggers its
//! passes and [`InventoryHandle`] is the public entry point.

pub mod actor;
pub mod command;
pub mod config;
pub mod diff;
pub mod emit;
pub mod engine;
pub mod error;
pub mod handle;
pub mod hash;
pub mod message;
pub mod normalize;
pub mod scanner;
pub mod schema;
pub mod state;
pub mod store;
pub mod sync_loop;

pub use actor::{InventoryActor, InventoryActorArgs};
pub use command::Command;
pub use config::InventoryConfig;
pub use diff::DiffEngine;
pub use emit::{EmitStats, EventEmitter, FnSink, PushSink};
pub use engine::{EngineParts, InventoryEngine, PassSummary};
pub use error::{CoreError, EmitError, StoreError};
pub use handle::InventoryHandle;
pub use hash::{HashId, hash_id};
pub use message::{ResetDomain, RunPass};
pub use normalize::{FieldPolicy, NormalizedDocument, PackageRules, normalize};
pub use scanner::Scanner;
pub use state::{DomainState, LoopState, SharedStatus};
pub use store::{ClassifiedRow, MemoryStore, MetadataStore, SnapshotStore, SqliteStore};
pub use sync_loop::{StopSignal, SyncLoop};
