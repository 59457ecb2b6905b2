//! HUD Runtime - the long-running half of the Claude HUD
//!
//! Owns the live state store, follows the host's event pipe across session
//! handovers, applies the degradation policies and keeps the config and
//! settings snapshots fresh.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, or `todo!()` outside tests.

pub mod config;
pub mod degrade;
pub mod error;
pub mod logging;
pub mod probe;
pub mod readers;
pub mod refresh;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::{debug_enabled, HudPaths};
pub use degrade::{DegradeConfig, SafeModePolicy, SchemaBannerPolicy};
pub use error::{HudError, Result};
pub use logging::LoggingGuard;
pub use probe::{Bounded, LocalProbe, SessionProbe, TranscriptInfo, TranscriptUsage};
pub use readers::{CachedReader, ConfigReader, ReadStatus, ReaderError, SettingsReader};
pub use refresh::SnapshotRefresher;
pub use session::{ManagerConfig, RecheckSource, RecheckTrigger, SessionManager};
pub use store::{spawn_clock_task, spawn_store, StoreError, StoreHandle};
pub use telemetry::{spawn_telemetry_task, DEFAULT_TELEMETRY_INTERVAL};
