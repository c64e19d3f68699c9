//! Coedit-core - edit session tracking and conflict detection
//!
//! This crate provides:
//! - Session, record and device identity types
//! - Session stores (SQLite and in-memory)
//! - Registration, heartbeat and conflict polling tasks
//! - The save gate and conflict resolution prompt
//! - Layered configuration

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod conflict;
pub mod detector;
pub mod error;
pub mod heartbeat;
pub mod lifecycle;
pub mod registrar;
pub mod resolution;
pub mod save;
pub mod scope;
pub mod session;
pub mod store;
pub mod task;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{load_config, load_config_from, load_config_with, CoeditConfig, ConfigLayer};
pub use conflict::{detect_conflicts, ConflictInfo, ConflictNotice, ConflictWatch, OtherDevice};
pub use detector::{ConflictDetector, ConflictNotifier, DetectorHandle, TracingNotifier};
pub use error::{Error, Result};
pub use heartbeat::{HeartbeatEmitter, HeartbeatHandle};
pub use lifecycle::{EditPhase, Lifecycle, PhaseTransition};
pub use registrar::SessionRegistrar;
pub use resolution::{ConflictPrompt, ConflictResolver, DeviceSummary, SaveDecision};
pub use save::{RecordWriter, SaveGate, SaveOutcome};
pub use scope::EditScope;
pub use session::{DeviceFingerprint, EditSession, RecordId, SessionId, SessionStatus};
pub use store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
pub use task::TaskHandle;
