// Core modules
pub mod common;
pub mod core;
pub mod storage;
pub mod notify;
pub mod export;
pub mod service;

// Re-export commonly used types
pub use common::{AttendanceError, Config, DataPaths, Result};
pub use core::{FingerprintStore, MatchScorer, Verdict, Verifier};
pub use storage::{AttendanceStore, ClassSelection, Status};
pub use notify::{AbsenceNotifier, TwilioNotifier};
pub use service::{router, start_server, AppState};
