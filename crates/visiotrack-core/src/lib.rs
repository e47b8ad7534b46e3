//! visiotrack-core: visitor check-in records and their lifecycle.
//!
//! Holds the record model, the ordered visitor log, its durable-slot
//! persistence, the filter/export view and the scan workflow that turns an
//! analyzed photo into a new check-in.

pub mod analyzer;
pub mod desk;
pub mod filter;
pub mod persistence;
pub mod store;
pub mod types;
pub mod workflow;

pub use analyzer::{AnalysisError, Analyzer};
pub use desk::Desk;
pub use filter::{export_csv, export_file_name, filter, Criteria, StatusFilter};
pub use persistence::{MemorySlot, PersistenceError, Slot, SqliteSlot, LOG_KEY};
pub use store::{Patch, StoreError, VisitorLog};
pub use types::{
    BlankField, CapturedImage, ImageMime, Profile, ProfileField, VisitorRecord, VisitorStatus,
};
pub use workflow::{Attempt, ScanError, ScanSession, ScanState};
