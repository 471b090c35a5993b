//! # Courseplan Core Library
//!
//! This library provides the core logic for building university course
//! schedules. It follows the same CLI-first layout as its binary: every
//! operation is a plain function or method here, and the `courseplan` CLI is a
//! thin layer over it.
//!
//! ## Architecture
//!
//! - **Session model**: meetings, the time-conflict predicate and primary /
//!   secondary ("A" / "AA") classification
//! - **Selection**: the student's committed schedule, with validate-then-commit
//!   commands and typed rejections
//! - **Generator**: depth-first search for conflict-free schedule variants
//! - **Storage**: TOML configuration and SQLite plan persistence with
//!   optimistic versioning
//!
//! ## Key Components
//!
//! - [`ScheduleSelection`]: committed schedule state
//! - [`generate`]: automatic schedule generation
//! - [`Catalog`]: read-only course data snapshot
//! - [`SqlitePlanStore`]: plan persistence
//! - [`Config`]: application configuration management

pub mod catalog;
pub mod error;
pub mod filter;
pub mod generator;
pub mod selection;
pub mod session;
pub mod storage;

pub use catalog::{Catalog, CourseInfo, CourseOffering, SessionProvider};
pub use error::{ConfigError, CoreError, DatabaseError, StoreError, ValidationError};
pub use filter::{filter_sessions, GenerationOptions};
pub use generator::{
    generate, generate_in_background, generate_variants, CancelToken, CourseAssignment,
    FixedSession, GenerationOutcome, GenerationReport, GenerationRequest, Infeasibility,
    ScheduleVariant, StopReason, VariantBoard,
};
pub use selection::{
    Eligibility, PlanSnapshot, Rejection, ScheduleSelection, ScheduledCourse, SelectionChange,
    SharedSelection, ViolationReason,
};
pub use session::{
    classify, conflicts, EnrollState, EnrollStatus, Meeting, MeetingDays, Session, SessionKind,
    Slot, StateKey, TimeRange, Weekday,
};
pub use storage::{Config, PlanStore, SqlitePlanStore, StoredPlan};
