#![forbid(unsafe_code)]

//! Core domain model and business logic for fitplan.
//!
//! This crate provides:
//! - Domain types (exercises, profiles, workouts, session records)
//! - Exercise catalog and queries
//! - Workout generator and weekly planner
//! - Tick-driven session engine with a per-user session lock
//! - Persistence (WAL, atomic JSON state, progress, profiles, CSV export)

pub mod types;
pub mod error;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod logging;
pub mod generator;
pub mod planner;
pub mod session;
pub mod lock;
pub mod state;
pub mod wal;
pub mod history;
pub mod progress;
pub mod profile;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog, ExerciseFilter};
pub use config::Config;
pub use generator::{generate, GenerateOverrides};
pub use planner::{generate_week, DayPlan, WeeklyPlan};
pub use session::{SessionAction, SessionEngine, SessionEvent, SessionPhase};
pub use lock::SessionGuard;
pub use wal::{JsonlSink, SessionSink};
pub use progress::{JsonProgressStore, ProgressStore, RecordOutcome, UserProgress};
pub use profile::{JsonProfileStore, ProfileStore};
