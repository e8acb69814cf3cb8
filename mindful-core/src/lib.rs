//! Core library for Mindful.
//!
//! Programs, sessions, questionnaires, enrollments and diary entries, plus
//! the rules that tie them together: the publication state machine, the
//! enrollment lifecycle and the weekly session availability gate. Nothing in
//! here knows about HTTP.
//!
//! # Usage
//!
//! ```no_run
//! use mindful_core::db::Database;
//! use mindful_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let account = db.create_user(CreateUserInput {
//!     username: "ines".into(),
//!     email: "ines@example.org".into(),
//!     role: Role::Participant,
//! })?;
//! let me = Principal::from(&account);
//! let current = db.current_program(&me)?;
//! # Ok::<(), mindful_core::CoreError>(())
//! ```

pub mod availability;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod publication;
pub mod questions;

// Re-export commonly used types at crate root
pub use db::Database;
pub use error::{CoreError, CoreResult};
