//! Database models
//!
//! SQLx models mapping to PostgreSQL tables.

mod attempt;
mod event;

pub use attempt::*;
pub use event::*;
