//! Core error types shared by every part of the updater
//!
//! See [`error`] for the taxonomy: [`FetchError`] for network trouble,
//! [`UpdateError`] for every fatal condition of a run, and [`ErrorContext`]
//! for presenting either to a user.

pub mod error;

pub use error::{ErrorContext, FetchError, FetchErrorKind, UpdateError, user_friendly_error};
