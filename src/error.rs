// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the adapter
//!
//! A failed library call becomes [`Error::Status`], a value the adapter cannot
//! represent becomes [`Error::Decode`], and touching a handle after it was
//! released becomes [`Error::Released`]. No status code is ever classified or
//! retried here.

use std::os::raw::c_int;

use thiserror::Error;

/// Main adapter error type
#[derive(Error, Debug)]
pub enum Error {
    /// The library returned a non-zero status
    #[error(transparent)]
    Status(#[from] StatusError),

    /// A value handed back by the library could not be converted
    #[error("cannot decode {0}")]
    Decode(#[from] DecodeError),

    /// A handle was used after it had been released
    #[error("{kind} used after release")]
    Released { kind: &'static str },

    /// An argument cannot be passed to the library
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// libddcutil could not be loaded
    #[error("failed to load libddcutil: {0}")]
    Load(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-zero status returned by a library call
///
/// `name` and `description` are whatever `ddca_rc_name()` and `ddca_rc_desc()`
/// return for `code`; they are absent only when the library returns NULL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{operation} failed: {} ({code}): {}{}",
    .name.as_deref().unwrap_or("unnamed status"),
    .description.as_deref().unwrap_or("no description"),
    .context.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default()
)]
pub struct StatusError {
    pub code: c_int,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Library entry point that produced the status
    pub operation: &'static str,
    /// Arguments of the failing call, if worth reporting
    pub context: Option<String>,
}

/// A native value that does not fit the documented ABI
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{field}: string is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("{what}: unknown discriminant {tag}")]
    UnknownTag { what: &'static str, tag: c_int },

    #[error("{what}: bad struct marker {found:?}")]
    BadMarker { what: &'static str, found: [u8; 4] },

    #[error("{field}: unexpected NULL pointer")]
    NullPointer { field: &'static str },

    #[error("value table has no terminating entry within {limit} entries")]
    UnterminatedTable { limit: usize },

    #[error("{field}: invalid length {len}")]
    BadLength { field: &'static str, len: i64 },
}

/// Result type alias for Error
pub type Result<T> = std::result::Result<T, Error>;
