//! Error kinds shared across the crate.
//!
//! Modeled on the teacher's [`io::cloud::traits::CloudIOError`]-style shape —
//! a fixed kind plus a message plus an optional nested source — rather than
//! `anyhow`'s type-erased bag, because every error here is a small, closed
//! set the caller is expected to match on (spec §7).

use std::fmt;

/// Convenience alias used throughout the crate's internal APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds listed in spec §7.
#[derive(Debug, Clone)]
pub enum Error {
    /// Shape mismatch constructing an [`crate::range::IndexSpace`].
    InvalidIndexSpace(String),
    /// Shape mismatch constructing or using a [`crate::range::Range`].
    InvalidRange(String),
    /// A partitioning's space or group differs from the container's.
    PartitioningMismatch(String),
    /// `Preserve` flow requested but the source partitioning does not cover
    /// an index the target needs.
    MissingSource(String),
    /// Collective KV sync saw two processes write different values to the
    /// same key.
    UpdateConflict { key: String, a: Vec<u8>, b: Vec<u8> },
    /// Allocation failure for a mapping or reservation.
    OutOfMemory(String),
    /// The backend reported a dead peer during `exec`.
    PeerGone(i32),
    /// Any other backend error, carrying the backend-supplied code.
    BackendFailure { code: i32, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIndexSpace(m) => write!(f, "invalid index space: {m}"),
            Self::InvalidRange(m) => write!(f, "invalid range: {m}"),
            Self::PartitioningMismatch(m) => write!(f, "partitioning mismatch: {m}"),
            Self::MissingSource(m) => write!(f, "missing source: {m}"),
            Self::UpdateConflict { key, a, b } => write!(
                f,
                "kv update conflict on key {key:?}: {a:?} != {b:?}"
            ),
            Self::OutOfMemory(m) => write!(f, "out of memory: {m}"),
            Self::PeerGone(pid) => write!(f, "peer {pid} is gone"),
            Self::BackendFailure { code, message } => {
                write!(f, "backend failure ({code}): {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for the error kinds spec §7 says interrupt `switch_to` and leave
    /// the container in its pre-switch state.
    #[must_use]
    pub const fn aborts_switch(&self) -> bool {
        matches!(self, Self::PeerGone(_) | Self::BackendFailure { .. })
    }

    /// True for the error kind spec §7 says is fatal and must abort the
    /// process after logging (no safe recovery).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UpdateConflict { .. })
    }
}
