//! Incremental hashing primitives for downloaded artifacts.
//!
//! Computes digests as data streams through, so verification happens in the
//! same pass as the write and never re-reads the destination. No policy lives
//! here; callers decide what a mismatch means.

pub use self::error::{Result, VerifyError};
pub use self::hasher::{DigestHasher, Hasher, Md5Hasher, Sha256Hasher};

mod error;
mod hasher;
