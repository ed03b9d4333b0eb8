//! Patch set access for patchview.
//!
//! This crate answers "what would these files look like with a code-review
//! patch set applied". It provides:
//!
//! - [`Patcher`]: version token, changed-file lists, and patched content
//! - [`CachingPatcher`]: memoizes a patcher on top of a [`pv_store::ObjectStore`]
//! - [`TestPatcher`]: fixture-backed patcher with call accounting
//! - [`NullPatcher`]: the empty patch set
//! - [`Pending`]: handle for results of operations that perform I/O
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pv_patcher::{CachingPatcher, PatchedFileSet, Patcher, TestPatcher, path_set};
//! use pv_store::MemoryStore;
//!
//! let files = PatchedFileSet::new(["add.txt"], ["del.txt"], ["modify.txt"]).unwrap();
//! let patcher = Arc::new(TestPatcher::new(
//!     "1",
//!     files,
//!     [("add.txt", "add"), ("modify.txt", "modify")],
//! ));
//! let store = MemoryStore::new();
//! let caching = CachingPatcher::new(Arc::clone(&patcher), &store);
//!
//! let content = caching.apply(&path_set(["add.txt", "del.txt"]), None).get().unwrap();
//! assert_eq!(content["add.txt"], b"add");
//! assert_eq!(content["del.txt"], b"");
//! ```

mod caching;
mod error;
mod flight;
mod null;
mod patcher;
mod pending;
mod test_patcher;

pub use caching::{CacheOptions, CachingPatcher, DEFAULT_VERSION_MAX_AGE};
pub use error::PatchError;
pub use null::NullPatcher;
pub use patcher::{FileStatus, PatchVersion, PatchedContent, PatchedFileSet, Patcher, path_set};
pub use pending::Pending;
pub use test_patcher::TestPatcher;
