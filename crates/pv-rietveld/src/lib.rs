//! Rietveld backend for patchview.
//!
//! [`RietveldPatcher`] exposes the latest patchset of a code review issue as
//! a [`pv_patcher::Patcher`]. Requests go through a [`Fetcher`]; production
//! code uses [`HttpFetcher`].

mod api;
mod fetcher;
mod patcher;
mod tarball;

pub use fetcher::{DEFAULT_TIMEOUT, Fetcher, HttpFetcher};
pub use patcher::RietveldPatcher;
