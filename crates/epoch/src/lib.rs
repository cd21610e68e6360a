//! Epoch framework for siltdb
//!
//! A monotonically advancing global epoch counter with per-worker local
//! epochs. Epochs serve two purposes:
//!
//! 1. Commit identifiers embed the committing worker's local epoch in their
//!    high bits, which makes identifier order respect real time for
//!    non-overlapping transactions.
//! 2. Displaced payload buffers are retired per epoch and only released
//!    once every worker has provably moved past the retiring epoch.
//!
//! The advancement fence: the global epoch never advances past
//! `min(local epoch over active workers) + 1`. A worker inside epoch `e`
//! therefore never observes the global counter beyond `e + 1`, and a buffer
//! retired in `e` is free once the global counter reaches `e + 2`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advancer;
pub mod framework;
pub mod reclaim;

pub use advancer::EpochAdvancer;
pub use framework::{EpochFramework, EpochGuard, EpochParticipant, INITIAL_EPOCH};
pub use reclaim::RetireList;
