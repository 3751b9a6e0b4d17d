// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Watermark Checkpointing
//!
//! Persists the highest feed sequence id processed so far, so each run only
//! handles entries that arrived since the previous one.
//!
//! ## Flow
//! 1. Load the watermark at run start (missing/corrupt → origin)
//! 2. Filter the feed against it
//! 3. Save the advanced watermark once reconciliation has completed
//!
//! ## Critical
//! Saves are atomic (temp file + rename) and never move the watermark
//! backwards.

pub mod store;
pub mod watermark;

pub use store::{
    CheckpointError, CheckpointRecord, CheckpointStore, FileCheckpointStore,
    MemoryCheckpointStore,
};
pub use watermark::{SequenceId, Watermark};
