// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent broadcast of one payload to every registered subscription.

pub mod aggregator;
pub mod dispatcher;

pub use aggregator::{BroadcastCompletion, BroadcastResult, JobState, ResultAggregator};
pub use dispatcher::{BroadcastDispatcher, BroadcastHandle, DispatchOptions};
