//! Reactive dispatch primitives.
//!
//! This module provides:
//! - `Topic`: Closed set of subscription keys, one per normalized attribute
//! - `Operation`: Single-shot publish/subscribe context for one evaluation
//!
//! An operation lives only as long as the watcher invocation that opened it.
//! Subscriptions register first, a single publish fires them synchronously,
//! and the aggregated verdict is captured before the operation is dropped.

mod operation;
mod topic;

pub use operation::{Operation, OperationState, Subscribed};
pub use topic::Topic;
