//! Live delivery infrastructure.
//!
//! Provides:
//! - Per-user registry of bounded subscription queues
//! - Non-blocking fanout with a drop-on-full policy

pub mod fanout;

pub use fanout::{FanoutReport, SubscriberRegistry, Subscription, SubscriptionId};
