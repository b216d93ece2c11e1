// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling each task's watch patterns into a [`WatchSubscription`].
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Batching rapid changes per subscription ([`debounce`]).
//!
//! It only knows the DAG well enough to route a change to the most
//! upstream matching task; dependents are scheduled by the engine.

pub mod dag_filter;
pub mod debounce;
pub mod path_utils;
pub mod subscription;
pub mod watcher;

pub use debounce::{DebounceState, Debouncer};
pub use subscription::{
    build_subscriptions, run_subscription, RuntimeTriggerSink, TriggerSink, WatchSubscription,
};
pub use watcher::{spawn_watcher, stable_path, ChangeRouter, WatcherHandle};
