//! Runtime primitives for pageflow features.
//!
//! This crate provides the coalescing request cache, the signature-keyed
//! call scheduler and the JSON fetch client that feeds request functions
//! into the cache.

pub mod coalesce;
pub mod fetch;
pub mod scheduler;

pub use coalesce::{CachedResponse, CoalescingCache, RequestOptions, SharedResult, request_cache_key};
pub use fetch::{FetchClient, FetchConfig, JsonRequest};
pub use scheduler::{CallOutcome, Debounced, FixedRateFrames, FrameSource, HostFrames, Scheduler};
