//! Test helpers for tvmp-live integration tests
//!
//! Provides reusable test infrastructure:
//! - Harness: every playback manager wired to a SimulatedEngine
//! - Channel fixtures and short-delay settings
//! - Polling helpers for asynchronous readiness

#![allow(dead_code)]

pub mod harness;

pub use harness::{channel_url, channels, wait_for, Harness, HarnessBuilder};
