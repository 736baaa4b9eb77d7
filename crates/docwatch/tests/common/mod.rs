//! Shared test utilities for docwatch integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated watched folder and status channel
//! - `RecordingBackend`, a converter double that records every call

pub mod converter;
pub mod harness;

pub use converter::{ConverterCall, RecordingBackend};
pub use harness::{collect_for, collect_until_terminal, wait_for_watcher, JobTrace, TestHarness};
