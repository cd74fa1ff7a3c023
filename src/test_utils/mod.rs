//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - A shared in-memory ledger implementing every repository trait
//! - A builder for constructing `AppState` with test dependencies

mod app_state_builder;
mod factories;
mod ledger_mock;

pub use app_state_builder::*;
pub use factories::*;
pub use ledger_mock::*;
