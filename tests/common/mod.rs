//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Database fixtures
//! - Mock API server helpers
//! - Custom assertion macros

pub mod assertions;
pub mod database;
pub mod mock_server;

// Re-export commonly used utilities
pub use database::*;
pub use mock_server::*;
