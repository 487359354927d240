//! Unit tests for configuration loading and precedence.
//!
//! Tests are organised into modules by functional area:
//! - `helpers`: Shared test utilities
//! - `precedence`: Layer precedence and environment loading tests
//! - `resolution`: OAuth settings, client settings, and token resolution
//! - `operation_mode`: Operation mode determination tests

mod helpers;
mod operation_mode;
