//! Reparo CI - test execution for working copies
//!
//! Provides the process-backed [`reparo_core::TestRunner`]:
//! - Detects npm / jest / mocha / vitest / pytest from marker files
//! - Installs Node dependencies before testing
//! - Runs the suite under a hard timeout and parses its output

pub mod runner;
pub mod toolchain;

// Re-export key types
pub use runner::{execute, truncate_output, CapturedOutput, LocalTestRunner};
pub use toolchain::{TestPlan, Toolchain};
