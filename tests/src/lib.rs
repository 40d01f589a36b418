//! Integration test framework for towersim
//!
//! Provides test utilities and a synchronous scenario bench for driving
//! the handover core through full broadcast cycles.
//!
//! # Test Categories
//!
//! 1. **Handover scenarios** - Full decision/transition sequences
//!    against the state machine and timer queue
//! 2. **Task scenarios** - The PHY task driven over its channels

pub mod scenario;
pub mod test_utils;

pub use scenario::ScenarioBench;
pub use test_utils::{init_test_logging, TestResult, DEFAULT_TEST_TIMEOUT};
