//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one side of the system
//! against mock adapters.  All tests run on the host with no real
//! hardware required.

mod firmware_tests;
mod gateway_tests;
mod mock_hw;
