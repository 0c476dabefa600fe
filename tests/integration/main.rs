//! Integration tests for the samsort pipeline.
//!
//! These tests run the full two-pass sort end to end over the plain-text
//! collaborator, so they exercise every stage without external tools.

mod helpers;
mod test_boundaries;
mod test_determinism;
mod test_error_paths;
mod test_scenarios;
