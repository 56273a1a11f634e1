//
// test_utils/mod.rs
//
// Shared helpers for tests and benchmarks (test builds and `test-support`)
//

pub mod fixture_workspace;
