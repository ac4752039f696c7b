//! Integration test harness.
//!
//! The tests live in `tests/integration/` and run against a live server;
//! see the module docs there.

mod integration {
    mod api_tests;
}
