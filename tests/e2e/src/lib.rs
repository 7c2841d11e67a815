//! Harness for tests that need a local Docker Engine.
//!
//! Every test here is `#[ignore]`d; run them with
//! `cargo test -p pagerepro-e2e -- --ignored`.

pub mod harness;
