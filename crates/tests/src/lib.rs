//! Cross-crate integration tests for soundpanel
//!
//! The scenarios live in `panel_integration.rs`; run them with
//! `cargo test -p soundpanel-tests`.
