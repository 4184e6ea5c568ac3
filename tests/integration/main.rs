//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for farm sites, directories and the
//! render engine, and tempfile databases for the store.

mod common;
mod discovery_tests;
mod fetch_tests;
mod storage_tests;
mod worker_tests;
