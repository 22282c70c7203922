//! Shared harness for end-to-end tests

#![allow(dead_code)]

pub mod client;
pub mod constants;
pub mod fixtures;
pub mod server;

pub use client::TestClient;
pub use constants::*;
pub use fixtures::fixture_items;
pub use server::TestServer;
