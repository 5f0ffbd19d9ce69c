//! Shared test utilities for gitops-creds integration tests.
//!
//! - `TestHarness`: a service wired to a temp-dir database and an in-memory cluster
//! - `RequestBuilder`: fluent construction of service requests

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
