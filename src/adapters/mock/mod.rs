//! Mock implementations for testing.
//!
//! These mocks let the gateway, renewal coordinator and cache be exercised
//! without network access.

pub mod http;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
