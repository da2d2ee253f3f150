//! [`HttpClient`](crate::traits::HttpClient) implementations.
//!
//! [`ReqwestHttpClient`] talks to a real control plane; [`mock`] holds the
//! scriptable in-memory double used throughout the tests.

pub mod mock;
pub mod reqwest_http;

pub use mock::{MockHttpClient, MockResponse};
pub use reqwest_http::ReqwestHttpClient;
