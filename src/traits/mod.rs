//! Trait seams for dependency injection.
//!
//! - [`HttpClient`]: the transport shared by the request gateway and the
//!   renewal coordinator

pub mod http;

pub use http::{Headers, HttpClient, HttpError, HttpRequest, Method, Response};
