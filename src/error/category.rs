//! Coarse error buckets for presentation and retry decisions.

use std::fmt;

/// Where a failure originated, as far as a caller needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Nothing came back from the control plane
    Network,
    /// Missing or dead credentials, including forced logout
    Auth,
    /// 5xx and throttling
    Server,
    /// Undecodable payloads and other client-side faults
    Client,
    /// The control plane refused the request on its merits
    User,
}

impl ErrorCategory {
    /// Transient buckets; the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::User => "user",
        }
    }

    /// Prefix for messages shown to a person.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Control plane unreachable",
            ErrorCategory::Auth => "Not signed in",
            ErrorCategory::Server => "Control plane error",
            ErrorCategory::Client => "Unexpected response",
            ErrorCategory::User => "Request refused",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
