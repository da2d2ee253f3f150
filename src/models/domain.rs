use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hostname routed to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub service_id: String,
    pub domain: String,
    #[serde(default)]
    pub ssl_enabled: bool,
    #[serde(default)]
    pub ssl_auto: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDomainRequest {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_auto: Option<bool>,
}

impl CreateDomainRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ssl_enabled: None,
            ssl_auto: None,
        }
    }
}
