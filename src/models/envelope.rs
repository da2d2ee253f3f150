//! The response envelope every control-plane endpoint wraps its payload in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `{success, data?, error?, meta?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Failure details carried by a non-success envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Machine-readable code, e.g. `VALIDATION_ERROR`
    pub code: String,
    pub message: String,
    /// Field name to message for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// Payload of endpoints that only acknowledge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = r#"{"success":true,"data":{"message":"ok"},"meta":{"page":1,"per_page":20,"total":3,"total_pages":1}}"#;
        let envelope: ApiResponse<MessageResponse> = serde_json::from_str(json).unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().message, "ok");
        assert_eq!(envelope.meta.unwrap().total, Some(3));
        assert!(envelope.error.is_none());
    }

    #[test]
    fn test_error_envelope_with_details() {
        let json = r#"{"success":false,"error":{"code":"VALIDATION_ERROR","message":"Validation failed","details":{"email":"invalid"}}}"#;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();

        let error = envelope.error.unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert_eq!(error.details.unwrap().get("email").unwrap(), "invalid");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_envelope_without_data_field() {
        let envelope: ApiResponse<MessageResponse> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(envelope.data.is_none());
    }
}
