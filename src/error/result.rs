//! Result type alias for control-plane operations.

use super::api::ApiError;

/// Type alias for Results using [`ApiError`].
///
/// # Example
///
/// ```ignore
/// use podoru::error::ApiResult;
///
/// async fn team_names(plane: &ControlPlane) -> ApiResult<Vec<String>> {
///     let teams = plane.teams().await?;
///     Ok(teams.iter().map(|t| t.team.name.clone()).collect())
/// }
/// ```
pub type ApiResult<T> = Result<T, ApiError>;
