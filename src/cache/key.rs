//! Hierarchical cache keys.
//!
//! A child resource's key extends its parent's, so invalidating a prefix
//! reaches everything below it.

use std::fmt;

/// Ordered path segments identifying a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty key; every key starts with it.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A key one segment deeper.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Segment-wise prefix test: `teams/t1` is under `teams` but
    /// `teams/t10` is not under `teams/t1`.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn current_user() -> Self {
        Self::new(["user", "me"])
    }

    pub fn user() -> Self {
        Self::new(["user"])
    }

    pub fn teams() -> Self {
        Self::new(["teams"])
    }

    pub fn team(team_id: &str) -> Self {
        Self::teams().child(team_id)
    }

    pub fn team_members(team_id: &str) -> Self {
        Self::team(team_id).child("members")
    }

    pub fn team_projects(team_id: &str) -> Self {
        Self::team(team_id).child("projects")
    }

    pub fn project(project_id: &str) -> Self {
        Self::new(["projects", project_id])
    }

    pub fn project_services(project_id: &str) -> Self {
        Self::project(project_id).child("services")
    }

    pub fn service(service_id: &str) -> Self {
        Self::new(["services", service_id])
    }

    pub fn service_domains(service_id: &str) -> Self {
        Self::service(service_id).child("domains")
    }

    /// Logs prefix of a service; the full key adds `tail` and `since`.
    pub fn service_logs_root(service_id: &str) -> Self {
        Self::service(service_id).child("logs")
    }

    /// Unset parameters become empty segments so every combination has
    /// exactly one key.
    pub fn service_logs(service_id: &str, tail: Option<u32>, since: Option<&str>) -> Self {
        Self::service_logs_root(service_id)
            .child(tail.map(|t| t.to_string()).unwrap_or_default())
            .child(since.unwrap_or_default())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for CacheKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_segment_wise() {
        let team = CacheKey::team("t1");
        assert!(CacheKey::team_projects("t1").starts_with(&team));
        assert!(!CacheKey::team_projects("t10").starts_with(&team));
        assert!(team.starts_with(&CacheKey::teams()));
        assert!(!CacheKey::teams().starts_with(&team));
    }

    #[test]
    fn test_root_matches_everything() {
        assert!(CacheKey::service("s1").starts_with(&CacheKey::root()));
        assert!(CacheKey::root().is_empty());
    }

    #[test]
    fn test_catalogue_shapes() {
        assert_eq!(CacheKey::current_user().to_string(), "user/me");
        assert_eq!(CacheKey::team_members("t1").to_string(), "teams/t1/members");
        assert_eq!(CacheKey::project_services("p1").to_string(), "projects/p1/services");
        assert_eq!(CacheKey::service_domains("s1").to_string(), "services/s1/domains");
        assert_eq!(
            CacheKey::service_logs("s1", Some(100), None).segments(),
            &["services", "s1", "logs", "100", ""]
        );
        assert!(CacheKey::service_logs("s1", None, Some("2024-01-01"))
            .starts_with(&CacheKey::service_logs_root("s1")));
    }
}
