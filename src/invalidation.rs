//! Which cached queries a mutation makes obsolete.
//!
//! The table is a single exhaustive `match`: adding a [`Mutation`] variant
//! without deciding its targets does not compile.

use std::fmt;

use crate::cache::CacheKey;

/// A key, or a key and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    Exact(CacheKey),
    Subtree(CacheKey),
}

impl InvalidationTarget {
    pub fn key(&self) -> &CacheKey {
        match self {
            InvalidationTarget::Exact(key) | InvalidationTarget::Subtree(key) => key,
        }
    }

    /// Whether `key` is affected by this target.
    pub fn covers(&self, key: &CacheKey) -> bool {
        match self {
            InvalidationTarget::Exact(target) => key == target,
            InvalidationTarget::Subtree(prefix) => key.starts_with(prefix),
        }
    }
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationTarget::Exact(key) => write!(f, "={}", key),
            InvalidationTarget::Subtree(key) => write!(f, "{}/…", key),
        }
    }
}

/// A completed write, with the ids needed to locate what it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Login,
    Register,
    Logout,
    UpdateProfile,
    UpdatePassword,
    CreateTeam,
    UpdateTeam { team_id: String },
    DeleteTeam { team_id: String },
    AddTeamMember { team_id: String },
    UpdateTeamMember { team_id: String },
    RemoveTeamMember { team_id: String },
    CreateProject { team_id: String },
    UpdateProject { team_id: String, project_id: String },
    DeleteProject { team_id: String, project_id: String },
    CreateService { project_id: String },
    UpdateService { project_id: String, service_id: String },
    ScaleService { project_id: String, service_id: String },
    DeployService { project_id: String, service_id: String },
    StartService { project_id: String, service_id: String },
    StopService { project_id: String, service_id: String },
    RestartService { project_id: String, service_id: String },
    DeleteService { project_id: String, service_id: String },
    AddDomain { service_id: String },
    DeleteDomain { service_id: String },
}

/// Mutation kinds without their ids, for logging and iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Login,
    Register,
    Logout,
    UpdateProfile,
    UpdatePassword,
    CreateTeam,
    UpdateTeam,
    DeleteTeam,
    AddTeamMember,
    UpdateTeamMember,
    RemoveTeamMember,
    CreateProject,
    UpdateProject,
    DeleteProject,
    CreateService,
    UpdateService,
    ScaleService,
    DeployService,
    StartService,
    StopService,
    RestartService,
    DeleteService,
    AddDomain,
    DeleteDomain,
}

impl MutationKind {
    pub const ALL: [MutationKind; 24] = [
        MutationKind::Login,
        MutationKind::Register,
        MutationKind::Logout,
        MutationKind::UpdateProfile,
        MutationKind::UpdatePassword,
        MutationKind::CreateTeam,
        MutationKind::UpdateTeam,
        MutationKind::DeleteTeam,
        MutationKind::AddTeamMember,
        MutationKind::UpdateTeamMember,
        MutationKind::RemoveTeamMember,
        MutationKind::CreateProject,
        MutationKind::UpdateProject,
        MutationKind::DeleteProject,
        MutationKind::CreateService,
        MutationKind::UpdateService,
        MutationKind::ScaleService,
        MutationKind::DeployService,
        MutationKind::StartService,
        MutationKind::StopService,
        MutationKind::RestartService,
        MutationKind::DeleteService,
        MutationKind::AddDomain,
        MutationKind::DeleteDomain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Login => "login",
            MutationKind::Register => "register",
            MutationKind::Logout => "logout",
            MutationKind::UpdateProfile => "update_profile",
            MutationKind::UpdatePassword => "update_password",
            MutationKind::CreateTeam => "create_team",
            MutationKind::UpdateTeam => "update_team",
            MutationKind::DeleteTeam => "delete_team",
            MutationKind::AddTeamMember => "add_team_member",
            MutationKind::UpdateTeamMember => "update_team_member",
            MutationKind::RemoveTeamMember => "remove_team_member",
            MutationKind::CreateProject => "create_project",
            MutationKind::UpdateProject => "update_project",
            MutationKind::DeleteProject => "delete_project",
            MutationKind::CreateService => "create_service",
            MutationKind::UpdateService => "update_service",
            MutationKind::ScaleService => "scale_service",
            MutationKind::DeployService => "deploy_service",
            MutationKind::StartService => "start_service",
            MutationKind::StopService => "stop_service",
            MutationKind::RestartService => "restart_service",
            MutationKind::DeleteService => "delete_service",
            MutationKind::AddDomain => "add_domain",
            MutationKind::DeleteDomain => "delete_domain",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Login => MutationKind::Login,
            Mutation::Register => MutationKind::Register,
            Mutation::Logout => MutationKind::Logout,
            Mutation::UpdateProfile => MutationKind::UpdateProfile,
            Mutation::UpdatePassword => MutationKind::UpdatePassword,
            Mutation::CreateTeam => MutationKind::CreateTeam,
            Mutation::UpdateTeam { .. } => MutationKind::UpdateTeam,
            Mutation::DeleteTeam { .. } => MutationKind::DeleteTeam,
            Mutation::AddTeamMember { .. } => MutationKind::AddTeamMember,
            Mutation::UpdateTeamMember { .. } => MutationKind::UpdateTeamMember,
            Mutation::RemoveTeamMember { .. } => MutationKind::RemoveTeamMember,
            Mutation::CreateProject { .. } => MutationKind::CreateProject,
            Mutation::UpdateProject { .. } => MutationKind::UpdateProject,
            Mutation::DeleteProject { .. } => MutationKind::DeleteProject,
            Mutation::CreateService { .. } => MutationKind::CreateService,
            Mutation::UpdateService { .. } => MutationKind::UpdateService,
            Mutation::ScaleService { .. } => MutationKind::ScaleService,
            Mutation::DeployService { .. } => MutationKind::DeployService,
            Mutation::StartService { .. } => MutationKind::StartService,
            Mutation::StopService { .. } => MutationKind::StopService,
            Mutation::RestartService { .. } => MutationKind::RestartService,
            Mutation::DeleteService { .. } => MutationKind::DeleteService,
            Mutation::AddDomain { .. } => MutationKind::AddDomain,
            Mutation::DeleteDomain { .. } => MutationKind::DeleteDomain,
        }
    }
}

/// The cache targets `mutation` invalidates.
pub fn affected_prefixes(mutation: &Mutation) -> Vec<InvalidationTarget> {
    use InvalidationTarget::{Exact, Subtree};

    match mutation {
        Mutation::Login | Mutation::Register => vec![Subtree(CacheKey::user())],
        Mutation::Logout => vec![Subtree(CacheKey::root())],
        Mutation::UpdateProfile => vec![Subtree(CacheKey::current_user())],
        Mutation::UpdatePassword => Vec::new(),

        Mutation::CreateTeam => vec![Exact(CacheKey::teams())],
        Mutation::UpdateTeam { team_id } => {
            vec![Exact(CacheKey::teams()), Exact(CacheKey::team(team_id))]
        }
        Mutation::DeleteTeam { team_id } => {
            vec![Exact(CacheKey::teams()), Subtree(CacheKey::team(team_id))]
        }
        Mutation::AddTeamMember { team_id }
        | Mutation::UpdateTeamMember { team_id }
        | Mutation::RemoveTeamMember { team_id } => vec![Subtree(CacheKey::team_members(team_id))],

        Mutation::CreateProject { team_id } => vec![Subtree(CacheKey::team_projects(team_id))],
        Mutation::UpdateProject {
            team_id,
            project_id,
        } => vec![
            Subtree(CacheKey::team_projects(team_id)),
            Exact(CacheKey::project(project_id)),
        ],
        Mutation::DeleteProject {
            team_id,
            project_id,
        } => vec![
            Subtree(CacheKey::team_projects(team_id)),
            Subtree(CacheKey::project(project_id)),
        ],

        Mutation::CreateService { project_id } => {
            vec![Subtree(CacheKey::project_services(project_id))]
        }
        Mutation::UpdateService {
            project_id,
            service_id,
        }
        | Mutation::ScaleService {
            project_id,
            service_id,
        } => vec![
            Subtree(CacheKey::project_services(project_id)),
            Exact(CacheKey::service(service_id)),
        ],
        Mutation::DeployService {
            project_id,
            service_id,
        }
        | Mutation::StartService {
            project_id,
            service_id,
        }
        | Mutation::StopService {
            project_id,
            service_id,
        }
        | Mutation::RestartService {
            project_id,
            service_id,
        } => vec![
            Subtree(CacheKey::project_services(project_id)),
            Exact(CacheKey::service(service_id)),
            Subtree(CacheKey::service_logs_root(service_id)),
        ],
        Mutation::DeleteService {
            project_id,
            service_id,
        } => vec![
            Subtree(CacheKey::project_services(project_id)),
            Subtree(CacheKey::service(service_id)),
        ],

        Mutation::AddDomain { service_id } | Mutation::DeleteDomain { service_id } => {
            vec![Subtree(CacheKey::service_domains(service_id))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(mutation: &Mutation, key: &CacheKey) -> bool {
        affected_prefixes(mutation).iter().any(|target| target.covers(key))
    }

    #[test]
    fn test_delete_team_reaches_listing_and_subtree() {
        let mutation = Mutation::DeleteTeam {
            team_id: "t1".to_string(),
        };

        assert!(covered(&mutation, &CacheKey::teams()));
        assert!(covered(&mutation, &CacheKey::team("t1")));
        assert!(covered(&mutation, &CacheKey::team_projects("t1")));
        assert!(covered(&mutation, &CacheKey::team_members("t1")));
        assert!(!covered(&mutation, &CacheKey::team("t2")));
        assert!(!covered(&mutation, &CacheKey::project("p2")));
    }

    #[test]
    fn test_update_team_leaves_children() {
        let mutation = Mutation::UpdateTeam {
            team_id: "t1".to_string(),
        };

        assert!(covered(&mutation, &CacheKey::team("t1")));
        assert!(!covered(&mutation, &CacheKey::team_members("t1")));
    }

    #[test]
    fn test_create_team_only_touches_listing() {
        let targets = affected_prefixes(&Mutation::CreateTeam);
        assert_eq!(targets, vec![InvalidationTarget::Exact(CacheKey::teams())]);
        assert!(!covered(&Mutation::CreateTeam, &CacheKey::team("t1")));
    }

    #[test]
    fn test_lifecycle_operations_reach_logs() {
        let mutation = Mutation::RestartService {
            project_id: "p1".to_string(),
            service_id: "s1".to_string(),
        };

        assert!(covered(&mutation, &CacheKey::project_services("p1")));
        assert!(covered(&mutation, &CacheKey::service("s1")));
        assert!(covered(&mutation, &CacheKey::service_logs("s1", Some(100), None)));
        assert!(!covered(&mutation, &CacheKey::service_domains("s1")));
    }

    #[test]
    fn test_scale_does_not_touch_logs() {
        let mutation = Mutation::ScaleService {
            project_id: "p1".to_string(),
            service_id: "s1".to_string(),
        };
        assert!(!covered(&mutation, &CacheKey::service_logs("s1", None, None)));
    }

    #[test]
    fn test_logout_reaches_everything() {
        assert!(covered(&Mutation::Logout, &CacheKey::current_user()));
        assert!(covered(&Mutation::Logout, &CacheKey::service_domains("s1")));
    }

    #[test]
    fn test_password_change_invalidates_nothing() {
        assert!(affected_prefixes(&Mutation::UpdatePassword).is_empty());
    }

    #[test]
    fn test_delete_project_keeps_other_projects() {
        let mutation = Mutation::DeleteProject {
            team_id: "t1".to_string(),
            project_id: "p1".to_string(),
        };
        assert!(covered(&mutation, &CacheKey::project_services("p1")));
        assert!(covered(&mutation, &CacheKey::team_projects("t1")));
        assert!(!covered(&mutation, &CacheKey::project("p2")));
    }

    #[test]
    fn test_kind_names_are_unique() {
        let names: std::collections::HashSet<_> =
            MutationKind::ALL.iter().map(MutationKind::as_str).collect();
        assert_eq!(names.len(), MutationKind::ALL.len());
    }
}
