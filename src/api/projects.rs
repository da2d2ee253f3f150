use std::sync::Arc;

use super::ControlPlane;
use crate::cache::CacheKey;
use crate::error::ApiResult;
use crate::gateway::ApiRequest;
use crate::invalidation::Mutation;
use crate::models::{CreateProjectRequest, Project, UpdateProjectRequest};

impl ControlPlane {
    pub async fn team_projects(&self, team_id: &str) -> ApiResult<Arc<Vec<Project>>> {
        self.query(
            CacheKey::team_projects(team_id),
            ApiRequest::get(format!("/teams/{}/projects", team_id)),
        )
        .await
    }

    pub async fn project(&self, project_id: &str) -> ApiResult<Arc<Project>> {
        self.query(
            CacheKey::project(project_id),
            ApiRequest::get(format!("/projects/{}", project_id)),
        )
        .await
    }

    pub async fn create_project(
        &self,
        team_id: &str,
        project: &CreateProjectRequest,
    ) -> ApiResult<Project> {
        let request = ApiRequest::post(format!("/teams/{}/projects", team_id)).json(project)?;
        self.mutate(
            request,
            Mutation::CreateProject {
                team_id: team_id.to_string(),
            },
        )
        .await
    }

    /// Update a project. `team_id` names the listing to refresh.
    pub async fn update_project(
        &self,
        team_id: &str,
        project_id: &str,
        update: &UpdateProjectRequest,
    ) -> ApiResult<Project> {
        let request = ApiRequest::put(format!("/projects/{}", project_id)).json(update)?;
        self.mutate(
            request,
            Mutation::UpdateProject {
                team_id: team_id.to_string(),
                project_id: project_id.to_string(),
            },
        )
        .await
    }

    pub async fn delete_project(&self, team_id: &str, project_id: &str) -> ApiResult<()> {
        self.mutate_empty(
            ApiRequest::delete(format!("/projects/{}", project_id)),
            Mutation::DeleteProject {
                team_id: team_id.to_string(),
                project_id: project_id.to_string(),
            },
        )
        .await
    }
}
