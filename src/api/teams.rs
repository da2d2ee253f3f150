use std::sync::Arc;

use super::ControlPlane;
use crate::cache::CacheKey;
use crate::error::ApiResult;
use crate::gateway::ApiRequest;
use crate::invalidation::Mutation;
use crate::models::{
    AddTeamMemberRequest, CreateTeamRequest, MemberRole, Team, TeamMember, TeamWithRole,
    UpdateTeamMemberRequest, UpdateTeamRequest,
};

impl ControlPlane {
    /// Teams the user belongs to, with their role in each.
    pub async fn teams(&self) -> ApiResult<Arc<Vec<TeamWithRole>>> {
        self.query(CacheKey::teams(), ApiRequest::get("/teams")).await
    }

    pub async fn team(&self, team_id: &str) -> ApiResult<Arc<Team>> {
        self.query(
            CacheKey::team(team_id),
            ApiRequest::get(format!("/teams/{}", team_id)),
        )
        .await
    }

    pub async fn create_team(&self, team: &CreateTeamRequest) -> ApiResult<Team> {
        let request = ApiRequest::post("/teams").json(team)?;
        self.mutate(request, Mutation::CreateTeam).await
    }

    pub async fn update_team(&self, team_id: &str, update: &UpdateTeamRequest) -> ApiResult<Team> {
        let request = ApiRequest::put(format!("/teams/{}", team_id)).json(update)?;
        self.mutate(
            request,
            Mutation::UpdateTeam {
                team_id: team_id.to_string(),
            },
        )
        .await
    }

    /// Delete a team. Everything cached under it goes too.
    pub async fn delete_team(&self, team_id: &str) -> ApiResult<()> {
        self.mutate_empty(
            ApiRequest::delete(format!("/teams/{}", team_id)),
            Mutation::DeleteTeam {
                team_id: team_id.to_string(),
            },
        )
        .await
    }

    pub async fn team_members(&self, team_id: &str) -> ApiResult<Arc<Vec<TeamMember>>> {
        self.query(
            CacheKey::team_members(team_id),
            ApiRequest::get(format!("/teams/{}/members", team_id)),
        )
        .await
    }

    /// Invite an existing user by email.
    pub async fn add_team_member(
        &self,
        team_id: &str,
        email: &str,
        role: MemberRole,
    ) -> ApiResult<TeamMember> {
        let request = ApiRequest::post(format!("/teams/{}/members", team_id)).json(
            &AddTeamMemberRequest {
                email: email.to_string(),
                role,
            },
        )?;
        self.mutate(
            request,
            Mutation::AddTeamMember {
                team_id: team_id.to_string(),
            },
        )
        .await
    }

    pub async fn update_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> ApiResult<TeamMember> {
        let request = ApiRequest::put(format!("/teams/{}/members/{}", team_id, user_id))
            .json(&UpdateTeamMemberRequest { role })?;
        self.mutate(
            request,
            Mutation::UpdateTeamMember {
                team_id: team_id.to_string(),
            },
        )
        .await
    }

    pub async fn remove_team_member(&self, team_id: &str, user_id: &str) -> ApiResult<()> {
        self.mutate_empty(
            ApiRequest::delete(format!("/teams/{}/members/{}", team_id, user_id)),
            Mutation::RemoveTeamMember {
                team_id: team_id.to_string(),
            },
        )
        .await
    }
}
