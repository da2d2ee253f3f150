//! Wire types of the control-plane API.
//!
//! All payloads are JSON with snake_case fields. Optional request fields are
//! left out of the body when unset so the server applies its own defaults.

mod auth;
mod domain;
mod envelope;
mod project;
mod service;
mod team;
mod user;

pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, TokenResponse};
pub use domain::{CreateDomainRequest, Domain};
pub use envelope::{ApiResponse, ErrorInfo, MessageResponse, Meta};
pub use project::{CreateProjectRequest, Project, UpdateProjectRequest};
pub use service::{
    CreateServiceRequest, DeployType, DeploymentResponse, EnvVar, RestartPolicy,
    ScaleServiceRequest, Service, ServiceLogsResponse, ServiceStatus, UpdateServiceRequest,
};
pub use team::{
    AddTeamMemberRequest, CreateTeamRequest, MemberRole, Team, TeamMember, TeamRole, TeamWithRole,
    UpdateTeamMemberRequest, UpdateTeamRequest,
};
pub use user::{UpdatePasswordRequest, UpdateUserRequest, User, UserRole};
