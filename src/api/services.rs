use std::sync::Arc;

use super::ControlPlane;
use crate::cache::{CacheKey, Subscription};
use crate::error::ApiResult;
use crate::gateway::ApiRequest;
use crate::invalidation::Mutation;
use crate::models::{
    CreateDomainRequest, CreateServiceRequest, DeploymentResponse, Domain, MessageResponse,
    ScaleServiceRequest, Service, ServiceLogsResponse, UpdateServiceRequest,
};

/// Lifecycle actions that answer with a plain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    fn path(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
        }
    }

    fn mutation(self, project_id: &str, service_id: &str) -> Mutation {
        let (project_id, service_id) = (project_id.to_string(), service_id.to_string());
        match self {
            Action::Start => Mutation::StartService { project_id, service_id },
            Action::Stop => Mutation::StopService { project_id, service_id },
            Action::Restart => Mutation::RestartService { project_id, service_id },
        }
    }
}

fn logs_request(service_id: &str, tail: Option<u32>, since: Option<&str>) -> ApiRequest {
    let mut request = ApiRequest::get(format!("/services/{}/logs", service_id));
    if let Some(tail) = tail {
        request = request.query("tail", tail);
    }
    if let Some(since) = since {
        request = request.query("since", since);
    }
    request
}

impl ControlPlane {
    pub async fn project_services(&self, project_id: &str) -> ApiResult<Arc<Vec<Service>>> {
        self.query(
            CacheKey::project_services(project_id),
            ApiRequest::get(format!("/projects/{}/services", project_id)),
        )
        .await
    }

    /// One-shot read of a service, fresh within the status poll interval.
    pub async fn service(&self, service_id: &str) -> ApiResult<Arc<Service>> {
        self.query_within(
            CacheKey::service(service_id),
            self.config.service_poll_interval,
            ApiRequest::get(format!("/services/{}", service_id)),
        )
        .await
    }

    /// Follow a service's status. Polls while the subscription is alive.
    pub async fn watch_service(&self, service_id: &str) -> ApiResult<Subscription<Service>> {
        self.watch(
            CacheKey::service(service_id),
            self.config.service_freshness(),
            ApiRequest::get(format!("/services/{}", service_id)),
        )
        .await
    }

    pub async fn create_service(
        &self,
        project_id: &str,
        service: &CreateServiceRequest,
    ) -> ApiResult<Service> {
        let request = ApiRequest::post(format!("/projects/{}/services", project_id)).json(service)?;
        self.mutate(
            request,
            Mutation::CreateService {
                project_id: project_id.to_string(),
            },
        )
        .await
    }

    pub async fn update_service(
        &self,
        project_id: &str,
        service_id: &str,
        update: &UpdateServiceRequest,
    ) -> ApiResult<Service> {
        let request = ApiRequest::put(format!("/services/{}", service_id)).json(update)?;
        self.mutate(
            request,
            Mutation::UpdateService {
                project_id: project_id.to_string(),
                service_id: service_id.to_string(),
            },
        )
        .await
    }

    pub async fn delete_service(&self, project_id: &str, service_id: &str) -> ApiResult<()> {
        self.mutate_empty(
            ApiRequest::delete(format!("/services/{}", service_id)),
            Mutation::DeleteService {
                project_id: project_id.to_string(),
                service_id: service_id.to_string(),
            },
        )
        .await
    }

    /// Build and roll out the service's current configuration.
    pub async fn deploy_service(
        &self,
        project_id: &str,
        service_id: &str,
    ) -> ApiResult<DeploymentResponse> {
        self.mutate(
            ApiRequest::post(format!("/services/{}/deploy", service_id)),
            Mutation::DeployService {
                project_id: project_id.to_string(),
                service_id: service_id.to_string(),
            },
        )
        .await
    }

    pub async fn start_service(&self, project_id: &str, service_id: &str) -> ApiResult<MessageResponse> {
        self.service_action(project_id, service_id, Action::Start).await
    }

    pub async fn stop_service(&self, project_id: &str, service_id: &str) -> ApiResult<MessageResponse> {
        self.service_action(project_id, service_id, Action::Stop).await
    }

    pub async fn restart_service(
        &self,
        project_id: &str,
        service_id: &str,
    ) -> ApiResult<MessageResponse> {
        self.service_action(project_id, service_id, Action::Restart).await
    }

    async fn service_action(
        &self,
        project_id: &str,
        service_id: &str,
        action: Action,
    ) -> ApiResult<MessageResponse> {
        self.mutate(
            ApiRequest::post(format!("/services/{}/{}", service_id, action.path())),
            action.mutation(project_id, service_id),
        )
        .await
    }

    pub async fn scale_service(
        &self,
        project_id: &str,
        service_id: &str,
        replicas: u32,
    ) -> ApiResult<Service> {
        let request = ApiRequest::post(format!("/services/{}/scale", service_id))
            .json(&ScaleServiceRequest { replicas })?;
        self.mutate(
            request,
            Mutation::ScaleService {
                project_id: project_id.to_string(),
                service_id: service_id.to_string(),
            },
        )
        .await
    }

    /// Recent container output. `tail` limits the line count, `since` is a
    /// timestamp or relative duration understood by the server.
    pub async fn service_logs(
        &self,
        service_id: &str,
        tail: Option<u32>,
        since: Option<&str>,
    ) -> ApiResult<Arc<ServiceLogsResponse>> {
        self.query_within(
            CacheKey::service_logs(service_id, tail, since),
            self.config.logs_poll_interval,
            logs_request(service_id, tail, since),
        )
        .await
    }

    /// Follow a service's logs. Polls while the subscription is alive.
    pub async fn watch_logs(
        &self,
        service_id: &str,
        tail: Option<u32>,
        since: Option<&str>,
    ) -> ApiResult<Subscription<ServiceLogsResponse>> {
        self.watch(
            CacheKey::service_logs(service_id, tail, since),
            self.config.logs_freshness(),
            logs_request(service_id, tail, since),
        )
        .await
    }

    pub async fn service_domains(&self, service_id: &str) -> ApiResult<Arc<Vec<Domain>>> {
        self.query(
            CacheKey::service_domains(service_id),
            ApiRequest::get(format!("/services/{}/domains", service_id)),
        )
        .await
    }

    pub async fn add_domain(&self, service_id: &str, domain: &CreateDomainRequest) -> ApiResult<Domain> {
        let request = ApiRequest::post(format!("/services/{}/domains", service_id)).json(domain)?;
        self.mutate(
            request,
            Mutation::AddDomain {
                service_id: service_id.to_string(),
            },
        )
        .await
    }

    pub async fn delete_domain(&self, service_id: &str, domain_id: &str) -> ApiResult<()> {
        self.mutate_empty(
            ApiRequest::delete(format!("/services/{}/domains/{}", service_id, domain_id)),
            Mutation::DeleteDomain {
                service_id: service_id.to_string(),
            },
        )
        .await
    }
}
