//! Port security and security groups

use crate::client::GcoreClient;
use async_trait::async_trait;
use nicflow_core::{ApiResult, PortApi};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SecurityGroupsRequest<'a> {
    security_groups: &'a [String],
}

impl GcoreClient {
    async fn port_action(&self, port_id: &str, action: &str) -> ApiResult<()> {
        let url = self.resource_url("ports", &format!("{}/{}", port_id, action));
        let _: serde_json::Value = self
            .send(reqwest::Method::PATCH, &url, &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PortApi for GcoreClient {
    async fn enable_port_security(&self, port_id: &str) -> ApiResult<()> {
        tracing::debug!("Enabling port security on {}", port_id);
        self.port_action(port_id, "enable_port_security").await
    }

    async fn disable_port_security(&self, port_id: &str) -> ApiResult<()> {
        tracing::debug!("Disabling port security on {}", port_id);
        self.port_action(port_id, "disable_port_security").await
    }

    async fn update_security_groups(&self, port_id: &str, groups: &[String]) -> ApiResult<()> {
        let url = self.resource_url("ports", port_id);
        let body = SecurityGroupsRequest {
            security_groups: groups,
        };
        let _: serde_json::Value = self.send(reqwest::Method::PATCH, &url, &body).await?;
        Ok(())
    }
}
