//! Instance interfaces and tasks

use crate::client::GcoreClient;
use crate::error::{GcoreError, Result};
use async_trait::async_trait;
use nicflow_core::{
    ApiResult, AttachOptions, AttachedInterface, ComputeApi, DetachOptions, FloatingIp,
    InterfaceType, IpAssignment, Task, TaskOutput, TaskState, TaskStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResponse<T> {
    #[serde(default)]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TaskIdList {
    #[serde(default)]
    tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireInterface {
    port_id: String,
    network_id: String,
    #[serde(default)]
    mac_address: Option<String>,
    #[serde(default)]
    ip_assignments: Vec<WireIpAssignment>,
    #[serde(default)]
    port_security_enabled: Option<bool>,
    #[serde(default)]
    network_details: Option<WireNetworkDetails>,
    #[serde(default)]
    security_groups: Vec<WireSecurityGroup>,
}

#[derive(Debug, Deserialize)]
struct WireIpAssignment {
    ip_address: String,
    subnet_id: String,
}

#[derive(Debug, Deserialize)]
struct WireNetworkDetails {
    #[serde(default)]
    external: bool,
}

#[derive(Debug, Deserialize)]
struct WireSecurityGroup {
    id: String,
}

impl From<WireInterface> for AttachedInterface {
    fn from(wire: WireInterface) -> Self {
        AttachedInterface {
            port_id: wire.port_id,
            network_id: wire.network_id,
            mac_address: wire.mac_address,
            ip_assignments: wire
                .ip_assignments
                .into_iter()
                .map(|a| IpAssignment {
                    ip_address: a.ip_address,
                    subnet_id: a.subnet_id,
                })
                .collect(),
            port_security_enabled: wire.port_security_enabled.unwrap_or(true),
            external: wire.network_details.is_some_and(|n| n.external),
            security_groups: wire.security_groups.into_iter().map(|sg| sg.id).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AttachRequest<'a> {
    #[serde(rename = "type")]
    interface_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subnet_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    floating_ip: Option<&'a FloatingIp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    security_groups: Vec<SecurityGroupRef<'a>>,
}

#[derive(Debug, Serialize)]
struct SecurityGroupRef<'a> {
    id: &'a str,
}

impl<'a> From<&'a AttachOptions> for AttachRequest<'a> {
    fn from(opts: &'a AttachOptions) -> Self {
        let interface_type = match opts.interface_type {
            InterfaceType::Subnet => "subnet",
            InterfaceType::AnySubnet => "any_subnet",
            InterfaceType::External => "external",
            InterfaceType::ReservedFixedIp => "reserved_fixed_ip",
        };
        AttachRequest {
            interface_type,
            network_id: opts.network_id.as_deref(),
            subnet_id: opts.subnet_id.as_deref(),
            port_id: opts.port_id.as_deref(),
            floating_ip: opts.floating_ip.as_ref(),
            security_groups: opts
                .security_groups
                .iter()
                .map(|id| SecurityGroupRef { id })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTask {
    state: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    created_resources: Option<WireCreatedResources>,
}

#[derive(Debug, Default, Deserialize)]
struct WireCreatedResources {
    #[serde(default)]
    ports: Vec<String>,
    #[serde(default)]
    reserved_fixed_ips: Vec<String>,
}

impl WireTask {
    fn into_status(self) -> TaskStatus {
        let state = match self.state.as_str() {
            "FINISHED" => TaskState::Success,
            "ERROR" => TaskState::Error,
            _ => TaskState::Pending,
        };
        let created = self.created_resources.unwrap_or_default();
        TaskStatus {
            state,
            error: self.error,
            output: TaskOutput {
                ports: created.ports,
                reserved_fixed_ips: created.reserved_fixed_ips,
                ip_address: None,
            },
        }
    }
}

impl GcoreClient {
    async fn instance_task<B: Serialize + Sync>(
        &self,
        instance_id: &str,
        action: &str,
        body: &B,
    ) -> Result<Task> {
        let url = self.resource_url("instances", &format!("{}/{}", instance_id, action));
        let response: TaskIdList = self.send(reqwest::Method::POST, &url, body).await?;
        let id = response
            .tasks
            .into_iter()
            .next()
            .ok_or_else(|| GcoreError::MissingTask(format!("{} on {}", action, instance_id)))?;
        tracing::debug!("{} on {} started task {}", action, instance_id, id);
        Ok(Task { id })
    }
}

#[async_trait]
impl ComputeApi for GcoreClient {
    async fn list_interfaces(&self, instance_id: &str) -> ApiResult<Vec<AttachedInterface>> {
        let url = self.resource_url("instances", &format!("{}/interfaces", instance_id));
        let response: ListResponse<WireInterface> = self.get(&url).await?;
        Ok(response.results.into_iter().map(Into::into).collect())
    }

    async fn attach_interface(&self, instance_id: &str, opts: &AttachOptions) -> ApiResult<Task> {
        let body = AttachRequest::from(opts);
        Ok(self
            .instance_task(instance_id, "attach_interface", &body)
            .await?)
    }

    async fn detach_interface(&self, instance_id: &str, opts: &DetachOptions) -> ApiResult<Task> {
        Ok(self
            .instance_task(instance_id, "detach_interface", opts)
            .await?)
    }

    async fn get_task(&self, task_id: &str) -> ApiResult<TaskStatus> {
        let task: WireTask = self.get(&self.task_url(task_id)).await?;
        Ok(task.into_status())
    }
}
