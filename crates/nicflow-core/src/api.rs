//! Backend API boundary
//!
//! The engine talks to the cloud only through these traits. Implementations
//! tag every failure as [`ApiError::Transient`] or [`ApiError::Permanent`].

use crate::descriptor::{FloatingIp, InterfaceType};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Instance interface attach/detach and task polling
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Interfaces attached to an instance, in attachment order
    async fn list_interfaces(&self, instance_id: &str) -> ApiResult<Vec<AttachedInterface>>;

    async fn attach_interface(&self, instance_id: &str, opts: &AttachOptions) -> ApiResult<Task>;

    async fn detach_interface(&self, instance_id: &str, opts: &DetachOptions) -> ApiResult<Task>;

    async fn get_task(&self, task_id: &str) -> ApiResult<TaskStatus>;
}

/// Port-level settings
#[async_trait]
pub trait PortApi: Send + Sync {
    async fn enable_port_security(&self, port_id: &str) -> ApiResult<()>;

    async fn disable_port_security(&self, port_id: &str) -> ApiResult<()>;

    /// Replace the security groups of a port
    async fn update_security_groups(&self, port_id: &str, groups: &[String]) -> ApiResult<()>;
}

/// Reserved fixed IP port sharing (VIP) and allowed address pairs
#[async_trait]
pub trait ReservedFixedIpApi: Send + Sync {
    async fn add_instance_ports(&self, vip_port_id: &str, port_ids: &[String]) -> ApiResult<()>;

    async fn replace_instance_ports(&self, vip_port_id: &str, port_ids: &[String])
    -> ApiResult<()>;

    async fn assign_allowed_address_pairs(
        &self,
        port_id: &str,
        pairs: &[AllowedAddressPair],
    ) -> ApiResult<()>;
}

/// One interface as reported by the backend listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedInterface {
    pub port_id: String,

    pub network_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(default)]
    pub ip_assignments: Vec<IpAssignment>,

    #[serde(default = "default_true")]
    pub port_security_enabled: bool,

    /// The network is the public external network
    #[serde(default)]
    pub external: bool,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl AttachedInterface {
    pub fn has_subnet(&self, subnet_id: &str) -> bool {
        self.ip_assignments.iter().any(|a| a.subnet_id == subnet_id)
    }

    pub fn first_ip(&self) -> Option<&str> {
        self.ip_assignments.first().map(|a| a.ip_address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAssignment {
    pub ip_address: String,
    pub subnet_id: String,
}

/// Attach request; only the discriminant of `interface_type` is sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachOptions {
    pub interface_type: InterfaceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<FloatingIp>,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachOptions {
    pub port_id: String,
    pub ip_address: String,
}

/// Handle of an asynchronous backend operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub output: TaskOutput,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            error: None,
            output: TaskOutput::default(),
        }
    }

    pub fn success(output: TaskOutput) -> Self {
        Self {
            state: TaskState::Success,
            error: None,
            output,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            error: Some(error.into()),
            output: TaskOutput::default(),
        }
    }
}

/// Resources created by a finished task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Instance ports created by the task
    #[serde(default)]
    pub ports: Vec<String>,

    /// Reserved fixed IP ports created by the task
    #[serde(default)]
    pub reserved_fixed_ips: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl TaskOutput {
    /// Port assigned by an attach task, falling back to the reserved fixed IP id
    pub fn assigned_port(&self) -> Option<&str> {
        self.ports
            .first()
            .or_else(|| self.reserved_fixed_ips.first())
            .map(String::as_str)
    }
}

/// Allowed address pair entry of a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedAddressPair {
    pub ip_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigned_port_falls_back_to_reserved_fixed_ip() {
        let output = TaskOutput {
            ports: Vec::new(),
            reserved_fixed_ips: vec!["rfip-1".to_string()],
            ip_address: None,
        };
        assert_eq!(output.assigned_port(), Some("rfip-1"));

        let output = TaskOutput {
            ports: vec!["port-1".to_string()],
            reserved_fixed_ips: vec!["rfip-1".to_string()],
            ip_address: None,
        };
        assert_eq!(output.assigned_port(), Some("port-1"));
    }

    #[test]
    fn test_attached_interface_defaults() {
        let iface: AttachedInterface =
            serde_json::from_str(r#"{"port_id": "p1", "network_id": "n1"}"#).unwrap();
        assert!(iface.port_security_enabled);
        assert!(!iface.external);
        assert_eq!(iface.first_ip(), None);
    }
}
