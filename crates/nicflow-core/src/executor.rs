//! Attachment executor
//!
//! Issues single detach/attach calls against the compute API and blocks on
//! the returned task. Every call is bounded by the timeout of the resource
//! class; a timed out task is not cancelled on the backend.

use crate::api::{
    AttachOptions, AttachedInterface, ComputeApi, DetachOptions, PortApi, Task, TaskOutput,
    TaskState,
};
use crate::descriptor::{InstanceClass, InterfaceDescriptor, InterfaceType};
use crate::error::{ApiError, NicError, Result};
use crate::identity::IdentityKey;
use crate::retry::{RetryPolicy, retry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Task wait bounds per resource class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub vm: Duration,
    pub bare_metal: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            vm: Duration::from_secs(20 * 60),
            bare_metal: Duration::from_secs(30 * 60),
        }
    }
}

impl ResourceTimeouts {
    pub fn for_class(&self, class: InstanceClass) -> Duration {
        match class {
            InstanceClass::Vm => self.vm,
            InstanceClass::BareMetal => self.bare_metal,
        }
    }
}

/// Executor settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub timeouts: ResourceTimeouts,

    /// Pause between two task status polls
    pub poll_interval: Duration,

    /// Policy for converging operations (listing lag after attach, VIP port
    /// sharing, address pairs)
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeouts: ResourceTimeouts::default(),
            poll_interval: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs attach/detach operations for one instance at a time
#[derive(Clone)]
pub struct AttachmentExecutor {
    compute: Arc<dyn ComputeApi>,
    ports: Arc<dyn PortApi>,
    config: ExecutorConfig,
}

impl AttachmentExecutor {
    pub fn new(compute: Arc<dyn ComputeApi>, ports: Arc<dyn PortApi>, config: ExecutorConfig) -> Self {
        Self {
            compute,
            ports,
            config,
        }
    }

    pub fn compute(&self) -> &Arc<dyn ComputeApi> {
        &self.compute
    }

    /// Detach one interface and wait for the task
    pub async fn detach(
        &self,
        instance_id: &str,
        class: InstanceClass,
        desc: &InterfaceDescriptor,
    ) -> Result<()> {
        let key = IdentityKey::of(desc)?;
        if class == InstanceClass::BareMetal && desc.is_default {
            return Err(NicError::TrunkImmutable(key));
        }
        let (Some(port_id), Some(ip_address)) = (&desc.port_id, &desc.ip_address) else {
            return Err(NicError::NotDetachable(key));
        };

        let opts = DetachOptions {
            port_id: port_id.clone(),
            ip_address: ip_address.clone(),
        };
        tracing::info!("Detaching {} ({}) from {}", key, ip_address, instance_id);
        let task = self.compute.detach_interface(instance_id, &opts).await?;
        self.wait_for_task(&task, class).await?;
        Ok(())
    }

    /// Attach one interface, wait for the task and record what the backend assigned
    pub async fn attach(
        &self,
        instance_id: &str,
        class: InstanceClass,
        desc: &mut InterfaceDescriptor,
    ) -> Result<()> {
        let key = IdentityKey::of(desc)?;
        if desc.interface_type != InterfaceType::ReservedFixedIp {
            // instance ports are recreated on every attach
            desc.port_id = None;
            desc.ip_address = None;
        }
        let opts = attach_options(desc);

        // ports attached before this call can never be the new interface
        let existing: HashSet<String> = if desc.port_id.is_none() {
            self.compute
                .list_interfaces(instance_id)
                .await?
                .into_iter()
                .map(|iface| iface.port_id)
                .collect()
        } else {
            HashSet::new()
        };

        tracing::info!("Attaching {} to {}", key, instance_id);
        let task = self.compute.attach_interface(instance_id, &opts).await?;
        let output = self.wait_for_task(&task, class).await?;

        if let Some(port_id) = output.assigned_port() {
            desc.port_id = Some(port_id.to_string());
        }
        if let Some(ip) = output.ip_address {
            desc.ip_address = Some(ip);
        }

        let iface = self.wait_until_listed(instance_id, desc, &existing).await?;
        desc.absorb(&iface);
        self.reconcile_port_security(desc, &iface).await
    }

    /// Find a freshly attached interface in the instance listing
    ///
    /// The listing may lag behind a finished attach task, so the lookup is
    /// retried under the executor retry policy. Interfaces in `existing` are
    /// skipped unless the descriptor names their port.
    async fn wait_until_listed(
        &self,
        instance_id: &str,
        desc: &InterfaceDescriptor,
        existing: &HashSet<String>,
    ) -> Result<AttachedInterface> {
        let key = IdentityKey::of(desc)?;
        let compute = &self.compute;
        let key_ref = &key;

        let found = retry(&self.config.retry, "list attached interface", || async move {
            compute
                .list_interfaces(instance_id)
                .await?
                .into_iter()
                .find(|iface| is_new_attachment(desc, iface, existing))
                .ok_or_else(|| {
                    ApiError::Transient(format!("{} not listed on {} yet", key_ref, instance_id))
                })
        })
        .await;

        match found {
            Ok(iface) => Ok(iface),
            Err(err @ ApiError::Permanent(_)) => Err(err.into()),
            Err(err) => Err(NicError::InterfaceNotListed {
                key,
                instance_id: instance_id.to_string(),
                reason: err.message().to_string(),
            }),
        }
    }

    /// Align the port security flag of an attached interface
    ///
    /// The port is only touched when the backend flag differs from the
    /// desired one.
    pub async fn reconcile_port_security(
        &self,
        desc: &InterfaceDescriptor,
        iface: &AttachedInterface,
    ) -> Result<()> {
        let want_enabled = !desc.port_security_disabled;
        if iface.port_security_enabled == want_enabled {
            return Ok(());
        }

        if want_enabled {
            tracing::debug!("Enabling port security on {}", iface.port_id);
            self.ports.enable_port_security(&iface.port_id).await?;
        } else {
            tracing::debug!("Disabling port security on {}", iface.port_id);
            self.ports.disable_port_security(&iface.port_id).await?;
        }
        Ok(())
    }

    /// Replace the security groups of a kept interface
    pub async fn update_security_groups(&self, desc: &InterfaceDescriptor) -> Result<()> {
        let key = IdentityKey::of(desc)?;
        let port_id = desc.port_id.as_deref().ok_or_else(|| {
            NicError::InvalidConfig(format!("interface {} has no port to update", key))
        })?;
        let groups: Vec<String> = desc.security_groups.iter().cloned().collect();

        tracing::info!("Updating security groups of {} to {:?}", key, groups);
        self.ports.update_security_groups(port_id, &groups).await?;
        Ok(())
    }

    /// Poll a task until it finishes, fails, or the class timeout passes
    pub async fn wait_for_task(&self, task: &Task, class: InstanceClass) -> Result<TaskOutput> {
        let timeout = self.config.timeouts.for_class(class);
        let deadline = Instant::now() + timeout;

        loop {
            match self.compute.get_task(&task.id).await {
                Ok(status) => match status.state {
                    TaskState::Success => {
                        tracing::debug!("Task {} finished", task.id);
                        return Ok(status.output);
                    }
                    TaskState::Error => {
                        return Err(NicError::TaskFailed {
                            task_id: task.id.clone(),
                            reason: status.error.unwrap_or_else(|| "unknown error".to_string()),
                        });
                    }
                    TaskState::Pending => {}
                },
                Err(err @ ApiError::Permanent(_)) => return Err(err.into()),
                Err(err) => {
                    tracing::debug!("Polling task {} failed: {}", task.id, err.message());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(NicError::TaskTimeout {
                    task_id: task.id.clone(),
                    timeout,
                });
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}

fn is_new_attachment(
    desc: &InterfaceDescriptor,
    iface: &AttachedInterface,
    existing: &HashSet<String>,
) -> bool {
    if desc.port_id.is_none() && existing.contains(&iface.port_id) {
        return false;
    }
    desc.matches(iface)
}

/// Attach request carrying only the discriminant of the interface type
fn attach_options(desc: &InterfaceDescriptor) -> AttachOptions {
    let mut opts = AttachOptions {
        interface_type: desc.interface_type,
        network_id: None,
        subnet_id: None,
        port_id: None,
        floating_ip: desc.floating_ip.clone(),
        security_groups: desc.security_groups.iter().cloned().collect(),
    };
    match desc.interface_type {
        InterfaceType::Subnet => {
            opts.network_id = desc.network_id.clone();
            opts.subnet_id = desc.subnet_id.clone();
        }
        InterfaceType::AnySubnet => opts.network_id = desc.network_id.clone(),
        InterfaceType::ReservedFixedIp => opts.port_id = desc.port_id.clone(),
        InterfaceType::External => {}
    }
    opts
}
