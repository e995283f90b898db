use async_trait::async_trait;
use nicflow_core::{
    AllowedAddressPair, ApiError, ApiResult, AttachOptions, AttachedInterface, ComputeApi,
    DetachOptions, ExecutorConfig, InterfaceType, IpAssignment, PortApi, ReservedFixedIpApi, Task,
    TaskOutput, TaskStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory backend: attachments apply in call order, tasks finish after
/// a configurable number of pending polls.
pub struct FakeCloud {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    instances: HashMap<String, Vec<AttachedInterface>>,
    tasks: HashMap<String, FakeTask>,
    calls: Vec<String>,
    next_id: u32,
    pending_polls: u32,
    failing_attach: Option<String>,
    hanging: bool,
    vip_ports: HashMap<String, Vec<String>>,
    vip_transient_failures: u32,
    listing_lag: u32,
    hidden: HashMap<String, u32>,
    task_ports_omitted: bool,
    default_security_group: Option<String>,
}

struct FakeTask {
    pending_left: u32,
    status: TaskStatus,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending_polls: 1,
                ..State::default()
            }),
        }
    }

    /// Seed an instance with interfaces on the given subnets, in order
    pub fn with_subnets(self, instance_id: &str, subnets: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for subnet in subnets {
                let iface = state.new_interface(&format!("net-{}", subnet), subnet);
                state
                    .instances
                    .entry(instance_id.to_string())
                    .or_default()
                    .push(iface);
            }
        }
        self
    }

    /// Attaches to this subnet or network end with a task error
    pub fn fail_attach_of(&self, discriminant: Option<&str>) {
        self.state.lock().unwrap().failing_attach = discriminant.map(str::to_string);
    }

    /// Tasks never leave the pending state
    pub fn hang_tasks(&self) {
        self.state.lock().unwrap().hanging = true;
    }

    pub fn fail_vip_transiently(&self, times: u32) {
        self.state.lock().unwrap().vip_transient_failures = times;
    }

    /// Newly attached interfaces stay out of the next `listings` listings
    pub fn lag_listing(&self, listings: u32) {
        self.state.lock().unwrap().listing_lag = listings;
    }

    /// Finished attach tasks do not report the created port
    pub fn omit_task_ports(&self) {
        self.state.lock().unwrap().task_ports_omitted = true;
    }

    /// Ports attached without security groups land in this group
    pub fn with_default_security_group(self, group: &str) -> Self {
        self.state.lock().unwrap().default_security_group = Some(group.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change something on the backend
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list") && !c.starts_with("task"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn interfaces(&self, instance_id: &str) -> Vec<AttachedInterface> {
        self.state
            .lock()
            .unwrap()
            .instances
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subnet of every attached interface, in attachment order
    pub fn attached_subnets(&self, instance_id: &str) -> Vec<String> {
        self.interfaces(instance_id)
            .iter()
            .map(|i| i.ip_assignments[0].subnet_id.clone())
            .collect()
    }

    pub fn vip_ports(&self, vip_port_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .vip_ports
            .get(vip_port_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn new_interface(&mut self, network_id: &str, subnet_id: &str) -> AttachedInterface {
        let n = self.next();
        AttachedInterface {
            port_id: format!("port-{}", n),
            network_id: network_id.to_string(),
            mac_address: Some(format!("fa:16:3e:00:00:{:02x}", n)),
            ip_assignments: vec![IpAssignment {
                ip_address: format!("10.0.0.{}", n),
                subnet_id: subnet_id.to_string(),
            }],
            port_security_enabled: true,
            external: false,
            security_groups: Vec::new(),
        }
    }

    fn task(&mut self, status: TaskStatus) -> Task {
        let id = format!("task-{}", self.next());
        let pending_left = if self.hanging {
            u32::MAX
        } else {
            self.pending_polls
        };
        self.tasks.insert(
            id.clone(),
            FakeTask {
                pending_left,
                status,
            },
        );
        Task { id }
    }
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn list_interfaces(&self, instance_id: &str) -> ApiResult<Vec<AttachedInterface>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list {}", instance_id));
        let listing = state.instances.get(instance_id).cloned().unwrap_or_default();
        let mut visible = Vec::with_capacity(listing.len());
        for iface in listing {
            match state.hidden.get_mut(&iface.port_id) {
                Some(left) if *left > 0 => *left -= 1,
                _ => visible.push(iface),
            }
        }
        Ok(visible)
    }

    async fn attach_interface(&self, instance_id: &str, opts: &AttachOptions) -> ApiResult<Task> {
        let mut state = self.state.lock().unwrap();
        let discriminant = match opts.interface_type {
            InterfaceType::Subnet => opts.subnet_id.clone().unwrap_or_default(),
            InterfaceType::AnySubnet => opts.network_id.clone().unwrap_or_default(),
            InterfaceType::ReservedFixedIp => opts.port_id.clone().unwrap_or_default(),
            InterfaceType::External => "external".to_string(),
        };
        state.calls.push(format!("attach {}", discriminant));

        if state.failing_attach.as_deref() == Some(discriminant.as_str()) {
            return Ok(state.task(TaskStatus::failed(format!(
                "cannot attach {}",
                discriminant
            ))));
        }

        let mut iface = match opts.interface_type {
            InterfaceType::Subnet => state.new_interface(
                opts.network_id.as_deref().unwrap_or_default(),
                &discriminant,
            ),
            InterfaceType::AnySubnet => {
                state.new_interface(&discriminant, &format!("{}-auto", discriminant))
            }
            InterfaceType::External => {
                let mut iface = state.new_interface("ext-net", "ext-subnet");
                iface.external = true;
                iface
            }
            InterfaceType::ReservedFixedIp => {
                let mut iface = state.new_interface("rfip-net", "rfip-subnet");
                iface.port_id = discriminant.clone();
                iface
            }
        };
        iface.security_groups = match &state.default_security_group {
            Some(group) if opts.security_groups.is_empty() => vec![group.clone()],
            _ => opts.security_groups.clone(),
        };

        if state.listing_lag > 0 {
            let lag = state.listing_lag;
            state.hidden.insert(iface.port_id.clone(), lag);
        }

        let output = if state.task_ports_omitted {
            TaskOutput::default()
        } else if opts.interface_type == InterfaceType::ReservedFixedIp {
            TaskOutput {
                ports: Vec::new(),
                reserved_fixed_ips: vec![iface.port_id.clone()],
                ip_address: None,
            }
        } else {
            TaskOutput {
                ports: vec![iface.port_id.clone()],
                reserved_fixed_ips: Vec::new(),
                ip_address: iface.first_ip().map(str::to_string),
            }
        };

        state
            .instances
            .entry(instance_id.to_string())
            .or_default()
            .push(iface);
        Ok(state.task(TaskStatus::success(output)))
    }

    async fn detach_interface(&self, instance_id: &str, opts: &DetachOptions) -> ApiResult<Task> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("detach {}", opts.port_id));

        let ifaces = state.instances.entry(instance_id.to_string()).or_default();
        let before = ifaces.len();
        ifaces.retain(|i| {
            !(i.port_id == opts.port_id && i.first_ip() == Some(opts.ip_address.as_str()))
        });
        if ifaces.len() == before {
            return Err(ApiError::Permanent(format!("port {} not attached", opts.port_id)));
        }
        Ok(state.task(TaskStatus::success(TaskOutput::default())))
    }

    async fn get_task(&self, task_id: &str) -> ApiResult<TaskStatus> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("task {}", task_id));
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| ApiError::Permanent(format!("task {} not found", task_id)))?;
        if task.pending_left > 0 {
            task.pending_left -= 1;
            return Ok(TaskStatus::pending());
        }
        Ok(task.status.clone())
    }
}

#[async_trait]
impl PortApi for FakeCloud {
    async fn enable_port_security(&self, port_id: &str) -> ApiResult<()> {
        self.set_port_security(port_id, true, "enable")
    }

    async fn disable_port_security(&self, port_id: &str) -> ApiResult<()> {
        self.set_port_security(port_id, false, "disable")
    }

    async fn update_security_groups(&self, port_id: &str, groups: &[String]) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("security-groups {} {}", port_id, groups.join(",")));
        for iface in state.instances.values_mut().flatten() {
            if iface.port_id == port_id {
                iface.security_groups = groups.to_vec();
            }
        }
        Ok(())
    }
}

impl FakeCloud {
    fn set_port_security(&self, port_id: &str, enabled: bool, verb: &str) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", verb, port_id));
        for iface in state.instances.values_mut().flatten() {
            if iface.port_id == port_id {
                iface.port_security_enabled = enabled;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReservedFixedIpApi for FakeCloud {
    async fn add_instance_ports(&self, vip_port_id: &str, port_ids: &[String]) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("vip-add {}", vip_port_id));
        if state.vip_transient_failures > 0 {
            state.vip_transient_failures -= 1;
            return Err(ApiError::Transient(format!(
                "instance port {} not found",
                port_ids.join(",")
            )));
        }
        state
            .vip_ports
            .entry(vip_port_id.to_string())
            .or_default()
            .extend(port_ids.iter().cloned());
        Ok(())
    }

    async fn replace_instance_ports(
        &self,
        vip_port_id: &str,
        port_ids: &[String],
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("vip-replace {}", vip_port_id));
        state
            .vip_ports
            .insert(vip_port_id.to_string(), port_ids.to_vec());
        Ok(())
    }

    async fn assign_allowed_address_pairs(
        &self,
        port_id: &str,
        _pairs: &[AllowedAddressPair],
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("address-pairs {}", port_id));
        Err(ApiError::Permanent(
            "port security must be enabled to use allowed address pairs".to_string(),
        ))
    }
}

/// Executor settings with short polling for paused-time tests
#[allow(dead_code)]
pub fn test_config() -> ExecutorConfig {
    ExecutorConfig {
        poll_interval: Duration::from_millis(100),
        ..ExecutorConfig::default()
    }
}
