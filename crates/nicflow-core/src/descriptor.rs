//! Interface descriptors
//!
//! An [`InterfaceDescriptor`] is the canonical form of one network attachment,
//! either desired (decoded from configuration) or current (derived from a
//! backend listing).

use crate::api::AttachedInterface;
use crate::error::{NicError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// How an interface is attached, which also decides its identity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// A specific subnet of a network
    Subnet,
    /// Any subnet of a network, chosen by the backend
    AnySubnet,
    /// The public external network
    External,
    /// A pre-created reserved fixed IP port
    ReservedFixedIp,
}

impl std::fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceType::Subnet => write!(f, "subnet"),
            InterfaceType::AnySubnet => write!(f, "any_subnet"),
            InterfaceType::External => write!(f, "external"),
            InterfaceType::ReservedFixedIp => write!(f, "reserved_fixed_ip"),
        }
    }
}

impl std::str::FromStr for InterfaceType {
    type Err = NicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subnet" => Ok(Self::Subnet),
            "any_subnet" => Ok(Self::AnySubnet),
            "external" => Ok(Self::External),
            "reserved_fixed_ip" => Ok(Self::ReservedFixedIp),
            other => Err(NicError::InvalidConfig(format!(
                "unknown interface type '{}'",
                other
            ))),
        }
    }
}

/// Resource class being reconciled
///
/// The class selects the meaning of [`InterfaceDescriptor::is_default`]:
/// default route interface for VMs, trunk parent for bare metal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceClass {
    Vm,
    BareMetal,
}

impl std::fmt::Display for InstanceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceClass::Vm => write!(f, "vm"),
            InstanceClass::BareMetal => write!(f, "bare_metal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatingIpSource {
    New,
    Existing,
}

/// Floating IP requested together with an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub source: FloatingIpSource,

    /// Required when `source` is `existing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_floating_id: Option<String>,
}

impl FloatingIp {
    pub fn new() -> Self {
        Self {
            source: FloatingIpSource::New,
            existing_floating_id: None,
        }
    }

    pub fn existing(floating_id: impl Into<String>) -> Self {
        Self {
            source: FloatingIpSource::Existing,
            existing_floating_id: Some(floating_id.into()),
        }
    }
}

impl Default for FloatingIp {
    fn default() -> Self {
        Self::new()
    }
}

/// One desired or actual network attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,

    /// Assigned by the backend, known only after attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// 1-based attachment position; 0 until assigned
    #[serde(default)]
    pub order: u32,

    /// Default route interface (VM) or trunk parent (bare metal)
    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub security_groups: BTreeSet<String>,

    #[serde(default)]
    pub port_security_disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<FloatingIp>,
}

impl InterfaceDescriptor {
    fn with_type(interface_type: InterfaceType) -> Self {
        Self {
            interface_type,
            network_id: None,
            subnet_id: None,
            port_id: None,
            ip_address: None,
            order: 0,
            is_default: false,
            security_groups: BTreeSet::new(),
            port_security_disabled: false,
            floating_ip: None,
        }
    }

    pub fn subnet(network_id: impl Into<String>, subnet_id: impl Into<String>) -> Self {
        let mut desc = Self::with_type(InterfaceType::Subnet);
        desc.network_id = Some(network_id.into());
        desc.subnet_id = Some(subnet_id.into());
        desc
    }

    pub fn any_subnet(network_id: impl Into<String>) -> Self {
        let mut desc = Self::with_type(InterfaceType::AnySubnet);
        desc.network_id = Some(network_id.into());
        desc
    }

    pub fn external() -> Self {
        Self::with_type(InterfaceType::External)
    }

    pub fn reserved_fixed_ip(port_id: impl Into<String>) -> Self {
        let mut desc = Self::with_type(InterfaceType::ReservedFixedIp);
        desc.port_id = Some(port_id.into());
        desc
    }

    pub fn with_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_port(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = Some(port_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_security_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port_security_disabled(mut self, disabled: bool) -> Self {
        self.port_security_disabled = disabled;
        self
    }

    pub fn with_floating_ip(mut self, floating_ip: FloatingIp) -> Self {
        self.floating_ip = Some(floating_ip);
        self
    }

    /// Sort key of the attachment order: default first, then by order
    pub fn attachment_sort_key(&self) -> (Reverse<bool>, u32) {
        (Reverse(self.is_default), self.order)
    }

    /// Whether a listed interface is the attachment this descriptor describes
    ///
    /// A known port id is decisive. Otherwise the type discriminant is used.
    pub fn matches(&self, iface: &AttachedInterface) -> bool {
        if let Some(port_id) = &self.port_id {
            return iface.port_id == *port_id;
        }
        match self.interface_type {
            InterfaceType::Subnet => self
                .subnet_id
                .as_deref()
                .is_some_and(|subnet| iface.has_subnet(subnet)),
            InterfaceType::AnySubnet => self.network_id.as_deref() == Some(iface.network_id.as_str()),
            InterfaceType::External => iface.external,
            InterfaceType::ReservedFixedIp => false,
        }
    }

    /// Copy backend-assigned fields from a listed interface
    pub fn absorb(&mut self, iface: &AttachedInterface) {
        self.port_id = Some(iface.port_id.clone());
        if self.network_id.is_none() {
            self.network_id = Some(iface.network_id.clone());
        }
        let assignment = match self.subnet_id.as_deref() {
            Some(subnet) => iface.ip_assignments.iter().find(|a| a.subnet_id == subnet),
            None => iface.ip_assignments.first(),
        };
        if let Some(assignment) = assignment {
            self.ip_address = Some(assignment.ip_address.clone());
            if self.subnet_id.is_none() {
                self.subnet_id = Some(assignment.subnet_id.clone());
            }
        }
    }
}

/// Put desired descriptors into attachment order
///
/// Declared position becomes the order, then the two-key sort (default
/// first, order ascending) is applied and orders are renumbered from 1. More
/// than one default is rejected; with none marked the first entry is the default.
pub fn normalize_desired(desired: Vec<InterfaceDescriptor>) -> Result<Vec<InterfaceDescriptor>> {
    let defaults = desired.iter().filter(|d| d.is_default).count();
    if defaults > 1 {
        return Err(NicError::MultipleDefaults(defaults));
    }

    let mut desired = desired;
    for (idx, desc) in desired.iter_mut().enumerate() {
        desc.order = idx as u32 + 1;
    }
    if defaults == 0 {
        if let Some(first) = desired.first_mut() {
            first.is_default = true;
        }
    }

    desired.sort_by_key(InterfaceDescriptor::attachment_sort_key);
    renumber(&mut desired);
    Ok(desired)
}

/// Put current descriptors into actual attachment order
///
/// Current orders come from the backend; descriptors without one keep their
/// listed position. A reported default flag is kept; when none is reported
/// the first attachment holds the default slot.
pub fn normalize_current(current: Vec<InterfaceDescriptor>) -> Vec<InterfaceDescriptor> {
    let mut current: Vec<(usize, InterfaceDescriptor)> = current.into_iter().enumerate().collect();
    current.sort_by_key(|(idx, desc)| {
        if desc.order == 0 {
            (*idx as u32 + 1, *idx)
        } else {
            (desc.order, *idx)
        }
    });
    let mut current: Vec<InterfaceDescriptor> = current.into_iter().map(|(_, d)| d).collect();
    renumber(&mut current);
    if !current.iter().any(|d| d.is_default) {
        if let Some(first) = current.first_mut() {
            first.is_default = true;
        }
    }
    current
}

fn renumber(list: &mut [InterfaceDescriptor]) {
    for (idx, desc) in list.iter_mut().enumerate() {
        desc.order = idx as u32 + 1;
    }
}
