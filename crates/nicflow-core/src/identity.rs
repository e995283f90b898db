//! Interface identity resolution
//!
//! The backend never echoes a client-chosen correlation id, so "the same
//! interface" across current and desired lists is decided by the
//! discriminant of the interface type.

use crate::descriptor::{InterfaceDescriptor, InterfaceType};
use crate::error::{NicError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable key of an interface across current/desired lists
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum IdentityKey {
    Subnet(String),
    Port(String),
    Network(String),
    External,
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::Subnet(id) => write!(f, "subnet:{}", id),
            IdentityKey::Port(id) => write!(f, "port:{}", id),
            IdentityKey::Network(id) => write!(f, "network:{}", id),
            IdentityKey::External => write!(f, "external"),
        }
    }
}

impl IdentityKey {
    /// Resolve the key of a descriptor
    ///
    /// Candidates are tried in the order subnet, port, network, external;
    /// only the fields meaningful for the descriptor type take part.
    pub fn of(desc: &InterfaceDescriptor) -> Result<Self> {
        let t = desc.interface_type;
        match t {
            InterfaceType::Subnet => {
                required(&desc.subnet_id, t, "subnet_id").map(IdentityKey::Subnet)
            }
            InterfaceType::ReservedFixedIp => {
                required(&desc.port_id, t, "port_id").map(IdentityKey::Port)
            }
            InterfaceType::AnySubnet => {
                required(&desc.network_id, t, "network_id").map(IdentityKey::Network)
            }
            InterfaceType::External => Ok(IdentityKey::External),
        }
    }
}

fn required(field: &Option<String>, t: InterfaceType, name: &'static str) -> Result<String> {
    non_empty(field)
        .map(str::to_string)
        .ok_or_else(|| missing(t, name))
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn missing(interface_type: InterfaceType, field: &'static str) -> NicError {
    NicError::MissingDiscriminant {
        interface_type: interface_type.to_string(),
        field,
    }
}

/// Descriptors keyed by identity, in attachment order
#[derive(Debug, Clone, Default)]
pub struct KeyedInterfaces {
    entries: Vec<(IdentityKey, InterfaceDescriptor)>,
    index: HashMap<IdentityKey, usize>,
}

impl KeyedInterfaces {
    /// Key every descriptor, rejecting identity collisions
    pub fn resolve(list: &[InterfaceDescriptor]) -> Result<Self> {
        let mut keyed = Self::default();
        for desc in list {
            let key = IdentityKey::of(desc)?;
            if keyed.index.contains_key(&key) {
                return Err(NicError::DuplicateIdentity(key));
            }
            keyed.index.insert(key.clone(), keyed.entries.len());
            keyed.entries.push((key, desc.clone()));
        }
        Ok(keyed)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&InterfaceDescriptor> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &InterfaceDescriptor)> {
        self.entries.iter().map(|(k, d)| (k, d))
    }

    pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the descriptor flagged default, if any
    pub fn default_key(&self) -> Option<&IdentityKey> {
        self.entries.iter().find(|(_, d)| d.is_default).map(|(k, _)| k)
    }
}
