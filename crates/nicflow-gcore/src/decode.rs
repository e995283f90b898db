//! Interface definitions from untyped configuration data
//!
//! Resource configuration arrives as loosely typed maps (JSON, YAML, HCL
//! converted to JSON). This is the only place they are inspected; the engine
//! receives typed [`InterfaceDescriptor`]s. Empty strings count as unset.

use crate::error::{GcoreError, Result};
use nicflow_core::{FloatingIp, FloatingIpSource, InterfaceDescriptor, InterfaceType};
use serde_json::{Map, Value};

/// Decode a list of interface maps in declaration order
pub fn decode_interfaces(value: &Value) -> Result<Vec<InterfaceDescriptor>> {
    let items = value
        .as_array()
        .ok_or_else(|| GcoreError::Decode("interfaces must be a list".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            decode_interface(item).map_err(|e| match e {
                GcoreError::Decode(msg) => {
                    GcoreError::Decode(format!("interface #{}: {}", idx + 1, msg))
                }
                other => other,
            })
        })
        .collect()
}

/// Decode one interface map
pub fn decode_interface(value: &Value) -> Result<InterfaceDescriptor> {
    let map = value
        .as_object()
        .ok_or_else(|| GcoreError::Decode("interface must be a map".to_string()))?;

    let type_name = string_field(map, "type")?
        .ok_or_else(|| GcoreError::Decode("missing 'type'".to_string()))?;
    let interface_type: InterfaceType = type_name
        .parse()
        .map_err(|_| GcoreError::Decode(format!("unknown interface type '{}'", type_name)))?;

    let mut desc = InterfaceDescriptor::external();
    desc.interface_type = interface_type;
    desc.network_id = string_field(map, "network_id")?;
    desc.subnet_id = string_field(map, "subnet_id")?;
    desc.port_id = string_field(map, "port_id")?;
    desc.ip_address = string_field(map, "ip_address")?;
    desc.order = order_field(map)?;
    // bare metal schemas call the flag is_parent
    desc.is_default = bool_field(map, "is_default")? || bool_field(map, "is_parent")?;
    desc.port_security_disabled = bool_field(map, "port_security_disabled")?;
    desc.security_groups = security_groups(map)?.into_iter().collect();
    desc.floating_ip = floating_ip(map)?;

    Ok(desc)
}

fn string_field(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(GcoreError::Decode(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> Result<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(GcoreError::Decode(format!(
            "'{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

fn order_field(map: &Map<String, Value>) -> Result<u32> {
    match map.get("order") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| GcoreError::Decode(format!("'order' out of range: {}", n))),
        Some(other) => Err(GcoreError::Decode(format!(
            "'order' must be a number, got {}",
            other
        ))),
    }
}

/// Security groups as a list of ids or of `{id: ...}` maps
fn security_groups(map: &Map<String, Value>) -> Result<Vec<String>> {
    let Some(value) = map.get("security_groups") else {
        return Ok(Vec::new());
    };
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(GcoreError::Decode(format!(
                "'security_groups' must be a list, got {}",
                other
            )));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(id) if !id.is_empty() => Ok(id.clone()),
            Value::Object(group) => string_field(group, "id")?
                .ok_or_else(|| GcoreError::Decode("security group without 'id'".to_string())),
            other => Err(GcoreError::Decode(format!(
                "invalid security group entry {}",
                other
            ))),
        })
        .collect()
}

fn floating_ip(map: &Map<String, Value>) -> Result<Option<FloatingIp>> {
    let fip = match map.get("floating_ip") {
        None | Some(Value::Null) => return Ok(None),
        // single-element block lists are common in resource schemas
        Some(Value::Array(items)) if items.is_empty() => return Ok(None),
        Some(Value::Array(items)) => &items[0],
        Some(other) => other,
    };
    let fip = fip
        .as_object()
        .ok_or_else(|| GcoreError::Decode("'floating_ip' must be a map".to_string()))?;

    let source = match string_field(fip, "source")?.as_deref() {
        None | Some("new") => FloatingIpSource::New,
        Some("existing") => FloatingIpSource::Existing,
        Some(other) => {
            return Err(GcoreError::Decode(format!(
                "unknown floating ip source '{}'",
                other
            )));
        }
    };
    let existing_floating_id = string_field(fip, "existing_floating_id")?;

    match (source, existing_floating_id) {
        (FloatingIpSource::New, _) => Ok(Some(FloatingIp::new())),
        (FloatingIpSource::Existing, Some(id)) => Ok(Some(FloatingIp::existing(id))),
        (FloatingIpSource::Existing, None) => Err(GcoreError::Decode(
            "floating ip source 'existing' requires 'existing_floating_id'".to_string(),
        )),
    }
}
