//! Reserved fixed IP port sharing (VIP)
//!
//! A VIP is a reserved fixed IP shared by several instance ports. The ports
//! usually come from interfaces attached moments before, so calls are
//! wrapped by [`retry`] until the backend has caught up.

use crate::api::{AllowedAddressPair, ReservedFixedIpApi};
use crate::error::{NicError, Result};
use crate::retry::{RetryPolicy, retry};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Change applied to the instance ports of a VIP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSharingChange {
    Unchanged,
    /// Only new ports, appended with the add call
    Add(Vec<String>),
    /// Some ports leave, the whole set is replaced
    Replace(Vec<String>),
}

/// Decide how to move a VIP from `current` to `desired` instance ports
pub fn port_sharing_change(current: &[String], desired: &[String]) -> PortSharingChange {
    let have: BTreeSet<&String> = current.iter().collect();
    let want: BTreeSet<&String> = desired.iter().collect();

    if have == want {
        return PortSharingChange::Unchanged;
    }
    if have.is_subset(&want) {
        let added = want.difference(&have).map(|p| p.to_string()).collect();
        return PortSharingChange::Add(added);
    }
    PortSharingChange::Replace(want.into_iter().cloned().collect())
}

pub struct VipPortSharing {
    api: Arc<dyn ReservedFixedIpApi>,
    retry: RetryPolicy,
}

impl VipPortSharing {
    pub fn new(api: Arc<dyn ReservedFixedIpApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Share the VIP with additional instance ports
    pub async fn add_instance_ports(&self, vip_port_id: &str, port_ids: &[String]) -> Result<()> {
        let operation = format!("add instance ports to {}", vip_port_id);
        retry(&self.retry, &operation, || {
            self.api.add_instance_ports(vip_port_id, port_ids)
        })
        .await?;
        Ok(())
    }

    /// Replace the full set of instance ports sharing the VIP
    pub async fn replace_instance_ports(
        &self,
        vip_port_id: &str,
        port_ids: &[String],
    ) -> Result<()> {
        let operation = format!("replace instance ports of {}", vip_port_id);
        retry(&self.retry, &operation, || {
            self.api.replace_instance_ports(vip_port_id, port_ids)
        })
        .await?;
        Ok(())
    }

    /// Assign allowed address pairs to a reserved fixed IP port
    ///
    /// A VIP cannot carry allowed address pairs; that combination is
    /// rejected without calling the backend.
    pub async fn assign_allowed_address_pairs(
        &self,
        port_id: &str,
        is_vip: bool,
        pairs: &[AllowedAddressPair],
    ) -> Result<()> {
        if is_vip && !pairs.is_empty() {
            return Err(NicError::VipWithAllowedAddressPairs(port_id.to_string()));
        }
        let operation = format!("assign allowed address pairs to {}", port_id);
        retry(&self.retry, &operation, || {
            self.api.assign_allowed_address_pairs(port_id, pairs)
        })
        .await?;
        Ok(())
    }

    /// Move the VIP's instance ports from `current` to `desired`
    pub async fn sync_instance_ports(
        &self,
        vip_port_id: &str,
        current: &[String],
        desired: &[String],
    ) -> Result<PortSharingChange> {
        let change = port_sharing_change(current, desired);
        match &change {
            PortSharingChange::Unchanged => {
                tracing::debug!("Instance ports of {} unchanged", vip_port_id);
            }
            PortSharingChange::Add(ports) => {
                tracing::info!("Adding {} instance ports to {}", ports.len(), vip_port_id);
                self.add_instance_ports(vip_port_id, ports).await?;
            }
            PortSharingChange::Replace(ports) => {
                tracing::info!("Replacing instance ports of {} with {:?}", vip_port_id, ports);
                self.replace_instance_ports(vip_port_id, ports).await?;
            }
        }
        Ok(change)
    }
}
