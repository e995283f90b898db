//! Attachment plans

use crate::descriptor::{InstanceClass, InterfaceDescriptor, normalize_current, normalize_desired};
use crate::error::{NicError, Result};
use crate::identity::{IdentityKey, KeyedInterfaces};
use crate::ordering::correct_order;
use crate::planner::plan_changes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Why an interface is part of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    /// Present now, absent from the desired list
    Removed,
    /// Desired, not attached yet
    Added,
    /// Kept, but has to move to restore default-first ordering
    Reordered,
    /// Kept in place with a different security group set
    SecurityGroups,
}

impl std::fmt::Display for PlanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanReason::Removed => write!(f, "removed"),
            PlanReason::Added => write!(f, "added"),
            PlanReason::Reordered => write!(f, "reordered"),
            PlanReason::SecurityGroups => write!(f, "security groups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedInterface {
    pub key: IdentityKey,
    pub descriptor: InterfaceDescriptor,
    pub reason: PlanReason,
}

impl PlannedInterface {
    pub fn new(key: IdentityKey, descriptor: InterfaceDescriptor, reason: PlanReason) -> Self {
        Self {
            key,
            descriptor,
            reason,
        }
    }
}

/// Ordered detach/attach operations for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPlan {
    pub class: InstanceClass,

    /// Current descriptors, descending current order
    pub to_detach: Vec<PlannedInterface>,

    /// Desired descriptors, ascending desired order
    pub to_attach: Vec<PlannedInterface>,

    /// Kept interfaces whose security groups are replaced in place
    pub security_group_updates: Vec<PlannedInterface>,
}

impl AttachmentPlan {
    /// Plan the move from `current` to `desired`
    ///
    /// No backend call is involved; every configuration error surfaces here.
    pub fn build(
        class: InstanceClass,
        current: Vec<InterfaceDescriptor>,
        desired: Vec<InterfaceDescriptor>,
    ) -> Result<Self> {
        let current = KeyedInterfaces::resolve(&normalize_current(current))?;
        let desired = KeyedInterfaces::resolve(&normalize_desired(desired)?)?;

        let changes = plan_changes(&current, &desired);
        let plan = correct_order(class, &current, &desired, changes)?;

        tracing::debug!("Planned {} for {} interfaces: {}", class, desired.len(), plan.summary());
        Ok(plan)
    }

    /// Every interface to detach must be addressable by port id and ip address
    pub fn check_detachable(&self) -> Result<()> {
        match self
            .to_detach
            .iter()
            .find(|p| p.descriptor.port_id.is_none() || p.descriptor.ip_address.is_none())
        {
            Some(item) => Err(NicError::NotDetachable(item.key.clone())),
            None => Ok(()),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.to_detach.is_empty()
            || !self.to_attach.is_empty()
            || !self.security_group_updates.is_empty()
    }

    /// Number of backend operations the plan issues, excluding task polling
    pub fn operation_count(&self) -> usize {
        self.to_detach.len() + self.to_attach.len() + self.security_group_updates.len()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            detach: self.to_detach.len(),
            attach: self.to_attach.len(),
            reordered: self
                .to_attach
                .iter()
                .filter(|p| p.reason == PlanReason::Reordered)
                .count(),
            security_groups: self.security_group_updates.len(),
        }
    }

    /// Attachment list the backend would report after the plan ran
    ///
    /// Detached entries drop out, survivors keep their relative order, new
    /// attachments follow in plan order; the first attachment holds the
    /// default slot.
    pub fn project(&self, current: &[InterfaceDescriptor]) -> Result<Vec<InterfaceDescriptor>> {
        let detached: HashSet<&IdentityKey> = self.to_detach.iter().map(|p| &p.key).collect();

        let mut projected = Vec::new();
        for desc in normalize_current(current.to_vec()) {
            if !detached.contains(&IdentityKey::of(&desc)?) {
                projected.push(desc);
            }
        }
        projected.extend(self.to_attach.iter().map(|p| p.descriptor.clone()));

        for (idx, desc) in projected.iter_mut().enumerate() {
            desc.order = idx as u32 + 1;
            desc.is_default = idx == 0;
        }
        Ok(projected)
    }
}

/// Counts of planned operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub detach: usize,
    pub attach: usize,
    pub reordered: usize,
    pub security_groups: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to detach, {} to attach ({} reordered), {} security group updates",
            self.detach, self.attach, self.reordered, self.security_groups
        )
    }
}
