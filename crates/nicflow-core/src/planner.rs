//! Set-difference planning between current and desired interfaces

use crate::identity::KeyedInterfaces;
use crate::plan::{PlanReason, PlannedInterface};

/// Raw detach/attach sets before ordering correction
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub to_detach: Vec<PlannedInterface>,
    pub to_attach: Vec<PlannedInterface>,
    /// Interfaces kept in place whose security groups differ
    pub security_group_updates: Vec<PlannedInterface>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_detach.is_empty()
            && self.to_attach.is_empty()
            && self.security_group_updates.is_empty()
    }
}

/// Compute which interfaces leave and which arrive
///
/// Interfaces present on both sides are never detached here; a difference in
/// their security groups is recorded for the in-place update path. A desired
/// interface without security groups leaves whatever the backend assigned.
pub fn plan_changes(current: &KeyedInterfaces, desired: &KeyedInterfaces) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (key, desc) in current.iter() {
        if !desired.contains(key) {
            changes
                .to_detach
                .push(PlannedInterface::new(key.clone(), desc.clone(), PlanReason::Removed));
        }
    }

    for (key, want) in desired.iter() {
        match current.get(key) {
            None => changes
                .to_attach
                .push(PlannedInterface::new(key.clone(), want.clone(), PlanReason::Added)),
            Some(have)
                if !want.security_groups.is_empty()
                    && have.security_groups != want.security_groups =>
            {
                let mut update = want.clone();
                update.port_id = have.port_id.clone().or(update.port_id);
                update.ip_address = have.ip_address.clone();
                changes.security_group_updates.push(PlannedInterface::new(
                    key.clone(),
                    update,
                    PlanReason::SecurityGroups,
                ));
            }
            Some(_) => {}
        }
    }

    changes
}
