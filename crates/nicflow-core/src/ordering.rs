//! Ordering correction
//!
//! The backend has no "move interface to position N" primitive: attachment
//! order is solely a function of call sequence. To force the desired default
//! interface first, every slot ahead of it is vacated and refilled after it.
//!
//! Contract of the corrected plan:
//!
//! - the desired default already holds the default slot at position `p`:
//!   interfaces at positions `< p` are detached and, when still desired,
//!   reattached; the default itself stays;
//! - the desired default is attached but does not hold the default slot: the
//!   default role is bound when an interface is the first attachment, so the
//!   whole current list is vacated (`max_order_to_detach = len(current)`);
//! - the desired default is not attached: the whole current list is vacated.
//!
//! Detaches run in descending current order, attaches in ascending desired
//! order. On bare metal the current parent is never detached; a plan that
//! needs it is rejected.

use crate::descriptor::InstanceClass;
use crate::error::{NicError, Result};
use crate::identity::{IdentityKey, KeyedInterfaces};
use crate::plan::{AttachmentPlan, PlanReason, PlannedInterface};
use crate::planner::ChangeSet;
use std::collections::HashSet;

pub fn correct_order(
    class: InstanceClass,
    current: &KeyedInterfaces,
    desired: &KeyedInterfaces,
    changes: ChangeSet,
) -> Result<AttachmentPlan> {
    let ChangeSet {
        mut to_detach,
        mut to_attach,
        security_group_updates,
    } = changes;

    if let Some(default_key) = desired.default_key() {
        let max_order_to_detach = match current.get(default_key) {
            Some(have) if have.is_default => have.order.saturating_sub(1),
            Some(_) => {
                tracing::debug!("Default interface {} moves to the first slot", default_key);
                current.len() as u32
            }
            None => current.len() as u32,
        };

        let mut detaching: HashSet<IdentityKey> = to_detach.iter().map(|p| p.key.clone()).collect();
        let mut attaching: HashSet<IdentityKey> = to_attach.iter().map(|p| p.key.clone()).collect();

        for (key, have) in current.iter() {
            if have.order > max_order_to_detach {
                continue;
            }
            if detaching.insert(key.clone()) {
                to_detach.push(PlannedInterface::new(
                    key.clone(),
                    have.clone(),
                    PlanReason::Reordered,
                ));
            }
            if let Some(want) = desired.get(key) {
                if attaching.insert(key.clone()) {
                    to_attach.push(PlannedInterface::new(
                        key.clone(),
                        want.clone(),
                        PlanReason::Reordered,
                    ));
                }
            }
        }
    }

    if class == InstanceClass::BareMetal {
        if let Some(parent) = to_detach.iter().find(|p| p.descriptor.is_default) {
            return Err(NicError::TrunkImmutable(parent.key.clone()));
        }
    }

    to_detach.sort_by(|a, b| b.descriptor.order.cmp(&a.descriptor.order));
    to_attach.sort_by_key(|p| p.descriptor.order);

    // reattached interfaces get their security groups on attach
    let attaching: HashSet<&IdentityKey> = to_attach.iter().map(|p| &p.key).collect();
    let security_group_updates = security_group_updates
        .into_iter()
        .filter(|p| !attaching.contains(&p.key))
        .collect();

    Ok(AttachmentPlan {
        class,
        to_detach,
        to_attach,
        security_group_updates,
    })
}
