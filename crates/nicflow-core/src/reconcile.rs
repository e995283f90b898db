//! Instance interface reconciliation
//!
//! Ties planning and execution together: detaches run to completion in
//! descending current order before any attach starts, attaches run in
//! ascending desired order, security group updates of kept interfaces run
//! last. Nothing is rolled back on failure; running the reconciliation again
//! against a fresh listing computes the remaining, smaller plan.

use crate::api::{AttachedInterface, ComputeApi, PortApi};
use crate::descriptor::{InstanceClass, InterfaceDescriptor, InterfaceType};
use crate::error::{NicError, OperationKind, Result};
use crate::executor::{AttachmentExecutor, ExecutorConfig};
use crate::plan::{AttachmentPlan, PlannedInterface};
use std::sync::Arc;

/// Reconciles the interfaces of compute and bare metal instances
#[derive(Clone)]
pub struct Reconciler {
    executor: AttachmentExecutor,
}

impl Reconciler {
    pub fn new(compute: Arc<dyn ComputeApi>, ports: Arc<dyn PortApi>, config: ExecutorConfig) -> Self {
        Self {
            executor: AttachmentExecutor::new(compute, ports, config),
        }
    }

    /// Current interfaces of an instance as descriptors, typed after `desired`
    pub async fn current_interfaces(
        &self,
        instance_id: &str,
        desired: &[InterfaceDescriptor],
    ) -> Result<Vec<InterfaceDescriptor>> {
        let listing = self.executor.compute().list_interfaces(instance_id).await?;
        Ok(descriptors_from_listing(&listing, desired))
    }

    /// Plan against a fresh backend listing
    pub async fn plan(
        &self,
        instance_id: &str,
        class: InstanceClass,
        desired: Vec<InterfaceDescriptor>,
    ) -> Result<AttachmentPlan> {
        let current = self.current_interfaces(instance_id, &desired).await?;
        AttachmentPlan::build(class, current, desired)
    }

    /// Execute a plan; returns the attached descriptors with assigned ports and addresses
    ///
    /// A plan with an interface that cannot be detached is rejected before
    /// the first call.
    pub async fn apply(
        &self,
        instance_id: &str,
        plan: &AttachmentPlan,
    ) -> Result<Vec<InterfaceDescriptor>> {
        plan.check_detachable()?;
        let planned = plan.operation_count();
        let mut completed = 0;

        for item in &plan.to_detach {
            self.executor
                .detach(instance_id, plan.class, &item.descriptor)
                .await
                .map_err(|e| failed(OperationKind::Detach, item, completed, planned, e))?;
            completed += 1;
        }

        let mut attached = Vec::with_capacity(plan.to_attach.len());
        for item in &plan.to_attach {
            let mut desc = item.descriptor.clone();
            self.executor
                .attach(instance_id, plan.class, &mut desc)
                .await
                .map_err(|e| failed(OperationKind::Attach, item, completed, planned, e))?;
            completed += 1;
            attached.push(desc);
        }

        for item in &plan.security_group_updates {
            self.executor
                .update_security_groups(&item.descriptor)
                .await
                .map_err(|e| failed(OperationKind::SecurityGroups, item, completed, planned, e))?;
            completed += 1;
        }

        tracing::info!(
            "Reconciled interfaces of {}: {} operations",
            instance_id,
            completed
        );
        Ok(attached)
    }

    /// Reconcile from caller-supplied current and desired lists
    ///
    /// Configuration errors surface before any backend call. On success the
    /// interfaces are listed again and returned in attachment order.
    pub async fn reconcile_from(
        &self,
        instance_id: &str,
        class: InstanceClass,
        current: Vec<InterfaceDescriptor>,
        desired: Vec<InterfaceDescriptor>,
    ) -> Result<Vec<InterfaceDescriptor>> {
        let plan = AttachmentPlan::build(class, current, desired.clone())?;
        if plan.has_changes() {
            self.apply(instance_id, &plan).await?;
        } else {
            tracing::debug!("Interfaces of {} already match", instance_id);
        }
        self.current_interfaces(instance_id, &desired).await
    }

    /// List the instance, then reconcile towards `desired`
    pub async fn reconcile(
        &self,
        instance_id: &str,
        class: InstanceClass,
        desired: Vec<InterfaceDescriptor>,
    ) -> Result<Vec<InterfaceDescriptor>> {
        let current = self.current_interfaces(instance_id, &desired).await?;
        self.reconcile_from(instance_id, class, current, desired).await
    }
}

fn failed(
    kind: OperationKind,
    item: &PlannedInterface,
    completed: usize,
    planned: usize,
    source: NicError,
) -> NicError {
    NicError::Operation {
        kind,
        key: item.key.clone(),
        completed,
        planned,
        source: Box::new(source),
    }
}

/// Turn a backend listing into current descriptors
///
/// Listing order is attachment order and the first attachment holds the
/// default slot. The backend does not report how an interface was attached,
/// so the type is recovered from the desired descriptor it matches, most
/// specific first; unmatched interfaces become `external`, `subnet` or
/// `any_subnet` from what the listing shows.
pub fn descriptors_from_listing(
    listing: &[AttachedInterface],
    desired: &[InterfaceDescriptor],
) -> Vec<InterfaceDescriptor> {
    const MATCH_PRIORITY: [InterfaceType; 4] = [
        InterfaceType::ReservedFixedIp,
        InterfaceType::Subnet,
        InterfaceType::AnySubnet,
        InterfaceType::External,
    ];

    let mut used = vec![false; desired.len()];
    let mut current = Vec::with_capacity(listing.len());

    for (idx, iface) in listing.iter().enumerate() {
        let matched = MATCH_PRIORITY.iter().find_map(|t| {
            desired.iter().enumerate().position(|(i, d)| {
                !used[i] && d.interface_type == *t && d.matches(iface)
            })
        });

        let mut desc = match matched {
            Some(i) => {
                used[i] = true;
                let mut desc = desired[i].clone();
                desc.ip_address = None;
                desc
            }
            None if iface.external => InterfaceDescriptor::external(),
            None => match iface.ip_assignments.first() {
                Some(assignment) => {
                    InterfaceDescriptor::subnet(&iface.network_id, &assignment.subnet_id)
                }
                None => InterfaceDescriptor::any_subnet(&iface.network_id),
            },
        };

        desc.absorb(iface);
        desc.order = idx as u32 + 1;
        desc.is_default = idx == 0;
        desc.port_security_disabled = !iface.port_security_enabled;
        if !iface.security_groups.is_empty() {
            desc.security_groups = iface.security_groups.iter().cloned().collect();
        }
        current.push(desc);
    }

    current
}
