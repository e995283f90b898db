//! nicflow network interface reconciliation engine
//!
//! Network interfaces of a running instance are attached one at a time and
//! their call order is visible from the outside: the first attachment carries
//! the default route of a VM and is the trunk parent of a bare metal server.
//! This crate turns "current interfaces -> desired interfaces" into a
//! minimal, order-correct sequence of detach and attach operations and runs
//! it against an asynchronous backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        caller (resource layer / nicflow CLI)     │
//! └─────────────────┬───────────────────────────────┘
//!                   │ current + desired descriptors
//! ┌─────────────────▼───────────────────────────────┐
//! │                 nicflow-core                     │
//! │  identity ─▶ planner ─▶ ordering ─▶ plan         │
//! │                                     │            │
//! │        reconcile ─▶ executor ◀──────┘            │
//! │        vip ─▶ retry                              │
//! └───────┬─────────────────┬───────────────────────┘
//!         │ trait ComputeApi / PortApi / ReservedFixedIpApi
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ nicflow-gcore │ │  test fakes   │
//! └───────────────┘ └───────────────┘
//! ```

pub mod api;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod identity;
pub mod ordering;
pub mod plan;
pub mod planner;
pub mod reconcile;
pub mod retry;
pub mod vip;

// Re-exports
pub use api::{
    AllowedAddressPair, ApiResult, AttachOptions, AttachedInterface, ComputeApi, DetachOptions,
    IpAssignment, PortApi, ReservedFixedIpApi, Task, TaskOutput, TaskState, TaskStatus,
};
pub use descriptor::{
    FloatingIp, FloatingIpSource, InstanceClass, InterfaceDescriptor, InterfaceType,
    normalize_current, normalize_desired,
};
pub use error::{ApiError, NicError, OperationKind, Result};
pub use executor::{AttachmentExecutor, ExecutorConfig, ResourceTimeouts};
pub use identity::{IdentityKey, KeyedInterfaces};
pub use plan::{AttachmentPlan, PlanReason, PlanSummary, PlannedInterface};
pub use planner::{ChangeSet, plan_changes};
pub use reconcile::{Reconciler, descriptors_from_listing};
pub use retry::{RetryPolicy, retry};
pub use vip::{PortSharingChange, VipPortSharing, port_sharing_change};
