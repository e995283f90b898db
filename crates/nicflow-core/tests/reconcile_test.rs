//! End-to-end reconciliation against an in-memory backend

mod common;

use common::{FakeCloud, test_config};
use nicflow_core::{
    AllowedAddressPair, ExecutorConfig, IdentityKey, InstanceClass, InterfaceDescriptor,
    InterfaceType, NicError, OperationKind, PortSharingChange, Reconciler, ResourceTimeouts,
    RetryPolicy, VipPortSharing,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

fn reconciler(cloud: &Arc<FakeCloud>, config: ExecutorConfig) -> Reconciler {
    Reconciler::new(cloud.clone(), cloud.clone(), config)
}

fn subnet(id: &str) -> InterfaceDescriptor {
    InterfaceDescriptor::subnet(format!("net-{}", id), id)
}

#[tokio::test(start_paused = true)]
async fn test_default_change_reattaches_in_order() {
    let cloud = Arc::new(FakeCloud::new().with_subnets("vm-1", &["s1", "s2"]));
    let reconciler = reconciler(&cloud, test_config());

    let desired = vec![subnet("s2").with_default(), subnet("s3")];
    let result = assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    assert_eq!(
        cloud.mutating_calls(),
        vec!["detach port-2", "detach port-1", "attach s2", "attach s3"]
    );
    assert_eq!(cloud.attached_subnets("vm-1"), vec!["s2", "s3"]);

    assert_eq!(result.len(), 2);
    assert!(result[0].is_default);
    assert_eq!(result[0].subnet_id.as_deref(), Some("s2"));
    assert_eq!(result[1].order, 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_instance_only_attaches() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());

    let desired = vec![subnet("s1").with_default()];
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    assert_eq!(cloud.mutating_calls(), vec!["attach s1"]);
    assert_eq!(cloud.attached_subnets("vm-1"), vec!["s1"]);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_a_no_op() {
    let cloud = Arc::new(FakeCloud::new().with_subnets("vm-1", &["s1", "s2"]));
    let reconciler = reconciler(&cloud, test_config());
    let desired = vec![
        subnet("s2").with_default(),
        subnet("s3"),
        InterfaceDescriptor::any_subnet("net-any"),
    ];

    assert_ok!(
        reconciler
            .reconcile("vm-1", InstanceClass::Vm, desired.clone())
            .await
    );
    cloud.clear_calls();

    let plan = assert_ok!(reconciler.plan("vm-1", InstanceClass::Vm, desired.clone()).await);
    assert!(!plan.has_changes(), "unexpected plan: {}", plan.summary());

    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bare_metal_parent_change_makes_no_calls() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());

    let current = vec![
        subnet("s1")
            .with_default()
            .with_order(1)
            .with_port("port-1")
            .with_ip("10.0.0.1"),
        subnet("s2").with_order(2).with_port("port-2").with_ip("10.0.0.2"),
    ];
    let desired = vec![subnet("s2").with_default()];

    let err = assert_err!(
        reconciler
            .reconcile_from("bm-1", InstanceClass::BareMetal, current, desired)
            .await
    );
    assert!(matches!(err, NicError::TrunkImmutable(IdentityKey::Subnet(ref s)) if s == "s1"));
    assert!(err.is_configuration_error());
    assert!(cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bare_metal_subports_follow_the_parent() {
    let cloud = Arc::new(FakeCloud::new().with_subnets("bm-1", &["s1", "s2"]));
    let reconciler = reconciler(&cloud, test_config());

    let desired = vec![subnet("s1").with_default(), subnet("s3")];
    assert_ok!(
        reconciler
            .reconcile("bm-1", InstanceClass::BareMetal, desired)
            .await
    );

    assert_eq!(cloud.mutating_calls(), vec!["detach port-2", "attach s3"]);
    assert_eq!(cloud.attached_subnets("bm-1"), vec!["s1", "s3"]);
}

#[tokio::test(start_paused = true)]
async fn test_port_security_is_toggled_once() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());
    let desired = vec![
        subnet("s1").with_default(),
        subnet("s2").with_port_security_disabled(true),
    ];

    assert_ok!(
        reconciler
            .reconcile("vm-1", InstanceClass::Vm, desired.clone())
            .await
    );
    let disables: Vec<_> = cloud
        .mutating_calls()
        .into_iter()
        .filter(|c| c.starts_with("disable") || c.starts_with("enable"))
        .collect();
    assert_eq!(disables.len(), 1);
    assert!(!cloud.interfaces("vm-1")[1].port_security_enabled);

    cloud.clear_calls();
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_port_security_waits_for_lagging_listing() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());
    cloud.lag_listing(2);

    let start = Instant::now();
    let desired = vec![
        subnet("s1").with_default(),
        subnet("s2").with_port_security_disabled(true),
    ];
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    assert_eq!(
        cloud.mutating_calls(),
        vec!["attach s1", "attach s2", "disable port-3"]
    );
    assert!(!cloud.interfaces("vm-1")[1].port_security_enabled);
    // two listing retries per attach: 1s then 2s
    assert!(start.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_attach_fails_when_interface_is_never_listed() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());
    cloud.lag_listing(u32::MAX);

    let desired = vec![subnet("s1").with_port_security_disabled(true)];
    let err = assert_err!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    let NicError::Operation { kind, source, .. } = err else {
        panic!("expected an operation error");
    };
    assert_eq!(kind, OperationKind::Attach);
    assert!(matches!(
        *source,
        NicError::InterfaceNotListed { ref key, .. } if *key == IdentityKey::Subnet("s1".to_string())
    ));
    assert_eq!(cloud.mutating_calls(), vec!["attach s1"]);
    assert!(cloud.interfaces("vm-1")[0].port_security_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_any_subnet_port_security_skips_existing_ports() {
    let cloud = Arc::new(FakeCloud::new().with_subnets("vm-1", &["s1"]));
    let reconciler = reconciler(&cloud, test_config());
    cloud.omit_task_ports();

    // both interfaces live on net-s1 and the task does not name the new port
    let desired = vec![
        subnet("s1").with_default(),
        InterfaceDescriptor::any_subnet("net-s1").with_port_security_disabled(true),
    ];
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    assert_eq!(cloud.mutating_calls(), vec!["attach net-s1", "disable port-2"]);
    let interfaces = cloud.interfaces("vm-1");
    assert!(interfaces[0].port_security_enabled);
    assert!(!interfaces[1].port_security_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_backend_default_security_group_is_left_alone() {
    let cloud = Arc::new(FakeCloud::new().with_default_security_group("default-sg"));
    let reconciler = reconciler(&cloud, test_config());
    let desired = vec![subnet("s1").with_default()];

    assert_ok!(
        reconciler
            .reconcile("vm-1", InstanceClass::Vm, desired.clone())
            .await
    );
    assert_eq!(cloud.interfaces("vm-1")[0].security_groups, vec!["default-sg"]);
    cloud.clear_calls();

    let plan = assert_ok!(reconciler.plan("vm-1", InstanceClass::Vm, desired.clone()).await);
    assert!(!plan.has_changes(), "unexpected plan: {}", plan.summary());
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    assert!(cloud.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_undetachable_interface_fails_before_any_call() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());

    // s2 can be detached, s1 has no address to detach by
    let current = vec![
        subnet("s1").with_default().with_order(1).with_port("port-1"),
        subnet("s2").with_order(2).with_port("port-2").with_ip("10.0.0.2"),
    ];
    let desired = vec![subnet("s3").with_default()];

    let err = assert_err!(
        reconciler
            .reconcile_from("vm-1", InstanceClass::Vm, current, desired)
            .await
    );
    assert!(matches!(err, NicError::NotDetachable(IdentityKey::Subnet(ref s)) if s == "s1"));
    assert!(err.is_configuration_error());
    assert!(cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_attach_reports_progress_and_recovers() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());
    let desired = vec![subnet("s1").with_default(), subnet("s2")];

    cloud.fail_attach_of(Some("s2"));
    let err = assert_err!(
        reconciler
            .reconcile("vm-1", InstanceClass::Vm, desired.clone())
            .await
    );
    match &err {
        NicError::Operation {
            kind,
            key,
            completed,
            planned,
            source,
        } => {
            assert_eq!(*kind, OperationKind::Attach);
            assert_eq!(*key, IdentityKey::Subnet("s2".to_string()));
            assert_eq!((*completed, *planned), (1, 2));
            assert!(matches!(**source, NicError::TaskFailed { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("1 of 2"), "{}", err);
    assert_eq!(cloud.attached_subnets("vm-1"), vec!["s1"]);

    cloud.fail_attach_of(None);
    cloud.clear_calls();
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    assert_eq!(cloud.mutating_calls(), vec!["attach s2"]);
    assert_eq!(cloud.attached_subnets("vm-1"), vec!["s1", "s2"]);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_task_times_out() {
    let cloud = Arc::new(FakeCloud::new());
    let config = ExecutorConfig {
        timeouts: ResourceTimeouts {
            vm: Duration::from_secs(5),
            bare_metal: Duration::from_secs(10),
        },
        ..test_config()
    };
    let reconciler = reconciler(&cloud, config);
    cloud.hang_tasks();

    let start = Instant::now();
    let err = assert_err!(
        reconciler
            .reconcile("vm-1", InstanceClass::Vm, vec![subnet("s1")])
            .await
    );
    let NicError::Operation { source, .. } = err else {
        panic!("expected an operation error");
    };
    assert!(matches!(
        *source,
        NicError::TaskTimeout { timeout, .. } if timeout == Duration::from_secs(5)
    ));
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_reserved_fixed_ip_keeps_its_port() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());
    let desired = vec![
        subnet("s1").with_default(),
        InterfaceDescriptor::reserved_fixed_ip("rfip-port"),
    ];

    let result = assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);

    assert_eq!(cloud.mutating_calls(), vec!["attach s1", "attach rfip-port"]);
    assert_eq!(result[1].interface_type, InterfaceType::ReservedFixedIp);
    assert_eq!(result[1].port_id.as_deref(), Some("rfip-port"));
    assert!(result[1].ip_address.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_security_groups_update_in_place() {
    let cloud = Arc::new(FakeCloud::new());
    let reconciler = reconciler(&cloud, test_config());

    let desired = vec![subnet("s1").with_default().with_security_groups(["sg-a"])];
    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    let port_id = cloud.interfaces("vm-1")[0].port_id.clone();
    cloud.clear_calls();

    let desired = vec![
        subnet("s1")
            .with_default()
            .with_security_groups(["sg-a", "sg-b"]),
    ];
    let plan = assert_ok!(reconciler.plan("vm-1", InstanceClass::Vm, desired.clone()).await);
    assert_eq!(plan.summary().security_groups, 1);
    assert_eq!(plan.summary().attach, 0);

    assert_ok!(reconciler.reconcile("vm-1", InstanceClass::Vm, desired).await);
    assert_eq!(
        cloud.mutating_calls(),
        vec![format!("security-groups {} sg-a,sg-b", port_id)]
    );
    assert_eq!(cloud.interfaces("vm-1")[0].port_id, port_id);
}

#[tokio::test(start_paused = true)]
async fn test_instances_reconcile_concurrently() {
    let cloud = Arc::new(
        FakeCloud::new()
            .with_subnets("vm-1", &["s1"])
            .with_subnets("vm-2", &["s1", "s2"]),
    );
    let reconciler = reconciler(&cloud, test_config());

    let first = reconciler.clone();
    let second = reconciler.clone();
    let (a, b) = tokio::join!(
        first.reconcile("vm-1", InstanceClass::Vm, vec![subnet("s1"), subnet("s4")]),
        second.reconcile("vm-2", InstanceClass::Vm, vec![subnet("s3").with_default()]),
    );
    assert_ok!(a);
    assert_ok!(b);

    assert_eq!(cloud.attached_subnets("vm-1"), vec!["s1", "s4"]);
    assert_eq!(cloud.attached_subnets("vm-2"), vec!["s3"]);
}

#[tokio::test(start_paused = true)]
async fn test_vip_port_sharing_retries_transient_errors() {
    let cloud = Arc::new(FakeCloud::new());
    let vip = VipPortSharing::new(cloud.clone(), RetryPolicy::default());
    cloud.fail_vip_transiently(2);

    let start = Instant::now();
    let change = assert_ok!(
        vip.sync_instance_ports("vip-port", &[], &["port-1".to_string()])
            .await
    );

    assert_eq!(change, PortSharingChange::Add(vec!["port-1".to_string()]));
    assert_eq!(cloud.calls().len(), 3);
    assert_eq!(cloud.vip_ports("vip-port"), vec!["port-1"]);
    // 1s after the first failure, 2s after the second
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_vip_port_sharing_replaces_on_removal() {
    let cloud = Arc::new(FakeCloud::new());
    let vip = VipPortSharing::new(cloud.clone(), RetryPolicy::default());

    let current = vec!["port-1".to_string(), "port-2".to_string()];
    let desired = vec!["port-2".to_string()];
    let change = assert_ok!(vip.sync_instance_ports("vip-port", &current, &desired).await);

    assert_eq!(change, PortSharingChange::Replace(desired.clone()));
    assert_eq!(cloud.calls(), vec!["vip-replace vip-port"]);
    assert_eq!(cloud.vip_ports("vip-port"), desired);
}

#[tokio::test(start_paused = true)]
async fn test_vip_rejects_allowed_address_pairs() {
    let cloud = Arc::new(FakeCloud::new());
    let vip = VipPortSharing::new(cloud.clone(), RetryPolicy::default());
    let pairs = vec![AllowedAddressPair {
        ip_address: "10.0.0.100".to_string(),
        mac_address: None,
    }];

    let err = assert_err!(
        vip.assign_allowed_address_pairs("vip-port", true, &pairs)
            .await
    );
    assert!(matches!(err, NicError::VipWithAllowedAddressPairs(_)));
    assert!(err.is_configuration_error());
    assert!(cloud.calls().is_empty());

    // permanent backend errors are not retried
    let err = assert_err!(
        vip.assign_allowed_address_pairs("plain-port", false, &pairs)
            .await
    );
    assert!(matches!(err, NicError::Api(_)));
    assert_eq!(cloud.calls(), vec!["address-pairs plain-port"]);
}
