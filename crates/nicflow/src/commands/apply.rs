use super::{gcore_client, print_interfaces, read_interfaces};
use crate::ApiArgs;
use colored::Colorize;
use nicflow_config::NicflowConfig;
use nicflow_core::{InstanceClass, Reconciler};
use std::path::Path;
use std::sync::Arc;

pub async fn handle(
    config: &NicflowConfig,
    api: &ApiArgs,
    instance_id: &str,
    class: InstanceClass,
    desired_path: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let desired = read_interfaces(desired_path)?;
    let client = Arc::new(gcore_client(config, api)?);
    let reconciler = Reconciler::new(client.clone(), client, config.executor_config());

    println!(
        "{} {} ({})",
        "Reconciling interfaces of".blue(),
        instance_id.cyan(),
        class
    );

    let plan = reconciler.plan(instance_id, class, desired.clone()).await?;
    super::plan::print_plan(&plan);
    if dry_run || !plan.has_changes() {
        return Ok(());
    }

    let current = reconciler.reconcile(instance_id, class, desired).await?;

    println!();
    println!("{}", "✓ Interfaces reconciled".green().bold());
    print_interfaces(&current);
    Ok(())
}
