use super::gcore_client;
use crate::ApiArgs;
use colored::Colorize;
use nicflow_config::NicflowConfig;
use nicflow_core::{PortSharingChange, VipPortSharing};
use std::sync::Arc;

pub async fn handle(
    config: &NicflowConfig,
    api: &ApiArgs,
    vip_port_id: &str,
    current_ports: &[String],
    desired_ports: &[String],
) -> anyhow::Result<()> {
    let client = Arc::new(gcore_client(config, api)?);
    let vip = VipPortSharing::new(client, config.retry_policy());

    match vip
        .sync_instance_ports(vip_port_id, current_ports, desired_ports)
        .await?
    {
        PortSharingChange::Unchanged => {
            println!("{}", "✓ Instance ports already match".green().bold());
        }
        PortSharingChange::Add(ports) => {
            println!(
                "{} {} shared with {}",
                "✓".green().bold(),
                vip_port_id.cyan(),
                ports.join(", ")
            );
        }
        PortSharingChange::Replace(ports) => {
            println!(
                "{} {} now shared with [{}]",
                "✓".green().bold(),
                vip_port_id.cyan(),
                ports.join(", ")
            );
        }
    }
    Ok(())
}
