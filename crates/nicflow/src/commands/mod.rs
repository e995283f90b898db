pub mod apply;
pub mod plan;
pub mod vip;

use crate::ApiArgs;
use anyhow::Context;
use colored::Colorize;
use nicflow_config::NicflowConfig;
use nicflow_core::InterfaceDescriptor;
use nicflow_gcore::{ClientConfig, GcoreClient};
use std::path::Path;

/// Read an interface list from a JSON or YAML file
///
/// The file is decoded as untyped data first and handed to the boundary
/// decoder, so both formats share the same validation.
pub fn read_interfaces(path: &Path) -> anyhow::Result<Vec<InterfaceDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value: serde_json::Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", path.display()))?
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
            .with_context(|| format!("{} is not valid YAML", path.display()))?;
        serde_json::to_value(yaml)
            .with_context(|| format!("{} cannot be represented as JSON", path.display()))?
    };

    nicflow_gcore::decode_interfaces(&value).with_context(|| format!("in {}", path.display()))
}

/// Gcore client from config, command line overrides and the token variable
pub fn gcore_client(config: &NicflowConfig, args: &ApiArgs) -> anyhow::Result<GcoreClient> {
    let project_id = args
        .project_id
        .or(config.api.project_id)
        .context("project id not set (api.project_id, --project-id or GCORE_PROJECT_ID)")?;
    let region_id = args
        .region_id
        .or(config.api.region_id)
        .context("region id not set (api.region_id, --region-id or GCORE_REGION_ID)")?;

    let mut client_config = ClientConfig::new(project_id, region_id, config.api_token()?);
    if let Some(url) = args.api_url.as_ref().or(config.api.base_url.as_ref()) {
        client_config = client_config.with_base_url(url.as_str());
    }
    tracing::debug!(
        "Using Gcore API {} (project {}, region {})",
        client_config.base_url,
        project_id,
        region_id
    );
    Ok(GcoreClient::new(client_config))
}

/// One line per interface: position, identity and the backend-assigned fields
pub fn print_interfaces(interfaces: &[InterfaceDescriptor]) {
    for desc in interfaces {
        let marker = if desc.is_default { "*" } else { " " };
        let identity = nicflow_core::IdentityKey::of(desc)
            .map(|key| key.to_string())
            .unwrap_or_else(|_| desc.interface_type.to_string());
        println!(
            "  {} {:>2}. {} {}",
            marker.green().bold(),
            desc.order,
            identity.cyan(),
            format!(
                "port={} ip={}",
                desc.port_id.as_deref().unwrap_or("-"),
                desc.ip_address.as_deref().unwrap_or("-")
            )
            .dimmed()
        );
    }
}
