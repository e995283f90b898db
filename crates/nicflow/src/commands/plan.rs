use super::{print_interfaces, read_interfaces};
use colored::Colorize;
use nicflow_core::{AttachmentPlan, InstanceClass, PlanReason};
use std::path::Path;

pub fn handle(
    class: InstanceClass,
    current_path: &Path,
    desired_path: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let current = read_interfaces(current_path)?;
    let desired = read_interfaces(desired_path)?;

    let plan = AttachmentPlan::build(class, current.clone(), desired)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_plan(&plan);
    if plan.has_changes() {
        println!();
        println!("{}", "After apply:".bold());
        print_interfaces(&plan.project(&current)?);
    }
    Ok(())
}

pub fn print_plan(plan: &AttachmentPlan) {
    if !plan.has_changes() {
        println!("{}", "✓ Interfaces already match".green().bold());
        return;
    }

    println!("{} ({})", "Plan:".bold(), plan.class);
    for item in &plan.to_detach {
        println!("  {} {} ({})", "-".red().bold(), item.key, item.reason);
    }
    for item in &plan.to_attach {
        let sign = if item.reason == PlanReason::Reordered {
            "~".yellow().bold()
        } else {
            "+".green().bold()
        };
        println!("  {} {} ({})", sign, item.key, item.reason);
    }
    for item in &plan.security_group_updates {
        let groups: Vec<&str> = item
            .descriptor
            .security_groups
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "  {} {} security groups -> [{}]",
            "~".yellow().bold(),
            item.key,
            groups.join(", ")
        );
    }
    println!();
    println!("{}", plan.summary());
}
