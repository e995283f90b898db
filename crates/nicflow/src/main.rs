mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use nicflow_core::InstanceClass;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nicflow")]
#[command(about = "Order-aware network interface reconciliation", long_about = None)]
struct Cli {
    /// Config file (defaults to nicflow.yaml discovery)
    #[arg(short, long, global = true, env = "NICFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detach/attach plan between two interface lists (offline)
    Plan {
        #[arg(long, value_enum, default_value = "vm")]
        class: ClassArg,
        /// Current interfaces (JSON or YAML list)
        #[arg(long)]
        current: PathBuf,
        /// Desired interfaces (JSON or YAML list)
        #[arg(long)]
        desired: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile the interfaces of a running instance
    Apply {
        /// Instance or bare metal server id
        #[arg(long)]
        instance: String,
        #[arg(long, value_enum, default_value = "vm")]
        class: ClassArg,
        /// Desired interfaces (JSON or YAML list)
        #[arg(long)]
        desired: PathBuf,
        /// Only show the plan against the live listing
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Share a reserved fixed IP (VIP) with instance ports
    Vip {
        /// Port id of the reserved fixed IP
        #[arg(long)]
        port: String,
        /// Instance ports that should share the VIP
        #[arg(long = "instance-port")]
        instance_ports: Vec<String>,
        /// Instance ports sharing the VIP now
        #[arg(long = "current-port")]
        current_ports: Vec<String>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Show the version
    Version,
}

/// Overrides of the `api` config section
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ApiArgs {
    #[arg(long, env = "GCORE_PROJECT_ID")]
    pub project_id: Option<u64>,
    #[arg(long, env = "GCORE_REGION_ID")]
    pub region_id: Option<u64>,
    #[arg(long, env = "GCORE_API_URL")]
    pub api_url: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassArg {
    Vm,
    BareMetal,
}

impl From<ClassArg> for InstanceClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::Vm => InstanceClass::Vm,
            ClassArg::BareMetal => InstanceClass::BareMetal,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr so JSON output stays clean
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("nicflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => nicflow_config::load_config_from(path)?,
        None => nicflow_config::load_config()?,
    };

    let result = match cli.command {
        Commands::Plan {
            class,
            current,
            desired,
            json,
        } => commands::plan::handle(class.into(), &current, &desired, json),
        Commands::Apply {
            instance,
            class,
            desired,
            dry_run,
            api,
        } => {
            commands::apply::handle(&config, &api, &instance, class.into(), &desired, dry_run)
                .await
        }
        Commands::Vip {
            port,
            instance_ports,
            current_ports,
            api,
        } => commands::vip::handle(&config, &api, &port, &current_ports, &instance_ports).await,
        Commands::Version => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
