use clap::{CommandFactory, Parser};
use std::io;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use vrfctl::cgroup::CgroupFs;
use vrfctl::commands::{Runner, EXIT_FAILURE};
use vrfctl::config::cli::{print_default_config, CliArgs};
use vrfctl::config::{load_configuration, AppConfig};
use vrfctl::gateway::IpRouteGateway;
use vrfctl::services::SystemdServices;
use vrfctl::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print_default_config();
        return ExitCode::SUCCESS;
    }

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vrf: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_writer(io::stderr)
        .init();

    let Some(command) = cli.command else {
        if let Err(e) = CliArgs::command().print_help() {
            eprintln!("vrf: {}", e);
        }
        return ExitCode::from(EXIT_FAILURE);
    };

    match run(command, &config, cli.json).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("vrf: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(
    command: vrfctl::config::cli::Command,
    config: &AppConfig,
    json: bool,
) -> Result<u8, AppError> {
    debug!(?command, "Running");

    let gateway = IpRouteGateway::new(config.ip_binary.clone()).await?;
    let services = SystemdServices::new(config.systemctl_binary.clone());
    let cgroups = CgroupFs::new(config.cgroup_root.clone());

    let runner = Runner::new(&gateway, &services, &cgroups, config, json);
    let mut stdout = io::stdout().lock();
    runner.run(command, &mut stdout).await
}
