mod cli;
mod commands;
mod config;
mod error;
mod hosts;
mod orchestrator;
mod planner;
mod report;
mod resolve;
mod transport;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::Config;
use error::ConfigError;
use orchestrator::RunOptions;
use report::RunReport;
use transport::Credentials;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arista_vtep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = &result {
        eprintln!("error: {:#}", e);
    }
    ExitCode::from(exit_code(&result))
}

/// 0 when every switch was updated or skipped (or nothing was sent), 1 when
/// any switch failed or the run broke, 2 when the configuration was rejected
fn exit_code(result: &anyhow::Result<Option<RunReport>>) -> u8 {
    match result {
        Ok(Some(report)) if report.failed() > 0 => 1,
        Ok(_) => 0,
        Err(e) if e.downcast_ref::<ConfigError>().is_some() => 2,
        Err(_) => 1,
    }
}

/// Returns the run report, or `None` for a dry run
async fn run(cli: Cli) -> anyhow::Result<Option<RunReport>> {
    let cfg = Config::load(cli)?;

    // Everything up to the prompt is local; no switch has been contacted yet
    let groups = hosts::load_groups(cfg.hosts_file.as_deref(), &cfg.hosts)?;
    let mut plans = planner::plan(&groups);
    if cfg.resolve {
        let addresses = resolve::resolve_all(&plans).await?;
        plans = resolve::apply_addresses(plans, &addresses);
    }

    if cfg.dry_run {
        print_plan(&cfg, &plans);
        return Ok(None);
    }

    let password = rpassword::prompt_password(format!("Password for {}: ", cfg.username))
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))?;
    let credentials = Credentials {
        username: cfg.username.clone(),
        password,
    };

    let transport = transport::select(cfg.use_eapi, credentials, cfg.transport.clone())?;

    let opts = RunOptions {
        interface: cfg.interface.clone(),
        mode: cfg.mode,
        workers: cfg.workers,
        timeout: cfg.transport.timeout,
    };
    let report = orchestrator::run(transport.as_ref(), plans, &opts).await;

    if cfg.json {
        println!("{}", report.render_json()?);
    } else {
        print!("{}", report.render_text());
    }

    if report.failed() > 0 {
        tracing::warn!("{} of {} switches failed", report.failed(), report.results.len());
    }
    Ok(Some(report))
}

fn print_plan(cfg: &Config, plans: &[planner::HostPlan]) {
    for plan in plans {
        if plan.peers.is_empty() {
            println!("! {}: no peers", plan.host);
            continue;
        }
        println!("! {}", plan.host);
        for cmd in commands::build_flood_commands(&cfg.interface, &plan.peers, cfg.mode) {
            println!("{}", cmd);
        }
    }
}
