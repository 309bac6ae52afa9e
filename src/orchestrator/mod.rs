use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::commands::{build_flood_commands, FloodMode};
use crate::error::DeviceError;
use crate::planner::HostPlan;
use crate::report::{HostResult, Outcome, RunReport};
use crate::transport::Transport;

/// Knobs for pushing a plan to the switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub interface: String,
    pub mode: FloodMode,
    pub workers: usize,
    pub timeout: Duration,
}

/// Configure every planned host. A failing host never stops the others;
/// results come back in plan order whatever the completion order.
pub async fn run(transport: &dyn Transport, plans: Vec<HostPlan>, opts: &RunOptions) -> RunReport {
    let started_at = Utc::now();
    tracing::info!(
        "Updating {} switches over {} ({} at a time)",
        plans.len(),
        transport.name(),
        opts.workers
    );

    let results: Vec<HostResult> = stream::iter(plans)
        .map(|plan| configure_host(transport, plan, opts))
        .buffered(opts.workers.max(1))
        .collect()
        .await;

    RunReport {
        started_at,
        finished_at: Utc::now(),
        results,
    }
}

async fn configure_host(transport: &dyn Transport, plan: HostPlan, opts: &RunOptions) -> HostResult {
    if plan.peers.is_empty() {
        tracing::info!("{}: no peers, skipping", plan.host);
        return HostResult {
            host: plan.host,
            peers: plan.peers,
            outcome: Outcome::Skipped,
        };
    }

    let commands = build_flood_commands(&opts.interface, &plan.peers, opts.mode);
    tracing::debug!("{}: sending {:?}", plan.host, commands);

    let result = apply(transport, &plan.host, &commands, opts.timeout).await;

    let outcome = match result {
        Ok(output) => {
            tracing::info!("{}: added {} flood-list peers", plan.host, plan.peers.len());
            tracing::debug!("{}: device output: {}", plan.host, output.trim());
            Outcome::Ok
        }
        Err(e) => {
            tracing::error!("{}: failed to send commands: {}", plan.host, e);
            Outcome::from(&e)
        }
    };

    HostResult {
        host: plan.host,
        peers: plan.peers,
        outcome,
    }
}

/// Open a session, run the commands, and close it whether or not they worked.
/// The timeout bounds connect plus commands; close always runs afterwards.
async fn apply(transport: &dyn Transport, host: &str, commands: &[String], timeout: Duration) -> Result<String, DeviceError> {
    let deadline = Instant::now() + timeout;
    let timed_out = || DeviceError::Connection(format!("timed out after {:?}", timeout));

    let mut session = tokio::time::timeout_at(deadline, transport.connect(host))
        .await
        .map_err(|_| timed_out())??;

    let result = match tokio::time::timeout_at(deadline, session.run_config(commands)).await {
        Ok(r) => r,
        Err(_) => Err(timed_out()),
    };
    session.close().await;
    result
}
