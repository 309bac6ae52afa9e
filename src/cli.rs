use clap::Parser;

use std::path::PathBuf;

use crate::commands::DEFAULT_INTERFACE;

/// Add every other switch of a group to each switch's VXLAN flood list
#[derive(Debug, Clone, Parser)]
#[clap(name = "arista-vtep", version, about)]
pub struct Cli {
    /// Hostnames or IP addresses of the switches (minimum two across all sources)
    pub hosts: Vec<String>,

    /// Login username
    #[clap(short, long)]
    pub username: String,

    /// File with hosts, one per line, or grouped under [name] headers
    #[clap(short = 'f', long)]
    pub hosts_file: Option<PathBuf>,

    /// Use eAPI instead of SSH
    #[clap(long)]
    pub use_eapi: bool,

    /// Verify TLS certificates when connecting over eAPI
    #[clap(long)]
    pub verify_ssl: bool,

    /// VXLAN interface to configure
    #[clap(long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,

    /// Clear the existing flood list before adding peers
    #[clap(long)]
    pub replace: bool,

    /// Print the planned commands without contacting any switch
    #[clap(long)]
    pub dry_run: bool,

    /// Use peer names as given instead of resolving them to addresses
    #[clap(long)]
    pub no_resolve: bool,

    /// Number of switches configured in parallel [env: VTEP_WORKERS, default: 1]
    #[clap(long)]
    pub workers: Option<usize>,

    /// Per-switch timeout in seconds [env: VTEP_TIMEOUT_SECS, default: 30]
    #[clap(long)]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}
