use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::commands::FloodMode;
use crate::error::ConfigError;
use crate::transport::TransportOptions;

/// Config holds everything a run needs apart from the password
#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<String>,
    pub hosts_file: Option<PathBuf>,
    pub username: String,
    pub use_eapi: bool,
    pub interface: String,
    pub mode: FloodMode,
    pub dry_run: bool,
    pub resolve: bool,
    pub workers: usize,
    pub json: bool,
    pub transport: TransportOptions,
}

impl Config {
    /// Merge CLI arguments over environment defaults
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let eapi_protocol = get_env("VTEP_EAPI_PROTOCOL", "https").to_lowercase();
        if eapi_protocol != "https" && eapi_protocol != "http" {
            return Err(ConfigError::InvalidSetting {
                key: "VTEP_EAPI_PROTOCOL",
                value: eapi_protocol,
            });
        }
        let default_eapi_port = if eapi_protocol == "https" { "443" } else { "80" };

        let ssh_port = parse_env("VTEP_SSH_PORT", "22")?;
        let eapi_port = parse_env("VTEP_EAPI_PORT", default_eapi_port)?;
        let timeout_secs = match cli.timeout {
            Some(t) => t,
            None => parse_env("VTEP_TIMEOUT_SECS", "30")?,
        };
        let workers = match cli.workers {
            Some(w) => w,
            None => parse_env("VTEP_WORKERS", "1")?,
        };

        if timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "timeout",
                value: timeout_secs.to_string(),
            });
        }
        if workers == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "workers",
                value: workers.to_string(),
            });
        }

        let interface = cli.interface.trim().to_string();
        if interface.is_empty() || interface.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidSetting {
                key: "interface",
                value: cli.interface,
            });
        }

        Ok(Self {
            hosts: cli.hosts,
            hosts_file: cli.hosts_file,
            username: cli.username,
            use_eapi: cli.use_eapi,
            interface,
            mode: if cli.replace { FloodMode::Replace } else { FloodMode::Add },
            dry_run: cli.dry_run,
            resolve: !cli.no_resolve,
            workers,
            json: cli.json,
            transport: TransportOptions {
                ssh_port,
                eapi_protocol,
                eapi_port,
                verify_ssl: cli.verify_ssl,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = get_env(key, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSetting { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["arista-vtep", "-u", "admin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::load(cli(&["leaf1", "leaf2"])).unwrap();
        assert_eq!(cfg.interface, "Vxlan1");
        assert_eq!(cfg.mode, FloodMode::Add);
        assert!(cfg.resolve);
        assert!(!cfg.transport.verify_ssl);
        assert!(!cfg.use_eapi);
    }

    #[test]
    fn test_cli_overrides() {
        let cfg = Config::load(cli(&["--workers", "3", "--timeout", "5", "--replace", "--no-resolve", "a", "b"])).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.transport.timeout, Duration::from_secs(5));
        assert_eq!(cfg.mode, FloodMode::Replace);
        assert!(!cfg.resolve);
    }

    #[test]
    fn test_rejects_zero_workers_and_bad_interface() {
        assert!(matches!(
            Config::load(cli(&["--workers", "0", "a", "b"])),
            Err(ConfigError::InvalidSetting { key: "workers", .. })
        ));
        assert!(matches!(
            Config::load(cli(&["--interface", "Vxlan 1", "a", "b"])),
            Err(ConfigError::InvalidSetting { key: "interface", .. })
        ));
    }
}
