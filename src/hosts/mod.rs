use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use crate::error::ConfigError;

/// Group name given to hosts passed as positional arguments
pub const CLI_GROUP: &str = "command-line";
/// Group name given to a hosts file without section headers
pub const FILE_GROUP: &str = "hosts-file";

/// Group of switches that are configured as each other's VTEP peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub hosts: Vec<String>,
}

impl Group {
    /// Build a group, dropping repeated hosts while keeping first-seen order
    pub fn new(name: impl Into<String>, hosts: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let hosts = hosts
            .into_iter()
            .filter(|h| seen.insert(h.clone()))
            .collect();
        Self {
            name: name.into(),
            hosts,
        }
    }
}

/// Load all groups for a run: the hosts file (if any) first, then the
/// command-line hosts as one trailing group.
pub fn load_groups(hosts_file: Option<&Path>, cli_hosts: &[String]) -> Result<Vec<Group>, ConfigError> {
    let mut groups = match hosts_file {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::UnreadableHostsFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            parse_hosts(&content, path)?
        }
        None => Vec::new(),
    };

    let cli: Vec<String> = cli_hosts
        .iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    if !cli.is_empty() {
        groups.push(Group::new(CLI_GROUP, cli));
    }

    let total = count_distinct_hosts(&groups);
    if total < 2 {
        return Err(ConfigError::NotEnoughHosts(total));
    }

    for group in &groups {
        tracing::debug!("Group '{}': {}", group.name, group.hosts.join(" "));
    }

    Ok(groups)
}

/// Parse hosts file contents. Files with `[name]` headers are read as
/// grouped; anything else is one host per line, with no comment syntax.
/// A bracketed IP literal such as `[2001:db8::1]` is a host, never a header.
pub fn parse_hosts(content: &str, path: &Path) -> Result<Vec<Group>, ConfigError> {
    let sectioned = content.lines().any(|l| is_header(l.trim()));
    if sectioned {
        parse_grouped(content, path)
    } else {
        let hosts: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(host_token)
            .collect();
        if hosts.is_empty() {
            return Err(ConfigError::EmptyGroup(FILE_GROUP.to_string()));
        }
        Ok(vec![Group::new(FILE_GROUP, hosts)])
    }
}

fn parse_grouped(content: &str, path: &Path) -> Result<Vec<Group>, ConfigError> {
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    for (line_no, line) in meaningful_lines(content) {
        if is_header(line) {
            let name = line
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ConfigError::BadGroupHeader {
                    path: path.to_path_buf(),
                    line: line_no,
                    header: line.to_string(),
                })?;
            sections.push((name.to_string(), Vec::new()));
            continue;
        }

        match sections.last_mut() {
            Some((_, hosts)) => hosts.extend(line.split_whitespace().map(host_token)),
            None => {
                return Err(ConfigError::HostOutsideGroup {
                    path: path.to_path_buf(),
                    line: line_no,
                })
            }
        }
    }

    sections
        .into_iter()
        .map(|(name, hosts)| {
            if hosts.is_empty() {
                Err(ConfigError::EmptyGroup(name))
            } else {
                Ok(Group::new(name, hosts))
            }
        })
        .collect()
}

/// Lines opening with `[` start a section unless they hold a bracketed IP
fn is_header(line: &str) -> bool {
    line.starts_with('[') && bracketed_ip(line).is_none()
}

fn bracketed_ip(token: &str) -> Option<&str> {
    let inner = token.strip_prefix('[')?.strip_suffix(']')?;
    inner.parse::<IpAddr>().ok().map(|_| inner)
}

/// `[2001:db8::1]` is written as `2001:db8::1`; other tokens pass through
fn host_token(token: &str) -> String {
    bracketed_ip(token).unwrap_or(token).to_string()
}

/// Grouped files only: non-blank lines that are not `#` or `;` comments,
/// with their 1-based line numbers, trimmed
fn meaningful_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
}

fn count_distinct_hosts(groups: &[Group]) -> usize {
    groups
        .iter()
        .flat_map(|g| g.hosts.iter())
        .collect::<HashSet<_>>()
        .len()
}
