use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::ConfigError;
use crate::planner::HostPlan;

/// Resolve a host token to the address used in flood lists.
/// Literal IPs pass through; names prefer the first IPv4 answer.
pub async fn resolve_host(host: &str) -> Result<IpAddr, ConfigError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| ConfigError::Unresolvable {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .map(|sa| sa.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ConfigError::Unresolvable {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        })
}

/// Resolve every host in the plan once
pub async fn resolve_all(plans: &[HostPlan]) -> Result<HashMap<String, IpAddr>, ConfigError> {
    let mut resolved = HashMap::new();
    for name in plans.iter().flat_map(|p| std::iter::once(&p.host).chain(p.peers.iter())) {
        if resolved.contains_key(name) {
            continue;
        }
        let ip = resolve_host(name).await?;
        tracing::debug!("Resolved {} to {}", name, ip);
        resolved.insert(name.clone(), ip);
    }
    Ok(resolved)
}

/// Rewrite peer names to addresses, dropping any peer that resolves to the
/// target's own address.
pub fn apply_addresses(plans: Vec<HostPlan>, addresses: &HashMap<String, IpAddr>) -> Vec<HostPlan> {
    plans
        .into_iter()
        .map(|plan| {
            let own = addresses.get(&plan.host).copied();
            let mut peers: Vec<String> = Vec::with_capacity(plan.peers.len());
            for peer in &plan.peers {
                let addr = match addresses.get(peer) {
                    Some(ip) => *ip,
                    None => {
                        peers.push(peer.clone());
                        continue;
                    }
                };
                if Some(addr) == own {
                    tracing::warn!("{}: peer {} resolves to its own address {}, skipping", plan.host, peer, addr);
                    continue;
                }
                let text = addr.to_string();
                if !peers.contains(&text) {
                    peers.push(text);
                }
            }
            HostPlan { host: plan.host, peers }
        })
        .collect()
}
