use std::collections::HashMap;

use crate::hosts::Group;

/// Flood-list work for one switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlan {
    pub host: String,
    /// Remote VTEPs to add, in group order
    pub peers: Vec<String>,
}

/// Map each host of a group to every other host of that group.
/// A group of N hosts yields N entries of N-1 peers each.
pub fn group_peers(group: &Group) -> Vec<HostPlan> {
    group
        .hosts
        .iter()
        .map(|host| HostPlan {
            host: host.clone(),
            peers: group.hosts.iter().filter(|other| *other != host).cloned().collect(),
        })
        .collect()
}

/// Plan the whole run. A host listed in several groups is configured once,
/// at its first appearance, with the union of its peers across groups.
pub fn plan(groups: &[Group]) -> Vec<HostPlan> {
    let mut plans: Vec<HostPlan> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for group in groups {
        if group.hosts.len() < 2 {
            tracing::warn!("Group '{}' has a single host, nothing to add", group.name);
        }
        for entry in group_peers(group) {
            match index.get(&entry.host) {
                Some(&i) => {
                    let existing = &mut plans[i];
                    tracing::info!(
                        "{} appears in more than one group, merging peers from '{}'",
                        entry.host,
                        group.name
                    );
                    for peer in entry.peers {
                        if !existing.peers.contains(&peer) {
                            existing.peers.push(peer);
                        }
                    }
                }
                None => {
                    index.insert(entry.host.clone(), plans.len());
                    plans.push(entry);
                }
            }
        }
    }

    plans
}
