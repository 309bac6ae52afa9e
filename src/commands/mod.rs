/// Default VXLAN interface on Arista EOS
pub const DEFAULT_INTERFACE: &str = "Vxlan1";

/// How peers are written to the flood list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloodMode {
    /// `vxlan flood vtep add <peer>`, leaves existing entries alone
    #[default]
    Add,
    /// Clear the list with `no vxlan flood vtep`, then set each peer
    Replace,
}

/// Build the configuration sequence for one switch.
/// Privilege escalation (`enable`) is left to the transport.
pub fn build_flood_commands(interface: &str, peers: &[String], mode: FloodMode) -> Vec<String> {
    let mut commands = Vec::with_capacity(peers.len() + 4);
    commands.push("configure".to_string());
    commands.push(format!("interface {}", interface));

    match mode {
        FloodMode::Add => {
            for peer in peers {
                commands.push(format!("vxlan flood vtep add {}", peer));
            }
        }
        FloodMode::Replace => {
            commands.push("no vxlan flood vtep".to_string());
            for peer in peers {
                commands.push(format!("vxlan flood vtep {}", peer));
            }
        }
    }

    commands.push("end".to_string());
    commands
}
