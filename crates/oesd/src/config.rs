//! Daemon configuration file.
//!
//! The file is YAML with the switch limits under `switch` and the initial
//! forwarding state under `bridges`:
//!
//! ```yaml
//! port_count: 8
//! switch:
//!   fdb_table_size: 4096
//! bridges:
//!   - ports: [1, 2, 3, 4]
//!     up: [1, 2, 3, 4]
//!     vlans:
//!       - vid: 10
//!         untagged: [1, 2]
//!         tagged: [3, 4]
//!         pvid_ports: [1, 2]
//! ```

use anyhow::{bail, Context, Result};
use log::info;
use oes_common::AccessCmd;
use oes_switch::config::SwitchConfig;
use oes_switch::event::{EventChannel, EventKind};
use oes_switch::vlan::VlanMember;
use oes_switch::Switch;
use oes_types::{AdminState, BridgeId, LogPort, VlanId};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub switch: SwitchConfig,
    /// Number of physical ports to generate when `switch.ports` is empty.
    pub port_count: Option<u32>,
    pub bridges: Vec<BridgeBootstrap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeBootstrap {
    pub ports: Vec<LogPort>,
    /// Ports brought admin up with link.
    pub up: Vec<LogPort>,
    pub fdb_age_time: Option<u32>,
    pub vlans: Vec<VlanBootstrap>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VlanBootstrap {
    pub vid: VlanId,
    #[serde(default)]
    pub untagged: Vec<LogPort>,
    #[serde(default)]
    pub tagged: Vec<LogPort>,
    /// Members that take this VLAN as their PVID.
    #[serde(default)]
    pub pvid_ports: Vec<LogPort>,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: DaemonConfig = serde_yaml::from_str(content)?;
        if config.port_count.is_some() && !config.switch.ports.is_empty() {
            bail!("port_count and switch.ports are mutually exclusive");
        }
        Ok(config)
    }

    /// Switch configuration with the port inventory filled in.
    pub fn switch_config(&self) -> SwitchConfig {
        match self.port_count {
            Some(count) => SwitchConfig {
                ports: SwitchConfig::with_ports(count).ports,
                ..self.switch.clone()
            },
            None => self.switch.clone(),
        }
    }

    /// Builds the switch and applies the bootstrap state.
    pub fn build(&self) -> Result<Switch> {
        let mut sw = Switch::new(self.switch_config()).context("invalid switch configuration")?;
        for bridge in &self.bridges {
            let br = bridge.apply(&mut sw)?;
            info!("oesd: bootstrapped bridge {} with {} ports", br, bridge.ports.len());
        }
        Ok(sw)
    }
}

impl BridgeBootstrap {
    fn apply(&self, sw: &mut Switch) -> Result<BridgeId> {
        let br = sw.bridge_set(AccessCmd::Create, None)?;
        if !self.ports.is_empty() {
            sw.bridge_port_set(AccessCmd::Add, br, &self.ports)
                .with_context(|| format!("adding ports to {}", br))?;
        }
        if let Some(age_time) = self.fdb_age_time {
            sw.fdb_age_time_set(br, age_time)?;
        }

        for vlan in &self.vlans {
            let members: Vec<VlanMember> = vlan
                .untagged
                .iter()
                .map(|p| VlanMember::untagged(*p))
                .chain(vlan.tagged.iter().map(|p| VlanMember::tagged(*p)))
                .collect();
            sw.vlan_ports_set(AccessCmd::Add, br, vlan.vid, &members)
                .with_context(|| format!("populating VLAN {} on {}", vlan.vid, br))?;
            for port in &vlan.pvid_ports {
                sw.vlan_port_pvid_set(AccessCmd::Add, br, *port, vlan.vid)
                    .with_context(|| format!("setting PVID of port {}", port))?;
            }
        }

        for port in &self.up {
            sw.port_state_set(br, *port, AdminState::Up)?;
            if !port.is_lag() {
                sw.port_link_update(*port, true)?;
            }
        }
        Ok(br)
    }
}

/// Opens one channel registered for every event kind on every bridge.
pub fn subscribe_all(sw: &mut Switch) -> Result<EventChannel> {
    let channel = sw.event_channel_create();
    for br in sw.bridge_get() {
        for kind in [
            EventKind::PortOperState,
            EventKind::FdbLearned,
            EventKind::FdbAged,
        ] {
            sw.event_register_set(AccessCmd::Add, br, kind, channel.fd())?;
        }
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oes_types::OperState;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::Instant;

    const SAMPLE: &str = r#"
port_count: 6
switch:
  fdb_table_size: 128
  default_fdb_age_time: 60
bridges:
  - ports: [1, 2, 3, 4]
    up: [1, 2]
    fdb_age_time: 120
    vlans:
      - vid: 10
        untagged: [1, 2]
        tagged: [3]
        pvid_ports: [1, 2]
      - vid: 20
        tagged: [3, 4]
"#;

    fn vid(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = DaemonConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.port_count, Some(6));
        assert_eq!(config.switch.fdb_table_size, 128);
        // Unset limits keep their defaults.
        assert_eq!(config.switch.max_bridges, SwitchConfig::default().max_bridges);
        assert_eq!(config.bridges.len(), 1);
        assert_eq!(config.bridges[0].vlans[1].untagged, Vec::<LogPort>::new());
        assert_eq!(config.switch_config().ports.len(), 6);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = DaemonConfig::from_yaml("{}").unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(DaemonConfig::from_yaml("bridgez: []").is_err());
    }

    #[test]
    fn test_port_count_conflicts_with_inventory() {
        let yaml = r#"
port_count: 2
switch:
  ports:
    - id: 1
      speed: speed40_gb_cr4
      mac: "00:02:c9:00:00:01"
"#;
        assert!(DaemonConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_build_applies_bootstrap() {
        let sw = DaemonConfig::from_yaml(SAMPLE).unwrap().build().unwrap();
        let br = sw.bridge_get()[0];

        assert_eq!(
            sw.bridge_port_get(br).unwrap(),
            vec![LogPort(1), LogPort(2), LogPort(3), LogPort(4)]
        );
        assert_eq!(sw.fdb_age_time_get(br).unwrap(), 120);
        assert_eq!(sw.vlan_ports_get(br, vid(10)).unwrap().len(), 3);
        assert_eq!(
            sw.vlan_ports_get(br, vid(20)).unwrap(),
            vec![VlanMember::tagged(LogPort(3)), VlanMember::tagged(LogPort(4))]
        );
        assert_eq!(sw.vlan_port_pvid_get(br, LogPort(1)).unwrap(), vid(10));
        assert_eq!(
            sw.port_state_get(br, LogPort(1)).unwrap(),
            (AdminState::Up, OperState::Up)
        );
        assert_eq!(
            sw.port_state_get(br, LogPort(4)).unwrap().0,
            AdminState::Down
        );
    }

    #[test]
    fn test_build_reports_bad_membership() {
        let yaml = r#"
port_count: 2
bridges:
  - ports: [1]
    vlans:
      - vid: 10
        untagged: [2]
"#;
        let err = DaemonConfig::from_yaml(yaml).unwrap().build().unwrap_err();
        assert!(format!("{:#}", err).contains("VLAN 10"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.bridges[0].ports.len(), 4);

        assert!(DaemonConfig::load(Path::new("/nonexistent/oesd.yaml")).is_err());
    }

    #[tokio::test]
    async fn test_subscribe_all_sees_learning() {
        let mut sw = DaemonConfig::from_yaml(SAMPLE).unwrap().build().unwrap();
        let mut channel = subscribe_all(&mut sw).unwrap();
        let br = sw.bridge_get()[0];
        let mac = oes_types::MacAddress::new([0x00, 0x1b, 0x21, 0, 0, 1]);

        sw.fdb_learn(br, LogPort(1), vid(10), mac, Instant::now())
            .unwrap();
        let info = channel.recv().await.unwrap();
        assert_eq!(info.bridge, br);
        assert_eq!(info.event.kind(), EventKind::FdbLearned);
    }
}
