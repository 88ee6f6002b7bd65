//! Event channel and registration operations.

use super::hub::EventChannel;
use super::types::EventKind;
use crate::switch::Switch;
use log::info;
use oes_common::{AccessCmd, OesResult};
use oes_types::BridgeId;

impl Switch {
    /// Opens a new event channel. Nothing is delivered to it until it is
    /// registered for an event kind.
    pub fn event_channel_create(&mut self) -> EventChannel {
        let channel = self.events.open();
        info!("EventMgr: created channel {}", channel.fd());
        channel
    }

    /// Closes a channel and drops its registrations.
    pub fn event_channel_destroy(&mut self, fd: i32) -> OesResult<()> {
        self.events.close(fd)?;
        info!("EventMgr: destroyed channel {}", fd);
        Ok(())
    }

    pub fn event_register_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        kind: EventKind,
        fd: i32,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "event_register_set")?;
        self.bridge(br)?;

        match cmd {
            AccessCmd::Add => self.events.register(br, kind, fd),
            _ => self.events.unregister(br, kind, fd),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SwitchConfig;
    use crate::event::{Event, EventKind};
    use crate::switch::Switch;
    use oes_common::{AccessCmd, OesStatus};
    use oes_types::{BridgeId, LogPort, OperState};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_requires_bridge_and_channel() {
        let mut sw = Switch::new(SwitchConfig::with_ports(2)).unwrap();
        let channel = sw.event_channel_create();

        let err = sw
            .event_register_set(AccessCmd::Add, BridgeId(0), EventKind::FdbAged, channel.fd())
            .unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryNotFound);

        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        let err = sw
            .event_register_set(AccessCmd::Add, br, EventKind::FdbAged, 42)
            .unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryNotFound);

        sw.event_register_set(AccessCmd::Add, br, EventKind::FdbAged, channel.fd())
            .unwrap();
        assert_eq!(
            sw.event_register_set(AccessCmd::Add, br, EventKind::FdbAged, channel.fd())
                .unwrap_err()
                .status(),
            OesStatus::EntryAlreadyExists
        );
        assert_eq!(
            sw.event_register_set(AccessCmd::Edit, br, EventKind::FdbAged, channel.fd())
                .unwrap_err()
                .status(),
            OesStatus::CmdUnsupported
        );
    }

    #[tokio::test]
    async fn test_port_events_reach_registered_channel() {
        let mut sw = Switch::new(SwitchConfig::with_ports(2)).unwrap();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1)]).unwrap();

        let mut channel = sw.event_channel_create();
        let mut idle = sw.event_channel_create();
        sw.event_register_set(AccessCmd::Add, br, EventKind::PortOperState, channel.fd())
            .unwrap();

        sw.port_state_set(br, LogPort(1), oes_types::AdminState::Up)
            .unwrap();
        sw.port_link_update(LogPort(1), true).unwrap();

        let info = channel.recv().await.unwrap();
        assert_eq!(info.bridge, br);
        assert_eq!(
            info.event,
            Event::PortOperState {
                port: LogPort(1),
                state: OperState::Up,
            }
        );
        assert_eq!(idle.try_recv().unwrap(), None);

        sw.event_channel_destroy(channel.fd()).unwrap();
        assert_eq!(channel.recv().await, None);
    }
}
