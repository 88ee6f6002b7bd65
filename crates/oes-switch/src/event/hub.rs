//! Event channels and registrations.

use super::types::{Event, EventInfo, EventKind};
use log::{debug, warn};
use oes_common::{OesError, OesResult};
use oes_types::BridgeId;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Receiving end of an event channel.
///
/// The channel is identified by its `fd`, which is what registrations refer
/// to. Dropping the channel stops delivery; the switch forgets the channel
/// on the next publish.
#[derive(Debug)]
pub struct EventChannel {
    fd: i32,
    rx: UnboundedReceiver<EventInfo>,
}

impl EventChannel {
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the channel was destroyed and drained.
    pub async fn recv(&mut self) -> Option<EventInfo> {
        self.rx.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> OesResult<Option<EventInfo>> {
        match self.rx.try_recv() {
            Ok(info) => Ok(Some(info)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(OesError::NotInitialized {
                what: format!("event channel {}", self.fd),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventHub {
    next_fd: i32,
    channels: BTreeMap<i32, UnboundedSender<EventInfo>>,
    registrations: BTreeMap<(BridgeId, EventKind), BTreeSet<i32>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) -> EventChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let fd = self.next_fd;
        self.next_fd += 1;
        self.channels.insert(fd, tx);
        debug!("EventHub: opened channel {}", fd);
        EventChannel { fd, rx }
    }

    pub fn close(&mut self, fd: i32) -> OesResult<()> {
        if self.channels.remove(&fd).is_none() {
            return Err(OesError::not_found(format!("event channel {}", fd)));
        }
        for fds in self.registrations.values_mut() {
            fds.remove(&fd);
        }
        self.registrations.retain(|_, fds| !fds.is_empty());
        debug!("EventHub: closed channel {}", fd);
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn register(&mut self, bridge: BridgeId, kind: EventKind, fd: i32) -> OesResult<()> {
        if !self.channels.contains_key(&fd) {
            return Err(OesError::not_found(format!("event channel {}", fd)));
        }
        if !self.registrations.entry((bridge, kind)).or_default().insert(fd) {
            return Err(OesError::already_exists(format!(
                "{} registration of channel {} on {}",
                kind, fd, bridge
            )));
        }
        Ok(())
    }

    pub fn unregister(&mut self, bridge: BridgeId, kind: EventKind, fd: i32) -> OesResult<()> {
        let removed = self
            .registrations
            .get_mut(&(bridge, kind))
            .is_some_and(|fds| fds.remove(&fd));
        if !removed {
            return Err(OesError::not_found(format!(
                "{} registration of channel {} on {}",
                kind, fd, bridge
            )));
        }
        self.registrations.retain(|_, fds| !fds.is_empty());
        Ok(())
    }

    /// Drops every registration on `bridge`.
    pub fn forget_bridge(&mut self, bridge: BridgeId) {
        self.registrations.retain(|(br, _), _| *br != bridge);
    }

    /// Delivers `event` to every channel registered for it on `bridge`.
    ///
    /// Returns the number of channels the event was delivered to.
    pub fn publish(&mut self, bridge: BridgeId, event: Event) -> usize {
        let Some(fds) = self.registrations.get(&(bridge, event.kind())) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for fd in fds {
            let Some(tx) = self.channels.get(fd) else {
                continue;
            };
            if tx.send(EventInfo::new(bridge, event.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(*fd);
            }
        }

        for fd in dead {
            warn!("EventHub: channel {} receiver dropped, closing", fd);
            // Just checked that the channel exists.
            let _ = self.close(fd);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oes_common::OesStatus;
    use oes_types::{LogPort, OperState};
    use pretty_assertions::assert_eq;

    fn oper_event(port: u32) -> Event {
        Event::PortOperState {
            port: LogPort(port),
            state: OperState::Up,
        }
    }

    #[test]
    fn test_publish_only_to_registered() {
        let mut hub = EventHub::new();
        let mut a = hub.open();
        let mut b = hub.open();
        hub.register(BridgeId(0), EventKind::PortOperState, a.fd()).unwrap();
        hub.register(BridgeId(1), EventKind::PortOperState, b.fd()).unwrap();

        assert_eq!(hub.publish(BridgeId(0), oper_event(1)), 1);

        let info = a.try_recv().unwrap().unwrap();
        assert_eq!(info.bridge, BridgeId(0));
        assert_eq!(info.event, oper_event(1));
        assert!(b.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut hub = EventHub::new();
        let ch = hub.open();
        hub.register(BridgeId(0), EventKind::FdbAged, ch.fd()).unwrap();
        let err = hub.register(BridgeId(0), EventKind::FdbAged, ch.fd()).unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryAlreadyExists);
    }

    #[test]
    fn test_register_unknown_channel() {
        let mut hub = EventHub::new();
        let err = hub.register(BridgeId(0), EventKind::FdbAged, 42).unwrap_err();
        assert_eq!(err.status(), OesStatus::EntryNotFound);
    }

    #[test]
    fn test_unregister() {
        let mut hub = EventHub::new();
        let mut ch = hub.open();
        hub.register(BridgeId(0), EventKind::PortOperState, ch.fd()).unwrap();
        hub.unregister(BridgeId(0), EventKind::PortOperState, ch.fd()).unwrap();
        assert_eq!(hub.publish(BridgeId(0), oper_event(1)), 0);
        assert!(ch.try_recv().unwrap().is_none());
        assert!(hub.unregister(BridgeId(0), EventKind::PortOperState, ch.fd()).is_err());
    }

    #[test]
    fn test_close_disconnects_receiver() {
        let mut hub = EventHub::new();
        let mut ch = hub.open();
        hub.close(ch.fd()).unwrap();
        assert_eq!(ch.try_recv().unwrap_err().status(), OesStatus::NotInitialized);
        assert!(hub.close(ch.fd()).is_err());
    }

    #[test]
    fn test_dropped_receiver_is_closed_on_publish() {
        let mut hub = EventHub::new();
        let ch = hub.open();
        hub.register(BridgeId(0), EventKind::PortOperState, ch.fd()).unwrap();
        drop(ch);

        assert_eq!(hub.publish(BridgeId(0), oper_event(1)), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_async_recv() {
        let mut hub = EventHub::new();
        let mut ch = hub.open();
        hub.register(BridgeId(2), EventKind::PortOperState, ch.fd()).unwrap();
        hub.publish(BridgeId(2), oper_event(7));
        hub.close(ch.fd()).unwrap();

        let info = ch.recv().await.unwrap();
        assert_eq!(info.event, oper_event(7));
        assert!(ch.recv().await.is_none());
    }
}
