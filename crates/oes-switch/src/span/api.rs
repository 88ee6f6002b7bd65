//! SPAN operations.

use super::types::{MirrorDirection, SpanSession, SpanSessionParams};
use crate::switch::Switch;
use log::info;
use oes_common::{AccessCmd, OesError, OesResult};
use oes_types::{BridgeId, LogPort};

impl Switch {
    /// Creates, edits or destroys a mirroring session.
    ///
    /// CREATE allocates the lowest free session id and returns it. EDIT and
    /// DESTROY need `session`; DESTROY is refused while ports mirror into
    /// the session.
    pub fn span_session_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        params: Option<&SpanSessionParams>,
        session: Option<u8>,
    ) -> OesResult<u8> {
        cmd.ensure_one_of(
            &[AccessCmd::Create, AccessCmd::Edit, AccessCmd::Destroy],
            "span_session_set",
        )?;
        let max_sessions = self.config.max_span_sessions;
        let span = &mut self.bridge_mut(br)?.span;

        match cmd {
            AccessCmd::Create => {
                let params = OesError::require(params, "params")?;
                params.validate()?;
                let id = (0..max_sessions)
                    .map(|i| i as u8)
                    .find(|id| !span.sessions.contains_key(id))
                    .ok_or_else(|| OesError::no_resources("span session"))?;
                span.sessions.insert_new(
                    id,
                    SpanSession {
                        params: *params,
                        analyzer: None,
                    },
                )?;
                info!("SpanMgr: created session {} on {}", id, br);
                Ok(id)
            }
            AccessCmd::Edit => {
                let id = OesError::require(session, "session")?;
                let params = OesError::require(params, "params")?;
                params.validate()?;
                span.sessions.lookup_mut(&id)?.params = *params;
                Ok(id)
            }
            _ => {
                let id = OesError::require(session, "session")?;
                span.sessions.lookup(&id)?;
                let bound = span.mirrors_into(id).count();
                if bound > 0 {
                    return Err(OesError::in_use(format!(
                        "{} ports mirror into session {}",
                        bound, id
                    )));
                }
                span.sessions.remove(&id)?;
                info!("SpanMgr: destroyed session {} on {}", id, br);
                Ok(id)
            }
        }
    }

    pub fn span_session_get(&self, br: BridgeId, session: u8) -> OesResult<SpanSession> {
        self.bridge(br)?.span().session(session).cloned()
    }

    /// Binds a port and direction to a session, or removes the binding.
    pub fn span_mirror_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        direction: MirrorDirection,
        session: u8,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "span_mirror_set")?;
        self.ensure_configurable(br, port)?;
        let span = &mut self.bridge_mut(br)?.span;
        let target = span.sessions.lookup(&session)?;

        match cmd {
            AccessCmd::Add => {
                if target.analyzer == Some(port) {
                    return Err(OesError::param(format!(
                        "port {} is the analyzer of session {}",
                        port, session
                    )));
                }
                match span.mirrors.get(&(port, direction)) {
                    Some(bound) if *bound == session => Err(OesError::already_exists(format!(
                        "port {} {:?} mirror",
                        port, direction
                    ))),
                    Some(bound) => Err(OesError::in_use(format!(
                        "port {} {:?} mirrors into session {}",
                        port, direction, bound
                    ))),
                    None => {
                        span.mirrors.insert((port, direction), session);
                        info!(
                            "SpanMgr: port {} {:?} mirrors into session {}",
                            port, direction, session
                        );
                        Ok(())
                    }
                }
            }
            _ => {
                if span.mirrors.get(&(port, direction)) != Some(&session) {
                    return Err(OesError::not_found(format!(
                        "port {} {:?} mirror into session {}",
                        port, direction, session
                    )));
                }
                span.mirrors.remove(&(port, direction));
                Ok(())
            }
        }
    }

    pub fn span_mirror_get(
        &self,
        br: BridgeId,
        port: LogPort,
        direction: MirrorDirection,
    ) -> OesResult<u8> {
        self.member(br, port)?;
        self.bridge(br)?
            .span()
            .mirrors
            .get(&(port, direction))
            .copied()
            .ok_or_else(|| OesError::not_found(format!("port {} {:?} mirror", port, direction)))
    }

    /// Sets or clears the analyzer port of a session.
    pub fn span_analyzer_set(
        &mut self,
        cmd: AccessCmd,
        br: BridgeId,
        port: LogPort,
        session: u8,
    ) -> OesResult<()> {
        cmd.ensure_one_of(&[AccessCmd::Add, AccessCmd::Delete], "span_analyzer_set")?;
        self.ensure_configurable(br, port)?;
        let span = &mut self.bridge_mut(br)?.span;
        let current = span.sessions.lookup(&session)?.analyzer;

        match cmd {
            AccessCmd::Add => {
                match current {
                    Some(analyzer) if analyzer == port => {
                        return Err(OesError::already_exists(format!(
                            "analyzer of session {}",
                            session
                        )))
                    }
                    Some(analyzer) => {
                        return Err(OesError::in_use(format!(
                            "session {} already uses analyzer {}",
                            session, analyzer
                        )))
                    }
                    None => {}
                }
                if span.is_analyzer(port) {
                    return Err(OesError::in_use(format!(
                        "port {} is the analyzer of another session",
                        port
                    )));
                }
                if span.mirrors_into(session).any(|(p, _)| *p == port) {
                    return Err(OesError::param(format!(
                        "port {} is mirrored by session {}",
                        port, session
                    )));
                }
                span.sessions.lookup_mut(&session)?.analyzer = Some(port);
                info!("SpanMgr: port {} analyzes session {}", port, session);
            }
            _ => {
                if current != Some(port) {
                    return Err(OesError::not_found(format!(
                        "port {} as analyzer of session {}",
                        port, session
                    )));
                }
                span.sessions.lookup_mut(&session)?.analyzer = None;
            }
        }
        Ok(())
    }

    pub fn span_analyzer_get(&self, br: BridgeId, session: u8) -> OesResult<LogPort> {
        self.bridge(br)?
            .span()
            .session(session)?
            .analyzer
            .ok_or_else(|| OesError::not_found(format!("analyzer of session {}", session)))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SwitchConfig;
    use crate::span::{MirrorDirection, SpanSessionParams};
    use crate::switch::Switch;
    use oes_common::{AccessCmd, OesStatus};
    use oes_types::{BridgeId, LogPort, VlanId};
    use pretty_assertions::assert_eq;

    const LOCAL: SpanSessionParams = SpanSessionParams::Local { tclass: 1 };

    fn setup() -> (Switch, BridgeId) {
        let mut sw = Switch::new(SwitchConfig {
            max_span_sessions: 2,
            ..SwitchConfig::with_ports(4)
        })
        .unwrap();
        let br = sw.bridge_set(AccessCmd::Create, None).unwrap();
        sw.bridge_port_set(AccessCmd::Add, br, &[LogPort(1), LogPort(2), LogPort(3)])
            .unwrap();
        (sw, br)
    }

    #[test]
    fn test_session_lifecycle() {
        let (mut sw, br) = setup();
        let s0 = sw
            .span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
            .unwrap();
        let s1 = sw
            .span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
            .unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(
            sw.span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
                .unwrap_err()
                .status(),
            OesStatus::NoResources
        );

        let remote = SpanSessionParams::RemoteL2 {
            tclass: 0,
            vid: VlanId::new(99).unwrap(),
            prio: 5,
            mac: "00:00:5e:00:53:01".parse().unwrap(),
        };
        sw.span_session_set(AccessCmd::Edit, br, Some(&remote), Some(s1))
            .unwrap();
        assert_eq!(sw.span_session_get(br, s1).unwrap().params, remote);
        assert_eq!(
            sw.span_session_set(AccessCmd::Edit, br, None, Some(s1))
                .unwrap_err()
                .status(),
            OesStatus::ParamNull
        );

        sw.span_mirror_set(AccessCmd::Add, br, LogPort(1), MirrorDirection::Ingress, s0)
            .unwrap();
        assert_eq!(
            sw.span_session_set(AccessCmd::Destroy, br, None, Some(s0))
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
        sw.span_mirror_set(AccessCmd::Delete, br, LogPort(1), MirrorDirection::Ingress, s0)
            .unwrap();
        sw.span_session_set(AccessCmd::Destroy, br, None, Some(s0))
            .unwrap();
        assert_eq!(
            sw.span_session_get(br, s0).unwrap_err().status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_one_session_per_port_direction() {
        let (mut sw, br) = setup();
        let s0 = sw
            .span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
            .unwrap();
        let s1 = sw
            .span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
            .unwrap();

        sw.span_mirror_set(AccessCmd::Add, br, LogPort(1), MirrorDirection::Ingress, s0)
            .unwrap();
        sw.span_mirror_set(AccessCmd::Add, br, LogPort(1), MirrorDirection::Egress, s1)
            .unwrap();
        assert_eq!(
            sw.span_mirror_set(AccessCmd::Add, br, LogPort(1), MirrorDirection::Ingress, s1)
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
        assert_eq!(
            sw.span_mirror_get(br, LogPort(1), MirrorDirection::Egress)
                .unwrap(),
            s1
        );
        assert_eq!(
            sw.span_mirror_get(br, LogPort(2), MirrorDirection::Egress)
                .unwrap_err()
                .status(),
            OesStatus::EntryNotFound
        );
    }

    #[test]
    fn test_analyzer_rules() {
        let (mut sw, br) = setup();
        let s0 = sw
            .span_session_set(AccessCmd::Create, br, Some(&LOCAL), None)
            .unwrap();
        sw.span_mirror_set(AccessCmd::Add, br, LogPort(1), MirrorDirection::Ingress, s0)
            .unwrap();

        assert_eq!(
            sw.span_analyzer_set(AccessCmd::Add, br, LogPort(1), s0)
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );
        sw.span_analyzer_set(AccessCmd::Add, br, LogPort(3), s0).unwrap();
        assert_eq!(sw.span_analyzer_get(br, s0).unwrap(), LogPort(3));
        assert_eq!(
            sw.span_analyzer_set(AccessCmd::Add, br, LogPort(2), s0)
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );
        assert_eq!(
            sw.span_mirror_set(AccessCmd::Add, br, LogPort(3), MirrorDirection::Egress, s0)
                .unwrap_err()
                .status(),
            OesStatus::ParamError
        );

        // The analyzer cannot leave the bridge.
        assert_eq!(
            sw.bridge_port_set(AccessCmd::Delete, br, &[LogPort(3)])
                .unwrap_err()
                .status(),
            OesStatus::ResourceInUse
        );

        sw.span_analyzer_set(AccessCmd::Delete, br, LogPort(3), s0)
            .unwrap();
        assert_eq!(
            sw.span_analyzer_get(br, s0).unwrap_err().status(),
            OesStatus::EntryNotFound
        );
    }
}
