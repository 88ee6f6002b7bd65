//! Port counter families.
//!
//! Each family is kept separately so that a READ_CLEAR of one family leaves
//! the others counting.

use serde::{Deserialize, Serialize};

/// IEEE 802.3 MAC counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ieee8023Counters {
    pub frames_transmitted_ok: u64,
    pub frames_received_ok: u64,
    pub frame_check_sequence_errors: u64,
    pub octets_transmitted_ok: u64,
    pub octets_received_ok: u64,
    pub multicast_frames_xmitted_ok: u64,
    pub broadcast_frames_xmitted_ok: u64,
    pub multicast_frames_received_ok: u64,
    pub broadcast_frames_received_ok: u64,
    pub frame_too_long_errors: u64,
    pub pause_mac_ctrl_frames_transmitted: u64,
    pub pause_mac_ctrl_frames_received: u64,
}

/// RFC 2863 interface counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rfc2863Counters {
    pub if_in_octets: u64,
    pub if_in_ucast_pkts: u64,
    pub if_in_multicast_pkts: u64,
    pub if_in_broadcast_pkts: u64,
    pub if_in_discards: u64,
    pub if_in_errors: u64,
    pub if_out_octets: u64,
    pub if_out_ucast_pkts: u64,
    pub if_out_multicast_pkts: u64,
    pub if_out_broadcast_pkts: u64,
    pub if_out_discards: u64,
    pub if_out_errors: u64,
}

/// RFC 2819 RMON Ethernet statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rfc2819Counters {
    pub ether_stats_drop_events: u64,
    pub ether_stats_octets: u64,
    pub ether_stats_pkts: u64,
    pub ether_stats_broadcast_pkts: u64,
    pub ether_stats_multicast_pkts: u64,
    pub ether_stats_crc_align_errors: u64,
    pub ether_stats_undersize_pkts: u64,
    pub ether_stats_oversize_pkts: u64,
    pub ether_stats_pkts_64_octets: u64,
    pub ether_stats_pkts_65_to_127_octets: u64,
    pub ether_stats_pkts_128_to_255_octets: u64,
    pub ether_stats_pkts_256_to_511_octets: u64,
    pub ether_stats_pkts_512_to_1023_octets: u64,
    pub ether_stats_pkts_1024_to_1518_octets: u64,
}

/// RFC 3635 Ethernet-like interface statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rfc3635Counters {
    pub dot3_stats_alignment_errors: u64,
    pub dot3_stats_fcs_errors: u64,
    pub dot3_stats_frame_too_longs: u64,
    pub dot3_stats_internal_mac_transmit_errors: u64,
    pub dot3_stats_internal_mac_receive_errors: u64,
    pub dot3_control_in_unknown_opcodes: u64,
    pub dot3_in_pause_frames: u64,
    pub dot3_out_pause_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDirection {
    Rx,
    Tx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameCast {
    Unicast,
    Multicast,
    Broadcast,
}

/// One frame seen on a port, fed to [`Switch::port_counters_account`].
///
/// [`Switch::port_counters_account`]: crate::Switch::port_counters_account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    pub direction: FrameDirection,
    pub cast: FrameCast,
    /// Frame length including L2 header and FCS.
    pub length: u32,
    pub fcs_error: bool,
    pub pause: bool,
    /// Dropped by the port before forwarding (rx) or transmission (tx).
    pub discarded: bool,
}

/// Minimum and maximum untagged Ethernet frame lengths.
const MIN_FRAME_LEN: u32 = 64;
const MAX_STD_FRAME_LEN: u32 = 1518;
/// L2 header and FCS added on top of the MTU payload.
const L2_OVERHEAD: u32 = 18;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub(crate) ieee_802_3: Ieee8023Counters,
    pub(crate) rfc_2863: Rfc2863Counters,
    pub(crate) rfc_2819: Rfc2819Counters,
    pub(crate) rfc_3635: Rfc3635Counters,
}

impl PortCounters {
    /// Accounts one frame on a port with payload MTU `mtu`.
    pub(crate) fn account(&mut self, frame: &FrameSample, mtu: u32) {
        let len = u64::from(frame.length);
        let too_long = frame.length > mtu + L2_OVERHEAD;

        if frame.pause {
            match frame.direction {
                FrameDirection::Rx => {
                    self.ieee_802_3.pause_mac_ctrl_frames_received += 1;
                    self.rfc_3635.dot3_in_pause_frames += 1;
                }
                FrameDirection::Tx => {
                    self.ieee_802_3.pause_mac_ctrl_frames_transmitted += 1;
                    self.rfc_3635.dot3_out_pause_frames += 1;
                }
            }
            return;
        }

        match frame.direction {
            FrameDirection::Rx => self.account_rx(frame, len, too_long),
            FrameDirection::Tx => self.account_tx(frame, len),
        }
    }

    fn account_rx(&mut self, frame: &FrameSample, len: u64, too_long: bool) {
        // RMON statistics see every received frame, good or bad.
        let rmon = &mut self.rfc_2819;
        rmon.ether_stats_pkts += 1;
        rmon.ether_stats_octets += len;
        match frame.cast {
            FrameCast::Broadcast => rmon.ether_stats_broadcast_pkts += 1,
            FrameCast::Multicast => rmon.ether_stats_multicast_pkts += 1,
            FrameCast::Unicast => {}
        }
        if frame.fcs_error {
            rmon.ether_stats_crc_align_errors += 1;
        }
        if frame.length < MIN_FRAME_LEN {
            rmon.ether_stats_undersize_pkts += 1;
        } else if frame.length > MAX_STD_FRAME_LEN {
            rmon.ether_stats_oversize_pkts += 1;
        }
        match frame.length {
            0..=64 => rmon.ether_stats_pkts_64_octets += 1,
            65..=127 => rmon.ether_stats_pkts_65_to_127_octets += 1,
            128..=255 => rmon.ether_stats_pkts_128_to_255_octets += 1,
            256..=511 => rmon.ether_stats_pkts_256_to_511_octets += 1,
            512..=1023 => rmon.ether_stats_pkts_512_to_1023_octets += 1,
            1024..=1518 => rmon.ether_stats_pkts_1024_to_1518_octets += 1,
            _ => {}
        }

        self.rfc_2863.if_in_octets += len;
        if frame.fcs_error || too_long {
            self.rfc_2863.if_in_errors += 1;
            if frame.fcs_error {
                self.ieee_802_3.frame_check_sequence_errors += 1;
                self.rfc_3635.dot3_stats_fcs_errors += 1;
            }
            if too_long {
                self.ieee_802_3.frame_too_long_errors += 1;
                self.rfc_3635.dot3_stats_frame_too_longs += 1;
            }
            return;
        }

        self.ieee_802_3.frames_received_ok += 1;
        self.ieee_802_3.octets_received_ok += len;
        match frame.cast {
            FrameCast::Unicast => self.rfc_2863.if_in_ucast_pkts += 1,
            FrameCast::Multicast => {
                self.rfc_2863.if_in_multicast_pkts += 1;
                self.ieee_802_3.multicast_frames_received_ok += 1;
            }
            FrameCast::Broadcast => {
                self.rfc_2863.if_in_broadcast_pkts += 1;
                self.ieee_802_3.broadcast_frames_received_ok += 1;
            }
        }
        if frame.discarded {
            self.rfc_2863.if_in_discards += 1;
            self.rfc_2819.ether_stats_drop_events += 1;
        }
    }

    fn account_tx(&mut self, frame: &FrameSample, len: u64) {
        if frame.discarded {
            self.rfc_2863.if_out_discards += 1;
            return;
        }
        if frame.fcs_error {
            self.rfc_2863.if_out_errors += 1;
            self.rfc_3635.dot3_stats_internal_mac_transmit_errors += 1;
            return;
        }

        self.ieee_802_3.frames_transmitted_ok += 1;
        self.ieee_802_3.octets_transmitted_ok += len;
        self.rfc_2863.if_out_octets += len;
        match frame.cast {
            FrameCast::Unicast => self.rfc_2863.if_out_ucast_pkts += 1,
            FrameCast::Multicast => {
                self.rfc_2863.if_out_multicast_pkts += 1;
                self.ieee_802_3.multicast_frames_xmitted_ok += 1;
            }
            FrameCast::Broadcast => {
                self.rfc_2863.if_out_broadcast_pkts += 1;
                self.ieee_802_3.broadcast_frames_xmitted_ok += 1;
            }
        }
    }
}
