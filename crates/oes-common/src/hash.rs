//! Flow hashing for LAG and ECMP member selection.

use ahash::RandomState;
use bitflags::bitflags;
use oes_types::{IpAddress, LogPort, MacAddress};
use serde::{Deserialize, Serialize};
use std::hash::{BuildHasher, Hash, Hasher};

bitflags! {
    /// Packet fields that participate in the flow hash.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HashFieldSet: u32 {
        const SMAC = 1 << 0;
        const DMAC = 1 << 1;
        const ETHERTYPE = 1 << 2;
        const VID = 1 << 3;
        const SIP = 1 << 4;
        const DIP = 1 << 5;
        const IP_PROTO = 1 << 6;
        const L4_SRC_PORT = 1 << 7;
        const L4_DST_PORT = 1 << 8;
        const INGRESS_PORT = 1 << 9;

        const L2 = Self::SMAC.bits() | Self::DMAC.bits() | Self::ETHERTYPE.bits() | Self::VID.bits();
        const L3 = Self::SIP.bits() | Self::DIP.bits() | Self::IP_PROTO.bits();
        const L4 = Self::L4_SRC_PORT.bits() | Self::L4_DST_PORT.bits();
    }
}

impl Default for HashFieldSet {
    fn default() -> Self {
        HashFieldSet::L2 | HashFieldSet::L3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Crc,
    Xor,
    /// Not flow-stable; every packet may pick a different member.
    Random,
}

/// Header fields of a packet as seen by the hash engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFields {
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
    pub ethertype: u16,
    pub vid: u16,
    pub src_ip: Option<IpAddress>,
    pub dst_ip: Option<IpAddress>,
    pub ip_proto: u8,
    pub l4_src_port: u16,
    pub l4_dst_port: u16,
    pub ingress_port: Option<LogPort>,
}

// Fixed ahash keys; the per-switch seed is mixed into the first one.
const HASH_KEYS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Feeds the enabled fields into `state` in a fixed order.
fn feed_fields<H: Hasher>(state: &mut H, fields: &FlowFields, enabled: HashFieldSet) {
    if enabled.contains(HashFieldSet::SMAC) {
        fields.src_mac.as_bytes().hash(state);
    }
    if enabled.contains(HashFieldSet::DMAC) {
        fields.dst_mac.as_bytes().hash(state);
    }
    if enabled.contains(HashFieldSet::ETHERTYPE) {
        fields.ethertype.hash(state);
    }
    if enabled.contains(HashFieldSet::VID) {
        fields.vid.hash(state);
    }
    if enabled.contains(HashFieldSet::SIP) {
        fields.src_ip.hash(state);
    }
    if enabled.contains(HashFieldSet::DIP) {
        fields.dst_ip.hash(state);
    }
    if enabled.contains(HashFieldSet::IP_PROTO) {
        fields.ip_proto.hash(state);
    }
    if enabled.contains(HashFieldSet::L4_SRC_PORT) {
        fields.l4_src_port.hash(state);
    }
    if enabled.contains(HashFieldSet::L4_DST_PORT) {
        fields.l4_dst_port.hash(state);
    }
    if enabled.contains(HashFieldSet::INGRESS_PORT) {
        fields.ingress_port.hash(state);
    }
}

/// Folds every fed byte into a 64-bit word with XOR.
#[derive(Default)]
struct XorFold {
    acc: u64,
    pos: usize,
}

impl Hasher for XorFold {
    fn finish(&self) -> u64 {
        self.acc
    }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.acc ^= u64::from(*b) << ((self.pos % 8) * 8);
            self.pos += 1;
        }
    }
}

/// Computes the hash of a flow.
///
/// `Crc` and `Xor` are deterministic for a given seed, so packets of the
/// same flow always land on the same member.
pub fn flow_hash(
    algorithm: HashAlgorithm,
    seed: u32,
    fields: &FlowFields,
    enabled: HashFieldSet,
) -> u64 {
    match algorithm {
        HashAlgorithm::Crc => {
            let state = RandomState::with_seeds(
                HASH_KEYS[0] ^ u64::from(seed),
                HASH_KEYS[1],
                HASH_KEYS[2],
                HASH_KEYS[3],
            );
            let mut hasher = state.build_hasher();
            feed_fields(&mut hasher, fields, enabled);
            hasher.finish()
        }
        HashAlgorithm::Xor => {
            let mut hasher = XorFold::default();
            feed_fields(&mut hasher, fields, enabled);
            hasher.finish() ^ u64::from(seed)
        }
        HashAlgorithm::Random => rand::random::<u64>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn flow(l4_src_port: u16) -> FlowFields {
        FlowFields {
            src_mac: "00:11:22:33:44:55".parse().unwrap(),
            dst_mac: "00:aa:bb:cc:dd:ee".parse().unwrap(),
            ethertype: 0x0800,
            vid: 10,
            src_ip: Some("10.0.0.1".parse().unwrap()),
            dst_ip: Some("10.0.1.1".parse().unwrap()),
            ip_proto: 6,
            l4_src_port,
            l4_dst_port: 80,
            ingress_port: Some(LogPort(1)),
        }
    }

    #[test]
    fn test_crc_is_deterministic() {
        let a = flow_hash(HashAlgorithm::Crc, 7, &flow(1000), HashFieldSet::all());
        let b = flow_hash(HashAlgorithm::Crc, 7, &flow(1000), HashFieldSet::all());
        assert_eq!(a, b);
    }

    #[test]
    fn test_disabled_fields_are_ignored() {
        let enabled = HashFieldSet::L2 | HashFieldSet::L3;
        let a = flow_hash(HashAlgorithm::Crc, 0, &flow(1000), enabled);
        let b = flow_hash(HashAlgorithm::Crc, 0, &flow(2000), enabled);
        assert_eq!(a, b);
    }

    #[test]
    fn test_l4_ports_spread_flows() {
        let hashes: HashSet<u64> = (0..64u16)
            .map(|p| flow_hash(HashAlgorithm::Crc, 0, &flow(p), HashFieldSet::all()) % 4)
            .collect();
        assert!(hashes.len() > 1);
    }

    #[test]
    fn test_xor_is_deterministic() {
        let a = flow_hash(HashAlgorithm::Xor, 3, &flow(5), HashFieldSet::all());
        let b = flow_hash(HashAlgorithm::Xor, 3, &flow(5), HashFieldSet::all());
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_field_set() {
        let set = HashFieldSet::default();
        assert!(set.contains(HashFieldSet::SMAC));
        assert!(set.contains(HashFieldSet::DIP));
        assert!(!set.contains(HashFieldSet::L4_SRC_PORT));
    }
}
