//! Class of service: priority assignment, priority to traffic class
//! mapping, ETS scheduling and port buffers.

mod api;
mod types;

pub use types::{
    CosDecision, CosPortConfig, CosTable, EtsArbitration, PortBuffConfig, PortBuffer,
    PortEtsConfig, ShaperUnits, TcEtsConfig, TrustLevel, MAX_PORT_BUFFERS, NUM_PRIORITIES,
    NUM_TRAFFIC_CLASSES,
};
