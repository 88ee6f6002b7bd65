//! Port attributes, link state and counters.
//!
//! Physical ports come from the configured inventory. LAG logical ports are
//! added by the LAG module and share the same state record, so attributes
//! that apply to logical ports (MTU, admin state, isolation) work on both.

mod api;
mod counters;
mod types;

pub use counters::{
    FrameCast, FrameDirection, FrameSample, Ieee8023Counters, PortCounters, Rfc2819Counters,
    Rfc2863Counters, Rfc3635Counters,
};
pub use types::{
    FlowCtrlEnable, FlowCtrlMode, FlowCtrlParams, FlowCtrlState, LoopbackFilterMode, PortLoopback,
    PortSpeed, PortSpeedCapability, PortState, SflowParams, PORT_MTU_DEFAULT, PORT_MTU_MAX,
    PORT_MTU_MIN,
};
