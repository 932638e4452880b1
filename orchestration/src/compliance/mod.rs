//! Compliance layer: the pre-routing gate and the human-override
//! workflow that handles its rejections.

pub mod gate;
pub mod overrides;

pub use gate::{ComplianceGate, ComplianceReport, Severity, Violation, ViolationKind};
pub use overrides::{
    OverrideConfig, OverrideDecision, OverrideRequest, OverrideStats, OverrideStatus,
    OverrideWorkflow, ViolationDescriptor,
};
