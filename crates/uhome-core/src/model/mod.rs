// ── Domain model ──
//
// One `Device` struct tagged with a `DeviceKind` and a capability set.
// Behaviour is selected by capability checks, not by type.

pub mod capability;
pub mod device;
pub mod handle_type;

pub use capability::{Attribute, Capability, StateAttributes};
pub use device::{Device, DeviceId, DeviceKind};
pub use handle_type::{HandleTypeProfile, lookup as lookup_handle_type};
