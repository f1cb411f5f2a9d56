mod capability;
mod telemetry;

pub use capability::{
    Backend, DeviceCapability, SupportLevel, Vendor, DEFAULT_THROTTLE_TEMPERATURE_C,
};
pub use telemetry::TelemetrySnapshot;
