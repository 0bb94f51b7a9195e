use std::fmt;
use std::time::Duration;

use depthcam_frame::FrameError;

use crate::driver::DriverError;

/// Errors surfaced by the capture layer.
///
/// Configuration-time variants (`NoDevice`, `StreamConfig`, `Busy`) are
/// unrecoverable for the adapter being constructed; `OptionType` and
/// `Teardown` are reported conditions the caller may ignore.
#[derive(Debug)]
pub enum CameraError {
    /// No matching hardware appeared within the discovery retry budget.
    NoDevice(String),
    /// Requested stream parameters are unsupported by the connected device.
    StreamConfig(String),
    /// A device option get/set received an incompatible value type.
    OptionType(String),
    /// Releasing an already-released or unreachable device.
    Teardown(String),
    /// The bounded frame wait elapsed without a usable frame.
    Timeout { waited: Duration },
    /// The device is already held by another adapter instance.
    Busy(String),
    /// Device-layer failure outside the categories above.
    Driver(String),
    /// Frame assembly from a vendor buffer failed.
    Frame(FrameError),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoDevice(msg) => write!(f, "no device found: {msg}"),
            CameraError::StreamConfig(msg) => write!(f, "stream configuration error: {msg}"),
            CameraError::OptionType(name) => {
                write!(f, "option {name} has an incompatible value type")
            }
            CameraError::Teardown(msg) => write!(f, "teardown error: {msg}"),
            CameraError::Timeout { waited } => {
                write!(f, "timed out after {waited:?} waiting for a frame")
            }
            CameraError::Busy(serial) => {
                write!(f, "device {serial} is already held by another adapter")
            }
            CameraError::Driver(msg) => write!(f, "device layer error: {msg}"),
            CameraError::Frame(err) => write!(f, "frame error: {err}"),
        }
    }
}

impl std::error::Error for CameraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CameraError::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for CameraError {
    fn from(err: FrameError) -> Self {
        CameraError::Frame(err)
    }
}

impl From<DriverError> for CameraError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NotFound(msg) => CameraError::NoDevice(msg),
            DriverError::Timeout { waited } => CameraError::Timeout { waited },
            DriverError::Unsupported(msg) => CameraError::StreamConfig(msg),
            DriverError::PropertyType { name } => CameraError::OptionType(name),
            DriverError::Device(msg) => CameraError::Driver(msg),
        }
    }
}
