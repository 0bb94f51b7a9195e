//! Capability contract over the vendor device layers.
//!
//! Both adapters talk to their SDK through [`DeviceDriver`], so hardware
//! bindings and test doubles share one interface: device enumeration,
//! stream lifecycle, buffer acquisition/requeue, and GenICam-style
//! property access.

use std::fmt;
use std::time::Duration;

use crate::intrinsics::Intrinsics;

/// One enumerated device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub model: String,
}

/// Typed value for nodemap/option access.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen losslessly enough for nodemap use.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Stream dimensions requested from the device layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub width: u32,
    pub height: u32,
}

/// Stream negotiation request passed to [`DeviceDriver::start`].
///
/// Backends that run fixed-format sensors ignore the dimension fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamSetup {
    pub color: Option<StreamSpec>,
    pub depth: Option<StreamSpec>,
    pub fps: u32,
}

/// Result of stream negotiation.
///
/// `intrinsics` is populated by layers that derive calibration from the
/// negotiated stream profile (RealSense); nodemap-calibrated devices leave
/// it `None` and expose calibration registers as properties instead.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamProfile {
    pub serial: String,
    pub intrinsics: Option<Intrinsics>,
}

/// Frame acquisition request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquireRequest {
    /// Ask for depth reprojected into the color pixel grid where the layer
    /// supports it.
    pub aligned: bool,
}

/// One decoded plane of an acquired buffer, in the vendor's sample layout.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPlane {
    /// 8-bit interleaved color, 3 channels, sensor-native channel order.
    Color {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// 16-bit single-channel depth.
    Depth {
        width: u32,
        height: u32,
        data: Vec<u16>,
    },
    /// 16-bit 4-channel interleaved coordinate layout (ABCY: x, y, z,
    /// intensity).
    Coord3d {
        width: u32,
        height: u32,
        data: Vec<u16>,
    },
}

/// One acquired frameset. May be partial: a frameset can carry color
/// without depth or vice versa; retrieval loops re-acquire until the
/// planes they need have arrived.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawBuffer {
    pub planes: Vec<RawPlane>,
}

impl RawBuffer {
    pub fn color(&self) -> Option<(u32, u32, &[u8])> {
        self.planes.iter().find_map(|plane| match plane {
            RawPlane::Color {
                width,
                height,
                data,
            } => Some((*width, *height, data.as_slice())),
            _ => None,
        })
    }

    pub fn depth(&self) -> Option<(u32, u32, &[u16])> {
        self.planes.iter().find_map(|plane| match plane {
            RawPlane::Depth {
                width,
                height,
                data,
            } => Some((*width, *height, data.as_slice())),
            _ => None,
        })
    }

    pub fn coord3d(&self) -> Option<(u32, u32, &[u16])> {
        self.planes.iter().find_map(|plane| match plane {
            RawPlane::Coord3d {
                width,
                height,
                data,
            } => Some((*width, *height, data.as_slice())),
            _ => None,
        })
    }
}

#[derive(Debug)]
pub enum DriverError {
    /// No device matched the requested serial (or none connected at all).
    NotFound(String),
    /// The bounded buffer wait elapsed.
    Timeout { waited: Duration },
    /// The device rejected the requested stream parameters.
    Unsupported(String),
    /// A property access used an incompatible value type.
    PropertyType { name: String },
    /// Any other vendor-layer failure.
    Device(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::NotFound(msg) => write!(f, "device not found: {msg}"),
            DriverError::Timeout { waited } => {
                write!(f, "no buffer within {waited:?}")
            }
            DriverError::Unsupported(msg) => write!(f, "unsupported stream setup: {msg}"),
            DriverError::PropertyType { name } => {
                write!(f, "property {name}: incompatible value type")
            }
            DriverError::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Capability surface every vendor device layer provides.
///
/// Implementations own the native device handle exclusively; dropping the
/// driver releases it. All calls are blocking and must be serialized by
/// the owning adapter.
pub trait DeviceDriver {
    /// Enumerate currently visible devices.
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, DriverError>;

    /// Bind one device: the given serial, or the first available when
    /// `serial` is `None`. Properties become accessible after this call.
    fn open(&mut self, serial: Option<&str>) -> Result<DeviceInfo, DriverError>;

    /// Negotiate and start streaming.
    fn start(&mut self, setup: &StreamSetup) -> Result<StreamProfile, DriverError>;

    /// Stop streaming and release the transport.
    fn stop(&mut self) -> Result<(), DriverError>;

    /// Block until the next frameset arrives, up to `timeout`.
    fn get_buffer(
        &mut self,
        request: AcquireRequest,
        timeout: Duration,
    ) -> Result<RawBuffer, DriverError>;

    /// Return an acquired buffer to the transport pool. Layers whose SDK
    /// reclaims buffers internally treat this as a no-op.
    fn requeue(&mut self, buffer: RawBuffer) -> Result<(), DriverError>;

    /// Read a nodemap property or device option.
    fn get_property(&mut self, name: &str) -> Result<PropertyValue, DriverError>;

    /// Write a nodemap property or device option.
    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DriverError>;

    /// Whether this layer can reproject depth into the color pixel grid.
    fn supports_alignment(&self) -> bool {
        false
    }
}
