//! Uniform capture layer over depth-camera hardware SDKs.
//!
//! This crate provides a single [`DepthCamera`] trait for synchronous
//! color/depth frame capture, with backend adapters for Intel RealSense
//! and LucidVision Helios devices. Adapters talk to their vendor SDK
//! through the [`driver::DeviceDriver`] capability contract, so test
//! doubles and hardware bindings share one interface. Hardware bindings
//! are optional cargo features (`realsense`, `helios`).

pub mod config;
pub mod convert;
pub mod driver;
pub mod error;
pub mod helios;
pub mod intrinsics;
pub mod realsense;
pub mod registry;
pub mod traits;

pub use config::{CameraConfig, Resolution, RetryPolicy};
pub use depthcam_frame::{Frame, FrameError};
pub use error::CameraError;
pub use helios::HeliosCamera;
pub use intrinsics::{AxisCalibration, CoordinateCalibration, Intrinsics};
pub use realsense::RealSenseCamera;
pub use registry::DeviceRegistry;
pub use traits::DepthCamera;

#[cfg(feature = "helios")]
pub use helios::AravisDriver;
#[cfg(feature = "realsense")]
pub use realsense::RsDriver;
