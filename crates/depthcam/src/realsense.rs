//! Intel RealSense backend.
//!
//! Wraps a stream pipeline: one depth stream pinned to the sensor's
//! maximum-rate resolution and one color stream chosen by the configured
//! resolution. Intrinsics come from the negotiated color stream profile.

use std::time::Instant;

use depthcam_frame::Frame;

use crate::CameraError;
use crate::config::{CameraConfig, Resolution};
use crate::convert::scale_depth_units;
use crate::driver::{
    AcquireRequest, DeviceDriver, DriverError, PropertyValue, StreamSetup, StreamSpec,
};
use crate::intrinsics::Intrinsics;
use crate::traits::DepthCamera;

const NAME: &str = "Intel RealSense";

/// Depth runs at the sensor's maximum-rate resolution regardless of the
/// configured depth resolution (1280x720 up to 90 fps).
const DEPTH_STREAM: StreamSpec = StreamSpec {
    width: 1280,
    height: 720,
};

/// RealSense camera adapter, generic over the device layer so hardware and
/// test doubles share one code path.
pub struct RealSenseCamera<D: DeviceDriver> {
    driver: D,
    config: CameraConfig,
    intrinsics: Intrinsics,
    serial: String,
    unit_divisor: u16,
    open: bool,
}

impl<D: DeviceDriver> std::fmt::Debug for RealSenseCamera<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealSenseCamera")
            .field("config", &self.config)
            .field("serial", &self.serial)
            .field("intrinsics", &self.intrinsics)
            .field("open", &self.open)
            .finish()
    }
}

impl<D: DeviceDriver> RealSenseCamera<D> {
    /// Open and start streaming through the given device layer.
    ///
    /// Binds the configured serial number, or the first available device
    /// when none is set. The color stream runs at 1280x720 for `Hd`,
    /// 1920x1080 otherwise, at the configured fps.
    ///
    /// # Errors
    ///
    /// Returns `CameraError::NoDevice` if no matching device is connected,
    /// `CameraError::StreamConfig` if the device rejects the requested
    /// streams or reports no color intrinsics.
    pub fn with_driver(mut driver: D, config: CameraConfig) -> Result<Self, CameraError> {
        driver.open(config.serial_number())?;

        let color = match config.rgb_resolution() {
            Resolution::Hd => StreamSpec {
                width: 1280,
                height: 720,
            },
            _ => StreamSpec {
                width: 1920,
                height: 1080,
            },
        };

        let setup = StreamSetup {
            color: Some(color),
            depth: Some(DEPTH_STREAM),
            fps: config.fps(),
        };

        let profile = driver.start(&setup).map_err(|err| {
            log::error!(
                "{NAME}: stream start failed ({err}); check the requested color \
                 resolution (some models have no FullHD mode) and pass serial \
                 numbers when more than one camera is connected"
            );
            CameraError::StreamConfig(err.to_string())
        })?;

        let intrinsics = profile.intrinsics.ok_or_else(|| {
            CameraError::StreamConfig("color stream reported no intrinsics".to_string())
        })?;

        let unit_divisor = if config.depth_in_meters() { 1000 } else { 1 };
        let serial = profile.serial;

        log::info!("{NAME} {serial} camera configured");

        Ok(Self {
            driver,
            config,
            intrinsics,
            serial,
            unit_divisor,
            open: true,
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Forward a device option to the active sensor.
    ///
    /// A value type the option does not accept is reported and skipped
    /// (`CameraError::OptionType`); the adapter stays usable.
    pub fn set_option(&mut self, option: &str, value: f64) -> Result<(), CameraError> {
        self.ensure_open()?;
        match self.driver.set_property(option, PropertyValue::Float(value)) {
            Ok(()) => {
                log::info!("{NAME} {}: option {option} changed to {value}", self.serial);
                Ok(())
            }
            Err(DriverError::PropertyType { name }) => {
                log::warn!("{NAME} {}: option {name} was not set (value type mismatch)", self.serial);
                Err(CameraError::OptionType(name))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Read a device option from the active sensor.
    pub fn get_option(&mut self, option: &str) -> Result<f64, CameraError> {
        self.ensure_open()?;
        match self.driver.get_property(option) {
            Ok(value) => value.as_f64().ok_or_else(|| {
                log::warn!("{NAME} {}: option {option} holds a non-numeric value", self.serial);
                CameraError::OptionType(option.to_string())
            }),
            Err(DriverError::PropertyType { name }) => {
                log::warn!("{NAME} {}: option {name} was not read (value type mismatch)", self.serial);
                Err(CameraError::OptionType(name))
            }
            Err(other) => Err(other.into()),
        }
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.open {
            Ok(())
        } else {
            Err(CameraError::Driver("camera is closed".to_string()))
        }
    }

    /// Re-acquire framesets until the needed planes have arrived or the
    /// wait budget is spent. Framesets may be partial; planes already
    /// copied out are kept across iterations. Every acquired buffer goes
    /// back to the device layer.
    fn wait_planes(
        &mut self,
        need_color: bool,
        need_depth: bool,
        aligned: bool,
    ) -> Result<(Option<Frame<u8>>, Option<Frame<u16>>), CameraError> {
        self.ensure_open()?;

        let budget = self.config.wait_timeout();
        let deadline = Instant::now() + budget;
        let mut color: Option<Frame<u8>> = None;
        let mut depth: Option<Frame<u16>> = None;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(CameraError::Timeout { waited: budget });
            }

            let buffer = match self
                .driver
                .get_buffer(AcquireRequest { aligned }, deadline - now)
            {
                Ok(buffer) => buffer,
                Err(DriverError::Timeout { .. }) => {
                    return Err(CameraError::Timeout { waited: budget });
                }
                Err(other) => return Err(other.into()),
            };

            if need_color && color.is_none() {
                if let Some((width, height, samples)) = buffer.color() {
                    color = Some(Frame::new(width, height, 3, samples.to_vec())?);
                }
            }

            if need_depth && depth.is_none() {
                if let Some((width, height, samples)) = buffer.depth() {
                    let scaled = scale_depth_units(samples, self.unit_divisor);
                    depth = Some(Frame::new(width, height, 1, scaled)?);
                }
            }

            self.driver.requeue(buffer)?;

            if (!need_color || color.is_some()) && (!need_depth || depth.is_some()) {
                return Ok((color, depth));
            }
        }
    }

    fn frame_pair(&mut self, aligned: bool) -> Result<(Frame<u8>, Frame<u16>), CameraError> {
        let (color, depth) = self.wait_planes(true, true, aligned)?;
        match (color, depth) {
            (Some(color), Some(depth)) => Ok((color, depth)),
            _ => Err(CameraError::Driver("frameset lost a plane".to_string())),
        }
    }
}

impl<D: DeviceDriver> DepthCamera for RealSenseCamera<D> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn get_rgb(&mut self) -> Result<Frame<u8>, CameraError> {
        let (color, _) = self.wait_planes(true, false, false)?;
        color.ok_or_else(|| CameraError::Driver("frameset lost the color plane".to_string()))
    }

    fn get_depth(&mut self) -> Result<Frame<u16>, CameraError> {
        let (_, depth) = self.wait_planes(false, true, false)?;
        depth.ok_or_else(|| CameraError::Driver("frameset lost the depth plane".to_string()))
    }

    fn get_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError> {
        self.frame_pair(false)
    }

    fn get_aligned_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError> {
        let aligned = self.driver.supports_alignment();
        if !aligned {
            log::debug!("{NAME} {}: device layer cannot align, returning unaligned frames", self.serial);
        }
        self.frame_pair(aligned)
    }

    fn close(&mut self) -> Result<(), CameraError> {
        if !self.open {
            log::warn!("{NAME} {}: close called on an already-closed camera", self.serial);
            return Err(CameraError::Teardown("camera already closed".to_string()));
        }

        self.open = false;
        self.driver.stop()?;
        log::info!("{NAME} {} camera closed", self.serial);
        Ok(())
    }
}

impl<D: DeviceDriver> Drop for RealSenseCamera<D> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        match self.driver.stop() {
            Ok(()) => log::info!("{NAME} {} camera closed", self.serial),
            Err(err) => {
                log::warn!("{NAME} {}: release failed during drop: {err}", self.serial);
            }
        }
    }
}

#[cfg(feature = "realsense")]
mod hw {
    use std::collections::HashSet;
    use std::ffi::CString;
    use std::time::Duration;

    use realsense_rust::config::Config;
    use realsense_rust::context::Context;
    use realsense_rust::frame::{ColorFrame, DepthFrame, FrameEx};
    use realsense_rust::kind::{Rs2CameraInfo, Rs2Format, Rs2Option, Rs2StreamKind};
    use realsense_rust::pipeline::{ActivePipeline, InactivePipeline};

    use crate::CameraError;
    use crate::driver::{
        AcquireRequest, DeviceDriver, DeviceInfo, DriverError, PropertyValue, RawBuffer, RawPlane,
        StreamProfile, StreamSetup,
    };
    use crate::intrinsics::Intrinsics;

    /// Device layer over librealsense2 via `realsense-rust`.
    pub struct RsDriver {
        context: Context,
        serial: Option<CString>,
        pipeline: Option<ActivePipeline>,
    }

    impl RsDriver {
        pub fn new() -> Result<Self, CameraError> {
            let context =
                Context::new().map_err(|err| CameraError::Driver(err.to_string()))?;
            Ok(Self {
                context,
                serial: None,
                pipeline: None,
            })
        }

        fn active(&mut self) -> Result<&mut ActivePipeline, DriverError> {
            self.pipeline
                .as_mut()
                .ok_or_else(|| DriverError::Device("pipeline is not streaming".to_string()))
        }

        /// Options are addressed to the second sensor of the device's
        /// sensor list (the color sensor on the D400 series).
        fn option_sensor(
            &mut self,
        ) -> Result<realsense_rust::sensor::Sensor, DriverError> {
            let pipeline = self.active()?;
            let mut sensors = pipeline.profile().device().sensors();
            if sensors.len() < 2 {
                return Err(DriverError::Device(
                    "device reports fewer than two sensors".to_string(),
                ));
            }
            Ok(sensors.remove(1))
        }
    }

    fn device_err(err: impl std::fmt::Display) -> DriverError {
        DriverError::Device(err.to_string())
    }

    fn parse_option(name: &str) -> Option<Rs2Option> {
        Some(match name {
            "Exposure" => Rs2Option::Exposure,
            "Gain" => Rs2Option::Gain,
            "Brightness" => Rs2Option::Brightness,
            "Contrast" => Rs2Option::Contrast,
            "Gamma" => Rs2Option::Gamma,
            "Hue" => Rs2Option::Hue,
            "Saturation" => Rs2Option::Saturation,
            "Sharpness" => Rs2Option::Sharpness,
            "WhiteBalance" => Rs2Option::WhiteBalance,
            "EnableAutoExposure" => Rs2Option::EnableAutoExposure,
            "EnableAutoWhiteBalance" => Rs2Option::EnableAutoWhiteBalance,
            "LaserPower" => Rs2Option::LaserPower,
            "EmitterEnabled" => Rs2Option::EmitterEnabled,
            _ => return None,
        })
    }

    impl DeviceDriver for RsDriver {
        fn discover(&mut self) -> Result<Vec<DeviceInfo>, DriverError> {
            let mut found = Vec::new();
            for device in self.context.query_devices(HashSet::new()) {
                let serial = device
                    .info(Rs2CameraInfo::SerialNumber)
                    .and_then(|s| s.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let model = device
                    .info(Rs2CameraInfo::Name)
                    .and_then(|s| s.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                found.push(DeviceInfo { serial, model });
            }
            Ok(found)
        }

        fn open(&mut self, serial: Option<&str>) -> Result<DeviceInfo, DriverError> {
            let devices = self.discover()?;
            let info = match serial {
                Some(wanted) => devices
                    .into_iter()
                    .find(|d| d.serial == wanted)
                    .ok_or_else(|| {
                        DriverError::NotFound(format!("no device with serial {wanted}"))
                    })?,
                None => devices.into_iter().next().ok_or_else(|| {
                    DriverError::NotFound("no RealSense device connected".to_string())
                })?,
            };
            self.serial =
                Some(CString::new(info.serial.clone()).map_err(device_err)?);
            Ok(info)
        }

        fn start(&mut self, setup: &StreamSetup) -> Result<StreamProfile, DriverError> {
            let mut config = Config::new();
            if let Some(serial) = &self.serial {
                config.enable_device_from_serial(serial).map_err(device_err)?;
            }
            config.disable_all_streams().map_err(device_err)?;

            if let Some(depth) = setup.depth {
                config
                    .enable_stream(
                        Rs2StreamKind::Depth,
                        None,
                        depth.width as usize,
                        depth.height as usize,
                        Rs2Format::Z16,
                        setup.fps as usize,
                    )
                    .map_err(device_err)?;
            }
            if let Some(color) = setup.color {
                config
                    .enable_stream(
                        Rs2StreamKind::Color,
                        None,
                        color.width as usize,
                        color.height as usize,
                        Rs2Format::Bgr8,
                        setup.fps as usize,
                    )
                    .map_err(device_err)?;
            }

            let inactive =
                InactivePipeline::try_from(&self.context).map_err(device_err)?;
            let pipeline = inactive
                .start(Some(config))
                .map_err(|err| DriverError::Unsupported(err.to_string()))?;

            let mut intrinsics = None;
            let mut serial = String::new();
            {
                let profile = pipeline.profile();
                for stream in profile.streams() {
                    if stream.kind() == Rs2StreamKind::Color {
                        let intr = stream.intrinsics().map_err(device_err)?;
                        intrinsics = Some(Intrinsics {
                            fx: intr.fx() as f64,
                            fy: intr.fy() as f64,
                            px: intr.ppx() as f64,
                            py: intr.ppy() as f64,
                            width: intr.width() as u32,
                            height: intr.height() as u32,
                        });
                    }
                }
                let device = profile.device();
                if let Some(sn) = device.info(Rs2CameraInfo::SerialNumber) {
                    if let Ok(sn) = sn.to_str() {
                        serial = sn.to_string();
                    }
                }
            }

            self.pipeline = Some(pipeline);
            Ok(StreamProfile { serial, intrinsics })
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            if let Some(pipeline) = self.pipeline.take() {
                pipeline.stop();
            }
            Ok(())
        }

        fn get_buffer(
            &mut self,
            _request: AcquireRequest,
            timeout: Duration,
        ) -> Result<RawBuffer, DriverError> {
            let pipeline = self.active()?;
            // The binding reports SDK timeouts through its generic error path.
            let frames = pipeline.wait(Some(timeout)).map_err(|err| {
                let msg = err.to_string();
                if msg.to_ascii_lowercase().contains("timeout") {
                    DriverError::Timeout { waited: timeout }
                } else {
                    DriverError::Device(msg)
                }
            })?;

            let mut planes = Vec::new();
            for frame in frames.frames_of_type::<ColorFrame>() {
                let width = frame.width() as u32;
                let height = frame.height() as u32;
                // Frame storage lives inside the SDK; copy before the
                // composite frame is dropped.
                let data = unsafe {
                    let ptr: *const _ = frame.get_data();
                    let ptr: *const u8 = ptr.cast();
                    std::slice::from_raw_parts(ptr, frame.get_data_size()).to_vec()
                };
                planes.push(RawPlane::Color {
                    width,
                    height,
                    data,
                });
            }
            for frame in frames.frames_of_type::<DepthFrame>() {
                let width = frame.width() as u32;
                let height = frame.height() as u32;
                let data = unsafe {
                    let ptr: *const _ = frame.get_data();
                    let ptr: *const u16 = ptr.cast();
                    std::slice::from_raw_parts(ptr, frame.get_data_size() / 2).to_vec()
                };
                planes.push(RawPlane::Depth {
                    width,
                    height,
                    data,
                });
            }

            Ok(RawBuffer { planes })
        }

        fn requeue(&mut self, _buffer: RawBuffer) -> Result<(), DriverError> {
            // librealsense reclaims composite frames internally.
            Ok(())
        }

        fn get_property(&mut self, name: &str) -> Result<PropertyValue, DriverError> {
            let option = parse_option(name).ok_or_else(|| {
                DriverError::Unsupported(format!("unknown option {name}"))
            })?;
            let sensor = self.option_sensor()?;
            match sensor.get_option(option) {
                Some(value) => Ok(PropertyValue::Float(value as f64)),
                None => Err(DriverError::PropertyType {
                    name: name.to_string(),
                }),
            }
        }

        fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DriverError> {
            let option = parse_option(name).ok_or_else(|| {
                DriverError::Unsupported(format!("unknown option {name}"))
            })?;
            let value = value.as_f64().ok_or_else(|| DriverError::PropertyType {
                name: name.to_string(),
            })? as f32;
            let mut sensor = self.option_sensor()?;
            sensor
                .set_option(option, value)
                .map_err(|_| DriverError::PropertyType {
                    name: name.to_string(),
                })
        }

        // realsense-rust does not expose the SDK's align processing block;
        // the adapter falls back to unaligned frames.
    }
}

#[cfg(feature = "realsense")]
pub use hw::RsDriver;

#[cfg(feature = "realsense")]
impl RealSenseCamera<RsDriver> {
    /// Open the first matching physical camera through librealsense2.
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        Self::with_driver(RsDriver::new()?, config)
    }
}
