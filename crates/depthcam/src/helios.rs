//! LucidVision Helios backend.
//!
//! A time-of-flight GenICam camera: intrinsics live in calibration
//! registers, frames arrive as one 4-channel 16-bit `Coord3D_ABCY16`
//! buffer carrying x/y/z coordinates plus intensity. Depth is decoded with
//! the per-axis scale/offset calibration read at initialization.

use std::sync::Arc;
use std::thread;

use depthcam_frame::Frame;

use crate::CameraError;
use crate::config::CameraConfig;
use crate::convert::{apply_axis_calibration, extract_channel, normalize_intensity};
use crate::driver::{AcquireRequest, DeviceDriver, PropertyValue, RawBuffer, StreamSetup};
use crate::intrinsics::{AxisCalibration, CoordinateCalibration, Intrinsics};
use crate::registry::DeviceRegistry;
use crate::traits::DepthCamera;

const NAME: &str = "LucidVision Helios";

/// Channel order of the `Coord3D_ABCY16` pixel format.
const COORD_CHANNELS: usize = 4;
const DEPTH_CHANNEL: usize = 2;
const INTENSITY_CHANNEL: usize = 3;

/// Helios camera adapter, generic over the device layer so hardware and
/// test doubles share one code path.
pub struct HeliosCamera<D: DeviceDriver> {
    driver: D,
    config: CameraConfig,
    registry: Arc<DeviceRegistry>,
    intrinsics: Intrinsics,
    calibration: CoordinateCalibration,
    serial: String,
    open: bool,
}

impl<D: DeviceDriver> std::fmt::Debug for HeliosCamera<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeliosCamera")
            .field("config", &self.config)
            .field("serial", &self.serial)
            .field("intrinsics", &self.intrinsics)
            .field("calibration", &self.calibration)
            .field("open", &self.open)
            .finish()
    }
}

fn float_node<D: DeviceDriver>(driver: &mut D, name: &str) -> Result<f64, CameraError> {
    let value = driver.get_property(name)?;
    value
        .as_f64()
        .ok_or_else(|| CameraError::Driver(format!("node {name} holds a non-numeric value")))
}

fn dimension_node<D: DeviceDriver>(driver: &mut D, name: &str) -> Result<u32, CameraError> {
    let value = driver.get_property(name)?;
    let value = value
        .as_i64()
        .ok_or_else(|| CameraError::Driver(format!("node {name} holds a non-integer value")))?;
    u32::try_from(value)
        .map_err(|_| CameraError::Driver(format!("node {name} is out of range: {value}")))
}

fn axis_calibration<D: DeviceDriver>(
    driver: &mut D,
    selector: &str,
) -> Result<AxisCalibration, CameraError> {
    driver.set_property(
        "Scan3dCoordinateSelector",
        PropertyValue::Str(selector.to_string()),
    )?;
    Ok(AxisCalibration {
        scale: float_node(driver, "Scan3dCoordinateScale")?,
        offset: float_node(driver, "Scan3dCoordinateOffset")?,
    })
}

impl<D: DeviceDriver> HeliosCamera<D> {
    /// Discover, configure and start streaming through the given device
    /// layer.
    ///
    /// Discovery retries per `config.retry()`: one enumeration pass per
    /// attempt with the policy delay between passes, then
    /// `CameraError::NoDevice` once the budget is spent. The registry
    /// enforces exclusive ownership of the serial for the adapter's
    /// lifetime.
    pub fn with_driver(
        mut driver: D,
        config: CameraConfig,
        registry: Arc<DeviceRegistry>,
    ) -> Result<Self, CameraError> {
        let retry = config.retry();
        let mut attempt = 1;
        loop {
            let devices = driver.discover()?;
            if !devices.is_empty() {
                log::info!("{NAME}: discovered {} device(s)", devices.len());
                break;
            }
            if attempt >= retry.max_attempts() {
                return Err(CameraError::NoDevice(format!(
                    "no device found after {} attempts",
                    retry.max_attempts()
                )));
            }
            log::info!(
                "{NAME}: try {attempt} of {}, waiting {:?} for a device to be connected",
                retry.max_attempts(),
                retry.delay()
            );
            thread::sleep(retry.delay());
            attempt += 1;
        }

        let info = driver.open(config.serial_number())?;

        // The nodemap is authoritative for the serial number.
        let serial = match driver.get_property("DeviceSerialNumber") {
            Ok(PropertyValue::Str(serial)) => serial,
            _ => info.serial,
        };

        registry.acquire(&serial)?;

        // Everything below must release the registry slot on failure.
        let result = Self::configure(&mut driver, &config);
        let (intrinsics, calibration) = match result {
            Ok(parts) => parts,
            Err(err) => {
                let _ = registry.release(&serial);
                return Err(err);
            }
        };

        log::info!("{NAME} {serial} camera configured");

        Ok(Self {
            driver,
            config,
            registry,
            intrinsics,
            calibration,
            serial,
            open: true,
        })
    }

    fn configure(
        driver: &mut D,
        config: &CameraConfig,
    ) -> Result<(Intrinsics, CoordinateCalibration), CameraError> {
        let intrinsics = Intrinsics {
            fx: float_node(driver, "CalibFocalLengthX")?,
            fy: float_node(driver, "CalibFocalLengthY")?,
            px: float_node(driver, "CalibOpticalCenterX")?,
            py: float_node(driver, "CalibOpticalCenterY")?,
            width: dimension_node(driver, "Width")?,
            height: dimension_node(driver, "Height")?,
        };

        // Confidence gating off, fixed amplitude gain, coordinate+intensity
        // pixel layout.
        driver.set_property("Scan3dConfidenceThresholdEnable", PropertyValue::Bool(false))?;
        driver.set_property("Scan3dAmplitudeGain", PropertyValue::Float(5.0))?;
        driver.set_property(
            "PixelFormat",
            PropertyValue::Str("Coord3D_ABCY16".to_string()),
        )?;

        // Transport stream: keep only the newest buffer, negotiate packet
        // size, resend lost packets.
        driver.set_property(
            "StreamBufferHandlingMode",
            PropertyValue::Str("NewestOnly".to_string()),
        )?;
        driver.set_property("StreamAutoNegotiatePacketSize", PropertyValue::Bool(true))?;
        driver.set_property("StreamPacketResendEnable", PropertyValue::Bool(true))?;

        let calibration = CoordinateCalibration {
            a: axis_calibration(driver, "CoordinateA")?,
            b: axis_calibration(driver, "CoordinateB")?,
            c: axis_calibration(driver, "CoordinateC")?,
        };

        driver.start(&StreamSetup {
            color: None,
            depth: None,
            fps: config.fps(),
        })?;

        Ok((intrinsics, calibration))
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Per-axis scale/offset calibration read at initialization.
    pub fn calibration(&self) -> &CoordinateCalibration {
        &self.calibration
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.open {
            Ok(())
        } else {
            Err(CameraError::Driver("camera is closed".to_string()))
        }
    }

    /// Acquire one buffer, take a private copy, and return the original to
    /// the transport pool immediately.
    fn acquire(&mut self) -> Result<RawBuffer, CameraError> {
        self.ensure_open()?;
        let buffer = self
            .driver
            .get_buffer(AcquireRequest::default(), self.config.wait_timeout())?;

        let copy = buffer.clone();
        self.driver.requeue(buffer)?;
        Ok(copy)
    }

    fn coord_plane(buffer: &RawBuffer) -> Result<(u32, u32, &[u16]), CameraError> {
        buffer
            .coord3d()
            .ok_or_else(|| CameraError::Driver("buffer carries no Coord3D plane".to_string()))
    }

    fn decode_intensity(&self, buffer: &RawBuffer) -> Result<Frame<u8>, CameraError> {
        let (width, height, samples) = Self::coord_plane(buffer)?;
        let channel = extract_channel(samples, COORD_CHANNELS, INTENSITY_CHANNEL)
            .ok_or_else(|| CameraError::Driver("Coord3D plane is not 4-channel".to_string()))?;
        Ok(Frame::new(width, height, 1, normalize_intensity(&channel))?)
    }

    fn decode_depth(&self, buffer: &RawBuffer) -> Result<Frame<u16>, CameraError> {
        let (width, height, samples) = Self::coord_plane(buffer)?;
        let channel = extract_channel(samples, COORD_CHANNELS, DEPTH_CHANNEL)
            .ok_or_else(|| CameraError::Driver("Coord3D plane is not 4-channel".to_string()))?;
        let depth = apply_axis_calibration(&channel, self.calibration.c);
        Ok(Frame::new(width, height, 1, depth)?)
    }
}

impl<D: DeviceDriver> DepthCamera for HeliosCamera<D> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    /// Intensity image from the Y channel, min-max rescaled into 0-255 per
    /// frame. Single channel; the sensor has no color stream.
    fn get_rgb(&mut self) -> Result<Frame<u8>, CameraError> {
        let buffer = self.acquire()?;
        self.decode_intensity(&buffer)
    }

    fn get_depth(&mut self) -> Result<Frame<u16>, CameraError> {
        let buffer = self.acquire()?;
        self.decode_depth(&buffer)
    }

    fn get_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError> {
        let buffer = self.acquire()?;
        Ok((self.decode_intensity(&buffer)?, self.decode_depth(&buffer)?))
    }

    /// The sensor produces co-registered channels natively; identical to
    /// [`get_frames`](Self::get_frames).
    fn get_aligned_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError> {
        self.get_frames()
    }

    fn close(&mut self) -> Result<(), CameraError> {
        if !self.open {
            log::warn!("{NAME} {}: close called on an already-released device", self.serial);
            return Err(CameraError::Teardown("device already released".to_string()));
        }

        self.open = false;
        let stopped = self.driver.stop();
        let released = self.registry.release(&self.serial);
        stopped.map_err(CameraError::from)?;
        released?;
        log::info!("{NAME} {} camera closed", self.serial);
        Ok(())
    }
}

impl<D: DeviceDriver> Drop for HeliosCamera<D> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let stopped = self.driver.stop();
        let _ = self.registry.release(&self.serial);
        match stopped {
            Ok(()) => log::info!("{NAME} {} camera closed", self.serial),
            Err(err) => {
                log::warn!("{NAME} {}: release failed during drop: {err}", self.serial);
            }
        }
    }
}

#[cfg(feature = "helios")]
mod hw {
    use std::time::Duration;

    use aravis::prelude::*;

    use crate::CameraError;
    use crate::driver::{
        AcquireRequest, DeviceDriver, DeviceInfo, DriverError, PropertyValue, RawBuffer, RawPlane,
        StreamProfile, StreamSetup,
    };

    const STREAM_BUFFERS: usize = 4;

    /// Device layer over the GenICam/GigE Vision transport via `aravis`.
    ///
    /// Transport-layer knobs (`Stream*` names) are staged here and applied
    /// when the stream is created; everything else goes straight to the
    /// device nodemap.
    pub struct AravisDriver {
        camera: Option<aravis::Camera>,
        stream: Option<aravis::Stream>,
        pending: Option<aravis::Buffer>,
        packet_resend: bool,
        auto_packet_size: bool,
    }

    impl AravisDriver {
        pub fn new() -> Result<Self, CameraError> {
            Ok(Self {
                camera: None,
                stream: None,
                pending: None,
                packet_resend: true,
                auto_packet_size: true,
            })
        }

        fn camera(&self) -> Result<&aravis::Camera, DriverError> {
            self.camera
                .as_ref()
                .ok_or_else(|| DriverError::Device("no device open".to_string()))
        }
    }

    fn device_err(err: impl std::fmt::Display) -> DriverError {
        DriverError::Device(err.to_string())
    }

    impl DeviceDriver for AravisDriver {
        fn discover(&mut self) -> Result<Vec<DeviceInfo>, DriverError> {
            aravis::update_device_list();
            let count = aravis::get_n_devices();
            let mut found = Vec::new();
            for index in 0..count {
                let serial = aravis::get_device_serial_nbr(index).unwrap_or_default();
                let model = aravis::get_device_model(index).unwrap_or_default();
                found.push(DeviceInfo {
                    serial: serial.to_string(),
                    model: model.to_string(),
                });
            }
            Ok(found)
        }

        fn open(&mut self, serial: Option<&str>) -> Result<DeviceInfo, DriverError> {
            let camera = aravis::Camera::new(serial)
                .map_err(|err| DriverError::NotFound(err.to_string()))?;
            let info = DeviceInfo {
                serial: camera
                    .device_serial_number()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                model: camera
                    .model_name()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            };
            self.camera = Some(camera);
            Ok(info)
        }

        fn start(&mut self, _setup: &StreamSetup) -> Result<StreamProfile, DriverError> {
            let camera = self.camera()?;

            if self.auto_packet_size {
                camera.gv_auto_packet_size().map_err(device_err)?;
            }

            let stream = camera.create_stream().map_err(device_err)?;
            if let Some(gv_stream) = stream.downcast_ref::<aravis::GvStream>() {
                gv_stream.set_packet_resend(if self.packet_resend {
                    aravis::GvStreamPacketResend::Always
                } else {
                    aravis::GvStreamPacketResend::Never
                });
            }

            let payload = camera.payload_size().map_err(device_err)?;
            for _ in 0..STREAM_BUFFERS {
                stream.push_buffer(&aravis::Buffer::new_allocate(payload as usize));
            }

            camera.start_acquisition().map_err(device_err)?;

            let serial = camera
                .device_serial_number()
                .map(|s| s.to_string())
                .unwrap_or_default();
            self.stream = Some(stream);
            Ok(StreamProfile {
                serial,
                intrinsics: None,
            })
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            if let Some(buffer) = self.pending.take() {
                if let Some(stream) = &self.stream {
                    stream.push_buffer(&buffer);
                }
            }
            self.stream = None;
            if let Some(camera) = self.camera.take() {
                camera.stop_acquisition().map_err(device_err)?;
            }
            Ok(())
        }

        fn get_buffer(
            &mut self,
            _request: AcquireRequest,
            timeout: Duration,
        ) -> Result<RawBuffer, DriverError> {
            // Return any buffer still checked out before popping a new one.
            if let Some(buffer) = self.pending.take() {
                if let Some(stream) = &self.stream {
                    stream.push_buffer(&buffer);
                }
            }

            let stream = self
                .stream
                .as_ref()
                .ok_or_else(|| DriverError::Device("stream is not running".to_string()))?;

            let buffer = stream
                .timeout_pop_buffer(timeout.as_micros() as u64)
                .ok_or(DriverError::Timeout { waited: timeout })?;

            let width = buffer.image_width() as u32;
            let height = buffer.image_height() as u32;
            let data = buffer.data();
            let samples = data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();

            self.pending = Some(buffer);
            Ok(RawBuffer {
                planes: vec![RawPlane::Coord3d {
                    width,
                    height,
                    data: samples,
                }],
            })
        }

        fn requeue(&mut self, _buffer: RawBuffer) -> Result<(), DriverError> {
            if let Some(buffer) = self.pending.take() {
                if let Some(stream) = &self.stream {
                    stream.push_buffer(&buffer);
                }
            }
            Ok(())
        }

        fn get_property(&mut self, name: &str) -> Result<PropertyValue, DriverError> {
            let camera = self.camera()?;
            let device = camera.device().ok_or_else(|| {
                DriverError::Device("camera exposes no device nodemap".to_string())
            })?;

            // Width/Height and the Scan3d nodes are integer or float
            // features; try the numeric readers first, then strings.
            if let Ok(value) = device.integer_feature_value(name) {
                return Ok(PropertyValue::Int(value));
            }
            if let Ok(value) = device.float_feature_value(name) {
                return Ok(PropertyValue::Float(value));
            }
            if let Ok(value) = device.boolean_feature_value(name) {
                return Ok(PropertyValue::Bool(value));
            }
            device
                .string_feature_value(name)
                .map(|value| PropertyValue::Str(value.to_string()))
                .map_err(|_| DriverError::PropertyType {
                    name: name.to_string(),
                })
        }

        fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DriverError> {
            match name {
                // Transport-layer knobs are staged and applied when the
                // stream is created.
                "StreamAutoNegotiatePacketSize" => {
                    self.auto_packet_size =
                        value.as_bool().ok_or_else(|| DriverError::PropertyType {
                            name: name.to_string(),
                        })?;
                    return Ok(());
                }
                "StreamPacketResendEnable" => {
                    self.packet_resend =
                        value.as_bool().ok_or_else(|| DriverError::PropertyType {
                            name: name.to_string(),
                        })?;
                    return Ok(());
                }
                "StreamBufferHandlingMode" => {
                    // Newest-only delivery is approximated by the small
                    // buffer ring plus the immediate requeue discipline.
                    return Ok(());
                }
                _ => {}
            }

            let camera = self.camera()?;
            let device = camera.device().ok_or_else(|| {
                DriverError::Device("camera exposes no device nodemap".to_string())
            })?;

            let result = match &value {
                PropertyValue::Bool(v) => device.set_boolean_feature_value(name, *v),
                PropertyValue::Int(v) => device.set_integer_feature_value(name, *v),
                PropertyValue::Float(v) => device.set_float_feature_value(name, *v),
                PropertyValue::Str(v) => device.set_string_feature_value(name, v),
            };
            result.map_err(|_| DriverError::PropertyType {
                name: name.to_string(),
            })
        }
    }
}

#[cfg(feature = "helios")]
pub use hw::AravisDriver;

#[cfg(feature = "helios")]
impl HeliosCamera<AravisDriver> {
    /// Open the first matching physical camera through the GenICam
    /// transport, registered in the process-wide device registry.
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        Self::with_driver(AravisDriver::new()?, config, DeviceRegistry::global())
    }
}
