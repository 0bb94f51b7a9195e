//! Shared mock device layer for the adapter tests.
//!
//! `MockDriver` implements the same `DeviceDriver` contract as the
//! hardware bindings; tests script its state up front and inspect what
//! the adapter did through the shared handle.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use depthcam::driver::{
    AcquireRequest, DeviceDriver, DeviceInfo, DriverError, PropertyValue, RawBuffer, RawPlane,
    StreamProfile, StreamSetup,
};
use depthcam::intrinsics::Intrinsics;

#[derive(Default)]
pub struct MockState {
    pub devices: Vec<DeviceInfo>,
    pub properties: HashMap<String, PropertyValue>,
    pub set_log: Vec<(String, PropertyValue)>,
    pub property_type_errors: HashSet<String>,
    pub buffers: VecDeque<RawBuffer>,
    pub profile_intrinsics: Option<Intrinsics>,
    pub start_error: Option<String>,
    pub supports_alignment: bool,
    pub discover_calls: u32,
    pub requeued: u32,
    pub stop_calls: u32,
    pub aligned_requests: Vec<bool>,
    pub opened_serial: Option<String>,
    pub last_setup: Option<StreamSetup>,
    pub started: bool,
}

pub struct MockDriver(pub Arc<Mutex<MockState>>);

impl MockDriver {
    pub fn new(state: Arc<Mutex<MockState>>) -> Self {
        Self(state)
    }
}

impl DeviceDriver for MockDriver {
    fn discover(&mut self) -> Result<Vec<DeviceInfo>, DriverError> {
        let mut state = self.0.lock().unwrap();
        state.discover_calls += 1;
        Ok(state.devices.clone())
    }

    fn open(&mut self, serial: Option<&str>) -> Result<DeviceInfo, DriverError> {
        let mut state = self.0.lock().unwrap();
        let info = match serial {
            Some(wanted) => state
                .devices
                .iter()
                .find(|d| d.serial == wanted)
                .cloned()
                .ok_or_else(|| DriverError::NotFound(format!("no device with serial {wanted}")))?,
            None => state
                .devices
                .first()
                .cloned()
                .ok_or_else(|| DriverError::NotFound("no devices connected".to_string()))?,
        };
        state.opened_serial = Some(info.serial.clone());
        Ok(info)
    }

    fn start(&mut self, setup: &StreamSetup) -> Result<StreamProfile, DriverError> {
        let mut state = self.0.lock().unwrap();
        if let Some(msg) = &state.start_error {
            return Err(DriverError::Unsupported(msg.clone()));
        }
        state.started = true;
        state.last_setup = Some(setup.clone());
        Ok(StreamProfile {
            serial: state.opened_serial.clone().unwrap_or_default(),
            intrinsics: state.profile_intrinsics,
        })
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        let mut state = self.0.lock().unwrap();
        state.stop_calls += 1;
        state.started = false;
        Ok(())
    }

    fn get_buffer(
        &mut self,
        request: AcquireRequest,
        timeout: Duration,
    ) -> Result<RawBuffer, DriverError> {
        let mut state = self.0.lock().unwrap();
        state.aligned_requests.push(request.aligned);
        state
            .buffers
            .pop_front()
            .ok_or(DriverError::Timeout { waited: timeout })
    }

    fn requeue(&mut self, _buffer: RawBuffer) -> Result<(), DriverError> {
        let mut state = self.0.lock().unwrap();
        state.requeued += 1;
        Ok(())
    }

    fn get_property(&mut self, name: &str) -> Result<PropertyValue, DriverError> {
        let state = self.0.lock().unwrap();
        if state.property_type_errors.contains(name) {
            return Err(DriverError::PropertyType {
                name: name.to_string(),
            });
        }

        // Scale/offset registers read through the coordinate selector, the
        // way the nodemap behaves on the device.
        let key = match name {
            "Scan3dCoordinateScale" | "Scan3dCoordinateOffset" => {
                let selector = state
                    .properties
                    .get("Scan3dCoordinateSelector")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                format!("{selector}:{name}")
            }
            _ => name.to_string(),
        };

        state
            .properties
            .get(&key)
            .cloned()
            .ok_or_else(|| DriverError::Device(format!("no node {key}")))
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DriverError> {
        let mut state = self.0.lock().unwrap();
        if state.property_type_errors.contains(name) {
            return Err(DriverError::PropertyType {
                name: name.to_string(),
            });
        }
        state.set_log.push((name.to_string(), value.clone()));
        state.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn supports_alignment(&self) -> bool {
        self.0.lock().unwrap().supports_alignment
    }
}

/// Scripted RealSense-shaped device: one device, color intrinsics in the
/// stream profile.
pub fn realsense_state(serial: &str, width: u32, height: u32) -> Arc<Mutex<MockState>> {
    let state = MockState {
        devices: vec![DeviceInfo {
            serial: serial.to_string(),
            model: "D435".to_string(),
        }],
        profile_intrinsics: Some(Intrinsics {
            fx: 615.4,
            fy: 615.9,
            px: width as f64 / 2.0,
            py: height as f64 / 2.0,
            width,
            height,
        }),
        ..MockState::default()
    };
    Arc::new(Mutex::new(state))
}

/// Scripted Helios-shaped device: one device, calibration registers and
/// per-axis scale/offset in the nodemap.
pub fn helios_state(serial: &str) -> Arc<Mutex<MockState>> {
    let mut properties = HashMap::new();
    properties.insert(
        "DeviceSerialNumber".to_string(),
        PropertyValue::Str(serial.to_string()),
    );
    properties.insert("CalibFocalLengthX".to_string(), PropertyValue::Float(474.2));
    properties.insert("CalibFocalLengthY".to_string(), PropertyValue::Float(474.9));
    properties.insert(
        "CalibOpticalCenterX".to_string(),
        PropertyValue::Float(319.5),
    );
    properties.insert(
        "CalibOpticalCenterY".to_string(),
        PropertyValue::Float(239.5),
    );
    properties.insert("Width".to_string(), PropertyValue::Int(640));
    properties.insert("Height".to_string(), PropertyValue::Int(480));
    for (axis, scale, offset) in [
        ("CoordinateA", 0.25, -8192.0),
        ("CoordinateB", 0.25, -8192.0),
        ("CoordinateC", 0.25, 0.0),
    ] {
        properties.insert(
            format!("{axis}:Scan3dCoordinateScale"),
            PropertyValue::Float(scale),
        );
        properties.insert(
            format!("{axis}:Scan3dCoordinateOffset"),
            PropertyValue::Float(offset),
        );
    }

    let state = MockState {
        devices: vec![DeviceInfo {
            serial: serial.to_string(),
            model: "HLT003S".to_string(),
        }],
        properties,
        ..MockState::default()
    };
    Arc::new(Mutex::new(state))
}

/// A RealSense-style frameset holding color and/or depth planes filled
/// with constant values.
pub fn frameset(
    width: u32,
    height: u32,
    color_fill: Option<u8>,
    depth_fill: Option<u16>,
) -> RawBuffer {
    let mut planes = Vec::new();
    if let Some(fill) = color_fill {
        planes.push(RawPlane::Color {
            width,
            height,
            data: vec![fill; (width * height * 3) as usize],
        });
    }
    if let Some(fill) = depth_fill {
        planes.push(RawPlane::Depth {
            width,
            height,
            data: vec![fill; (width * height) as usize],
        });
    }
    RawBuffer { planes }
}

/// A Helios-style ABCY16 buffer built from per-pixel (a, b, c, y) tuples.
/// `pixels` must hold `width * height` entries.
pub fn coord_buffer(width: u32, height: u32, pixels: &[(u16, u16, u16, u16)]) -> RawBuffer {
    assert_eq!(pixels.len(), (width * height) as usize);
    let mut data = Vec::with_capacity(pixels.len() * 4);
    for &(a, b, c, y) in pixels {
        data.extend_from_slice(&[a, b, c, y]);
    }
    RawBuffer {
        planes: vec![RawPlane::Coord3d {
            width,
            height,
            data,
        }],
    }
}
