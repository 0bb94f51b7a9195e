//! Exclusive ownership tracking for physical devices.
//!
//! Vendor SDKs with a process-global device table make teardown order
//! ambiguous; the registry replaces that implicit state with an explicit
//! object. Exactly one adapter may hold a given serial number at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use crate::CameraError;

/// Tracks which device serial numbers are currently held by live adapters.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    held: Mutex<HashSet<String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by the hardware constructors.
    pub fn global() -> Arc<DeviceRegistry> {
        static GLOBAL: OnceLock<Arc<DeviceRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(DeviceRegistry::new()))
            .clone()
    }

    /// Claim a device. Fails with [`CameraError::Busy`] if another adapter
    /// already holds it.
    pub fn acquire(&self, serial: &str) -> Result<(), CameraError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(serial.to_string()) {
            return Err(CameraError::Busy(serial.to_string()));
        }
        Ok(())
    }

    /// Release a device. Releasing a serial that is not held is the
    /// reported, non-fatal teardown condition.
    pub fn release(&self, serial: &str) -> Result<(), CameraError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.remove(serial) {
            return Err(CameraError::Teardown(format!(
                "device {serial} is not registered (already released?)"
            )));
        }
        Ok(())
    }

    /// Whether any live adapter holds the given serial.
    pub fn is_held(&self, serial: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.contains(serial)
    }
}
