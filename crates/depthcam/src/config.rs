use std::time::Duration;

/// Stream resolutions supported by the capture layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Vga,
    Hd,
    FullHd,
}

impl Resolution {
    pub fn width(self) -> u32 {
        match self {
            Resolution::Vga => 640,
            Resolution::Hd => 1280,
            Resolution::FullHd => 1920,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            Resolution::Vga => 480,
            Resolution::Hd => 720,
            Resolution::FullHd => 1080,
        }
    }

    pub fn dimensions(self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Bounded retry policy for device discovery.
///
/// `max_attempts` enumeration passes are made, sleeping `delay` between
/// consecutive passes. Tests shrink the delay to keep runs fast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Configuration for a camera adapter. Immutable once handed to a backend.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    rgb_resolution: Resolution,
    depth_resolution: Resolution,
    fps: u32,
    serial_number: Option<String>,
    depth_in_meters: bool,
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rgb_resolution: Resolution::Hd,
            depth_resolution: Resolution::Hd,
            fps: 30,
            serial_number: None,
            depth_in_meters: false,
            wait_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl CameraConfig {
    /// Set the color stream resolution.
    pub fn with_rgb_resolution(mut self, resolution: Resolution) -> Self {
        self.rgb_resolution = resolution;
        self
    }

    /// Set the requested depth stream resolution.
    ///
    /// Both current backends pin the depth stream to the sensor's native
    /// resolution; the field is carried for callers that record intended
    /// settings.
    pub fn with_depth_resolution(mut self, resolution: Resolution) -> Self {
        self.depth_resolution = resolution;
        self
    }

    /// Set the frames per second.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Bind to a specific device by serial number.
    pub fn with_serial_number(mut self, serial: String) -> Self {
        self.serial_number = Some(serial);
        self
    }

    /// Report depth in whole meters instead of device-native millimeters.
    ///
    /// Samples stay `u16`; meter conversion discards sub-unit precision.
    pub fn with_depth_in_meters(mut self, depth_in_meters: bool) -> Self {
        self.depth_in_meters = depth_in_meters;
        self
    }

    /// Set the bounded wait for each frame retrieval call.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Set the device discovery retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // Getters
    pub fn rgb_resolution(&self) -> Resolution {
        self.rgb_resolution
    }

    pub fn depth_resolution(&self) -> Resolution {
        self.depth_resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn depth_in_meters(&self) -> bool {
        self.depth_in_meters
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}
