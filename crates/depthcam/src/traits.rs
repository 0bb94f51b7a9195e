use depthcam_frame::Frame;

use crate::CameraError;
use crate::intrinsics::Intrinsics;

/// Capture contract shared by all camera backends.
///
/// All calls are synchronous and block the calling thread until a frame is
/// available or the configured wait budget elapses. Instances are not safe
/// for concurrent use; run one capture thread per physical device.
pub trait DepthCamera {
    /// Human-readable backend name, used in lifecycle logs.
    fn name(&self) -> &'static str;

    /// Calibration parameters read at initialization. Fixed for the life
    /// of the adapter.
    fn intrinsics(&self) -> &Intrinsics;

    /// Serial number of the bound device.
    fn serial_number(&self) -> &str;

    /// The next color image: 3-channel for sensors with a color stream,
    /// single-channel intensity for monochrome time-of-flight sensors.
    fn get_rgb(&mut self) -> Result<Frame<u8>, CameraError>;

    /// The next depth image, single-channel `u16`, in device-native or
    /// meter-derived units per configuration.
    fn get_depth(&mut self) -> Result<Frame<u16>, CameraError>;

    /// The next color and depth images.
    fn get_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError>;

    /// Like [`get_frames`](Self::get_frames), with depth reprojected into
    /// the color pixel grid where the device layer supports alignment.
    /// Backends without alignment return unaligned frames.
    fn get_aligned_frames(&mut self) -> Result<(Frame<u8>, Frame<u16>), CameraError>;

    /// Release the device so another process can use it. A second call
    /// reports [`CameraError::Teardown`] without crashing; dropping the
    /// adapter performs a best-effort release.
    fn close(&mut self) -> Result<(), CameraError>;
}
