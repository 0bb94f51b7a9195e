//! Per-frame sample conversions from vendor buffer layouts.

use crate::intrinsics::AxisCalibration;

/// Rescales raw intensity samples into the full 0–255 range.
///
/// Min-max normalization per call: the smallest sample maps to 0, the
/// largest to 255, values in between scale linearly and round to nearest.
/// A constant input maps to all zeros. The range is not calibrated against
/// any global reference, so absolute intensity is not comparable between
/// frames.
pub fn normalize_intensity(raw: &[u16]) -> Vec<u8> {
    let mut bounds = None;
    for &value in raw {
        bounds = match bounds {
            None => Some((value, value)),
            Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
        };
    }

    let (lo, hi) = match bounds {
        Some(b) => b,
        None => return Vec::new(),
    };

    if lo == hi {
        return vec![0; raw.len()];
    }

    let span = (hi - lo) as f64;
    raw.iter()
        .map(|&value| (((value - lo) as f64) * 255.0 / span).round() as u8)
        .collect()
}

/// Deinterleaves one channel out of an interleaved multi-channel buffer.
///
/// Returns `None` if `index` is out of range or the buffer length is not a
/// multiple of `channels`.
pub fn extract_channel(data: &[u16], channels: usize, index: usize) -> Option<Vec<u16>> {
    if channels == 0 || index >= channels || data.len() % channels != 0 {
        return None;
    }

    Some(data.iter().skip(index).step_by(channels).copied().collect())
}

/// Decodes raw sensor units into physical units:
/// `value = raw * scale + offset`, saturating back into `u16`.
pub fn apply_axis_calibration(raw: &[u16], calibration: AxisCalibration) -> Vec<u16> {
    raw.iter()
        .map(|&value| (f64::from(value) * calibration.scale + calibration.offset) as u16)
        .collect()
}

/// Integer unit conversion for depth samples.
///
/// `divisor` is 1000 for millimeter-to-meter conversion, 1 for native
/// units. Sub-unit precision is discarded.
pub fn scale_depth_units(raw: &[u16], divisor: u16) -> Vec<u16> {
    if divisor <= 1 {
        return raw.to_vec();
    }

    raw.iter().map(|&value| value / divisor).collect()
}
