use depthcam::convert::{
    apply_axis_calibration, extract_channel, normalize_intensity, scale_depth_units,
};
use depthcam::intrinsics::AxisCalibration;

#[test]
fn test_normalize_maps_extremes_to_full_range() {
    let normalized = normalize_intensity(&[500, 1000, 1500]);
    assert_eq!(normalized, vec![0, 128, 255]);
}

#[test]
fn test_normalize_is_per_call() {
    // The same sample lands on different output values depending on the
    // rest of the frame; the range is not globally calibrated.
    let bright = normalize_intensity(&[1000, 4000]);
    let dim = normalize_intensity(&[1000, 1001]);
    assert_eq!(bright[0], 0);
    assert_eq!(dim[0], 0);
    assert_eq!(bright[1], 255);
    assert_eq!(dim[1], 255);
}

#[test]
fn test_normalize_constant_input() {
    assert_eq!(normalize_intensity(&[777; 4]), vec![0; 4]);
}

#[test]
fn test_normalize_empty_input() {
    assert!(normalize_intensity(&[]).is_empty());
}

#[test]
fn test_extract_channel_deinterleaves() {
    // Two ABCY pixels
    let data = [1, 2, 3, 4, 10, 20, 30, 40];
    assert_eq!(extract_channel(&data, 4, 2), Some(vec![3, 30]));
    assert_eq!(extract_channel(&data, 4, 3), Some(vec![4, 40]));
}

#[test]
fn test_extract_channel_rejects_bad_layout() {
    let data = [1, 2, 3, 4, 5];
    assert_eq!(extract_channel(&data, 4, 0), None);
    assert_eq!(extract_channel(&data[..4], 4, 4), None);
    assert_eq!(extract_channel(&data[..4], 0, 0), None);
}

#[test]
fn test_axis_calibration_formula() {
    let calibration = AxisCalibration {
        scale: 0.25,
        offset: 50.0,
    };
    assert_eq!(
        apply_axis_calibration(&[0, 4, 4000], calibration),
        vec![50, 51, 1050]
    );
}

#[test]
fn test_axis_calibration_saturates() {
    let calibration = AxisCalibration {
        scale: 2.0,
        offset: 0.0,
    };
    assert_eq!(
        apply_axis_calibration(&[60000], calibration),
        vec![u16::MAX]
    );

    let negative = AxisCalibration {
        scale: 1.0,
        offset: -100.0,
    };
    assert_eq!(apply_axis_calibration(&[40], negative), vec![0]);
}

#[test]
fn test_scale_depth_units() {
    assert_eq!(scale_depth_units(&[0, 999, 1000, 2999], 1000), vec![0, 0, 1, 2]);
    assert_eq!(scale_depth_units(&[0, 999, 1000], 1), vec![0, 999, 1000]);
    // A zero divisor degrades to native units instead of dividing by zero
    assert_eq!(scale_depth_units(&[123], 0), vec![123]);
}
