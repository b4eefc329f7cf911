//! Numeric helpers shared by the normalizers.

/// Clamp a value into the unit interval `[0, 1]`.
///
/// NaN maps to `0.0` so a bad value can never escape the interval.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = 10f64.powi(decimals as i32);
    ((value as f64 * factor).round() / factor) as f32
}
