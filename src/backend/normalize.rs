//! Raw-unit conversions shared by native sources
//!
//! Sources hand drivers signed stick values in `[-1, 1]` and triggers in
//! `[0, 1]`. Deadzones are not applied here; the input component owns them.
//!
//! Native APIs disagree on stick geometry: some report a square (corners reach
//! (1, 1)), some a concave diamond, some already a circle. [`StickShape`]
//! selects the transform that maps a source's geometry onto the unit circle.

/// XInput triggers report 0-255; below this the reading is sensor noise
pub const XINPUT_TRIGGER_NOISE_FLOOR: u8 = 30;

/// Geometry a source's stick values form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StickShape {
    /// Already circular, only clamp overshoot
    #[default]
    Circle,
    /// Corners reach (1, 1); shrink diagonals
    Square,
    /// Diagonals pulled inward; expand them
    Astroid,
}

impl StickShape {
    pub fn to_circle(self, x: f32, y: f32) -> (f32, f32) {
        match self {
            StickShape::Circle => radial_clamp(x, y),
            StickShape::Square => square_to_circle(x, y),
            StickShape::Astroid => astroid_to_circle(x, y),
        }
    }
}

/// Map a signed 16-bit stick pair to `[-1, 1]`, preserving direction
///
/// Uses 32768 as full scale on both sides so `i16::MIN` maps to exactly -1
/// and the result is clamped to the unit circle.
pub fn stick_from_i16(raw_x: i16, raw_y: i16) -> (f32, f32) {
    const FULL_SCALE: f32 = 32768.0;
    let x = (raw_x as f32 / FULL_SCALE).clamp(-1.0, 1.0);
    let y = (raw_y as f32 / FULL_SCALE).clamp(-1.0, 1.0);
    radial_clamp(x, y)
}

/// Map a square to the unit circle: scale = max(|x|, |y|) / magnitude
///
/// - (0, 1) stays (0, 1)
/// - (1, 1) becomes (0.707, 0.707)
pub fn square_to_circle(x: f32, y: f32) -> (f32, f32) {
    let magnitude = (x * x + y * y).sqrt();

    if magnitude < 0.0001 {
        return (0.0, 0.0);
    }

    let max_axis = x.abs().max(y.abs());
    let scale = max_axis / magnitude;

    (x * scale, y * scale)
}

/// Scale points outside the unit circle back onto it; interior points are untouched
pub fn radial_clamp(x: f32, y: f32) -> (f32, f32) {
    let magnitude = (x * x + y * y).sqrt();

    if magnitude <= 1.0 {
        (x, y)
    } else {
        (x / magnitude, y / magnitude)
    }
}

/// Inverse of [`square_to_circle`]: expand diagonals outward, clamped to the unit circle
pub fn astroid_to_circle(x: f32, y: f32) -> (f32, f32) {
    let magnitude = (x * x + y * y).sqrt();
    let max_axis = x.abs().max(y.abs());

    if magnitude < 0.0001 || max_axis < 0.0001 {
        return (0.0, 0.0);
    }

    let scale = magnitude / max_axis;
    radial_clamp(x * scale, y * scale)
}

/// XInput trigger (0-255) to `[0, 1]`, dropping the noise floor
pub fn trigger_from_u8(value: u8) -> f32 {
    if value < XINPUT_TRIGGER_NOISE_FLOOR {
        return 0.0;
    }
    let adjusted = value - XINPUT_TRIGGER_NOISE_FLOOR;
    let range = 255 - XINPUT_TRIGGER_NOISE_FLOOR;
    adjusted as f32 / range as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stick_from_i16_extremes() {
        assert_eq!(stick_from_i16(0, 0), (0.0, 0.0));

        let (x, y) = stick_from_i16(i16::MIN, 0);
        assert_eq!((x, y), (-1.0, 0.0));

        let (x, _) = stick_from_i16(i16::MAX, 0);
        assert!((x - 1.0).abs() < 0.001);

        let (x, y) = stick_from_i16(i16::MAX, i16::MAX);
        assert!(((x * x + y * y).sqrt() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_square_to_circle_diagonal() {
        let (x, y) = square_to_circle(1.0, 1.0);
        let mag = (x * x + y * y).sqrt();
        assert!((mag - 1.0).abs() < 0.01, "Diagonal magnitude was {}", mag);

        let (x, y) = square_to_circle(0.0, 1.0);
        assert!(x.abs() < 0.001);
        assert!((y - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_astroid_expands_diagonals() {
        let (x, y) = astroid_to_circle(0.6, 0.6);
        assert!(x > 0.6 && y > 0.6);
        assert!((x * x + y * y).sqrt() <= 1.0 + 1e-6);
    }

    #[test]
    fn test_radial_clamp_keeps_interior() {
        assert_eq!(radial_clamp(0.5, 0.5), (0.5, 0.5));
        let (x, y) = StickShape::Circle.to_circle(1.0, 1.0);
        assert!(((x * x + y * y).sqrt() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_trigger_from_u8() {
        assert_eq!(trigger_from_u8(0), 0.0);
        assert_eq!(trigger_from_u8(29), 0.0);
        assert_eq!(trigger_from_u8(30), 0.0);
        assert!(trigger_from_u8(31) > 0.0);
        assert_eq!(trigger_from_u8(255), 1.0);
    }
}
