use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::track::Interpolate;

/// A hue angle on the circle, stored normalized to `[0, 2π)`.
///
/// Arithmetic between two angles always works on the shortest arc, so
/// interpolating from 350° to 10° passes through 0°, never backward through
/// 180°. Values are immutable; operations return new angles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Angle {
    radians: f64,
}

impl From<f64> for Angle {
    fn from(radians: f64) -> Self {
        Angle::normalize(radians)
    }
}

impl From<Angle> for f64 {
    fn from(angle: Angle) -> f64 {
        angle.radians
    }
}

impl Angle {
    /// Map any real value into `[0, 2π)`. Negative inputs land in range;
    /// the result is never negative and never equal to 2π.
    pub fn normalize(radians: f64) -> Self {
        let mut r = radians.rem_euclid(TAU);
        // rem_euclid can round to exactly TAU for tiny negative inputs.
        if r >= TAU {
            r = 0.0;
        }
        Self { radians: r }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::normalize(degrees.to_radians())
    }

    pub fn radians(self) -> f64 {
        self.radians
    }

    pub fn degrees(self) -> f64 {
        self.radians.to_degrees()
    }

    /// Signed shortest angular difference from `self` to `other`, wrapped
    /// into `(−π, π]`. Antipodal angles sit exactly on the boundary and
    /// deliberately map to `+π`, so ambiguous interpolation rotates in the
    /// positive (counter-clockwise) direction.
    pub fn shortest_arc_to(self, other: Angle) -> f64 {
        let mut d = (other.radians - self.radians).rem_euclid(TAU);
        if d > PI {
            d -= TAU;
        }
        d
    }

    /// Circular interpolation along the shortest arc. `t` in `[0, 1]`;
    /// `t = 0` returns `self` exactly and `t = 1` returns `other` exactly.
    pub fn lerp(self, other: Angle, t: f64) -> Angle {
        if t >= 1.0 {
            return other;
        }
        let d = self.shortest_arc_to(other);
        Angle::normalize(self.radians + t * d)
    }
}

impl Interpolate for Angle {
    fn interpolate(&self, toward: &Self, t: f64) -> Self {
        self.lerp(*toward, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn normalizes_into_range() {
        for raw in [-7.5, -TAU, -1e-17, 0.0, 1.0, TAU, TAU + 0.25, 123.456] {
            let a = Angle::normalize(raw);
            assert!(a.radians() >= 0.0 && a.radians() < TAU, "out of range: {raw}");
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [-3.0, -1e-17, 0.1, 9.9, 100.0] {
            let once = Angle::normalize(raw);
            let twice = Angle::normalize(once.radians());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = Angle::from_degrees(350.0);
        let b = Angle::from_degrees(10.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn interpolates_across_the_wrap_boundary() {
        // 350° → 10° takes the short arc through 0°, not through 180°.
        let mid = Angle::from_degrees(350.0).lerp(Angle::from_degrees(10.0), 0.5);
        assert!(mid.degrees().abs() < EPS || (mid.degrees() - 360.0).abs() < EPS);
    }

    #[test]
    fn interpolates_antipodal_angles_positively() {
        // Exactly opposite angles are ambiguous; the convention is to
        // rotate counter-clockwise, so 0° → 180° passes through 90°.
        let mid = Angle::from_degrees(0.0).lerp(Angle::from_degrees(180.0), 0.5);
        assert!((mid.degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn shortest_arc_is_signed() {
        let d = Angle::from_degrees(10.0).shortest_arc_to(Angle::from_degrees(350.0));
        assert!((d.to_degrees() + 20.0).abs() < 1e-9);
    }
}
