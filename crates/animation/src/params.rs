use serde::{Deserialize, Serialize};

use crate::{Angle, Interpolate};

/// The animated color-correction state: a circular hue plus a linear
/// saturation. This is the value type of the hue/saturation parameter
/// track; the host persists it as `{"hueRadians": .., "saturation": ..}`
/// alongside each keyframe's time, and that shape round-trips exactly
/// (hue is subject only to the documented `[0, 2π)` normalization).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueSaturation {
    #[serde(rename = "hueRadians")]
    pub hue: Angle,
    pub saturation: f64,
}

impl HueSaturation {
    pub fn new(hue: Angle, saturation: f64) -> Self {
        Self { hue, saturation }
    }

    /// Final per-frame values handed to rendering. Saturation is clamped
    /// into `[0, 1]` here and nowhere earlier, so interpolation between
    /// keyframes stays smooth even if host data overshoots the range.
    pub fn resolve(&self) -> ColorCorrection {
        ColorCorrection {
            hue_radians: self.hue.radians() as f32,
            saturation: self.saturation.clamp(0.0, 1.0) as f32,
        }
    }
}

impl Default for HueSaturation {
    /// The plugin's registration default: a 30° warm shift at half
    /// saturation.
    fn default() -> Self {
        Self {
            hue: Angle::from_degrees(30.0),
            saturation: 0.5,
        }
    }
}

impl Interpolate for HueSaturation {
    /// Hue blends along the shortest arc, saturation linearly. No clamping
    /// happens here; see [`HueSaturation::resolve`].
    fn interpolate(&self, toward: &Self, t: f64) -> Self {
        Self {
            hue: self.hue.interpolate(&toward.hue, t),
            saturation: self.saturation.interpolate(&toward.saturation, t),
        }
    }
}

/// Resolved, render-ready correction values. Constructed fresh per render
/// request; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCorrection {
    pub hue_radians: f32,
    pub saturation: f32,
}

/// The animated brightness scalar, the value type of the brightness track.
/// A named-field struct rather than a bare `f64` so keyframes flatten to
/// `{"time": .., "brightness": ..}` on the wire like the hue/saturation
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brightness {
    pub brightness: f64,
}

impl Brightness {
    pub fn new(brightness: f64) -> Self {
        Self { brightness }
    }

    /// Render-ready value for the one-float brightness uniform.
    pub fn resolve(&self) -> f32 {
        self.brightness as f32
    }
}

impl Default for Brightness {
    /// The registration default: no adjustment.
    fn default() -> Self {
        Self { brightness: 1.0 }
    }
}

impl Interpolate for Brightness {
    fn interpolate(&self, toward: &Self, t: f64) -> Self {
        Self {
            brightness: self.brightness.interpolate(&toward.brightness, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Keyframe, ParameterTrack};

    #[test]
    fn hue_wraps_while_saturation_stays_linear() {
        let a = HueSaturation::new(Angle::from_degrees(350.0), 0.2);
        let b = HueSaturation::new(Angle::from_degrees(10.0), 0.8);
        let mid = a.interpolate(&b, 0.5);
        assert!(mid.hue.degrees().abs() < 1e-9 || (mid.hue.degrees() - 360.0).abs() < 1e-9);
        assert!((mid.saturation - 0.5).abs() < 1e-9);
    }

    #[test]
    fn resolve_clamps_saturation_only_at_the_end() {
        let a = HueSaturation::new(Angle::from_degrees(0.0), -0.5);
        let b = HueSaturation::new(Angle::from_degrees(0.0), 1.5);
        let mid = a.interpolate(&b, 0.5);
        // Interpolation itself preserves the raw values.
        assert!((mid.saturation - 0.5).abs() < 1e-9);
        assert_eq!(a.resolve().saturation, 0.0);
        assert_eq!(b.resolve().saturation, 1.0);
    }

    #[test]
    fn keyframe_wire_shape_round_trips() {
        let track = ParameterTrack::with_keyframes(
            HueSaturation::default(),
            [
                Keyframe {
                    time: 0,
                    value: HueSaturation::new(Angle::from_degrees(350.0), 0.25),
                },
                Keyframe {
                    time: 48,
                    value: HueSaturation::new(Angle::from_degrees(10.0), 0.75),
                },
            ],
        );

        let json = serde_json::to_string(&track).unwrap();
        assert!(json.contains("\"hueRadians\""));
        assert!(json.contains("\"time\""));

        let back: ParameterTrack<HueSaturation> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keyframes().len(), track.keyframes().len());
        for (orig, round) in track.keyframes().iter().zip(back.keyframes()) {
            assert_eq!(orig.time, round.time);
            assert_eq!(orig.value.hue, round.value.hue);
            assert_eq!(orig.value.saturation, round.value.saturation);
        }
    }

    #[test]
    fn brightness_track_round_trips() {
        let track = ParameterTrack::with_keyframes(
            Brightness::default(),
            [
                Keyframe {
                    time: 0,
                    value: Brightness::new(1.0),
                },
                Keyframe {
                    time: 24,
                    value: Brightness::new(2.5),
                },
            ],
        );

        let json = serde_json::to_string(&track).unwrap();
        assert!(json.contains("\"brightness\""));

        let back: ParameterTrack<Brightness> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keyframes(), track.keyframes());
        assert!((back.value_at(12).unwrap().brightness - 1.75).abs() < 1e-9);
    }
}
