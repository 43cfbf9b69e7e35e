/// Keyframed parameter tracks and the interpolation engine.
///
/// A track owns a time-sorted sequence of keyframes for one parameter and
/// evaluates it at any frame. The bracketing logic is shared across all
/// parameter domains; only the blend differs, supplied by the value type's
/// [`Interpolate`] implementation (linear for scalars, shortest-arc for
/// angles).
use serde::{Deserialize, Serialize};

use crate::{AnimationError, Frame};

/// Domain-specific blend between two keyframe values.
///
/// `t` is the normalized position in `[0, 1]` between the bracketing
/// keyframes. Implementations must return `self` at `t = 0` and `toward`
/// at `t = 1` exactly.
pub trait Interpolate: Clone {
    fn interpolate(&self, toward: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, toward: &Self, t: f64) -> Self {
        self + (toward - self) * t
    }
}

/// A (time, value) anchor on a parameter track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: Frame,
    #[serde(flatten)]
    pub value: T,
}

/// An animated parameter: zero or more keyframes plus a default used when
/// the track is empty. Keyframes are kept sorted by time with unique times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterTrack<T> {
    default: T,
    keyframes: Vec<Keyframe<T>>,
}

impl<T: Interpolate> ParameterTrack<T> {
    pub fn new(default: T) -> Self {
        Self {
            default,
            keyframes: Vec::new(),
        }
    }

    pub fn with_keyframes(default: T, keyframes: impl IntoIterator<Item = Keyframe<T>>) -> Self {
        let mut track = Self::new(default);
        for kf in keyframes {
            track.set_keyframe(kf);
        }
        track
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Insert a keyframe, replacing any existing keyframe at the same time
    /// and keeping the sequence sorted.
    pub fn set_keyframe(&mut self, keyframe: Keyframe<T>) {
        self.keyframes.retain(|kf| kf.time != keyframe.time);
        self.keyframes.push(keyframe);
        self.keyframes.sort_by_key(|kf| kf.time);
    }

    pub fn remove_keyframe(&mut self, time: Frame) -> Option<Keyframe<T>> {
        self.keyframes
            .iter()
            .position(|kf| kf.time == time)
            .map(|idx| self.keyframes.remove(idx))
    }

    pub fn keyframe_at(&self, time: Frame) -> Option<&Keyframe<T>> {
        self.keyframes.iter().find(|kf| kf.time == time)
    }

    /// The frame span covered by keyframes, if any.
    pub fn time_range(&self) -> Option<(Frame, Frame)> {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    /// Evaluate the track at `time`.
    ///
    /// An empty track yields the default value. Queries before the first
    /// keyframe or after the last hold the boundary value; there is no
    /// extrapolation. Between two keyframes the value type's blend is
    /// applied at the normalized position. Two keyframes sharing a time
    /// would divide by zero; the insertion invariant prevents it, but it is
    /// still checked and surfaced as [`AnimationError::DegenerateInterval`]
    /// because it means the track data is corrupt.
    pub fn value_at(&self, time: Frame) -> Result<T, AnimationError> {
        match self.bracket(time) {
            Bracket::Empty => Ok(self.default.clone()),
            Bracket::Boundary(kf) | Bracket::Exact(kf) => Ok(kf.value.clone()),
            Bracket::Between(left, right) => {
                let span = right.time - left.time;
                if span <= 0 {
                    return Err(AnimationError::DegenerateInterval(left.time));
                }
                let t = (time - left.time) as f64 / span as f64;
                Ok(left.value.interpolate(&right.value, t))
            }
        }
    }

    fn bracket(&self, time: Frame) -> Bracket<'_, T> {
        let keyframes = &self.keyframes;
        let (first, last) = match (keyframes.first(), keyframes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Bracket::Empty,
        };

        if time <= first.time {
            return Bracket::Boundary(first);
        }
        if time >= last.time {
            return Bracket::Boundary(last);
        }

        // partition_point: index of the first keyframe with time > `time`.
        let idx = keyframes.partition_point(|kf| kf.time <= time);
        let left = &keyframes[idx - 1];
        if left.time == time {
            return Bracket::Exact(left);
        }
        Bracket::Between(left, &keyframes[idx])
    }
}

/// Where a query time falls relative to the keyframe sequence.
enum Bracket<'a, T> {
    /// No keyframes at all.
    Empty,
    /// Before the first keyframe or after the last.
    Boundary(&'a Keyframe<T>),
    /// Exactly on a keyframe.
    Exact(&'a Keyframe<T>),
    /// Strictly between two adjacent keyframes.
    Between(&'a Keyframe<T>, &'a Keyframe<T>),
}
