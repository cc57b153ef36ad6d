use crate::animation::{AnimationChannel, AnimationClip, Track};
use rfw_math::*;

/// Values that can be blended between two keyframes.
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, u: f32) -> Self;
}

impl Interpolate for Vec3 {
    #[inline]
    fn interpolate(a: Self, b: Self, u: f32) -> Self {
        lerp_vec3(a, b, u)
    }
}

impl Interpolate for Quat {
    #[inline]
    fn interpolate(a: Self, b: Self, u: f32) -> Self {
        slerp_shortest(a, b, u)
    }
}

impl<T: Interpolate> Track<T> {
    /// Value at `time` seconds, `default` for an empty track. Times outside the keyed range
    /// hold the nearest end key.
    pub fn sample(&self, time: f32, default: T) -> T {
        let keys = self.keys();
        let (first, last) = match (keys.first(), keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return default,
        };

        if time.is_nan() || time <= first.time {
            return first.value;
        }

        if time >= last.time {
            return last.value;
        }

        // first.time < time < last.time, so both i and i + 1 are in range
        let i = keys.partition_point(|k| k.time <= time) - 1;
        let (a, b) = (&keys[i], &keys[i + 1]);
        let span = b.time - a.time;
        if span <= 0.0 {
            return a.value;
        }

        T::interpolate(a.value, b.value, (time - a.time) / span)
    }
}

impl AnimationChannel {
    /// Local transform of the target at `time`. Missing tracks contribute the identity.
    pub fn sample(&self, time: f32) -> Transform {
        Transform {
            translation: self.positions.sample(time, Vec3::ZERO),
            rotation: self.rotations.sample(time, Quat::IDENTITY),
            scale: self.scales.sample(time, Vec3::ONE),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChannelSample<'a> {
    pub target: &'a str,
    pub transform: Transform,
}

impl AnimationClip {
    /// Maps an arbitrary playback time into the clip: wrapped into `[0, duration)` for looping
    /// clips, clamped to `[0, duration]` otherwise.
    pub fn normalize_time(&self, time: f32) -> f32 {
        if !time.is_finite() || !self.duration.is_finite() || self.duration <= 0.0 {
            return 0.0;
        }

        if self.looping {
            // rem_euclid rounds tiny negative times up to exactly `duration`
            let time = time.rem_euclid(self.duration);
            if time >= self.duration {
                0.0
            } else {
                time
            }
        } else {
            time.clamp(0.0, self.duration)
        }
    }

    pub fn sample(&self, time: f32) -> Vec<ChannelSample<'_>> {
        let mut out = Vec::with_capacity(self.channels.len());
        self.sample_into(time, &mut out);
        out
    }

    /// Like [`AnimationClip::sample`] but reuses `out`, which is cleared first.
    pub fn sample_into<'a>(&'a self, time: f32, out: &mut Vec<ChannelSample<'a>>) {
        let time = self.normalize_time(time);
        out.clear();
        out.extend(self.channels.iter().map(|c| ChannelSample {
            target: c.target.as_str(),
            transform: c.sample(time),
        }));
    }
}
