use crate::settings::ImportSettings;
use crate::source::{SourceAnimation, SourceKey};
use rfw_math::*;
use rfw_utils::log;
use std::cmp::Ordering;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Keyframe<T> {
    /// Seconds since the start of the clip.
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Keyframes sorted by strictly increasing time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    keys: Vec<Keyframe<T>>,
}

impl<T> Default for Track<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<T: Copy> Track<T> {
    /// Sorts `keys` by time (stable) and collapses equal times into the key authored last.
    /// Returns the track and the number of keys removed as duplicates.
    pub fn from_keys(mut keys: Vec<Keyframe<T>>) -> (Self, usize) {
        keys.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));

        let mut duplicates = 0;
        let mut unique: Vec<Keyframe<T>> = Vec::with_capacity(keys.len());
        for key in keys.into_iter() {
            match unique.last_mut() {
                Some(last) if last.time == key.time => {
                    *last = key;
                    duplicates += 1;
                }
                _ => unique.push(key),
            }
        }

        (Self { keys: unique }, duplicates)
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        self.keys.as_slice()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first(&self) -> Option<&Keyframe<T>> {
        self.keys.first()
    }

    pub fn last(&self) -> Option<&Keyframe<T>> {
        self.keys.last()
    }

    pub fn end_time(&self) -> f32 {
        self.keys.last().map(|k| k.time).unwrap_or(0.0)
    }
}

/// Animated transform of a single node. The three tracks keep their own key times.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationChannel {
    /// Name of the animated node.
    pub target: String,
    pub positions: Track<Vec3>,
    pub rotations: Track<Quat>,
    pub scales: Track<Vec3>,
}

impl AnimationChannel {
    pub fn end_time(&self) -> f32 {
        self.positions
            .end_time()
            .max(self.rotations.end_time())
            .max(self.scales.end_time())
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.rotations.is_empty() && self.scales.is_empty()
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds.
    pub duration: f32,
    pub ticks_per_second: f64,
    pub looping: bool,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    pub fn channel<S: AsRef<str>>(&self, target: S) -> Option<&AnimationChannel> {
        let target = target.as_ref();
        self.channels.iter().find(|c| c.target == target)
    }
}

/// Clips in source order with a name lookup. Duplicate names resolve to the first clip.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct AnimationCollection {
    clips: Vec<AnimationClip>,
    lookup: HashMap<String, usize>,
}

impl AnimationCollection {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        let mut lookup = HashMap::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            if lookup.contains_key(&clip.name) {
                log::warn!(
                    "animation name \"{}\" is used more than once, lookups return the first",
                    clip.name
                );
                continue;
            }
            lookup.insert(clip.name.clone(), i);
        }

        Self { clips, lookup }
    }

    pub fn get(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }

    pub fn get_by_name<S: AsRef<str>>(&self, name: S) -> Option<&AnimationClip> {
        self.lookup
            .get(name.as_ref())
            .and_then(|i| self.clips.get(*i))
    }

    pub fn index_of<S: AsRef<str>>(&self, name: S) -> Option<usize> {
        self.lookup.get(name.as_ref()).copied()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnimationClip> {
        self.clips.iter()
    }
}

#[derive(Debug, Default)]
struct KeyFixups {
    non_finite: usize,
    duplicates: usize,
}

#[derive(Default)]
struct RawChannel<'a> {
    positions: Vec<&'a SourceKey<Vec3>>,
    rotations: Vec<&'a SourceKey<Quat>>,
    scales: Vec<&'a SourceKey<Vec3>>,
}

fn build_track<T: Copy>(
    keys: &[&SourceKey<T>],
    ticks_per_second: f64,
    prepare: impl Fn(T) -> T,
    is_finite: impl Fn(&T) -> bool,
    fixups: &mut KeyFixups,
) -> Track<T> {
    let mut timed: Vec<(f64, T)> = Vec::with_capacity(keys.len());
    for key in keys.iter() {
        let seconds = key.time_ticks / ticks_per_second;
        let value = prepare(key.value);
        if !(seconds as f32).is_finite() || !is_finite(&value) {
            fixups.non_finite += 1;
            continue;
        }

        timed.push((seconds, value));
    }

    // Order on the full-precision time so keys that only collide after the cast to f32
    // resolve to the later one in time, not the later one authored.
    timed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let frames = timed
        .into_iter()
        .map(|(seconds, value)| Keyframe::new(seconds as f32, value))
        .collect();

    let (track, duplicates) = Track::from_keys(frames);
    fixups.duplicates += duplicates;
    track
}

/// Converts one source animation into a clip timed in seconds.
///
/// `index` names clips that carry no name of their own.
pub fn extract_clip(
    source: &SourceAnimation,
    index: usize,
    settings: &ImportSettings,
) -> AnimationClip {
    let name = if source.name.is_empty() {
        format!("clip{}", index)
    } else {
        source.name.clone()
    };

    let ticks_per_second = if source.ticks_per_second.is_finite() && source.ticks_per_second > 0.0
    {
        source.ticks_per_second
    } else {
        log::warn!(
            "animation \"{}\" has invalid ticks per second ({}), using {}",
            name,
            source.ticks_per_second,
            settings.default_ticks_per_second
        );
        settings.default_ticks_per_second
    };

    // Channels for the same node are merged, in order of first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut raw: HashMap<&str, RawChannel> = HashMap::new();
    for channel in source.channels.iter() {
        let entry = raw.entry(channel.node_name.as_str()).or_insert_with(|| {
            order.push(channel.node_name.as_str());
            RawChannel::default()
        });
        entry.positions.extend(channel.position_keys.iter());
        entry.rotations.extend(channel.rotation_keys.iter());
        entry.scales.extend(channel.scale_keys.iter());
    }

    if order.len() < source.channels.len() {
        log::warn!(
            "animation \"{}\": merged {} channels that target an already animated node",
            name,
            source.channels.len() - order.len()
        );
    }

    let mut fixups = KeyFixups::default();
    let channels: Vec<AnimationChannel> = order
        .iter()
        .filter_map(|target| raw.get(target).map(|r| (*target, r)))
        .map(|(target, r)| AnimationChannel {
            target: target.to_string(),
            positions: build_track(
                r.positions.as_slice(),
                ticks_per_second,
                |v| v,
                |v| v.is_finite(),
                &mut fixups,
            ),
            rotations: build_track(
                r.rotations.as_slice(),
                ticks_per_second,
                |q| q.normalize(),
                |q| q.is_finite(),
                &mut fixups,
            ),
            scales: build_track(
                r.scales.as_slice(),
                ticks_per_second,
                |v| v,
                |v| v.is_finite(),
                &mut fixups,
            ),
        })
        .collect();

    if fixups.non_finite > 0 {
        log::warn!(
            "animation \"{}\": dropped {} keys with a non-finite time or value",
            name,
            fixups.non_finite
        );
    }

    if fixups.duplicates > 0 {
        log::warn!(
            "animation \"{}\": collapsed {} keys sharing a timestamp, kept the last authored",
            name,
            fixups.duplicates
        );
    }

    let mut duration = (source.duration_ticks / ticks_per_second) as f32;
    if !duration.is_finite() || duration <= 0.0 {
        duration = channels
            .iter()
            .map(AnimationChannel::end_time)
            .fold(0.0, f32::max);
    }

    AnimationClip {
        name,
        duration,
        ticks_per_second,
        looping: settings.loop_animations,
        channels,
    }
}

pub fn extract_animations(
    animations: &[SourceAnimation],
    settings: &ImportSettings,
) -> AnimationCollection {
    AnimationCollection::new(
        animations
            .iter()
            .enumerate()
            .map(|(i, a)| extract_clip(a, i, settings))
            .collect(),
    )
}
