//! Keyframe animations

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::foundation::collections::EntityId;
use crate::foundation::time::DEFAULT_FPS;
use crate::foundation::value::{ImageRef, Value};
use crate::scene::Scene;

use super::easing::{self, Easing, Step};
use super::AnimationError;

/// Property name → value written when a frame or sample is applied
pub type State = IndexMap<String, Value>;

/// Shortest frame duration, one display frame
pub const MIN_FRAME_DURATION: f32 = 1.0 / DEFAULT_FPS;

/// One keyframe
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Properties this frame sets
    pub state: State,
    /// Seconds until the next frame
    pub duration: f32,
}

impl Frame {
    /// Frame setting one property
    pub fn new(property: impl Into<String>, value: impl Into<Value>, duration: f32) -> Self {
        let mut state = State::new();
        state.insert(property.into(), value.into());
        Self { state, duration }
    }

    /// Set one more property
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(property.into(), value.into());
        self
    }
}

/// Precomputed state at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds from the animation start
    pub time: f32,
    /// State at that time
    pub state: State,
}

/// A sequence of frames played over time
#[derive(Clone)]
pub struct Animation {
    frames: Vec<Frame>,
    easing: Rc<dyn Easing>,
    looping: bool,
    samples: Vec<Sample>,
    length: f32,
    elapsed: f32,
    current_frame: Option<usize>,
    next_frame: Option<usize>,
    paused: bool,
    finished: bool,
}

impl Animation {
    /// Build an animation and precompute its samples
    pub fn new(frames: Vec<Frame>, easing: impl Easing, looping: bool) -> Result<Self, AnimationError> {
        Self::with_easing(frames, Rc::new(easing), looping)
    }

    /// Build an animation from a shared easing
    pub fn with_easing(frames: Vec<Frame>, easing: Rc<dyn Easing>, looping: bool) -> Result<Self, AnimationError> {
        if frames.is_empty() {
            return Err(AnimationError::NoFrames);
        }
        for (index, frame) in frames.iter().enumerate() {
            if frame.state.is_empty() {
                return Err(AnimationError::EmptyFrame(index));
            }
            if frame.duration < MIN_FRAME_DURATION - f32::EPSILON {
                return Err(AnimationError::FrameTooShort {
                    index,
                    duration: frame.duration,
                });
            }
        }
        easing::validate(easing.as_ref())?;

        let samples = if easing.is_step() {
            step_samples(&frames)
        } else {
            interpolated_samples(&frames, easing.as_ref(), looping)
        };
        let length = frames.iter().map(|f| f.duration).sum();
        let mut animation = Self {
            frames,
            easing,
            looping,
            samples,
            length,
            elapsed: 0.0,
            current_frame: None,
            next_frame: None,
            paused: false,
            finished: false,
        };
        animation.restart();
        Ok(animation)
    }

    /// Step animation showing `images` one after another on `property`
    pub fn from_sequence(
        images: Vec<ImageRef>,
        frame_duration: f32,
        looping: bool,
        property: &str,
    ) -> Result<Self, AnimationError> {
        let frames = images
            .into_iter()
            .map(|image| Frame::new(property, image, frame_duration))
            .collect();
        Self::new(frames, Step, looping)
    }

    /// Step animation over the cells of a sprite sheet, row-major
    #[allow(clippy::too_many_arguments)]
    pub fn from_spritesheet(
        sheet: &ImageRef,
        sheet_size: (u32, u32),
        columns: u32,
        rows: u32,
        frame_duration: f32,
        looping: bool,
        property: &str,
    ) -> Result<Self, AnimationError> {
        Self::from_sequence(sheet.slice(sheet_size, columns, rows), frame_duration, looping, property)
    }

    /// Keyframes
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Precomputed samples
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Seconds for one pass
    pub const fn length(&self) -> f32 {
        self.length
    }

    /// Whether playback wraps around
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the easing holds frames
    pub fn is_step(&self) -> bool {
        self.easing.is_step()
    }

    /// Index of the last applied sample
    pub const fn current_frame(&self) -> Option<usize> {
        self.current_frame
    }

    /// Index of the sample the next `play` applies
    pub const fn next_frame(&self) -> Option<usize> {
        self.next_frame
    }

    /// Whether a non-looping animation reached its end
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether playback is paused
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Rewind to the first sample
    pub fn restart(&mut self) {
        self.elapsed = 0.0;
        self.current_frame = None;
        self.next_frame = Some(0);
        self.finished = false;
        self.paused = false;
    }

    /// Stop advancing
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume advancing
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Return the state of the next sample, then advance by `dt` seconds.
    /// Returns `None` while paused or once finished.
    pub fn play(&mut self, dt: f32) -> Option<State> {
        if self.paused || self.finished {
            return None;
        }
        let index = self.next_frame?;
        let state = self.samples.get(index)?.state.clone();
        self.current_frame = Some(index);
        self.elapsed += dt.max(0.0);

        let last = self.samples.len() - 1;
        if index == last && self.elapsed >= self.length {
            if self.looping && self.length > 0.0 {
                self.elapsed %= self.length;
                self.next_frame = Some(self.sample_at(self.elapsed));
            } else {
                self.finished = true;
                self.next_frame = None;
            }
        } else {
            self.next_frame = Some(self.sample_at(self.elapsed));
        }
        Some(state)
    }

    /// Play one step and write the state onto `entity`
    pub fn play_on(&mut self, scene: &mut Scene, entity: EntityId, dt: f32) -> bool {
        match self.play(dt) {
            Some(state) => {
                apply_state(scene, entity, &state);
                true
            }
            None => false,
        }
    }

    fn sample_at(&self, time: f32) -> usize {
        self.samples
            .partition_point(|sample| sample.time <= time)
            .saturating_sub(1)
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("frames", &self.frames.len())
            .field("samples", &self.samples.len())
            .field("length", &self.length)
            .field("looping", &self.looping)
            .field("next_frame", &self.next_frame)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Write every entry of `state` onto `entity`. Returns how many were accepted.
pub fn apply_state(scene: &mut Scene, entity: EntityId, state: &State) -> usize {
    state
        .iter()
        .filter(|(name, value)| {
            let accepted = scene.apply_property(entity, name, value);
            if !accepted {
                log::trace!("property '{name}' not accepted by {entity:?}");
            }
            accepted
        })
        .count()
}

fn step_samples(frames: &[Frame]) -> Vec<Sample> {
    let mut time = 0.0;
    frames
        .iter()
        .map(|frame| {
            let sample = Sample {
                time,
                state: frame.state.clone(),
            };
            time += frame.duration;
            sample
        })
        .collect()
}

fn interpolated_samples(frames: &[Frame], easing: &dyn Easing, looping: bool) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut start = 0.0;
    for (index, frame) in frames.iter().enumerate() {
        let target = match frames.get(index + 1) {
            Some(next) => next,
            None if looping => &frames[0],
            None => {
                samples.push(Sample {
                    time: start,
                    state: frame.state.clone(),
                });
                break;
            }
        };
        // Whole display frames only; the tail of a frame is covered by the next one.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((frame.duration * DEFAULT_FPS).round() as usize).max(1);
        for step in 0..steps {
            #[allow(clippy::cast_precision_loss)]
            let local = step as f32 / DEFAULT_FPS;
            let factor = f64::from(easing.compute((local / frame.duration).min(1.0)));
            let state = frame
                .state
                .iter()
                .map(|(name, value)| {
                    let value = match target.state.get(name) {
                        Some(to) if value.is_interpolatable() => value.lerp(to, factor),
                        _ => value.clone(),
                    };
                    (name.clone(), value)
                })
                .collect();
            samples.push(Sample {
                time: start + local,
                state,
            });
        }
        start += frame.duration;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::easing::Linear;
    use crate::foundation::math::Vector;
    use approx::assert_abs_diff_eq;

    fn bounce(looping: bool) -> Animation {
        Animation::new(
            vec![
                Frame::new("position", Vector::new(0.0, 1.0), 1.0),
                Frame::new("position", Vector::new(0.0, -1.0), 0.3),
            ],
            Linear,
            looping,
        )
        .expect("valid animation")
    }

    #[test]
    fn test_step_samples_match_frames() {
        let frames = vec![
            Frame::new("frame", 0, 0.5),
            Frame::new("frame", 1, 0.25),
            Frame::new("frame", 2, 0.25),
        ];
        let animation = Animation::new(frames, Step, false).expect("valid");
        assert_eq!(animation.samples().len(), animation.frames().len());
        let total: f32 = animation.frames().iter().map(|f| f.duration).sum();
        assert_abs_diff_eq!(animation.length(), total);
        assert_abs_diff_eq!(animation.samples()[2].time, 0.75);
    }

    #[test]
    fn test_linear_plays_to_last_frame() {
        let mut animation = bounce(false);
        assert_abs_diff_eq!(animation.length(), 1.3, epsilon = 0.16);
        let first = animation.play(1.0 / 60.0).expect("first sample");
        assert_eq!(first.get("position"), Some(&Value::Vector(Vector::new(0.0, 1.0))));

        let mut last = None;
        let mut guard = 0;
        while !animation.is_finished() && guard < 1000 {
            if let Some(state) = animation.play(1.0 / 60.0) {
                last = Some(state);
            }
            guard += 1;
        }
        assert!(animation.is_finished());
        assert_eq!(animation.next_frame(), None);
        let position = last.and_then(|s| s.get("position").and_then(Value::as_vector));
        assert_eq!(position, Some(Vector::new(0.0, -1.0)));
    }

    #[test]
    fn test_loop_wraps_instead_of_finishing() {
        let mut animation = bounce(true);
        for _ in 0..200 {
            animation.play(1.0 / 60.0);
        }
        assert!(!animation.is_finished());
        assert!(animation.next_frame().is_some());
    }

    #[test]
    fn test_pause_and_restart() {
        let mut animation = bounce(false);
        animation.play(0.5);
        animation.pause();
        assert!(animation.play(0.1).is_none());
        animation.restart();
        assert_eq!(animation.next_frame(), Some(0));
        assert!(animation.play(0.1).is_some());
    }

    #[test]
    fn test_invalid_frames_rejected() {
        assert!(matches!(
            Animation::new(Vec::new(), Linear, false),
            Err(AnimationError::NoFrames)
        ));
        assert!(matches!(
            Animation::new(vec![Frame::new("a", 1, 0.001)], Linear, false),
            Err(AnimationError::FrameTooShort { index: 0, .. })
        ));
    }

    #[test]
    fn test_spritesheet_slices_cells() {
        let sheet = ImageRef::new("hero.png");
        let animation =
            Animation::from_spritesheet(&sheet, (64, 32), 4, 2, 0.1, true, "image").expect("valid");
        assert_eq!(animation.frames().len(), 8);
        let second = animation.frames()[1].state.get("image");
        assert_eq!(
            second,
            Some(&Value::Image(ImageRef {
                name: "hero.png".into(),
                region: Some([16, 0, 16, 16]),
            }))
        );
    }
}
