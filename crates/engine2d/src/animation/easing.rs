//! Easing curves
//!
//! An easing maps normalized progress `t` in `[0, 1]` to an interpolation
//! factor, also in `[0, 1]`.

use std::fmt;

use super::AnimationError;

/// Points checked when validating a curve
const VALIDATION_STEPS: u16 = 100;

/// Progress curve between two frames
pub trait Easing: 'static {
    /// Factor for progress `t`
    fn compute(&self, t: f32) -> f32;

    /// Frames are held rather than interpolated
    fn is_step(&self) -> bool {
        false
    }
}

/// Hold each frame for its whole duration
#[derive(Debug, Clone, Copy, Default)]
pub struct Step;

impl Easing for Step {
    fn compute(&self, _t: f32) -> f32 {
        0.0
    }

    fn is_step(&self) -> bool {
        true
    }
}

/// Constant speed
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Easing for Linear {
    fn compute(&self, t: f32) -> f32 {
        t
    }
}

/// Quadratic ease in-out
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadInOut;

impl Easing for QuadInOut {
    fn compute(&self, t: f32) -> f32 {
        if t < 0.5 {
            2.0 * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
        }
    }
}

/// User supplied curve
pub struct Custom<F>(pub F);

impl<F> Easing for Custom<F>
where
    F: Fn(f32) -> f32 + 'static,
{
    fn compute(&self, t: f32) -> f32 {
        (self.0)(t)
    }
}

impl<F> fmt::Debug for Custom<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Custom(..)")
    }
}

/// Reject curves that leave `[0, 1]` anywhere on `[0, 1]`
pub fn validate(easing: &dyn Easing) -> Result<(), AnimationError> {
    if easing.is_step() {
        return Ok(());
    }
    for i in 0..=VALIDATION_STEPS {
        let t = f32::from(i) / f32::from(VALIDATION_STEPS);
        let value = easing.compute(t);
        if !(0.0..=1.0).contains(&value) {
            return Err(AnimationError::InvalidEasing { t, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_curves_are_valid() {
        assert!(validate(&Step).is_ok());
        assert!(validate(&Linear).is_ok());
        assert!(validate(&QuadInOut).is_ok());
        assert_relative_eq!(QuadInOut.compute(0.5), 0.5);
    }

    #[test]
    fn test_overshooting_curve_is_rejected() {
        let overshoot = Custom(|t: f32| t * 1.5);
        assert!(matches!(
            validate(&overshoot),
            Err(AnimationError::InvalidEasing { .. })
        ));
    }
}
