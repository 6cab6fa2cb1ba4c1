//! Animation state machine component

use indexmap::IndexMap;
use log::debug;

use crate::ecs::Component;
use crate::foundation::condition::Condition;
use crate::foundation::value::Value;

use super::clip::{Animation, State};
use super::AnimationError;

/// Wildcard source state: the transition applies from any animation
pub const ANY: &str = "*";

#[derive(Debug, Clone)]
struct Transition {
    from: String,
    condition: Condition,
    to: String,
}

/// Outcome of one [`Animator::update`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatorStep {
    /// `(from, to)` when the animator switched animations
    pub changed: Option<(String, String)>,
    /// State to write onto the owner
    pub state: Option<State>,
}

/// Plays one of several named animations and switches between them when
/// field conditions hold
#[derive(Debug, Clone, Default)]
pub struct Animator {
    animations: IndexMap<String, Animation>,
    transitions: Vec<Transition>,
    fields: IndexMap<String, Value>,
    current: Option<String>,
    next: Option<String>,
}

impl Animator {
    /// Empty animator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an animation. The first one becomes current.
    pub fn add_animation(&mut self, name: impl Into<String>, animation: Animation) -> Result<(), AnimationError> {
        let name = name.into();
        if name == ANY {
            return Err(AnimationError::ReservedName(name));
        }
        if self.animations.contains_key(&name) {
            return Err(AnimationError::DuplicateAnimation(name));
        }
        if self.current.is_none() {
            self.current = Some(name.clone());
        }
        self.animations.insert(name, animation);
        Ok(())
    }

    /// Builder form of [`Animator::add_animation`]
    pub fn with_animation(mut self, name: impl Into<String>, animation: Animation) -> Result<Self, AnimationError> {
        self.add_animation(name, animation)?;
        Ok(self)
    }

    /// Register a field read by conditions
    pub fn add_field(&mut self, name: impl Into<String>, default: impl Into<Value>) -> Result<(), AnimationError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(AnimationError::DuplicateField(name));
        }
        self.fields.insert(name, default.into());
        Ok(())
    }

    /// Add `from → to` taken when `forward` holds, and `to → from` when
    /// `back` holds
    pub fn add_transition(
        &mut self,
        from: &str,
        to: &str,
        forward: Condition,
        back: Option<Condition>,
    ) -> Result<(), AnimationError> {
        if from != ANY && !self.animations.contains_key(from) {
            return Err(AnimationError::UnknownAnimation(from.to_string()));
        }
        if !self.animations.contains_key(to) {
            return Err(AnimationError::UnknownAnimation(to.to_string()));
        }
        self.check_fields(&forward)?;
        if let Some(back) = &back {
            if from == ANY {
                return Err(AnimationError::WildcardTarget);
            }
            self.check_fields(back)?;
        }

        self.transitions.push(Transition {
            from: from.to_string(),
            condition: forward,
            to: to.to_string(),
        });
        if let Some(back) = back {
            self.transitions.push(Transition {
                from: to.to_string(),
                condition: back,
                to: from.to_string(),
            });
        }
        Ok(())
    }

    fn check_fields(&self, condition: &Condition) -> Result<(), AnimationError> {
        match condition
            .fields()
            .into_iter()
            .find(|field| !self.fields.contains_key(*field))
        {
            Some(field) => Err(AnimationError::UnknownField(field.to_string())),
            None => Ok(()),
        }
    }

    /// Set a field and look for a transition whose condition reads it.
    /// Wildcard transitions are checked before those of the current animation.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), AnimationError> {
        let slot = self
            .fields
            .get_mut(field)
            .ok_or_else(|| AnimationError::UnknownField(field.to_string()))?;
        *slot = value.into();

        let Some(current) = self.current.as_deref() else {
            return Ok(());
        };
        let wildcard = self.transitions.iter().filter(|t| t.from == ANY);
        let local = self.transitions.iter().filter(|t| t.from == current);
        let target = wildcard
            .chain(local)
            .filter(|t| t.condition.prop() == field && t.to != current)
            .find(|t| t.condition.resolve(&self.fields))
            .map(|t| t.to.clone());
        if let Some(target) = target {
            debug!("animator queued '{current}' -> '{target}'");
            self.next = Some(target);
        }
        Ok(())
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Name of the playing animation
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Animation queued for the next update
    pub fn queued(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// The playing animation
    pub fn current_animation(&self) -> Option<&Animation> {
        self.current.as_ref().and_then(|name| self.animations.get(name))
    }

    /// Look up an animation
    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.get(name)
    }

    /// Switch to a queued animation, advance the current one by `dt`, and
    /// follow an `ALWAYS` transition once it finishes
    pub fn update(&mut self, dt: f32) -> AnimatorStep {
        let mut step = AnimatorStep::default();
        if let Some(next) = self.next.take() {
            step.changed = self.switch(next);
        }
        let Some(current) = self.current.clone() else {
            return step;
        };
        let Some(animation) = self.animations.get_mut(&current) else {
            return step;
        };
        step.state = animation.play(dt);
        if animation.is_finished() {
            let follow = self
                .transitions
                .iter()
                .find(|t| t.from == current && t.condition == Condition::Always)
                .map(|t| t.to.clone());
            if let Some(to) = follow {
                step.changed = self.switch(to);
            }
        }
        step
    }

    fn switch(&mut self, to: String) -> Option<(String, String)> {
        let animation = self.animations.get_mut(&to)?;
        animation.restart();
        let from = self.current.replace(to.clone()).unwrap_or_default();
        debug!("animator switched '{from}' -> '{to}'");
        Some((from, to))
    }
}

impl Component for Animator {
    fn name(&self) -> &'static str {
        "Animator"
    }

    fn unique(&self) -> bool {
        true
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        self.set(name, value.clone()).is_ok()
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "animation" => self.current.clone().map(Value::Str),
            _ => self.fields.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::Frame;
    use crate::animation::easing::Step;
    use crate::foundation::condition::{Op, ALWAYS};

    fn clip(value: i64, looping: bool) -> Animation {
        Animation::new(vec![Frame::new("frame", value, 0.1)], Step, looping).expect("valid")
    }

    fn animator() -> Animator {
        let mut animator = Animator::new()
            .with_animation("idle", clip(0, true))
            .and_then(|a| a.with_animation("run", clip(1, true)))
            .and_then(|a| a.with_animation("hurt", clip(2, false)))
            .expect("animations");
        animator.add_field("speed", 0.0).expect("field");
        animator.add_field("hit", false).expect("field");
        animator
    }

    #[test]
    fn test_first_animation_is_current() {
        assert_eq!(animator().current(), Some("idle"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut animator = animator();
        assert!(matches!(
            animator.add_field("speed", 1.0),
            Err(AnimationError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_transition_validation() {
        let mut animator = animator();
        assert!(matches!(
            animator.add_transition("idle", "fly", ALWAYS, None),
            Err(AnimationError::UnknownAnimation(_))
        ));
        assert!(matches!(
            animator.add_transition("idle", "run", Condition::compare("jump", Op::Is, true), None),
            Err(AnimationError::UnknownField(_))
        ));
    }

    #[test]
    fn test_field_change_switches_on_update() {
        let mut animator = animator();
        animator
            .add_transition(
                "idle",
                "run",
                Condition::compare("speed", Op::Gt, 0.5),
                Some(Condition::compare("speed", Op::Lte, 0.5)),
            )
            .expect("transition");
        animator.set("speed", 1.0).expect("set");
        assert_eq!(animator.queued(), Some("run"));
        let step = animator.update(0.1);
        assert_eq!(step.changed, Some(("idle".to_string(), "run".to_string())));
        assert_eq!(animator.current(), Some("run"));

        animator.set("speed", 0.0).expect("set");
        animator.update(0.1);
        assert_eq!(animator.current(), Some("idle"));
    }

    #[test]
    fn test_wildcard_dominates_local_transition() {
        let mut animator = animator();
        animator
            .add_transition("idle", "run", Condition::compare("hit", Op::Is, true), None)
            .expect("local");
        animator
            .add_transition(ANY, "hurt", Condition::compare("hit", Op::Is, true), None)
            .expect("wildcard");
        animator.set("hit", true).expect("set");
        assert_eq!(animator.queued(), Some("hurt"));
    }

    #[test]
    fn test_finished_animation_follows_always() {
        let mut animator = animator();
        animator
            .add_transition(ANY, "hurt", Condition::compare("hit", Op::Is, true), None)
            .expect("wildcard");
        animator.add_transition("hurt", "idle", ALWAYS, None).expect("always");
        animator.set("hit", true).expect("set");
        animator.update(0.05);
        assert_eq!(animator.current(), Some("hurt"));
        let step = animator.update(0.2);
        assert_eq!(step.changed, Some(("hurt".to_string(), "idle".to_string())));
        assert_eq!(animator.current(), Some("idle"));
    }
}
