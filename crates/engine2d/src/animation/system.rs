//! Drives animators of visible entities

use log::trace;

use crate::ecs::Entity;
use crate::engine::{EngineError, System, SystemContext};
use crate::events::{Event, EventData, EventKind};
use crate::scene::EntityFilter;

use super::animator::Animator;
use super::clip::apply_state;

/// Advances every [`Animator`] on an active entity inside the camera frame
/// once per `Update`
#[derive(Debug, Default)]
pub struct AnimationSystem {
    frames: u64,
}

impl AnimationSystem {
    /// New system
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates processed so far
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl System for AnimationSystem {
    fn name(&self) -> &'static str {
        "AnimationSystem"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::Update]
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        let Some(dt) = event.scaled_delta() else {
            return Ok(());
        };
        let Some(scene) = ctx.scene.as_deref_mut() else {
            return Ok(());
        };
        self.frames += 1;
        let visible = scene.entity_layers(&EntityFilter::new().with_component::<Animator>());
        for id in visible {
            let Some(step) = scene
                .entity_mut(id)
                .and_then(Entity::get_component_mut::<Animator>)
                .map(|animator| animator.update(dt))
            else {
                continue;
            };
            if let Some(state) = &step.state {
                apply_state(scene, id, state);
            }
            if let Some((from, to)) = step.changed {
                trace!("AnimChanged on {id:?}: {from} -> {to}");
                ctx.bus.dispatch(
                    Event::new(EventData::AnimChanged { entity: id, from, to }).only(id),
                    false,
                );
            }
        }
        Ok(())
    }
}
