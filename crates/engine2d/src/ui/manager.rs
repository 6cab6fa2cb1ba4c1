//! UI Manager
//!
//! Routes cursor events to the canvases under the cursor.

use indexmap::IndexSet;
use log::trace;

use crate::ecs::{Entity, Kind};
use crate::engine::{EngineError, System, SystemContext};
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::collections::EntityId;
use crate::foundation::math::Vector;
use crate::scene::Scene;
use crate::spatial::Aabb;

use super::canvas::{Canvas, CanvasEvent};

/// Side of the square searched around the cursor
pub const SEARCH_SIZE: f32 = 1.0 / 32.0;

/// Turns `MouseMotion`, `MouseDown` and `MouseUp` into hover and click
/// zones on visible canvases
#[derive(Debug, Default)]
pub struct UiManager {
    stated: IndexSet<EntityId>,
}

impl UiManager {
    /// New manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvases touched by the last cursor event
    pub fn touched(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.stated.iter().copied()
    }

    fn clear(&mut self, scene: &mut Scene, bus: &mut EventBus) {
        for id in self.stated.drain(..) {
            if let Some(canvas) = scene.entity_mut(id).and_then(Entity::get_component_mut::<Canvas>) {
                canvas.dispatch(CanvasEvent::Clear, Vector::zero(), bus);
            }
        }
    }

    fn route(&mut self, scene: &mut Scene, bus: &mut EventBus, position: Vector, make: fn(Aabb) -> CanvasEvent) {
        self.clear(scene, bus);
        let zone = Aabb::from_center(position, Vector::unit() * SEARCH_SIZE);
        for id in scene.query_region(position, zone.size(), Some(&Kind::CANVAS)) {
            let Some(entity) = scene.entity_mut(id) else {
                continue;
            };
            if !entity.is_active() {
                continue;
            }
            let origin = entity.position();
            let Some(canvas) = entity.get_component_mut::<Canvas>() else {
                continue;
            };
            let bounds = Aabb::from_center(origin, canvas.size());
            if !canvas.is_visible() || !bounds.overlaps(&zone) {
                continue;
            }
            let hit = canvas.dispatch(make(zone), origin, bus);
            trace!("canvas {id:?}: {} element(s) under the cursor", hit.len());
            self.stated.insert(id);
        }
    }
}

impl System for UiManager {
    fn name(&self) -> &'static str {
        "UiManager"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::MouseMotion, EventKind::MouseDown, EventKind::MouseUp]
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        let (position, make): (Vector, fn(Aabb) -> CanvasEvent) = match &event.data {
            EventData::MouseMotion { position, .. } => (*position, CanvasEvent::Hover),
            EventData::MouseDown { position, .. } => (*position, CanvasEvent::ClickDown),
            EventData::MouseUp { position, .. } => (*position, CanvasEvent::ClickUp),
            EventData::SceneStopped | EventData::ScenePaused => {
                self.stated.clear();
                return Ok(());
            }
            _ => return Ok(()),
        };
        let Some(scene) = ctx.scene.as_deref_mut() else {
            return Ok(());
        };
        self.route(scene, ctx.bus, position, make);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseButton;
    use crate::services::Services;
    use crate::ui::{ElementState, UiElement};

    fn send(manager: &mut UiManager, scene: &mut Scene, bus: &mut EventBus, data: EventData) {
        let services = Services::new();
        let mut ctx = SystemContext {
            scene: Some(scene),
            bus,
            services: &services,
        };
        manager.on_event(&mut ctx, &Event::new(data)).expect("handled");
    }

    fn motion(x: f32, y: f32) -> EventData {
        EventData::MouseMotion {
            position: Vector::new(x, y),
            screen: Vector::zero(),
            delta: Vector::zero(),
        }
    }

    fn element_state(scene: &Scene, canvas: EntityId, element: crate::foundation::collections::ElementId) -> Option<ElementState> {
        scene
            .entity(canvas)
            .and_then(Entity::get_component::<Canvas>)
            .and_then(|c| c.element(element))
            .map(UiElement::state)
    }

    #[test]
    fn test_hover_is_cleared_by_the_next_event() {
        let mut scene = Scene::new("ui", Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        let canvas = scene
            .add(Canvas::entity("hud", Vector::new(10.0, 10.0)).expect("canvas"))
            .expect("added");
        let button = scene
            .entity_mut(canvas)
            .and_then(Entity::get_component_mut::<Canvas>)
            .map(|c| c.add(UiElement::new("play", Vector::new(2.0, 2.0)), Vector::new(2.0, 2.0)))
            .expect("canvas component")
            .expect("fits");

        let mut manager = UiManager::new();
        let mut bus = EventBus::new();
        send(&mut manager, &mut scene, &mut bus, motion(2.0, 2.0));
        assert_eq!(element_state(&scene, canvas, button), Some(ElementState::Hovered));
        assert_eq!(manager.touched().collect::<Vec<_>>(), vec![canvas]);

        send(&mut manager, &mut scene, &mut bus, motion(-3.0, -3.0));
        assert_eq!(element_state(&scene, canvas, button), Some(ElementState::Normal));

        send(
            &mut manager,
            &mut scene,
            &mut bus,
            EventData::MouseDown {
                button: MouseButton::Left,
                position: Vector::new(2.5, 1.5),
                screen: Vector::zero(),
            },
        );
        assert_eq!(element_state(&scene, canvas, button), Some(ElementState::Pressed));
    }

    #[test]
    fn test_hidden_canvas_is_skipped() {
        let mut scene = Scene::new("ui", Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        let canvas = scene
            .add(Canvas::entity("hud", Vector::new(10.0, 10.0)).expect("canvas"))
            .expect("added");
        if let Some(c) = scene.entity_mut(canvas).and_then(Entity::get_component_mut::<Canvas>) {
            c.set_visible(false);
        }
        let mut manager = UiManager::new();
        send(&mut manager, &mut scene, &mut EventBus::new(), motion(0.0, 0.0));
        assert_eq!(manager.touched().count(), 0);
    }
}
