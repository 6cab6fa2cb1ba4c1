//! Canvas component
//!
//! A canvas lives on the topmost layer and keeps its elements in a private
//! spatial hash so cursor events only test elements near the cursor.

use indexmap::IndexSet;

use crate::ecs::{Component, Entity, Kind};
use crate::events::EventBus;
use crate::foundation::collections::{ElementId, SlotMap};
use crate::foundation::math::Vector;
use crate::foundation::value::Value;
use crate::scene::SceneError;
use crate::spatial::{Aabb, SpatialHash, CANVAS_CELL_SIZE};

use super::element::UiElement;

/// Canvas size when none is given
pub const DEFAULT_CANVAS_SIZE: Vector = Vector::new(10.0, 10.0);

/// Cursor interaction routed to a canvas. Zones are in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasEvent {
    /// Cursor over the zone
    Hover(Aabb),
    /// Button pressed over the zone
    ClickDown(Aabb),
    /// Button released over the zone
    ClickUp(Aabb),
    /// Reset every element touched by the previous event
    Clear,
}

/// Container of [`UiElement`]s
pub struct Canvas {
    size: Vector,
    visible: bool,
    elements: SlotMap<ElementId, UiElement>,
    spatial: SpatialHash<ElementId, ()>,
    touched: IndexSet<ElementId>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_SIZE)
    }
}

impl Canvas {
    /// Canvas covering `size` world units
    pub fn new(size: Vector) -> Self {
        Self {
            size,
            visible: true,
            elements: SlotMap::with_key(),
            spatial: SpatialHash::new(CANVAS_CELL_SIZE),
            touched: IndexSet::new(),
        }
    }

    /// Canvas entity: kind `Canvas`, scaled to `size`, ready for `Scene::add`
    pub fn entity(name: impl Into<String>, size: Vector) -> Result<Entity, SceneError> {
        Entity::new(name)
            .with_kind(Kind::CANVAS)
            .with_scale(size)
            .with(Self::new(size))
    }

    /// Size in world units
    pub const fn size(&self) -> Vector {
        self.size
    }

    /// Whether the canvas receives cursor events
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Place `element` at `position` relative to the canvas center. Elements
    /// that do not touch the canvas are rejected.
    pub fn add(&mut self, mut element: UiElement, position: Vector) -> Result<ElementId, SceneError> {
        let bounds = Aabb::from_center(Vector::zero(), self.size);
        let aabb = Aabb::from_center(position, element.size());
        if !bounds.overlaps(&aabb) {
            return Err(SceneError::ElementOutOfBounds);
        }
        element.position = position;
        let id = self.elements.insert(element);
        self.spatial.add(id, aabb, &[]);
        Ok(id)
    }

    /// Take an element off the canvas
    pub fn remove(&mut self, id: ElementId) -> Option<UiElement> {
        self.spatial.remove(id);
        self.touched.shift_remove(&id);
        self.elements.remove(id)
    }

    /// Element by id
    pub fn element(&self, id: ElementId) -> Option<&UiElement> {
        self.elements.get(id)
    }

    /// Element by id, mutably
    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut UiElement> {
        self.elements.get_mut(id)
    }

    /// Every element
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &UiElement)> {
        self.elements.iter()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the canvas has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Route a cursor event. `origin` is the world position of the canvas
    /// center. Returns the elements the event touched.
    pub fn dispatch(&mut self, event: CanvasEvent, origin: Vector, bus: &mut EventBus) -> Vec<ElementId> {
        let zone = match event {
            CanvasEvent::Clear => {
                for id in self.touched.drain(..) {
                    if let Some(element) = self.elements.get_mut(id) {
                        element.set_normal();
                    }
                }
                return Vec::new();
            }
            CanvasEvent::Hover(zone) | CanvasEvent::ClickDown(zone) | CanvasEvent::ClickUp(zone) => {
                Aabb::from_center(zone.center() - origin, zone.size())
            }
        };

        let mut hit = Vec::new();
        for id in self.spatial.search(&zone, &[]) {
            let Some(element) = self.elements.get_mut(id) else {
                continue;
            };
            let bounds = Aabb::from_center(element.position(), element.size());
            if !element.is_interactive() || !bounds.overlaps(&zone) {
                continue;
            }
            match event {
                CanvasEvent::ClickDown(_) => element.set_pressed(),
                CanvasEvent::ClickUp(_) => {
                    element.set_hover();
                    element.click(bus);
                }
                _ => element.set_hover(),
            }
            self.touched.insert(id);
            hit.push(id);
        }
        hit
    }
}

impl Component for Canvas {
    fn name(&self) -> &'static str {
        "Canvas"
    }

    fn unique(&self) -> bool {
        true
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value) {
            ("visible", Value::Bool(visible)) => {
                self.visible = *visible;
                true
            }
            _ => false,
        }
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "visible" => Some(Value::Bool(self.visible)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventData, EventKind};
    use crate::ui::ElementState;

    fn zone(x: f32, y: f32) -> Aabb {
        Aabb::from_center(Vector::new(x, y), Vector::unit() / 32.0)
    }

    #[test]
    fn test_elements_outside_are_rejected() {
        let mut canvas = Canvas::default();
        assert!(canvas.add(UiElement::new("ok", Vector::unit()), Vector::new(4.0, 4.0)).is_ok());
        assert_eq!(
            canvas.add(UiElement::new("far", Vector::unit()), Vector::new(20.0, 0.0)).err(),
            Some(SceneError::ElementOutOfBounds)
        );
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_hover_then_clear() {
        let mut canvas = Canvas::default();
        let id = canvas
            .add(UiElement::new("button", Vector::new(2.0, 1.0)), Vector::new(1.0, 1.0))
            .expect("fits");
        let mut bus = EventBus::new();
        let origin = Vector::new(100.0, 0.0);

        assert_eq!(canvas.dispatch(CanvasEvent::Hover(zone(101.5, 1.0)), origin, &mut bus), vec![id]);
        assert_eq!(canvas.element(id).map(UiElement::state), Some(ElementState::Hovered));
        assert!(canvas.dispatch(CanvasEvent::Hover(zone(0.0, 0.0)), origin, &mut bus).is_empty());

        canvas.dispatch(CanvasEvent::Clear, origin, &mut bus);
        assert_eq!(canvas.element(id).map(UiElement::state), Some(ElementState::Normal));
    }

    #[test]
    fn test_click_runs_callbacks() {
        let mut canvas = Canvas::default();
        let button = UiElement::new("play", Vector::unit()).on_click(|bus| bus.defer(EventData::custom("play", ())));
        let id = canvas.add(button, Vector::zero()).expect("fits");
        let mut bus = EventBus::new();

        canvas.dispatch(CanvasEvent::ClickDown(zone(0.0, 0.0)), Vector::zero(), &mut bus);
        assert_eq!(canvas.element(id).map(UiElement::state), Some(ElementState::Pressed));
        canvas.dispatch(CanvasEvent::ClickUp(zone(0.0, 0.0)), Vector::zero(), &mut bus);
        assert_eq!(canvas.element(id).map(UiElement::clicks), Some(1));

        bus.promote();
        assert_eq!(bus.pop().map(|e| e.kind()), Some(EventKind::Custom("play")));
    }

    #[test]
    fn test_disabled_elements_ignore_the_cursor() {
        let mut canvas = Canvas::default();
        let id = canvas.add(UiElement::new("off", Vector::unit()), Vector::zero()).expect("fits");
        if let Some(element) = canvas.element_mut(id) {
            element.set_enabled(false);
        }
        let hit = canvas.dispatch(CanvasEvent::Hover(zone(0.0, 0.0)), Vector::zero(), &mut EventBus::new());
        assert!(hit.is_empty());
        assert!(canvas.remove(id).is_some());
        assert!(canvas.is_empty());
    }
}
