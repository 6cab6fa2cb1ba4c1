//! Renderer coupler
//!
//! Turns the visible part of the scene into backend calls once per frame.
//! The engine raises `PreRender`, `Render` and `Rendered` in that order.

use std::collections::HashSet;

use log::{debug, info, trace, warn};

use crate::ecs::Entity;
use crate::engine::{EngineError, System, SystemContext};
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::collections::EntityId;
use crate::foundation::math::Vector;
use crate::physics::{DebugShape, PhysicsCoupler};
use crate::scene::{EntityFilter, Scene};

use super::backend::RenderBackend;
use super::commands::FrameInfo;
use super::sprite::SpriteRenderer;

/// Draws scenes through a [`RenderBackend`]
pub struct RendererCoupler {
    backend: Box<dyn RenderBackend>,
    size: Vector,
    drawn: HashSet<EntityId>,
    debug_shapes: Vec<DebugShape>,
    frames: u64,
}

impl RendererCoupler {
    /// Coupler drawing through `backend`
    pub fn new(backend: impl RenderBackend + 'static) -> Self {
        let size = backend.size();
        Self {
            backend: Box::new(backend),
            size,
            drawn: HashSet::new(),
            debug_shapes: Vec::new(),
            frames: 0,
        }
    }

    /// Frames drawn so far
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Entities currently held by the backend
    pub fn drawn(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.drawn.iter().copied()
    }

    fn pre_render(&mut self, scene: &mut Scene, bus: &mut EventBus) {
        let size = self.backend.size();
        if size != self.size {
            info!("surface resized to {size}");
            self.size = size;
            scene.set_resolution(size);
            bus.dispatch(EventData::WindowResized { size }, true);
        }
        for id in scene.entity_layers(&EntityFilter::new().with_component::<SpriteRenderer>()) {
            let committed = scene
                .entity_mut(id)
                .and_then(Entity::get_component_mut::<SpriteRenderer>)
                .is_some_and(SpriteRenderer::commit);
            if committed {
                scene.mark_dirty(id);
            }
        }
    }

    fn render(&mut self, scene: &mut Scene) -> Result<(), EngineError> {
        let frame = FrameInfo {
            background: scene.background(),
            camera: scene.camera().position(),
            ratio: scene.camera().ratio(),
        };
        self.backend.begin_frame(&frame)?;

        let visible = scene.entity_layers(&EntityFilter::new().with_component::<SpriteRenderer>());
        let visible_set: HashSet<EntityId> = visible.iter().copied().collect();
        for gone in self.drawn.difference(&visible_set) {
            trace!("{gone:?} left the frame");
            self.backend.release(*gone);
        }
        self.drawn.retain(|id| visible_set.contains(id));

        for id in visible {
            let Some(entity) = scene.entity(id) else {
                continue;
            };
            if entity.is_dirty() || !self.drawn.contains(&id) {
                let record = entity
                    .get_component::<SpriteRenderer>()
                    .and_then(|sprite| sprite.draw_record(id, entity));
                match record {
                    Some(record) => {
                        self.backend.submit(&record)?;
                        self.drawn.insert(id);
                    }
                    None => {
                        if self.drawn.remove(&id) {
                            self.backend.release(id);
                        }
                    }
                }
            }
            scene.mark_clean(id);
        }

        self.backend.draw()?;
        if !self.debug_shapes.is_empty() {
            self.backend.draw_debug(&self.debug_shapes)?;
            self.debug_shapes.clear();
        }
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self, entity: EntityId) {
        if self.drawn.remove(&entity) {
            self.backend.release(entity);
        }
    }

    fn release_all(&mut self) {
        for id in self.drawn.drain() {
            self.backend.release(id);
        }
        self.debug_shapes.clear();
    }
}

impl System for RendererCoupler {
    fn name(&self) -> &'static str {
        "RendererCoupler"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::PreRender,
            EventKind::Render,
            EventKind::Rendered,
            EventKind::EntityDestroyed,
            EventKind::DrawDebug,
        ]
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        match &event.data {
            EventData::PreRender => {
                if let Some(scene) = ctx.scene.as_deref_mut() {
                    self.pre_render(scene, ctx.bus);
                }
            }
            EventData::Render => {
                if let Some(scene) = ctx.scene.as_deref_mut() {
                    self.render(scene)?;
                }
            }
            EventData::Rendered => trace!("frame {} rendered", self.frames),
            EventData::EntityDestroyed { entity, .. } => self.release(*entity),
            EventData::DrawDebug => {
                let Some(scene) = ctx.scene.as_deref() else {
                    return Ok(());
                };
                match ctx.services.get::<PhysicsCoupler>() {
                    Some(physics) => match physics.try_borrow() {
                        Ok(physics) => self.debug_shapes = physics.debug_shapes(scene.id()),
                        Err(_) => warn!("physics busy, debug shapes skipped"),
                    },
                    None => debug!("DrawDebug without a physics service"),
                }
            }
            EventData::SceneStopped | EventData::ScenePaused => self.release_all(),
            EventData::SceneStarted | EventData::SceneContinued => {
                if let Some(scene) = ctx.scene.as_deref_mut() {
                    scene.mark_all_dirty();
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::value::ImageRef;
    use crate::render::backend::{BackendCall, HeadlessBackend};
    use crate::services::Services;

    fn setup() -> (RendererCoupler, HeadlessBackend, Scene, EventBus, Services) {
        let backend = HeadlessBackend::new(Vector::new(640.0, 640.0));
        let coupler = RendererCoupler::new(backend.clone());
        let scene = Scene::new("render", Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        (coupler, backend, scene, EventBus::new(), Services::new())
    }

    fn send(coupler: &mut RendererCoupler, scene: &mut Scene, bus: &mut EventBus, services: &Services, data: EventData) {
        let mut ctx = SystemContext {
            scene: Some(scene),
            bus,
            services,
        };
        coupler.on_event(&mut ctx, &Event::new(data)).expect("handled");
    }

    #[test]
    fn test_only_visible_sprites_are_submitted() {
        let (mut coupler, backend, mut scene, mut bus, services) = setup();
        let near = scene
            .add_at(
                Entity::new("near").with(SpriteRenderer::new(ImageRef::new("a.png"))).expect("sprite"),
                Vector::zero(),
                0,
            )
            .expect("near");
        scene
            .add_at(
                Entity::new("far").with(SpriteRenderer::new(ImageRef::new("b.png"))).expect("sprite"),
                Vector::new(50.0, 0.0),
                0,
            )
            .expect("far");
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::Render);
        assert_eq!(backend.submitted(), vec![near]);
        assert!(backend.calls().contains(&BackendCall::Draw));
    }

    #[test]
    fn test_clean_entities_are_not_resubmitted() {
        let (mut coupler, backend, mut scene, mut bus, services) = setup();
        scene
            .add(Entity::new("hero").with(SpriteRenderer::new(ImageRef::new("a.png"))).expect("sprite"))
            .expect("hero");
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::Render);
        backend.clear();
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::Render);
        assert!(backend.submitted().is_empty());
    }

    #[test]
    fn test_leaving_the_frame_releases() {
        let (mut coupler, backend, mut scene, mut bus, services) = setup();
        let hero = scene
            .add(Entity::new("hero").with(SpriteRenderer::new(ImageRef::new("a.png"))).expect("sprite"))
            .expect("hero");
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::Render);
        scene.set_position(hero, Vector::new(100.0, 0.0)).expect("moved");
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::Render);
        assert!(backend.calls().contains(&BackendCall::Release(hero)));
        assert_eq!(coupler.drawn().count(), 0);
    }

    #[test]
    fn test_resize_is_reported() {
        let (mut coupler, backend, mut scene, mut bus, services) = setup();
        backend.set_size(Vector::new(1280.0, 640.0));
        send(&mut coupler, &mut scene, &mut bus, &services, EventData::PreRender);
        assert_eq!(bus.pop().map(|e| e.kind()), Some(EventKind::WindowResized));
        assert_eq!(scene.camera().frame_size(), Vector::new(20.0, 10.0));
    }
}
