//! Component delivery
//!
//! The engine routes every event through two wildcard systems after the
//! subscribed ones: the [`EventDispatcher`] for built-in components and the
//! [`BehaviourManager`] for scripts. Both share [`deliver`].

use log::{error, trace};

use crate::ecs::Context;
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::collections::{ComponentId, EntityId};
use crate::scene::{Receiver, Scene};
use crate::services::Services;

use super::{EngineError, System, SystemContext};

/// Delivers events to non-script components
#[derive(Debug, Default)]
pub struct EventDispatcher {
    delivered: u64,
}

impl EventDispatcher {
    /// New dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler calls made so far
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl System for EventDispatcher {
    fn name(&self) -> &'static str {
        "EventDispatcher"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        Vec::new()
    }

    fn is_wildcard(&self) -> bool {
        true
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        if let Some(scene) = ctx.scene.as_deref_mut() {
            self.delivered += deliver(scene, ctx.bus, ctx.services, event, false);
        }
        Ok(())
    }
}

/// Delivers events to scripts, after every built-in component
#[derive(Debug, Default)]
pub struct BehaviourManager {
    delivered: u64,
}

impl BehaviourManager {
    /// New manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Script calls made so far
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl System for BehaviourManager {
    fn name(&self) -> &'static str {
        "BehaviourManager"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        Vec::new()
    }

    fn is_wildcard(&self) -> bool {
        true
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        if let Some(scene) = ctx.scene.as_deref_mut() {
            self.delivered += deliver(scene, ctx.bus, ctx.services, event, true);
        }
        Ok(())
    }
}

/// Hand `event` to the registered components of one family (scripts or
/// built-ins). Returns how many handlers ran.
///
/// Only receivers registered before the delivery mark are called, so a
/// component attached by any handler of this event, in either family, only
/// sees later events. A component that has not seen its `Init` gets one
/// right before its first event, whatever it subscribed to.
pub fn deliver(scene: &mut Scene, bus: &mut EventBus, services: &Services, event: &Event, scripts: bool) -> u64 {
    let kind = event.kind();
    let mark = scene.registration_mark();
    let targets: Vec<(EntityId, ComponentId)> = if kind == EventKind::Init {
        init_targets(scene, event.only_entity, scripts)
    } else {
        scene
            .receivers_for(kind)
            .into_iter()
            .filter(|r: &Receiver| r.script == scripts && r.serial < mark)
            .filter(|r| event.only_entity.map_or(true, |only| only == r.entity))
            .map(|r| (r.entity, r.component))
            .collect()
    };

    let mut calls = 0;
    for (entity, component) in targets {
        let reachable = scene
            .entity(entity)
            .is_some_and(|e| e.is_active() || kind.reaches_inactive());
        if !reachable {
            continue;
        }
        if let Err(err) = run_component(scene, bus, services, entity, component, event) {
            let (name, components) = scene
                .entity(entity)
                .map(|e| (e.name().to_owned(), e.component_names()))
                .unwrap_or_default();
            error!("'{name}' {components:?} failed on {:?}: {err}", event.kind());
        }
        scene.flush_outbox(bus);
        calls += 1;
    }
    calls
}

fn init_targets(scene: &Scene, only: Option<EntityId>, scripts: bool) -> Vec<(EntityId, ComponentId)> {
    let Some(id) = only else {
        return Vec::new();
    };
    let Some(entity) = scene.entity(id) else {
        return Vec::new();
    };
    entity
        .components
        .iter()
        .filter(|(_, slot)| !slot.is_initialized() && slot.is_script() == scripts)
        .map(|(cid, _)| (id, *cid))
        .collect()
}

/// Run one component handler. The component is taken out of its slot for
/// the call and put back afterwards, unless the handler removed it.
fn run_component(
    scene: &mut Scene,
    bus: &mut EventBus,
    services: &Services,
    entity: EntityId,
    cid: ComponentId,
    event: &Event,
) -> Result<(), EngineError> {
    let Some(slot) = scene.entity_mut(entity).and_then(|e| e.components.get_mut(&cid)) else {
        return Ok(());
    };
    let first = !slot.initialized;
    // Already running further up the stack
    let Some(mut component) = slot.component.take() else {
        return Ok(());
    };
    slot.initialized = true;

    let mut ctx = Context {
        entity,
        component: cid,
        scene,
        bus,
        services,
    };
    let mut result = Ok(());
    if first && event.kind() != EventKind::Init {
        trace!("late Init for {} on {entity:?}", component.name());
        let init = Event {
            data: EventData::Init,
            only_entity: Some(entity),
            ..event.clone()
        };
        result = component.on_event(&mut ctx, &init);
    }
    if result.is_ok() {
        result = component.on_event(&mut ctx, event);
    }

    if let Some(slot) = ctx.scene.entity_mut(entity).and_then(|e| e.components.get_mut(&cid)) {
        slot.component = Some(component);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, Entity, Script};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        log: Log,
        tag: &'static str,
    }

    impl Component for Recorder {
        fn name(&self) -> &'static str {
            "Recorder"
        }

        fn subscriptions(&self) -> Vec<EventKind> {
            vec![EventKind::Update, EventKind::Custom("boom")]
        }

        fn on_event(&mut self, _ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError> {
            self.log.borrow_mut().push(format!("{}:{:?}", self.tag, event.kind()));
            if event.kind() == EventKind::Custom("boom") {
                return Err(EngineError::Handler("boom".into()));
            }
            Ok(())
        }
    }

    fn scene_with(log: &Log) -> (Scene, EntityId) {
        let mut scene = Scene::new("dispatch", crate::foundation::math::Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        let script_log = Rc::clone(log);
        let entity = Entity::new("recorder")
            .with(Recorder {
                log: Rc::clone(log),
                tag: "a",
            })
            .and_then(|e| {
                e.with(Script::from_fn("script", &[EventKind::Update], move |_ctx, event| {
                    script_log.borrow_mut().push(format!("s:{:?}", event.kind()));
                    Ok(())
                }))
            })
            .expect("components");
        let id = scene.add(entity).expect("added");
        (scene, id)
    }

    fn run(scene: &mut Scene, bus: &mut EventBus, event: &Event) {
        let services = Services::new();
        deliver(scene, bus, &services, event, false);
        deliver(scene, bus, &services, event, true);
    }

    #[test]
    fn test_init_comes_first_and_scripts_last() {
        let log = Log::default();
        let (mut scene, _) = scene_with(&log);
        let mut bus = EventBus::new();
        run(&mut scene, &mut bus, &Event::new(EventData::Update { dt: 0.1 }));
        assert_eq!(
            *log.borrow(),
            vec!["a:Init", "a:Update", "s:Init", "s:Update"]
        );
    }

    #[test]
    fn test_queued_init_is_not_repeated() {
        let log = Log::default();
        let (mut scene, id) = scene_with(&log);
        let mut bus = EventBus::new();
        let init = Event::new(EventData::Init).only(id);
        run(&mut scene, &mut bus, &init);
        run(&mut scene, &mut bus, &init);
        assert_eq!(*log.borrow(), vec!["a:Init", "s:Init"]);
    }

    #[test]
    fn test_inactive_entities_are_skipped() {
        let log = Log::default();
        let (mut scene, id) = scene_with(&log);
        scene.set_active(id, false).expect("known entity");
        run(&mut scene, &mut EventBus::new(), &Event::new(EventData::Update { dt: 0.1 }));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_errors_do_not_stop_delivery() {
        let log = Log::default();
        let (mut scene, _) = scene_with(&log);
        let second = scene
            .add(
                Entity::new("second")
                    .with(Recorder {
                        log: Rc::clone(&log),
                        tag: "b",
                    })
                    .expect("recorder"),
            )
            .expect("added");
        let mut bus = EventBus::new();
        run(&mut scene, &mut bus, &Event::new(EventData::custom("boom", ())));
        assert!(log.borrow().contains(&"a:Custom(\"boom\")".to_owned()));
        assert!(log.borrow().contains(&"b:Custom(\"boom\")".to_owned()));

        log.borrow_mut().clear();
        run(&mut scene, &mut bus, &Event::new(EventData::Update { dt: 0.1 }).only(second));
        assert_eq!(*log.borrow(), vec!["b:Update"]);
    }
}
