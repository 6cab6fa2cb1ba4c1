//! Fixed-rate clocks driven by the host delta

use crate::events::{EventBus, EventData};
use crate::foundation::time::FixedClock;

/// Emits `Update` then `LateUpdate` at the update rate
#[derive(Debug, Clone)]
pub struct Updater {
    clock: FixedClock,
}

impl Updater {
    /// Clock ticking `rate` times per second
    pub fn new(rate: f32) -> Self {
        Self {
            clock: FixedClock::new(1.0 / rate),
        }
    }

    /// Feed `dt` seconds; due steps are appended to the current queue
    pub fn advance(&mut self, dt: f32, bus: &mut EventBus) -> u32 {
        let steps = self.clock.advance(dt);
        let step = self.clock.interval();
        for _ in 0..steps {
            bus.enqueue_current(EventData::Update { dt: step });
            bus.enqueue_current(EventData::LateUpdate { dt: step });
        }
        steps
    }

    /// Drop the backlog
    pub fn reset(&mut self) {
        self.clock.reset();
    }
}

/// Emits `FixedUpdate` then `PhysicsUpdate` at the fixed rate
#[derive(Debug, Clone)]
pub struct FixedUpdater {
    clock: FixedClock,
}

impl FixedUpdater {
    /// Clock ticking `rate` times per second
    pub fn new(rate: f32) -> Self {
        Self {
            clock: FixedClock::new(1.0 / rate),
        }
    }

    /// Feed `dt` seconds; due steps are appended to the current queue
    pub fn advance(&mut self, dt: f32, bus: &mut EventBus) -> u32 {
        let steps = self.clock.advance(dt);
        let step = self.clock.interval();
        for _ in 0..steps {
            bus.enqueue_current(EventData::FixedUpdate { dt: step });
            bus.enqueue_current(EventData::PhysicsUpdate { dt: step });
        }
        steps
    }

    /// Drop the backlog
    pub fn reset(&mut self) {
        self.clock.reset();
    }
}

/// Emits `PreRender`, `Render` and `Rendered` at the render rate, at most
/// once per host tick
#[derive(Debug, Clone)]
pub struct RenderClock {
    clock: FixedClock,
}

impl RenderClock {
    /// Clock ticking `rate` times per second
    pub fn new(rate: f32) -> Self {
        Self {
            clock: FixedClock::new(1.0 / rate),
        }
    }

    /// Feed `dt` seconds; returns whether a frame was queued
    pub fn advance(&mut self, dt: f32, bus: &mut EventBus) -> bool {
        if self.clock.advance(dt) == 0 {
            return false;
        }
        bus.enqueue_current(EventData::PreRender);
        bus.enqueue_current(EventData::Render);
        bus.enqueue_current(EventData::Rendered);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::foundation::time::FIXED_DELTA;

    fn drain(bus: &mut EventBus) -> Vec<EventKind> {
        std::iter::from_fn(|| bus.pop()).map(|e| e.kind()).collect()
    }

    #[test]
    fn test_update_then_late_update() {
        let mut bus = EventBus::new();
        let mut updater = Updater::new(60.0);
        assert_eq!(updater.advance(1.0 / 60.0, &mut bus), 1);
        assert_eq!(drain(&mut bus), vec![EventKind::Update, EventKind::LateUpdate]);
        assert_eq!(updater.advance(0.001, &mut bus), 0);
    }

    #[test]
    fn test_fixed_steps_accumulate() {
        let mut bus = EventBus::new();
        let mut fixed = FixedUpdater::new(50.0);
        assert_eq!(fixed.advance(FIXED_DELTA * 2.0, &mut bus), 2);
        assert_eq!(
            drain(&mut bus),
            vec![
                EventKind::FixedUpdate,
                EventKind::PhysicsUpdate,
                EventKind::FixedUpdate,
                EventKind::PhysicsUpdate
            ]
        );
    }

    #[test]
    fn test_render_once_per_tick() {
        let mut bus = EventBus::new();
        let mut render = RenderClock::new(60.0);
        assert!(render.advance(0.05, &mut bus));
        assert_eq!(drain(&mut bus), vec![EventKind::PreRender, EventKind::Render, EventKind::Rendered]);
    }
}
