use std::collections::VecDeque;

use log::trace;

use super::{Event, EventData};
use crate::foundation::collections::SceneId;
use crate::scene::Scene;

/// One-shot task run by the engine scheduler against the current scene
pub type Task = Box<dyn FnOnce(&mut Scene, &mut EventBus)>;

/// Current-frame and next-frame event queues
///
/// `dispatch(e, true)` pushes to the FRONT of the current queue, so an
/// immediate event raised by a handler runs before anything already waiting.
/// `dispatch(e, false)` appends to the next-frame queue, which
/// [`EventBus::promote`] moves behind the current one.
pub struct EventBus {
    current: VecDeque<Event>,
    next: VecDeque<Event>,
    scene: Option<SceneId>,
    time_scale: f32,
    scheduled: Vec<(f32, Task)>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Empty bus at time scale 1
    pub fn new() -> Self {
        Self {
            current: VecDeque::new(),
            next: VecDeque::new(),
            scene: None,
            time_scale: 1.0,
            scheduled: Vec::new(),
        }
    }

    /// Queue an event. Scene-control events are always immediate.
    pub fn dispatch(&mut self, event: impl Into<Event>, immediate: bool) {
        let mut event = event.into();
        if event.scene.is_none() {
            event.scene = self.scene;
        }
        event.time_scale = self.time_scale;
        let immediate = immediate || event.kind().is_scene_control();
        trace!("queue {:?} (immediate: {immediate})", event.kind());
        if immediate {
            self.current.push_front(event);
        } else {
            self.next.push_back(event);
        }
    }

    /// Shorthand for `dispatch(data, true)`
    pub fn immediate(&mut self, data: EventData) {
        self.dispatch(data, true);
    }

    /// Shorthand for `dispatch(data, false)`
    pub fn defer(&mut self, data: EventData) {
        self.dispatch(data, false);
    }

    /// Append an event to the back of the current queue, behind anything waiting
    pub fn enqueue_current(&mut self, event: impl Into<Event>) {
        let mut event = event.into();
        if event.scene.is_none() {
            event.scene = self.scene;
        }
        event.time_scale = self.time_scale;
        self.current.push_back(event);
    }

    /// Move the next-frame queue behind the current one
    pub fn promote(&mut self) {
        self.current.append(&mut self.next);
    }

    /// Take the next event of the current frame
    pub fn pop(&mut self) -> Option<Event> {
        self.current.pop_front()
    }

    /// Drop every queued event
    pub fn flush(&mut self) {
        if !self.current.is_empty() || !self.next.is_empty() {
            trace!(
                "flushing {} current and {} deferred events",
                self.current.len(),
                self.next.len()
            );
        }
        self.current.clear();
        self.next.clear();
    }

    /// `(current, next)` queue lengths
    pub fn pending(&self) -> (usize, usize) {
        (self.current.len(), self.next.len())
    }

    /// Scene stamped onto new events
    pub const fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    /// Change the scene stamped onto new events
    pub fn set_scene(&mut self, scene: Option<SceneId>) {
        self.scene = scene;
    }

    /// Time scale stamped onto new events
    pub const fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Change the time scale stamped onto new events
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Run `task` against the current scene after `delay` seconds
    pub fn after(&mut self, delay: f32, task: impl FnOnce(&mut Scene, &mut EventBus) + 'static) {
        self.scheduled.push((delay.max(0.0), Box::new(task)));
    }

    /// Hand queued tasks to the scheduler
    pub fn take_scheduled(&mut self) -> Vec<(f32, Task)> {
        std::mem::take(&mut self.scheduled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn kinds(bus: &mut EventBus) -> Vec<EventKind> {
        std::iter::from_fn(|| bus.pop()).map(|e| e.kind()).collect()
    }

    #[test]
    fn test_immediate_jumps_the_queue() {
        let mut bus = EventBus::new();
        bus.enqueue_current(EventData::Update { dt: 0.1 });
        bus.dispatch(EventData::Render, true);
        assert_eq!(kinds(&mut bus), vec![EventKind::Render, EventKind::Update]);
    }

    #[test]
    fn test_deferred_waits_for_promote() {
        let mut bus = EventBus::new();
        bus.dispatch(EventData::Render, false);
        assert!(bus.pop().is_none());
        bus.promote();
        assert_eq!(kinds(&mut bus), vec![EventKind::Render]);
    }

    #[test]
    fn test_scene_control_is_forced_immediate() {
        let mut bus = EventBus::new();
        bus.dispatch(EventData::StopScene, false);
        assert_eq!(bus.pending(), (1, 0));
    }

    #[test]
    fn test_stamping_and_flush() {
        let mut bus = EventBus::new();
        let scene = SceneId::next();
        bus.set_scene(Some(scene));
        bus.set_time_scale(0.5);
        bus.dispatch(EventData::Update { dt: 0.2 }, true);
        bus.dispatch(EventData::Render, false);
        let event = bus.pop().expect("queued");
        assert_eq!(event.scene, Some(scene));
        assert!((event.scaled_delta().unwrap_or_default() - 0.1).abs() < 1e-6);
        bus.flush();
        bus.promote();
        assert!(bus.pop().is_none());
    }
}
