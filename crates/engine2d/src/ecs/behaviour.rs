//! User scripts
//!
//! A [`Script`] wraps a [`Behaviour`] as a component. Scripts are delivered
//! by the behaviour manager after built-in components have seen the event.

use crate::engine::EngineError;
use crate::events::{Event, EventKind};

use super::{Component, Context};

/// Game logic reacting to events
pub trait Behaviour: 'static {
    /// Handle an event
    fn on_event(&mut self, ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError>;
}

impl<F> Behaviour for F
where
    F: FnMut(&mut Context<'_>, &Event) -> Result<(), EngineError> + 'static,
{
    fn on_event(&mut self, ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError> {
        self(ctx, event)
    }
}

/// Component hosting a behaviour
pub struct Script {
    name: &'static str,
    subscriptions: Vec<EventKind>,
    behaviour: Box<dyn Behaviour>,
}

impl Script {
    /// Script named `name` handling `subscriptions`
    pub fn new(name: &'static str, subscriptions: &[EventKind], behaviour: impl Behaviour) -> Self {
        Self {
            name,
            subscriptions: subscriptions.to_vec(),
            behaviour: Box::new(behaviour),
        }
    }

    /// Script from a closure
    pub fn from_fn<F>(name: &'static str, subscriptions: &[EventKind], handler: F) -> Self
    where
        F: FnMut(&mut Context<'_>, &Event) -> Result<(), EngineError> + 'static,
    {
        Self::new(name, subscriptions, handler)
    }

    /// Script name
    pub const fn script_name(&self) -> &'static str {
        self.name
    }
}

impl Component for Script {
    fn name(&self) -> &'static str {
        self.name
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        self.subscriptions.clone()
    }

    fn is_script(&self) -> bool {
        true
    }

    fn on_event(&mut self, ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError> {
        self.behaviour.on_event(ctx, event)
    }
}
