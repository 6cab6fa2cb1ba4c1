//! Core engine implementation
//!
//! The [`Engine`] owns the scene stack, the systems, the service registry,
//! the event bus and the worker pool. Each [`Engine::tick`] promotes the
//! deferred queue, drains it, then lets the update, fixed-update and render
//! clocks queue their events and drains again.
//!
//! ## Delivery
//!
//! ```text
//! event ─▶ subscribed systems (scene broadcasts reach all of them)
//!       ─▶ EventDispatcher   (built-in components)
//!       ─▶ BehaviourManager  (scripts)
//! ```
//!
//! Scene-control events never reach components: the engine handles them by
//! flushing the queues and broadcasting the lifecycle events synchronously.

pub mod clocks;
pub mod dispatch;
pub mod jobs;
pub mod scheduler;
mod system;

pub use clocks::{FixedUpdater, RenderClock, Updater};
pub use dispatch::{BehaviourManager, EventDispatcher};
pub use jobs::{JobError, WorkerPool};
pub use scheduler::Scheduler;
pub use system::{System, SystemContext};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::animation::{AnimationError, AnimationSystem};
use crate::assets::{AssetError, AssetLoader, DirectoryVfs, Vfs};
use crate::config::{ConfigError, EngineConfig};
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::condition::ConditionError;
use crate::foundation::logging;
use crate::foundation::time::Timer;
use crate::input::{InputTranslator, RawInput};
use crate::physics::{PhysicsCoupler, PhysicsError};
use crate::render::{HeadlessBackend, RenderBackend, RenderError, RendererCoupler};
use crate::scene::{Scene, SceneError};
use crate::services::Services;
use crate::ui::UiManager;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene operation failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Physics operation failed
    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),

    /// Animation setup failed
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// Asset loading failed
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Condition could not be evaluated
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Render backend failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Worker pool refused a job
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// The operation needs a running scene
    #[error("no scene is running")]
    NoScene,

    /// A required service is not registered
    #[error("service not provided: {0}")]
    ServiceMissing(&'static str),

    /// A handler failed
    #[error("handler failed: {0}")]
    Handler(String),
}

struct Registered {
    system: Box<dyn System>,
    subscriptions: Vec<EventKind>,
    wildcard: bool,
}

impl Registered {
    fn wants(&self, kind: EventKind) -> bool {
        self.wildcard || kind.is_broadcast() || self.subscriptions.contains(&kind)
    }
}

/// Main engine struct
///
/// The engine coordinates all subsystems and manages the main loop.
pub struct Engine {
    config: EngineConfig,
    scenes: Vec<Scene>,
    systems: Vec<Registered>,
    dispatcher: EventDispatcher,
    behaviours: BehaviourManager,
    services: Services,
    bus: EventBus,
    pool: Arc<WorkerPool>,
    updater: Updater,
    fixed: FixedUpdater,
    render: RenderClock,
    scheduler: Scheduler,
    physics: Rc<RefCell<PhysicsCoupler>>,
    input: Rc<RefCell<InputTranslator>>,
    renderer: Rc<RefCell<RendererCoupler>>,
    assets: Rc<RefCell<AssetLoader>>,
    timer: Timer,
    running: bool,
}

impl Engine {
    /// Engine drawing into a [`HeadlessBackend`] the size of the window
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let backend = HeadlessBackend::new(config.resolution());
        Self::with_backend(config, backend)
    }

    /// Engine drawing through `backend`
    pub fn with_backend(config: EngineConfig, backend: impl RenderBackend + 'static) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init(logging::parse_level(&config.log_level));
        info!("Initializing engine...");

        let pool = Arc::new(WorkerPool::new(config.asset_workers));
        let vfs: Arc<dyn Vfs> = Arc::new(DirectoryVfs::new(&config.asset_root));
        let physics = Rc::new(RefCell::new(PhysicsCoupler::new(&config.physics)));
        let input = Rc::new(RefCell::new(InputTranslator::new()));
        let renderer = Rc::new(RefCell::new(RendererCoupler::new(backend)));
        let assets = Rc::new(RefCell::new(AssetLoader::new(vfs, Arc::clone(&pool))));

        let mut services = Services::new();
        services.provide(Rc::clone(&physics));
        services.provide(Rc::clone(&input));
        services.provide(Rc::clone(&renderer));
        services.provide(Rc::clone(&assets));

        let mut engine = Self {
            updater: Updater::new(config.timing.update_rate),
            fixed: FixedUpdater::new(config.timing.fixed_rate),
            render: RenderClock::new(config.timing.render_rate),
            config,
            scenes: Vec::new(),
            systems: Vec::new(),
            dispatcher: EventDispatcher::new(),
            behaviours: BehaviourManager::new(),
            services,
            bus: EventBus::new(),
            pool,
            scheduler: Scheduler::new(),
            physics: Rc::clone(&physics),
            input: Rc::clone(&input),
            renderer: Rc::clone(&renderer),
            assets,
            timer: Timer::new(),
            running: true,
        };
        engine.add_system(physics);
        engine.add_system(input);
        engine.add_system(AnimationSystem::new());
        engine.add_system(UiManager::new());
        engine.add_system(renderer);
        info!("Engine initialized with {} systems", engine.systems.len());
        Ok(engine)
    }

    /// Register a system. Systems see events in registration order.
    pub fn add_system(&mut self, system: impl System) {
        let subscriptions = system.subscriptions();
        let wildcard = system.is_wildcard();
        debug!("system registered: {} {subscriptions:?}", system.name());
        self.systems.push(Registered {
            system: Box::new(system),
            subscriptions,
            wildcard,
        });
    }

    /// Configuration the engine was built with
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared capabilities
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Shared capabilities, mutably
    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Physics world and queries
    pub fn physics(&self) -> Rc<RefCell<PhysicsCoupler>> {
        Rc::clone(&self.physics)
    }

    /// Input state
    pub fn input(&self) -> Rc<RefCell<InputTranslator>> {
        Rc::clone(&self.input)
    }

    /// Renderer
    pub fn renderer(&self) -> Rc<RefCell<RendererCoupler>> {
        Rc::clone(&self.renderer)
    }

    /// Asset loader
    pub fn assets(&self) -> Rc<RefCell<AssetLoader>> {
        Rc::clone(&self.assets)
    }

    /// Read assets from `vfs` from now on. Handles already given out keep
    /// loading from the previous one.
    pub fn set_vfs(&mut self, vfs: Arc<dyn Vfs>) {
        *self.assets.borrow_mut() = AssetLoader::new(vfs, Arc::clone(&self.pool));
    }

    /// Background worker pool
    pub fn pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&self.pool)
    }

    /// Event queues
    pub fn bus(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Queue an event from outside a handler
    pub fn dispatch(&mut self, event: impl Into<Event>, immediate: bool) {
        self.bus.dispatch(event, immediate);
    }

    /// Top of the scene stack
    pub fn scene(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    /// Top of the scene stack, mutably. Events raised through it are queued
    /// on the next tick.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.last_mut()
    }

    /// Number of scenes on the stack
    pub fn depth(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the loop keeps going
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Current time scale
    pub const fn time_scale(&self) -> f32 {
        self.bus.time_scale()
    }

    /// Pending scheduled tasks
    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }

    // ----- scene stack -----

    /// Start `scene` on top of the stack right away. The queues are flushed
    /// and scheduled tasks cancelled first.
    pub fn start_scene(&mut self, mut scene: Scene) {
        self.reset_queues();
        let id = scene.id();
        info!("Starting scene '{}'", scene.name());
        let setup = scene.take_setup();
        self.bus.set_scene(Some(id));
        self.scenes.push(scene);
        self.running = true;

        self.broadcast(EventData::StartScene { scene: id });
        if let Some(setup) = setup {
            if let Some(top) = self.scenes.last_mut() {
                if let Err(err) = setup(top, &self.services) {
                    error!("setup of scene '{}' failed: {err}", top.name());
                }
            }
        }
        if let Some(top) = self.scenes.last_mut() {
            top.flush_outbox(&mut self.bus);
        }
        self.broadcast(EventData::SetupScene);
        self.broadcast(EventData::SceneStarted);
    }

    fn pause_top(&mut self) {
        if self.scenes.is_empty() {
            return;
        }
        self.bus.flush();
        self.broadcast(EventData::ScenePaused);
    }

    fn stop_top(&mut self) {
        let Some(name) = self.scenes.last().map(|s| s.name().to_owned()) else {
            return;
        };
        info!("Stopping scene '{name}'");
        self.reset_queues();
        self.broadcast(EventData::SceneStopped);
        self.scenes.pop();
        self.reset_queues();
        self.bus.set_scene(None);
    }

    fn resume_top(&mut self) {
        let Some(id) = self.scenes.last().map(Scene::id) else {
            info!("Scene stack is empty, stopping");
            self.running = false;
            return;
        };
        self.bus.set_scene(Some(id));
        self.broadcast(EventData::SceneContinued);
    }

    fn reset_queues(&mut self) {
        self.bus.flush();
        drop(self.bus.take_scheduled());
        self.scheduler.cancel_all();
    }

    fn control(&mut self, event: &Event) {
        match &event.data {
            EventData::PushScene(request) => match request.take() {
                Some(scene) => {
                    self.pause_top();
                    self.start_scene(scene);
                }
                None => warn!("{request:?} was already started"),
            },
            EventData::ReplaceScene(request) => match request.take() {
                Some(scene) => {
                    self.stop_top();
                    self.start_scene(scene);
                }
                None => warn!("{request:?} was already started"),
            },
            EventData::StopScene => {
                self.stop_top();
                self.resume_top();
            }
            EventData::PauseScene { paused: true } => self.broadcast(EventData::ScenePaused),
            EventData::PauseScene { paused: false } => self.broadcast(EventData::SceneContinued),
            EventData::Quit => {
                info!("Engine shutdown requested");
                while !self.scenes.is_empty() {
                    self.stop_top();
                }
                self.running = false;
            }
            _ => {}
        }
    }

    // ----- pump -----

    /// Advance the engine by `dt` host seconds. Returns whether the loop
    /// should keep going.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.running {
            return false;
        }
        self.bus.enqueue_current(EventData::Idle { dt });
        self.bus.promote();
        self.drain();

        self.updater.advance(dt, &mut self.bus);
        self.drain();
        self.fixed.advance(dt, &mut self.bus);
        self.drain();
        if self.render.advance(dt, &mut self.bus) {
            self.drain();
        }
        self.run_scheduled(dt);
        self.assets.borrow_mut().poll(&mut self.bus);
        self.running
    }

    /// Drive [`tick`](Self::tick) from the wall clock until the engine stops
    pub fn run(&mut self) {
        if self.scenes.is_empty() {
            warn!("run() called without a scene");
            return;
        }
        info!("Starting main loop...");
        self.timer = Timer::new();
        let mut since_report = 0.0;
        loop {
            let dt = self.timer.update();
            if !self.tick(dt) {
                break;
            }
            since_report += dt;
            if self.config.show_fps && since_report >= 1.0 {
                info!("{:.1} fps", self.timer.average_fps());
                since_report = 0.0;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        info!("Engine shutdown complete");
    }

    /// Feed one raw device event; the translated event is queued for the
    /// next tick
    pub fn feed_input(&mut self, raw: RawInput) {
        let Some(scene) = self.scenes.last() else {
            return;
        };
        self.input.borrow_mut().translate(raw, scene.camera(), &mut self.bus);
    }

    /// Process every event in the current queue
    pub fn drain(&mut self) {
        if let Some(top) = self.scenes.last_mut() {
            top.flush_outbox(&mut self.bus);
        }
        while self.running {
            let Some(event) = self.bus.pop() else {
                break;
            };
            self.process(&event);
        }
    }

    fn process(&mut self, event: &Event) {
        let top = self.scenes.last().map(Scene::id);
        if let (Some(stamp), Some(top)) = (event.scene, top) {
            if stamp != top {
                trace!("dropping stale {:?}", event.kind());
                return;
            }
        }
        if event.kind().is_scene_control() {
            self.control(event);
            return;
        }
        match &event.data {
            EventData::TimeDilation { scale } => {
                info!("time scale {} -> {scale}", self.bus.time_scale());
                self.bus.set_time_scale(*scale);
            }
            EventData::AddComponent { entity, component } => {
                if let (Some(scene), Some(component)) = (self.scenes.last_mut(), component.take()) {
                    if let Err(err) = scene.add_boxed(*entity, component) {
                        warn!("AddComponent on {entity:?}: {err}");
                    }
                }
            }
            EventData::RemoveComponent { entity, component } => {
                if let Some(scene) = self.scenes.last_mut() {
                    if let Err(err) = scene.remove_component(*entity, *component) {
                        warn!("RemoveComponent on {entity:?}: {err}");
                    }
                }
            }
            _ => {}
        }
        self.deliver(event);
        if let EventData::DestroyEntity { entity } = event.data {
            self.destroy_entity(entity);
        }
    }

    fn destroy_entity(&mut self, id: crate::foundation::collections::EntityId) {
        let Some(scene) = self.scenes.last_mut() else {
            return;
        };
        if let Some(entity) = scene.entity_mut(id) {
            entity.active = false;
        }
        match scene.remove(id) {
            Ok(entity) => debug!("destroyed '{}'", entity.name()),
            Err(err) => warn!("DestroyEntity: {err}"),
        }
        scene.flush_outbox(&mut self.bus);
    }

    fn broadcast(&mut self, data: EventData) {
        let mut event = Event::new(data);
        event.scene = self.bus.scene();
        event.time_scale = self.bus.time_scale();
        self.deliver(&event);
    }

    fn deliver(&mut self, event: &Event) {
        let kind = event.kind();
        let Self {
            scenes,
            systems,
            dispatcher,
            behaviours,
            services,
            bus,
            ..
        } = self;
        if let Some(scene) = scenes.last_mut() {
            scene.begin_delivery();
        }
        for registered in systems.iter_mut().filter(|r| r.wants(kind)) {
            run_system(registered.system.as_mut(), scenes.last_mut(), bus, services, event);
        }
        run_system(dispatcher, scenes.last_mut(), bus, services, event);
        run_system(behaviours, scenes.last_mut(), bus, services, event);
        if let Some(scene) = scenes.last_mut() {
            scene.end_delivery();
        }
    }

    fn run_scheduled(&mut self, dt: f32) {
        for (delay, task) in self.bus.take_scheduled() {
            self.scheduler.schedule(delay, task);
        }
        let due = self.scheduler.advance(dt * self.bus.time_scale());
        if due.is_empty() {
            return;
        }
        for task in due {
            let Some(scene) = self.scenes.last_mut() else {
                break;
            };
            task(scene, &mut self.bus);
            scene.flush_outbox(&mut self.bus);
        }
        self.drain();
    }
}

fn run_system(
    system: &mut dyn System,
    scene: Option<&mut Scene>,
    bus: &mut EventBus,
    services: &Services,
    event: &Event,
) {
    let mut ctx = SystemContext { scene, bus, services };
    if let Err(err) = system.on_event(&mut ctx, event) {
        error!("{} failed on {:?}: {err}", system.name(), event.kind());
    }
    if let Some(scene) = ctx.scene {
        scene.flush_outbox(ctx.bus);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scenes", &self.scenes.iter().map(Scene::name).collect::<Vec<_>>())
            .field("systems", &self.systems.iter().map(|r| r.system.name()).collect::<Vec<_>>())
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
