use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ecs::Component;
use crate::foundation::collections::{ComponentId, EntityId, SceneId};
use crate::foundation::math::Vector;
use crate::input::{KeyCode, Modifiers, MouseButton, MouseButtons, ScrollDirection};
use crate::scene::Scene;

/// A specific collider: the component on the entity that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderRef {
    /// Owning entity
    pub entity: EntityId,
    /// Collider component
    pub component: ComponentId,
}

/// Contact as seen from one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    /// The receiving entity's collider
    pub own: ColliderRef,
    /// The collider on the other side
    pub other: ColliderRef,
}

/// User payload of a custom event
#[derive(Clone)]
pub struct Payload(pub Rc<dyn Any>);

impl Payload {
    /// Wrap a value
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the value as `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// A scene travelling inside a scene-control event; taken once by the engine
#[derive(Clone)]
pub struct SceneRequest(Rc<RefCell<Option<Scene>>>);

impl SceneRequest {
    /// Wrap a scene
    pub fn new(scene: Scene) -> Self {
        Self(Rc::new(RefCell::new(Some(scene))))
    }

    /// Take the scene out; later calls return `None`
    pub fn take(&self) -> Option<Scene> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for SceneRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(slot) => match slot.as_ref() {
                Some(scene) => write!(f, "SceneRequest({})", scene.name()),
                None => f.write_str("SceneRequest(taken)"),
            },
            Err(_) => f.write_str("SceneRequest(busy)"),
        }
    }
}

/// A component travelling inside an `AddComponent` event; taken once
#[derive(Clone)]
pub struct ComponentRequest(Rc<RefCell<Option<Box<dyn Component>>>>);

impl ComponentRequest {
    /// Wrap a component
    pub fn new(component: impl Component) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(component)))))
    }

    /// Take the component out; later calls return `None`
    pub fn take(&self) -> Option<Box<dyn Component>> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for ComponentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentRequest(..)")
    }
}

/// Event kinds and their payloads
#[derive(Debug, Clone)]
pub enum EventData {
    // -- lifecycle --
    /// A scene is being started; carries its id. Broadcast to every system.
    StartScene {
        /// Scene being started
        scene: SceneId,
    },
    /// The scene finished starting
    SceneStarted,
    /// The scene is being stopped
    SceneStopped,
    /// The scene resumed after the scene above it stopped
    SceneContinued,
    /// The scene was paused (another scene was pushed over it)
    ScenePaused,
    /// The scene's setup hook ran
    SetupScene,
    /// First event of a freshly attached component
    Init,
    /// Request to destroy an entity
    DestroyEntity {
        /// Target
        entity: EntityId,
    },
    /// An entity left its scene
    EntityDestroyed {
        /// Former entity
        entity: EntityId,
        /// Its name, for logs and listeners
        name: String,
    },
    /// Request to disable an entity's body
    DisableEntity {
        /// Target
        entity: EntityId,
    },
    /// Request to enable an entity's body
    EnableEntity {
        /// Target
        entity: EntityId,
    },
    /// The entity is now disabled
    EntityDisabled {
        /// Target
        entity: EntityId,
    },
    /// The entity is now enabled
    EntityEnabled {
        /// Target
        entity: EntityId,
    },
    /// Request to attach a component at the next safe point
    AddComponent {
        /// Target
        entity: EntityId,
        /// Component to attach
        component: ComponentRequest,
    },
    /// A component was attached
    ComponentAdded {
        /// Owner
        entity: EntityId,
        /// New component
        component: ComponentId,
        /// Its type name
        name: &'static str,
    },
    /// Request to detach a component at the next safe point
    RemoveComponent {
        /// Owner
        entity: EntityId,
        /// Component to detach
        component: ComponentId,
    },
    /// A component was detached
    ComponentRemoved {
        /// Former owner
        entity: EntityId,
        /// Detached component
        component: ComponentId,
        /// Its type name
        name: &'static str,
    },

    // -- timing --
    /// Variable-rate update
    Update {
        /// Seconds since the previous update
        dt: f32,
    },
    /// Fixed-rate update, before physics
    FixedUpdate {
        /// Fixed step length
        dt: f32,
    },
    /// After every `Update`
    LateUpdate {
        /// Seconds since the previous update
        dt: f32,
    },
    /// Physics step trigger
    PhysicsUpdate {
        /// Fixed step length
        dt: f32,
    },
    /// Host loop heartbeat with the raw frame delta
    Idle {
        /// Raw host delta
        dt: f32,
    },
    /// Change the engine time scale
    TimeDilation {
        /// New scale, `1.0` is real time
        scale: f32,
    },

    // -- input --
    /// Key pressed
    KeyDown {
        /// Key
        key: KeyCode,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Key released
    KeyUp {
        /// Key
        key: KeyCode,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Cursor moved
    MouseMotion {
        /// Scene-space position
        position: Vector,
        /// Screen point, origin bottom-left
        screen: Vector,
        /// Screen-space movement
        delta: Vector,
    },
    /// Mouse button pressed
    MouseDown {
        /// Button
        button: MouseButton,
        /// Scene-space position
        position: Vector,
        /// Screen point
        screen: Vector,
    },
    /// Mouse button released
    MouseUp {
        /// Button
        button: MouseButton,
        /// Scene-space position
        position: Vector,
        /// Screen point
        screen: Vector,
    },
    /// Wheel scrolled
    MouseScroll {
        /// Direction
        direction: ScrollDirection,
        /// Scene-space position
        position: Vector,
    },
    /// Cursor moved with buttons held
    MouseDrag {
        /// Held buttons
        buttons: MouseButtons,
        /// Scene-space position
        position: Vector,
        /// Screen point
        screen: Vector,
        /// Screen-space movement
        delta: Vector,
    },
    /// Cursor entered the window
    MouseEnter {
        /// Screen point
        screen: Vector,
    },
    /// Cursor left the window
    MouseLeave {
        /// Screen point
        screen: Vector,
    },

    // -- physics --
    /// Two solid colliders started touching
    CollisionBegin(Collision),
    /// Two solid colliders stopped touching
    CollisionEnd(Collision),
    /// A collider entered a sensor (or the camera)
    CollisionEnter(Collision),
    /// A collider left a sensor (or the camera)
    CollisionExit(Collision),
    /// Build the entity's body at the next safe point
    CreateBody {
        /// Owner
        entity: EntityId,
    },
    /// The entity's body exists
    BodyCreated {
        /// Owner
        entity: EntityId,
    },
    /// Tear down the entity's body at the next safe point
    DestroyBody {
        /// Owner
        entity: EntityId,
    },
    /// The entity's body is gone
    BodyDestroyed {
        /// Former owner
        entity: EntityId,
    },

    // -- render --
    /// Before the render pass
    PreRender,
    /// Render pass trigger
    Render,
    /// After the render pass
    Rendered,
    /// The backend surface changed size
    WindowResized {
        /// New size in pixels
        size: Vector,
    },
    /// Physics debug shapes are ready
    DrawDebug,

    // -- animation --
    /// An animator switched animations
    AnimChanged {
        /// Owner
        entity: EntityId,
        /// Previous animation
        from: String,
        /// New animation
        to: String,
    },

    // -- assets --
    /// An asset finished loading
    AssetLoaded {
        /// Asset class
        class: &'static str,
        /// Asset name
        name: String,
        /// Loads finished so far
        loaded: usize,
        /// Loads queued so far
        queued: usize,
    },

    // -- scene control --
    /// Start a scene on top of the current one
    PushScene(SceneRequest),
    /// Stop the current scene and resume the previous one
    StopScene,
    /// Stop the current scene and start another
    ReplaceScene(SceneRequest),
    /// Pause or resume the current scene
    PauseScene {
        /// `true` pauses, `false` resumes
        paused: bool,
    },
    /// Stop the engine
    Quit,

    /// User-defined event
    Custom {
        /// Routing name
        name: &'static str,
        /// Data
        payload: Payload,
    },
}

/// Fieldless mirror of [`EventData`], used for routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventKind {
    StartScene,
    SceneStarted,
    SceneStopped,
    SceneContinued,
    ScenePaused,
    SetupScene,
    Init,
    DestroyEntity,
    EntityDestroyed,
    DisableEntity,
    EnableEntity,
    EntityDisabled,
    EntityEnabled,
    AddComponent,
    ComponentAdded,
    RemoveComponent,
    ComponentRemoved,
    Update,
    FixedUpdate,
    LateUpdate,
    PhysicsUpdate,
    Idle,
    TimeDilation,
    KeyDown,
    KeyUp,
    MouseMotion,
    MouseDown,
    MouseUp,
    MouseScroll,
    MouseDrag,
    MouseEnter,
    MouseLeave,
    CollisionBegin,
    CollisionEnd,
    CollisionEnter,
    CollisionExit,
    CreateBody,
    BodyCreated,
    DestroyBody,
    BodyDestroyed,
    PreRender,
    Render,
    Rendered,
    WindowResized,
    DrawDebug,
    AnimChanged,
    AssetLoaded,
    PushScene,
    StopScene,
    ReplaceScene,
    PauseScene,
    Quit,
    Custom(&'static str),
}

impl EventKind {
    /// Events that change the scene stack or end the loop
    pub const fn is_scene_control(self) -> bool {
        matches!(
            self,
            Self::PushScene | Self::StopScene | Self::ReplaceScene | Self::PauseScene | Self::Quit
        )
    }

    /// Scene lifecycle broadcasts, delivered to every system
    pub const fn is_broadcast(self) -> bool {
        matches!(
            self,
            Self::StartScene
                | Self::SceneStarted
                | Self::SceneStopped
                | Self::SceneContinued
                | Self::ScenePaused
        )
    }

    /// Events delivered to components of inactive entities too
    pub const fn reaches_inactive(self) -> bool {
        matches!(
            self,
            Self::Init
                | Self::SceneStopped
                | Self::EnableEntity
                | Self::EntityEnabled
                | Self::DisableEntity
                | Self::EntityDisabled
                | Self::BodyCreated
                | Self::BodyDestroyed
                | Self::ComponentAdded
                | Self::ComponentRemoved
        )
    }
}

impl EventData {
    /// Routing kind
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StartScene { .. } => EventKind::StartScene,
            Self::SceneStarted => EventKind::SceneStarted,
            Self::SceneStopped => EventKind::SceneStopped,
            Self::SceneContinued => EventKind::SceneContinued,
            Self::ScenePaused => EventKind::ScenePaused,
            Self::SetupScene => EventKind::SetupScene,
            Self::Init => EventKind::Init,
            Self::DestroyEntity { .. } => EventKind::DestroyEntity,
            Self::EntityDestroyed { .. } => EventKind::EntityDestroyed,
            Self::DisableEntity { .. } => EventKind::DisableEntity,
            Self::EnableEntity { .. } => EventKind::EnableEntity,
            Self::EntityDisabled { .. } => EventKind::EntityDisabled,
            Self::EntityEnabled { .. } => EventKind::EntityEnabled,
            Self::AddComponent { .. } => EventKind::AddComponent,
            Self::ComponentAdded { .. } => EventKind::ComponentAdded,
            Self::RemoveComponent { .. } => EventKind::RemoveComponent,
            Self::ComponentRemoved { .. } => EventKind::ComponentRemoved,
            Self::Update { .. } => EventKind::Update,
            Self::FixedUpdate { .. } => EventKind::FixedUpdate,
            Self::LateUpdate { .. } => EventKind::LateUpdate,
            Self::PhysicsUpdate { .. } => EventKind::PhysicsUpdate,
            Self::Idle { .. } => EventKind::Idle,
            Self::TimeDilation { .. } => EventKind::TimeDilation,
            Self::KeyDown { .. } => EventKind::KeyDown,
            Self::KeyUp { .. } => EventKind::KeyUp,
            Self::MouseMotion { .. } => EventKind::MouseMotion,
            Self::MouseDown { .. } => EventKind::MouseDown,
            Self::MouseUp { .. } => EventKind::MouseUp,
            Self::MouseScroll { .. } => EventKind::MouseScroll,
            Self::MouseDrag { .. } => EventKind::MouseDrag,
            Self::MouseEnter { .. } => EventKind::MouseEnter,
            Self::MouseLeave { .. } => EventKind::MouseLeave,
            Self::CollisionBegin(_) => EventKind::CollisionBegin,
            Self::CollisionEnd(_) => EventKind::CollisionEnd,
            Self::CollisionEnter(_) => EventKind::CollisionEnter,
            Self::CollisionExit(_) => EventKind::CollisionExit,
            Self::CreateBody { .. } => EventKind::CreateBody,
            Self::BodyCreated { .. } => EventKind::BodyCreated,
            Self::DestroyBody { .. } => EventKind::DestroyBody,
            Self::BodyDestroyed { .. } => EventKind::BodyDestroyed,
            Self::PreRender => EventKind::PreRender,
            Self::Render => EventKind::Render,
            Self::Rendered => EventKind::Rendered,
            Self::WindowResized { .. } => EventKind::WindowResized,
            Self::DrawDebug => EventKind::DrawDebug,
            Self::AnimChanged { .. } => EventKind::AnimChanged,
            Self::AssetLoaded { .. } => EventKind::AssetLoaded,
            Self::PushScene(_) => EventKind::PushScene,
            Self::StopScene => EventKind::StopScene,
            Self::ReplaceScene(_) => EventKind::ReplaceScene,
            Self::PauseScene { .. } => EventKind::PauseScene,
            Self::Quit => EventKind::Quit,
            Self::Custom { name, .. } => EventKind::Custom(*name),
        }
    }

    /// Time delta of timing events
    pub const fn delta(&self) -> Option<f32> {
        match self {
            Self::Update { dt }
            | Self::FixedUpdate { dt }
            | Self::LateUpdate { dt }
            | Self::PhysicsUpdate { dt }
            | Self::Idle { dt } => Some(*dt),
            _ => None,
        }
    }

    /// Custom event carrying `value`
    pub fn custom<T: Any>(name: &'static str, value: T) -> Self {
        Self::Custom {
            name,
            payload: Payload::new(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mirrors_data() {
        assert_eq!(EventData::Update { dt: 0.1 }.kind(), EventKind::Update);
        assert_eq!(EventData::custom("score", 3_u32).kind(), EventKind::Custom("score"));
        assert_ne!(EventKind::Custom("a"), EventKind::Custom("b"));
    }

    #[test]
    fn test_scene_control_kinds() {
        assert!(EventKind::StopScene.is_scene_control());
        assert!(EventKind::Quit.is_scene_control());
        assert!(!EventKind::StartScene.is_scene_control());
        assert!(EventKind::StartScene.is_broadcast());
    }

    #[test]
    fn test_payload_downcast() {
        let data = EventData::custom("hit", 42_i32);
        let EventData::Custom { payload, .. } = data else {
            panic!("expected a custom event");
        };
        assert_eq!(payload.get::<i32>(), Some(&42));
        assert!(payload.get::<u8>().is_none());
    }
}
