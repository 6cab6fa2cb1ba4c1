//! End-to-end behaviour through the public API

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use engine2d::prelude::*;

fn engine() -> Engine {
    Engine::new(EngineConfig::default().with_asset_root("missing-assets")).expect("valid config")
}

fn scene(name: &str) -> Scene {
    Scene::new(name, Vector::new(640.0, 640.0), 64.0).expect("valid scene")
}

#[test]
fn test_camera_culling() {
    let scene = scene("culling");
    let camera = scene.camera();
    assert_abs_diff_eq!(camera.frame_size().x, 10.0);
    assert_abs_diff_eq!(camera.frame_size().y, 10.0);
    assert!(camera.in_frame(Vector::zero(), Vector::new(2.0, 2.0)));
    assert!(!camera.in_frame(Vector::new(-6.0, 0.0), Vector::new(2.0, 2.0)));
}

#[test]
fn test_children_follow_their_parent() {
    let mut scene = scene("parenting");
    let a = scene
        .add_at(Entity::new("a"), Vector::new(1.0, 1.0), 0)
        .expect("added");
    let b = scene
        .add_at(Entity::new("b"), Vector::new(2.0, 2.0), 0)
        .expect("added");
    scene.set_parent(b, Some(a)).expect("parented");
    scene.set_position(a, Vector::new(5.0, 5.0)).expect("moved");
    let b = scene.entity(b).map(Entity::position).expect("child");
    assert_abs_diff_eq!(b.x, 6.0, epsilon = 1e-5);
    assert_abs_diff_eq!(b.y, 6.0, epsilon = 1e-5);
}

#[test]
fn test_animation_drives_entity_position() {
    let mut scene = scene("animated");
    let id = scene.add(Entity::new("bouncer")).expect("added");
    let mut animation = Animation::new(
        vec![
            Frame::new("position", Vector::new(0.0, 1.0), 1.0),
            Frame::new("position", Vector::new(0.0, -1.0), 0.3),
        ],
        Linear,
        false,
    )
    .expect("valid animation");
    assert_abs_diff_eq!(animation.length(), 1.3, epsilon = 0.16);

    assert!(animation.play_on(&mut scene, id, 1.0 / 60.0));
    let first = scene.entity(id).map(Entity::position).expect("entity");
    assert_abs_diff_eq!(first.y, 1.0, epsilon = 1e-5);

    let mut guard = 0;
    while animation.play_on(&mut scene, id, 1.0 / 60.0) && guard < 1000 {
        guard += 1;
    }
    assert!(animation.is_finished());
    let last = scene.entity(id).map(Entity::position).expect("entity");
    assert_abs_diff_eq!(last.y, -1.0, epsilon = 1e-5);
}

#[test]
fn test_body_falls_under_gravity() {
    let mut engine = engine();
    let mut level = scene("falling");
    let ball = level
        .add_at(
            Entity::new("ball").with(RigidBody::dynamic()).expect("body"),
            Vector::new(0.0, 10.0),
            0,
        )
        .expect("added");
    engine.start_scene(level);
    for _ in 0..50 {
        assert!(engine.tick(FIXED_DELTA));
    }
    let y = engine
        .scene()
        .and_then(|s| s.entity(ball))
        .map(|e| e.position().y)
        .expect("ball");
    assert_abs_diff_eq!(y, 5.0, epsilon = 0.5);
}

#[test]
fn test_ray_cast_hits_ground() {
    let mut engine = engine();
    let mut level = scene("rays");
    level.add_layer("Ground", 2).expect("layer");
    let ground = level
        .add_at(
            Entity::new("ground")
                .with_scale(Vector::new(2.0, 2.0))
                .with(Collider::cuboid())
                .expect("collider"),
            Vector::zero(),
            "Ground",
        )
        .expect("added");
    engine.start_scene(level);
    engine.tick(FIXED_DELTA);

    let layer = engine.scene().map(|s| s.layer("Ground")).expect("scene").expect("layer");
    let physics = engine.physics();
    let hits = physics.borrow().ray_cast(
        engine.scene().expect("scene"),
        Vector::new(0.0, 10.0),
        Vector::down(),
        20.0,
        Some(layer),
        RayMode::Closest,
        false,
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, ground);
    assert_abs_diff_eq!(hits[0].point.y, 1.0, epsilon = 1e-3);
}

#[test]
fn test_replace_scene_drops_deferred_events() {
    let first_log: Rc<RefCell<Vec<String>>> = Rc::default();
    let second_log: Rc<RefCell<Vec<String>>> = Rc::default();

    let mut second = scene("second");
    let log = Rc::clone(&second_log);
    second
        .add(
            Entity::new("greeter")
                .with(Script::from_fn(
                    "greeter",
                    &[EventKind::SceneStarted, EventKind::Update],
                    move |_ctx, event| {
                        if event.kind() != EventKind::Init {
                            log.borrow_mut().push(format!("{:?}", event.kind()));
                        }
                        Ok(())
                    },
                ))
                .expect("script"),
        )
        .expect("added");

    let mut first = scene("first");
    let log = Rc::clone(&first_log);
    let mut next = Some(second);
    first
        .add(
            Entity::new("switcher")
                .with(Script::from_fn(
                    "switcher",
                    &[EventKind::Update, EventKind::Custom("E")],
                    move |ctx, event| {
                        log.borrow_mut().push(format!("{:?}", event.kind()));
                        if event.kind() == EventKind::Update {
                            if let Some(scene) = next.take() {
                                ctx.dispatch(EventData::custom("E", ()), false);
                                ctx.dispatch(EventData::ReplaceScene(SceneRequest::new(scene)), false);
                            }
                        }
                        Ok(())
                    },
                ))
                .expect("script"),
        )
        .expect("added");

    let mut engine = engine();
    engine.start_scene(first);
    for _ in 0..5 {
        engine.tick(1.0 / 60.0);
    }

    assert_eq!(engine.depth(), 1);
    assert_eq!(engine.scene().map(Scene::name), Some("second"));
    assert!(!first_log.borrow().iter().any(|kind| kind.contains("\"E\"")));
    assert_eq!(second_log.borrow().first().map(String::as_str), Some("SceneStarted"));
}
