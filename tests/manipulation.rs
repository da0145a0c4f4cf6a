// tests/manipulation.rs
use approx::assert_relative_eq;
use bevy_math::{Dir3, Ray3d};
use glam::{Quat, Vec2, Vec3};
use motion_forge::{
    BlockId, BodyVolume, Controller, DragKind, JointIndex, JointTransform, JointVector,
    KinematicManipulator, ManipulatorConfig, MotionSession, OwnershipError, PointerEvent,
    TransformQuery,
};
use proptest::prelude::*;
use std::time::Duration;

/// A scene holding a single joint at the origin.
struct OneJoint {
    joint: JointIndex,
    axis: Vec3,
}

impl TransformQuery for OneJoint {
    fn joint_transform(&self, joint: JointIndex) -> Option<JointTransform> {
        (joint == self.joint).then(|| JointTransform {
            translation: Vec3::ZERO,
            rotation: Quat::from_rotation_arc(joint.axis(), self.axis),
            axis: self.axis,
        })
    }

    fn body_volumes(&self) -> Vec<BodyVolume> {
        Vec::new()
    }
}

/// Joints at fixed places with fixed world axes.
struct Handles(Vec<(JointIndex, Vec3, Vec3)>);

impl TransformQuery for Handles {
    fn joint_transform(&self, joint: JointIndex) -> Option<JointTransform> {
        let &(_, translation, axis) = self.0.iter().find(|h| h.0 == joint)?;
        Some(JointTransform {
            translation,
            rotation: Quat::from_rotation_arc(joint.axis(), axis),
            axis,
        })
    }

    fn body_volumes(&self) -> Vec<BodyVolume> {
        Vec::new()
    }
}

/// Pointer looking down -Z through `(x, y)` from two meters away.
fn pointer_at(screen: Vec2, x: f32, y: f32) -> PointerEvent {
    PointerEvent::new(
        screen,
        Ray3d {
            origin: Vec3::new(x, y, 2.0),
            direction: Dir3::NEG_Z,
        },
    )
}

#[test]
fn linear_drag_up_increases_value() {
    let scene = OneJoint {
        joint: JointIndex::LeftElbow,
        axis: Vec3::X,
    };
    let mut m = KinematicManipulator::new(ManipulatorConfig::default());
    let values = JointVector::ZERO;

    let down = pointer_at(Vec2::new(200.0, 300.0), 0.0, 0.0);
    assert_eq!(m.pointer_down(&down, &scene, &values), Some(DragKind::Linear));
    assert_eq!(m.selected(), Some(JointIndex::LeftElbow));

    let up = pointer_at(Vec2::new(200.0, 250.0), 0.0, 0.0);
    let (joint, value) = m.pointer_move(&up).unwrap();
    assert_eq!(joint, JointIndex::LeftElbow);
    assert_relative_eq!(value, 0.5);

    assert!(m.pointer_up());
    assert!(m.pointer_move(&up).is_none());
}

#[test]
fn missing_every_handle_starts_nothing() {
    let scene = OneJoint {
        joint: JointIndex::Torso,
        axis: Vec3::Y,
    };
    let mut m = KinematicManipulator::default();
    let miss = pointer_at(Vec2::ZERO, 1.0, 1.0);
    assert_eq!(m.pointer_down(&miss, &scene, &JointVector::ZERO), None);
    assert!(!m.is_dragging());
}

#[test]
fn tilted_handle_does_not_shadow_the_one_behind() {
    let scene = Handles(vec![
        (JointIndex::Torso, Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0).normalize()),
        (JointIndex::LeftElbow, Vec3::new(0.03, -0.03, -0.5), Vec3::X),
    ]);
    let mut m = KinematicManipulator::default();

    // Passes the torso handle's corner, well clear of the handle itself.
    let past = pointer_at(Vec2::ZERO, 0.03, -0.03);
    assert_eq!(m.pointer_down(&past, &scene, &JointVector::ZERO), Some(DragKind::Linear));
    assert_eq!(m.selected(), Some(JointIndex::LeftElbow));
    m.pointer_up();

    let through = pointer_at(Vec2::ZERO, 0.02, 0.02);
    assert_eq!(m.pointer_down(&through, &scene, &JointVector::ZERO), Some(DragKind::Linear));
    assert_eq!(m.selected(), Some(JointIndex::Torso));
}

#[test]
fn arc_drag_follows_swept_angle() {
    let quarter = std::f32::consts::FRAC_PI_2;
    for (joint, expected) in [
        (JointIndex::Torso, -1.55),
        // Roll joints turn opposite to the pointer.
        (JointIndex::LeftShoulderRoll, 1.55),
    ] {
        let scene = OneJoint { joint, axis: Vec3::Z };
        let mut m = KinematicManipulator::default();
        m.select(Some(joint));

        let start = pointer_at(Vec2::ZERO, 0.1, 0.0);
        assert_eq!(
            m.pointer_down(&start, &scene, &JointVector::ZERO),
            Some(DragKind::Rotational)
        );
        let (_, value) = m.pointer_move(&pointer_at(Vec2::ZERO, 0.0, 0.1)).unwrap();
        assert_relative_eq!(value, expected, epsilon = 1e-5);
        assert!(value.abs() < quarter);
    }
}

#[test]
fn arc_is_ignored_outside_its_sector() {
    let scene = OneJoint {
        joint: JointIndex::Torso,
        axis: Vec3::Z,
    };
    let mut m = KinematicManipulator::default();
    m.select(Some(JointIndex::Torso));
    let far = pointer_at(Vec2::ZERO, 0.5, 0.0);
    assert_eq!(m.pointer_down(&far, &scene, &JointVector::ZERO), None);
}

#[test]
fn handle_opacity_marks_selection_and_chain() {
    let session = MotionSession::default();
    let mut m = KinematicManipulator::default();
    m.select(Some(JointIndex::LeftShoulderRoll));
    let handles = m.handle_directives(&session.pose());
    assert_eq!(handles.len(), 9);

    let opacity = |j: JointIndex| handles.iter().find(|h| h.joint == j).unwrap().opacity;
    assert_eq!(opacity(JointIndex::LeftShoulderRoll), 0.92);
    assert_eq!(opacity(JointIndex::LeftShoulderYaw), 0.3);
    assert_eq!(opacity(JointIndex::LeftElbow), 0.3);
    assert_eq!(opacity(JointIndex::LeftShoulderPitch), 0.15);
    assert_eq!(opacity(JointIndex::RightElbow), 0.15);

    let arc = m.arc_directive(&session.pose());
    assert!(arc.visible);
    assert_eq!(arc.radius, 0.13);
}

#[test]
fn session_drag_writes_selected_block() {
    let mut session = MotionSession::default();
    let block = session.add_block();
    session.select_target(block).unwrap();
    session.tick(Duration::from_millis(1000)).unwrap();
    assert_eq!(session.joint_values(), &JointVector::ZERO);

    let elbow = session
        .pose()
        .joint_transform(JointIndex::LeftElbow)
        .unwrap()
        .translation;
    let ray_through = |screen_y: f32| {
        PointerEvent::new(
            Vec2::new(400.0, screen_y),
            Ray3d {
                origin: elbow + Vec3::Z * 2.0,
                direction: Dir3::NEG_Z,
            },
        )
    };

    assert_eq!(
        session.on_pointer_down(&ray_through(100.0)).unwrap(),
        Some(DragKind::Linear)
    );
    assert_eq!(session.joint_state().owner(), Some(Controller::Manipulator));
    assert!(matches!(
        session.select_target(BlockId::Init),
        Err(OwnershipError::Contended { .. })
    ));

    let values = session.on_pointer_move(&ray_through(50.0)).unwrap().unwrap();
    assert_relative_eq!(values[JointIndex::LeftElbow], 0.5);
    assert_relative_eq!(
        session.sequence().get(block).unwrap().positions[JointIndex::LeftElbow],
        0.5
    );

    assert!(session.on_pointer_up());
    assert_eq!(session.joint_state().owner(), None);
    assert_eq!(session.animator().resting(), Some(block));
}

#[test]
fn pointer_down_cancels_playback() {
    let mut session = MotionSession::default();
    let block = session.add_block();
    let init_elbow = session
        .pose()
        .joint_transform(JointIndex::LeftElbow)
        .unwrap()
        .translation;
    session.select_target(block).unwrap();
    session.tick(Duration::ZERO).unwrap();
    assert!(session.animator().is_animating());

    let down = PointerEvent::new(
        Vec2::ZERO,
        Ray3d {
            origin: init_elbow + Vec3::Z * 2.0,
            direction: Dir3::NEG_Z,
        },
    );
    assert!(session.on_pointer_down(&down).unwrap().is_some());
    assert!(!session.animator().is_animating());

    session.tick(Duration::from_millis(500)).unwrap();
    assert_eq!(session.joint_values(), &session.sequence().init().positions);
}

proptest! {
    #[test]
    fn linear_drags_never_leave_limits(
        joint_index in 0usize..9,
        start in -5.0f32..5.0,
        dy in -10_000.0f32..10_000.0,
    ) {
        let joint = JointIndex::ALL[joint_index];
        let scene = OneJoint { joint, axis: Vec3::X };
        let mut m = KinematicManipulator::default();
        let mut values = JointVector::ZERO;
        values[joint] = start;

        prop_assert!(m.pointer_down(&pointer_at(Vec2::ZERO, 0.0, 0.0), &scene, &values).is_some());
        let (_, value) = m.pointer_move(&pointer_at(Vec2::new(0.0, dy), 0.0, 0.0)).unwrap();
        prop_assert!(joint.limit().contains(value), "{joint} = {value}");
    }

    #[test]
    fn arc_drags_never_leave_limits(
        joint_index in 0usize..9,
        start in -5.0f32..5.0,
        angle in -10.0f32..10.0,
    ) {
        let joint = JointIndex::ALL[joint_index];
        let scene = OneJoint { joint, axis: Vec3::Z };
        let mut m = KinematicManipulator::default();
        m.select(Some(joint));
        let mut values = JointVector::ZERO;
        values[joint] = start;

        prop_assert!(m.pointer_down(&pointer_at(Vec2::ZERO, 0.1, 0.0), &scene, &values).is_some());
        let to = pointer_at(Vec2::ZERO, 0.1 * angle.cos(), 0.1 * angle.sin());
        let (_, value) = m.pointer_move(&to).unwrap();
        prop_assert!(joint.limit().contains(value), "{joint} = {value}");
    }
}
