//! Engine-agnostic scene graph of the robot and the queries the editor needs from it.
//!
//! A [`RobotScene`] is a tree of named links. Each link hangs off its parent at
//! a fixed origin and, if it is driven by one of the nine controllable joints,
//! rotates about that joint's axis. [`RobotScene::pose`] runs forward
//! kinematics for a [`JointVector`] and yields a [`ScenePose`], which answers
//! the [`TransformQuery`] calls made by the manipulator and the collision
//! monitor. A host engine with its own scene graph can implement
//! [`TransformQuery`] directly instead.

use crate::joint::{JOINT_COUNT, JointIndex, JointVector};
use bevy_math::bounding::{Aabb3d, Bounded3d};
use bevy_math::primitives::{Capsule3d, Cuboid, Cylinder, Sphere};
use bevy_math::Isometry3d;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Supported collision shapes for links.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapePrimitive {
    /// A box defined by half-extents (x, y, z).
    Box(Vec3),
    /// A cylinder defined by radius and height (aligned along Y axis).
    Cylinder { radius: f32, height: f32 },
    /// A sphere defined by radius.
    Sphere(f32),
    /// A capsule defined by radius and the length of its straight section (Y axis).
    Capsule { radius: f32, height: f32 },
}

impl ShapePrimitive {
    /// World-space bounding box of the shape placed at `translation`/`rotation`.
    pub fn aabb(self, translation: Vec3, rotation: Quat) -> Aabb3d {
        let isometry = Isometry3d::new(translation, rotation);
        match self {
            Self::Box(half_size) => Cuboid { half_size }.aabb_3d(isometry),
            Self::Cylinder { radius, height } => Cylinder::new(radius, height).aabb_3d(isometry),
            Self::Sphere(radius) => Sphere::new(radius).aabb_3d(isometry),
            Self::Capsule { radius, height } => Capsule3d::new(radius, height).aabb_3d(isometry),
        }
    }
}

/// One rigid body of the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub name: String,
    /// Index of the parent link; `None` for the root.
    pub parent: Option<usize>,
    /// Joint origin in the parent's frame (world frame for the root).
    pub origin: Vec3,
    /// The controllable joint rotating this link, or `None` for a fixed mount.
    pub joint: Option<JointIndex>,
    /// Collision shape, if the link has one.
    pub shape: Option<ShapePrimitive>,
    /// Shape center in the link's own frame.
    pub shape_offset: Vec3,
}

impl LinkDefinition {
    pub fn new(name: impl Into<String>, parent: Option<usize>, origin: Vec3) -> Self {
        Self {
            name: name.into(),
            parent,
            origin,
            joint: None,
            shape: None,
            shape_offset: Vec3::ZERO,
        }
    }

    pub fn with_joint(mut self, joint: JointIndex) -> Self {
        self.joint = Some(joint);
        self
    }

    pub fn with_shape(mut self, shape: ShapePrimitive, offset: Vec3) -> Self {
        self.shape = Some(shape);
        self.shape_offset = offset;
        self
    }
}

/// World placement of a controllable joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointTransform {
    pub translation: Vec3,
    /// Orientation of the link the joint drives, joint rotation included.
    pub rotation: Quat,
    /// Rotation axis in world space, unit length.
    pub axis: Vec3,
}

/// A named world-space collision volume.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyVolume {
    pub name: String,
    pub aabb: Aabb3d,
}

/// What the editor reads from the scene every frame.
pub trait TransformQuery {
    /// World placement of `joint`, if the scene contains it.
    fn joint_transform(&self, joint: JointIndex) -> Option<JointTransform>;

    /// Collision volumes of every named body that has one.
    fn body_volumes(&self) -> Vec<BodyVolume>;
}

/// A tree of links. Parents are always added before their children.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotScene {
    links: Vec<LinkDefinition>,
}

impl RobotScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a link and returns its index.
    ///
    /// A parent index that does not refer to an earlier link makes the new
    /// link a root.
    pub fn add_link(&mut self, mut link: LinkDefinition) -> usize {
        if link.parent.is_some_and(|p| p >= self.links.len()) {
            tracing::warn!(link = %link.name, "parent link not found, attaching at root");
            link.parent = None;
        }
        self.links.push(link);
        self.links.len() - 1
    }

    pub fn links(&self) -> &[LinkDefinition] {
        &self.links
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    /// Forward kinematics for `values`.
    pub fn pose(&self, values: &JointVector) -> ScenePose {
        let mut frames: Vec<(Vec3, Quat)> = Vec::with_capacity(self.links.len());
        let mut joints = [None; JOINT_COUNT];

        for link in &self.links {
            let (parent_pos, parent_rot) = link
                .parent
                .and_then(|p| frames.get(p).copied())
                .unwrap_or((Vec3::ZERO, Quat::IDENTITY));

            let position = parent_pos + parent_rot * link.origin;
            let rotation = match link.joint {
                Some(joint) => {
                    let rotation =
                        parent_rot * Quat::from_axis_angle(joint.axis(), values[joint]);
                    joints[joint.index()] = Some(JointTransform {
                        translation: position,
                        rotation,
                        axis: (rotation * joint.axis()).normalize(),
                    });
                    rotation
                }
                None => parent_rot,
            };
            frames.push((position, rotation));
        }

        let bodies = self
            .links
            .iter()
            .zip(&frames)
            .filter_map(|(link, &(position, rotation))| {
                let shape = link.shape?;
                Some(BodyVolume {
                    name: link.name.clone(),
                    aabb: shape.aabb(position + rotation * link.shape_offset, rotation),
                })
            })
            .collect();

        ScenePose { joints, bodies }
    }

    /// A simplified upper-body humanoid (pelvis, waist, both arms with hands,
    /// fixed leg stubs) in a Y-up, Z-forward frame with the left side on +X.
    ///
    /// Link names follow the `*_link` convention used by the collision monitor.
    pub fn humanoid() -> Self {
        let mut scene = Self::new();
        let pelvis = scene.add_link(
            LinkDefinition::new("pelvis", None, Vec3::new(0.0, 0.79, 0.0))
                .with_shape(ShapePrimitive::Box(Vec3::new(0.1, 0.05, 0.07)), Vec3::ZERO),
        );
        let torso = scene.add_link(
            LinkDefinition::new("torso_link", Some(pelvis), Vec3::new(0.0, 0.05, 0.0))
                .with_joint(JointIndex::Torso)
                .with_shape(
                    ShapePrimitive::Box(Vec3::new(0.1, 0.15, 0.07)),
                    Vec3::new(0.0, 0.17, 0.0),
                ),
        );

        for (side, sign) in [("left", 1.0), ("right", -1.0)] {
            let (pitch, roll, yaw, elbow) = if sign > 0.0 {
                (
                    JointIndex::LeftShoulderPitch,
                    JointIndex::LeftShoulderRoll,
                    JointIndex::LeftShoulderYaw,
                    JointIndex::LeftElbow,
                )
            } else {
                (
                    JointIndex::RightShoulderPitch,
                    JointIndex::RightShoulderRoll,
                    JointIndex::RightShoulderYaw,
                    JointIndex::RightElbow,
                )
            };

            let p = scene.add_link(
                LinkDefinition::new(
                    format!("{side}_shoulder_pitch_link"),
                    Some(torso),
                    Vec3::new(0.1 * sign, 0.33, 0.0),
                )
                .with_joint(pitch)
                .with_shape(ShapePrimitive::Sphere(0.04), Vec3::new(0.02 * sign, 0.0, 0.0)),
            );
            let r = scene.add_link(
                LinkDefinition::new(
                    format!("{side}_shoulder_roll_link"),
                    Some(p),
                    Vec3::new(0.05 * sign, 0.0, 0.0),
                )
                .with_joint(roll)
                .with_shape(
                    ShapePrimitive::Cylinder {
                        radius: 0.035,
                        height: 0.06,
                    },
                    Vec3::new(0.0, -0.03, 0.0),
                ),
            );
            let y = scene.add_link(
                LinkDefinition::new(
                    format!("{side}_shoulder_yaw_link"),
                    Some(r),
                    Vec3::new(0.0, -0.08, 0.0),
                )
                .with_joint(yaw)
                .with_shape(
                    ShapePrimitive::Capsule {
                        radius: 0.035,
                        height: 0.1,
                    },
                    Vec3::new(0.0, -0.06, 0.0),
                ),
            );
            let e = scene.add_link(
                LinkDefinition::new(
                    format!("{side}_elbow_link"),
                    Some(y),
                    Vec3::new(0.0, -0.12, 0.0),
                )
                .with_joint(elbow)
                .with_shape(
                    ShapePrimitive::Capsule {
                        radius: 0.03,
                        height: 0.1,
                    },
                    Vec3::new(0.0, -0.07, 0.0),
                ),
            );
            scene.add_link(
                LinkDefinition::new(format!("{side}_hand_link"), Some(e), Vec3::new(0.0, -0.14, 0.0))
                    .with_shape(ShapePrimitive::Sphere(0.035), Vec3::ZERO),
            );

            let mut parent = pelvis;
            let leg = [
                ("hip_yaw", Vec3::new(0.06 * sign, -0.05, 0.0)),
                ("hip_roll", Vec3::new(0.0, -0.06, 0.0)),
                ("hip_pitch", Vec3::new(0.0, -0.06, 0.0)),
                ("knee", Vec3::new(0.0, -0.3, 0.0)),
                ("ankle", Vec3::new(0.0, -0.3, 0.0)),
            ];
            for (part, origin) in leg {
                parent = scene.add_link(
                    LinkDefinition::new(format!("{side}_{part}_link"), Some(parent), origin)
                        .with_shape(
                            ShapePrimitive::Box(Vec3::new(0.04, 0.03, 0.04)),
                            Vec3::new(0.0, -0.03, 0.0),
                        ),
                );
            }
        }
        scene
    }
}

/// A scene evaluated at one joint vector.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenePose {
    joints: [Option<JointTransform>; JOINT_COUNT],
    bodies: Vec<BodyVolume>,
}

impl TransformQuery for ScenePose {
    fn joint_transform(&self, joint: JointIndex) -> Option<JointTransform> {
        self.joints[joint.index()]
    }

    fn body_volumes(&self) -> Vec<BodyVolume> {
        self.bodies.clone()
    }
}
