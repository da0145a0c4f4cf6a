//! The fixed 9-DOF joint table of the arm SDK and the pose vector indexed by it.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of controllable joints: four per arm plus the torso.
pub const JOINT_COUNT: usize = 9;

/// A joint of the upper body, in the order used by pose arrays in source scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointIndex {
    LeftShoulderPitch,
    LeftShoulderRoll,
    LeftShoulderYaw,
    LeftElbow,
    RightShoulderPitch,
    RightShoulderRoll,
    RightShoulderYaw,
    RightElbow,
    Torso,
}

/// Static angular range of a joint, in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointLimit {
    pub min: f32,
    pub max: f32,
}

impl JointLimit {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl JointIndex {
    /// All joints in array order.
    pub const ALL: [JointIndex; JOINT_COUNT] = [
        Self::LeftShoulderPitch,
        Self::LeftShoulderRoll,
        Self::LeftShoulderYaw,
        Self::LeftElbow,
        Self::RightShoulderPitch,
        Self::RightShoulderRoll,
        Self::RightShoulderYaw,
        Self::RightElbow,
        Self::Torso,
    ];

    /// Position of this joint in a pose array.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn limit(self) -> JointLimit {
        match self {
            Self::LeftShoulderPitch | Self::RightShoulderPitch => JointLimit::new(-2.87, 2.87),
            Self::LeftShoulderRoll => JointLimit::new(-0.34, 3.11),
            Self::RightShoulderRoll => JointLimit::new(-3.11, 0.34),
            Self::LeftShoulderYaw => JointLimit::new(-1.3, 4.45),
            Self::RightShoulderYaw => JointLimit::new(-4.45, 1.3),
            Self::LeftElbow | Self::RightElbow => JointLimit::new(-1.25, 2.61),
            Self::Torso => JointLimit::new(-2.35, 2.35),
        }
    }

    /// The joint's name in the robot description (and in the scene graph).
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeftShoulderPitch => "left_shoulder_pitch_joint",
            Self::LeftShoulderRoll => "left_shoulder_roll_joint",
            Self::LeftShoulderYaw => "left_shoulder_yaw_joint",
            Self::LeftElbow => "left_elbow_joint",
            Self::RightShoulderPitch => "right_shoulder_pitch_joint",
            Self::RightShoulderRoll => "right_shoulder_roll_joint",
            Self::RightShoulderYaw => "right_shoulder_yaw_joint",
            Self::RightElbow => "right_elbow_joint",
            Self::Torso => "torso_joint",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.name() == name)
    }

    /// Rotation axis in the joint's local frame (Y up, Z forward).
    pub const fn axis(self) -> Vec3 {
        match self {
            Self::LeftShoulderPitch
            | Self::RightShoulderPitch
            | Self::LeftElbow
            | Self::RightElbow => Vec3::X,
            Self::LeftShoulderRoll | Self::RightShoulderRoll => Vec3::Z,
            Self::LeftShoulderYaw | Self::RightShoulderYaw | Self::Torso => Vec3::Y,
        }
    }

    /// Whether an arc drag turns this joint opposite to the on-screen pointer motion.
    ///
    /// This is a visual convention of the editor, not a kinematic property:
    /// every joint except the shoulder pitches and the torso is mirrored.
    pub const fn mirrored_drag(self) -> bool {
        !matches!(
            self,
            Self::LeftShoulderPitch | Self::RightShoulderPitch | Self::Torso
        )
    }

    /// Joints directly driven by this one in the handle hierarchy.
    pub const fn children(self) -> &'static [JointIndex] {
        match self {
            Self::Torso => &[Self::LeftShoulderPitch, Self::RightShoulderPitch],
            Self::LeftShoulderPitch => &[Self::LeftShoulderRoll],
            Self::LeftShoulderRoll => &[Self::LeftShoulderYaw],
            Self::LeftShoulderYaw => &[Self::LeftElbow],
            Self::RightShoulderPitch => &[Self::RightShoulderRoll],
            Self::RightShoulderRoll => &[Self::RightShoulderYaw],
            Self::RightShoulderYaw => &[Self::RightElbow],
            Self::LeftElbow | Self::RightElbow => &[],
        }
    }

    /// Every joint below this one, depth first.
    pub fn descendants(self) -> Vec<JointIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<JointIndex> = self.children().iter().rev().copied().collect();
        while let Some(joint) = stack.pop() {
            out.push(joint);
            stack.extend(joint.children().iter().rev());
        }
        out
    }
}

impl std::fmt::Display for JointIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rounds `value` to the nearest `1 / steps_per_unit`.
pub fn snap(value: f32, steps_per_unit: f32) -> f32 {
    if steps_per_unit <= 0.0 {
        return value;
    }
    (value * steps_per_unit).round() / steps_per_unit
}

/// One value per [`JointIndex`], in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointVector(pub [f32; JOINT_COUNT]);

impl JointVector {
    pub const ZERO: Self = Self([0.0; JOINT_COUNT]);

    pub const fn new(values: [f32; JOINT_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_array(&self) -> &[f32; JOINT_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointIndex, f32)> + '_ {
        JointIndex::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Copy with every value clamped to its joint's limit.
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        for joint in JointIndex::ALL {
            out[joint] = joint.limit().clamp(out[joint]);
        }
        out
    }

    pub fn within_limits(&self) -> bool {
        self.iter().all(|(joint, v)| joint.limit().contains(v))
    }

    /// `self + (target - self) * s`, per joint.
    pub fn lerp(&self, target: &Self, s: f32) -> Self {
        let mut out = *self;
        for (o, t) in out.0.iter_mut().zip(target.0.iter()) {
            *o += (t - *o) * s;
        }
        out
    }

    /// True when every joint differs by at most `epsilon`.
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl From<[f32; JOINT_COUNT]> for JointVector {
    fn from(values: [f32; JOINT_COUNT]) -> Self {
        Self(values)
    }
}

impl Index<JointIndex> for JointVector {
    type Output = f32;

    fn index(&self, joint: JointIndex) -> &f32 {
        &self.0[joint.index()]
    }
}

impl IndexMut<JointIndex> for JointVector {
    fn index_mut(&mut self, joint: JointIndex) -> &mut f32 {
        &mut self.0[joint.index()]
    }
}
