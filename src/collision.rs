//! Advisory self-collision display.
//!
//! Every frame the monitor tests the bounding boxes of all named bodies
//! against each other, skipping pairs that are directly jointed (those always
//! touch). Overlaps thinner than the configured threshold on every axis are
//! treated as noise. A marker is cached per body pair the first time it
//! collides and is hidden, not dropped, when the pair separates.

use crate::config::CollisionConfig;
use crate::scene::{BodyVolume, TransformQuery};
use bevy_math::bounding::{Aabb3d, BoundingVolume, IntersectsVolume};
use glam::Vec3;
use std::collections::BTreeMap;

/// Direct parent → children relations of the humanoid's kinematic tree.
pub const LINK_HIERARCHY: &[(&str, &[&str])] = &[
    ("pelvis", &["torso_link", "left_hip_yaw_link", "right_hip_yaw_link"]),
    ("torso_link", &["left_shoulder_pitch_link", "right_shoulder_pitch_link"]),
    ("left_shoulder_pitch_link", &["left_shoulder_roll_link"]),
    ("left_shoulder_roll_link", &["left_shoulder_yaw_link"]),
    ("left_shoulder_yaw_link", &["left_elbow_link"]),
    ("left_elbow_link", &["left_hand_link"]),
    ("right_shoulder_pitch_link", &["right_shoulder_roll_link"]),
    ("right_shoulder_roll_link", &["right_shoulder_yaw_link"]),
    ("right_shoulder_yaw_link", &["right_elbow_link"]),
    ("right_elbow_link", &["right_hand_link"]),
    ("left_hip_yaw_link", &["left_hip_roll_link"]),
    ("left_hip_roll_link", &["left_hip_pitch_link"]),
    ("left_hip_pitch_link", &["left_knee_link"]),
    ("left_knee_link", &["left_ankle_link"]),
    ("right_hip_yaw_link", &["right_hip_roll_link"]),
    ("right_hip_roll_link", &["right_hip_pitch_link"]),
    ("right_hip_pitch_link", &["right_knee_link"]),
    ("right_knee_link", &["right_ankle_link"]),
];

/// True when one body is the other's direct parent.
pub fn are_adjacent(a: &str, b: &str) -> bool {
    let is_child = |parent: &str, child: &str| {
        LINK_HIERARCHY
            .iter()
            .any(|(p, children)| *p == parent && children.contains(&child))
    };
    is_child(a, b) || is_child(b, a)
}

/// Marker key for an unordered pair of bodies.
pub fn pair_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

/// Two bodies whose boxes touched this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionPair {
    pub body_a: String,
    pub body_b: String,
    pub contact_point: Vec3,
    /// `false` when the overlap was below the noise threshold.
    pub is_colliding: bool,
}

/// How to draw one cached collision marker this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionDirective {
    pub pair_id: String,
    pub visible: bool,
    pub contact_point: Vec3,
}

/// Result of one [`CollisionMonitor::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionReport {
    pub pairs: Vec<CollisionPair>,
    /// One entry per cached marker, sorted by pair id.
    pub directives: Vec<CollisionDirective>,
}

impl CollisionReport {
    pub fn colliding(&self) -> impl Iterator<Item = &CollisionPair> {
        self.pairs.iter().filter(|p| p.is_colliding)
    }
}

#[derive(Clone, Copy, Debug)]
struct Marker {
    visible: bool,
    contact_point: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct CollisionMonitor {
    config: CollisionConfig,
    markers: BTreeMap<String, Marker>,
}

impl CollisionMonitor {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            config,
            markers: BTreeMap::new(),
        }
    }

    /// Number of markers created so far.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Drops every cached marker.
    pub fn clear(&mut self) {
        self.markers.clear();
    }

    pub fn update(&mut self, scene: &impl TransformQuery) -> CollisionReport {
        let bodies: Vec<BodyVolume> = scene
            .body_volumes()
            .into_iter()
            .filter(|b| b.name.ends_with(&self.config.body_suffix))
            .collect();

        for marker in self.markers.values_mut() {
            marker.visible = false;
        }

        let mut pairs = Vec::new();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                if a.name == b.name || are_adjacent(&a.name, &b.name) {
                    continue;
                }
                let Some(pair) = self.test_pair(a, b) else {
                    continue;
                };

                if pair.is_colliding {
                    let key = pair_id(&a.name, &b.name);
                    let marker = self.markers.entry(key).or_insert(Marker {
                        visible: false,
                        contact_point: pair.contact_point,
                    });
                    if !marker.visible {
                        tracing::debug!(a = %a.name, b = %b.name, "bodies intersect");
                    }
                    marker.visible = true;
                    marker.contact_point = pair.contact_point;
                }
                pairs.push(pair);
            }
        }

        let directives = self
            .markers
            .iter()
            .map(|(id, m)| CollisionDirective {
                pair_id: id.clone(),
                visible: m.visible,
                contact_point: m.contact_point,
            })
            .collect();

        CollisionReport { pairs, directives }
    }

    fn test_pair(&self, a: &BodyVolume, b: &BodyVolume) -> Option<CollisionPair> {
        if !a.aabb.intersects(&b.aabb) {
            return None;
        }
        let overlap = overlap_extent(&a.aabb, &b.aabb);
        let is_colliding = overlap.cmpge(Vec3::splat(self.config.min_overlap)).any();

        let a_surface = Vec3::from(a.aabb.closest_point(b.aabb.center()));
        let b_surface = Vec3::from(b.aabb.closest_point(a.aabb.center()));
        Some(CollisionPair {
            body_a: a.name.clone(),
            body_b: b.name.clone(),
            contact_point: (a_surface + b_surface) * 0.5,
            is_colliding,
        })
    }
}

/// Size of the intersection box along each axis (zero or negative when disjoint).
fn overlap_extent(a: &Aabb3d, b: &Aabb3d) -> Vec3 {
    Vec3::from(a.max.min(b.max) - a.min.max(b.min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_symmetric_and_direct_only() {
        assert!(are_adjacent("torso_link", "left_shoulder_pitch_link"));
        assert!(are_adjacent("left_shoulder_pitch_link", "torso_link"));
        assert!(!are_adjacent("torso_link", "left_shoulder_roll_link"));
        assert!(!are_adjacent("left_hand_link", "right_hand_link"));
    }

    #[test]
    fn pair_id_ignores_order() {
        assert_eq!(pair_id("b_link", "a_link"), "a_link_b_link");
        assert_eq!(pair_id("a_link", "b_link"), pair_id("b_link", "a_link"));
    }

    #[test]
    fn overlap_of_nested_boxes() {
        let a = Aabb3d::new(Vec3::ZERO, Vec3::splat(1.0));
        let b = Aabb3d::new(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(1.0));
        assert_eq!(overlap_extent(&a, &b), Vec3::new(0.5, 2.0, 2.0));
    }
}
