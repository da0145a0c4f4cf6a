//! Direct manipulation of single joints by pointer drags.
//!
//! Each controllable joint shows a cylindrical handle along its world rotation
//! axis. Pressing a handle selects the joint, shows its rotation arc and starts
//! a *linear* drag, where vertical pointer travel maps to a joint delta.
//! Pressing inside the arc's sector disk starts a *rotational* drag, where the
//! angle swept around the joint axis maps to the delta. Either way the result
//! is rounded to the configured step and then clamped to the joint limit, so
//! the manipulator can never produce an out-of-range value.

use crate::config::ManipulatorConfig;
use crate::joint::{JointIndex, JointVector, snap};
use crate::scene::TransformQuery;
use bevy_math::primitives::InfinitePlane3d;
use bevy_math::{Dir3, Ray3d};
use glam::{Quat, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// A pointer sample: screen position (pixels, y down) and the camera ray through it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub screen: Vec2,
    pub ray: Ray3d,
}

impl PointerEvent {
    pub fn new(screen: Vec2, ray: Ray3d) -> Self {
        Self { screen, ray }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    Linear,
    Rotational,
}

/// How to draw one joint handle this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleDirective {
    pub joint: JointIndex,
    pub position: Vec3,
    /// Maps the handle's local Y axis onto the joint's world axis.
    pub rotation: Quat,
    pub length: f32,
    pub radius: f32,
    pub opacity: f32,
}

/// How to draw the rotation arc of the selected joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcDirective {
    pub visible: bool,
    pub position: Vec3,
    /// Maps the arc's local Z axis (its normal) onto the joint's world axis.
    pub rotation: Quat,
    pub radius: f32,
    pub thickness: f32,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    joint: JointIndex,
    kind: DragKind,
    start_value: f32,
    start_y: f32,
    // Arc drags only.
    center: Vec3,
    axis: Dir3,
    base: Vec3,
    start_angle: f32,
}

/// Handle selection and drag state.
#[derive(Clone, Debug, Default)]
pub struct KinematicManipulator {
    config: ManipulatorConfig,
    selected: Option<JointIndex>,
    arc_visible: bool,
    drag: Option<Drag>,
}

impl KinematicManipulator {
    pub fn new(config: ManipulatorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ManipulatorConfig {
        &self.config
    }

    pub fn selected(&self) -> Option<JointIndex> {
        self.selected
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_kind(&self) -> Option<DragKind> {
        self.drag.map(|d| d.kind)
    }

    /// Selects `joint` and shows its arc without starting a drag.
    pub fn select(&mut self, joint: Option<JointIndex>) {
        self.selected = joint;
        self.arc_visible = joint.is_some();
    }

    /// Starts a drag if the pointer hits the visible arc or a handle.
    ///
    /// The arc of the selected joint wins over handles. Returns the kind of
    /// drag started, or `None` if nothing was hit.
    pub fn pointer_down(
        &mut self,
        event: &PointerEvent,
        scene: &impl TransformQuery,
        values: &JointVector,
    ) -> Option<DragKind> {
        if self.arc_visible
            && let Some(joint) = self.selected
            && let Some(drag) = self.arc_hit(joint, event, scene, values)
        {
            tracing::debug!(%joint, "arc drag started");
            self.drag = Some(drag);
            return Some(DragKind::Rotational);
        }

        let joint = self.handle_hit(&event.ray, scene)?;
        tracing::debug!(%joint, "handle drag started");
        self.select(Some(joint));
        self.drag = Some(Drag {
            joint,
            kind: DragKind::Linear,
            start_value: values[joint],
            start_y: event.screen.y,
            center: Vec3::ZERO,
            axis: Dir3::Y,
            base: Vec3::X,
            start_angle: 0.0,
        });
        Some(DragKind::Linear)
    }

    /// The dragged joint's new value for this pointer sample, or `None` when
    /// no drag is active or the ray misses the arc plane.
    pub fn pointer_move(&self, event: &PointerEvent) -> Option<(JointIndex, f32)> {
        let drag = self.drag?;
        let delta = match drag.kind {
            DragKind::Linear => (event.screen.y - drag.start_y) * self.config.linear_sensitivity,
            DragKind::Rotational => {
                let t = event
                    .ray
                    .intersect_plane(drag.center, InfinitePlane3d { normal: drag.axis })?;
                let v = event.ray.get_point(t) - drag.center;
                let swept = wrap_angle(signed_angle(v, drag.base, *drag.axis) - drag.start_angle);
                let delta = swept * self.config.rotational_sensitivity;
                if drag.joint.mirrored_drag() { -delta } else { delta }
            }
        };
        Some((drag.joint, self.settle(drag.joint, drag.start_value + delta)))
    }

    /// Ends the drag. Returns whether one was active.
    pub fn pointer_up(&mut self) -> bool {
        let was_dragging = self.drag.take().is_some();
        if was_dragging {
            tracing::debug!(joint = ?self.selected, "drag finished");
        }
        was_dragging
    }

    /// Aborts a drag without a final value, e.g. when a new script is loaded.
    pub fn reset(&mut self) {
        self.drag = None;
        self.select(None);
    }

    /// Rounds to the configured step, then clamps. Clamping last keeps a
    /// limit such as -0.34 reachable even though it is not on the grid.
    pub fn settle(&self, joint: JointIndex, value: f32) -> f32 {
        joint.limit().clamp(snap(value, self.config.steps_per_radian))
    }

    pub fn handle_directives(&self, scene: &impl TransformQuery) -> Vec<HandleDirective> {
        let descendants = self
            .selected
            .map(JointIndex::descendants)
            .unwrap_or_default();

        JointIndex::ALL
            .into_iter()
            .filter_map(|joint| {
                let t = scene.joint_transform(joint)?;
                let opacity = if Some(joint) == self.selected {
                    self.config.opacity_selected
                } else if descendants.contains(&joint) {
                    self.config.opacity_descendant
                } else {
                    self.config.opacity_idle
                };
                Some(HandleDirective {
                    joint,
                    position: t.translation,
                    rotation: Quat::from_rotation_arc(Vec3::Y, t.axis),
                    length: self.config.handle_length,
                    radius: self.config.handle_radius,
                    opacity,
                })
            })
            .collect()
    }

    pub fn arc_directive(&self, scene: &impl TransformQuery) -> ArcDirective {
        let transform = self
            .selected
            .filter(|_| self.arc_visible)
            .and_then(|joint| scene.joint_transform(joint));
        match transform {
            Some(t) => ArcDirective {
                visible: true,
                position: t.translation,
                rotation: Quat::from_rotation_arc(Vec3::Z, t.axis),
                radius: self.config.arc_radius,
                thickness: self.config.arc_thickness,
            },
            None => ArcDirective {
                visible: false,
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                radius: self.config.arc_radius,
                thickness: self.config.arc_thickness,
            },
        }
    }

    /// Nearest handle along `ray`.
    fn handle_hit(&self, ray: &Ray3d, scene: &impl TransformQuery) -> Option<JointIndex> {
        let half_length = self.config.handle_length / 2.0;
        JointIndex::ALL
            .into_iter()
            .filter_map(|joint| {
                let t = scene.joint_transform(joint)?;
                let axis = t.axis.try_normalize()?;
                let radius = self.config.handle_radius;
                let distance = ray_cylinder(ray, t.translation, axis, radius, half_length)?;
                Some((joint, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(joint, _)| joint)
    }

    /// A rotational drag if `event` lands inside the sector disk of `joint`'s arc.
    fn arc_hit(
        &self,
        joint: JointIndex,
        event: &PointerEvent,
        scene: &impl TransformQuery,
        values: &JointVector,
    ) -> Option<Drag> {
        let t = scene.joint_transform(joint)?;
        let axis = Dir3::new(t.axis).ok()?;
        let distance = event
            .ray
            .intersect_plane(t.translation, InfinitePlane3d { normal: axis })?;
        let v = event.ray.get_point(distance) - t.translation;
        let sector_radius = self.config.arc_radius + 2.0 * self.config.arc_thickness;
        if v.length() > sector_radius {
            return None;
        }

        let base = reference_basis(*axis);
        Some(Drag {
            joint,
            kind: DragKind::Rotational,
            start_value: values[joint],
            start_y: event.screen.y,
            center: t.translation,
            axis,
            base,
            start_angle: signed_angle(v, base, *axis),
        })
    }
}

/// Distance along `ray` to a capped cylinder centred on `center`, or zero when
/// the ray starts inside it. `axis` must be normalized.
fn ray_cylinder(ray: &Ray3d, center: Vec3, axis: Vec3, radius: f32, half_length: f32) -> Option<f32> {
    let o = ray.origin - center;
    let d = *ray.direction;
    let (o_axial, d_axial) = (o.dot(axis), d.dot(axis));
    let o_radial = o - axis * o_axial;
    let d_radial = d - axis * d_axial;
    let r2 = radius * radius;

    if o_radial.length_squared() <= r2 && o_axial.abs() <= half_length {
        return Some(0.0);
    }

    let mut nearest: Option<f32> = None;
    let mut consider = |t: f32| {
        if t >= 0.0 && nearest.is_none_or(|n| t < n) {
            nearest = Some(t);
        }
    };

    // Side wall: |o_radial + t d_radial| = radius.
    let a = d_radial.length_squared();
    if a > f32::EPSILON {
        let b = o_radial.dot(d_radial);
        let c = o_radial.length_squared() - r2;
        let disc = b * b - a * c;
        if disc >= 0.0 {
            let root = disc.sqrt();
            for t in [(-b - root) / a, (-b + root) / a] {
                if (o_axial + t * d_axial).abs() <= half_length {
                    consider(t);
                }
            }
        }
    }

    // End caps.
    if d_axial.abs() > f32::EPSILON {
        for cap in [-half_length, half_length] {
            let t = (cap - o_axial) / d_axial;
            if (o_radial + d_radial * t).length_squared() <= r2 {
                consider(t);
            }
        }
    }

    nearest
}

/// World X (or Y when the axis is nearly parallel to X) projected onto the
/// plane normal to `axis`.
fn reference_basis(axis: Vec3) -> Vec3 {
    let base = if axis.dot(Vec3::X).abs() > 0.99 {
        Vec3::Y
    } else {
        Vec3::X
    };
    (base - axis * base.dot(axis)).normalize()
}

/// Signed angle of `v` against `base` about `axis`.
fn signed_angle(v: Vec3, base: Vec3, axis: Vec3) -> f32 {
    v.cross(base).dot(axis).atan2(v.dot(base))
}

/// Wraps into `(-π, π]`.
fn wrap_angle(angle: f32) -> f32 {
    let a = angle % TAU;
    if a > PI {
        a - TAU
    } else if a <= -PI {
        a + TAU
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn down_z(x: f32, y: f32) -> Ray3d {
        Ray3d {
            origin: Vec3::new(x, y, 2.0),
            direction: Dir3::NEG_Z,
        }
    }

    #[test]
    fn cylinder_hits_follow_the_tilted_handle() {
        let axis = Vec3::new(1.0, 1.0, 0.0).normalize();
        let hit = |x, y| ray_cylinder(&down_z(x, y), Vec3::ZERO, axis, 0.015, 0.04);

        // On the axis: the side wall is one radius in front of it.
        assert_relative_eq!(hit(0.02, 0.02).unwrap(), 1.985, epsilon = 1e-4);
        // Inside the tilted handle's bounding box, yet clear of the handle.
        assert_eq!(hit(0.03, -0.03), None);
        // Beyond the end cap.
        assert_eq!(hit(0.04, 0.04), None);
    }

    #[test]
    fn cylinder_caps_and_inside_start() {
        let hit = |ray: &Ray3d| ray_cylinder(ray, Vec3::ZERO, Vec3::Z, 0.015, 0.04);
        assert_relative_eq!(hit(&down_z(0.01, 0.0)).unwrap(), 1.96, epsilon = 1e-5);
        let inside = Ray3d {
            origin: Vec3::ZERO,
            direction: Dir3::X,
        };
        assert_eq!(hit(&inside), Some(0.0));
    }

    #[test]
    fn wrap_stays_in_half_open_range() {
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-PI), PI, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(0.25), 0.25);
    }

    #[test]
    fn basis_switches_near_x() {
        assert_eq!(reference_basis(Vec3::Y), Vec3::X);
        assert_eq!(reference_basis(Vec3::X), Vec3::Y);
    }

    #[test]
    fn settle_rounds_before_clamping() {
        let m = KinematicManipulator::default();
        // -0.34 would round to -0.35, past the limit.
        assert_eq!(m.settle(JointIndex::LeftShoulderRoll, -0.34), -0.34);
        assert_eq!(m.settle(JointIndex::LeftElbow, 0.26), 0.25);
        assert_eq!(m.settle(JointIndex::LeftElbow, 9.0), 2.61);
    }
}
