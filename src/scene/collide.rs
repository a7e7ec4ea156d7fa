//! Collision shapes and the traverser used by ray picking.
//!
//! Renderable geometry collides on [`CollideMask::GEOM`]; explicit collider
//! solids (the widget handles) carry their own into-mask.

use super::{NodeId, SceneGraph};
use glam::{DMat4, DVec3};
use std::ops::BitOr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CollideMask(pub u32);

impl CollideMask {
    pub const NONE: Self = Self(0);
    pub const GEOM: Self = Self(1 << 20);
    pub const WIDGET: Self = Self(1 << 31);
    pub const ALL: Self = Self(u32::MAX);

    pub fn bit(n: u32) -> Self {
        Self(1 << (n & 31))
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CollideMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Local-space solid attached to a node, either as renderable geometry or as
/// a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { min: DVec3, max: DVec3 },
    Sphere { center: DVec3, radius: f64 },
    /// Capsule-free cylinder between `a` and `b`.
    Tube { a: DVec3, b: DVec3, radius: f64 },
    Disc { center: DVec3, normal: DVec3, radius: f64 },
    Ring {
        center: DVec3,
        normal: DVec3,
        radius: f64,
        thickness: f64,
    },
}

impl Shape {
    pub fn cube(half_extent: f64) -> Self {
        Shape::Box {
            min: DVec3::splat(-half_extent),
            max: DVec3::splat(half_extent),
        }
    }

    /// Axis-aligned bounds in the shape's own space.
    pub fn bounds(&self) -> (DVec3, DVec3) {
        match *self {
            Shape::Box { min, max } => (min, max),
            Shape::Sphere { center, radius } => {
                (center - DVec3::splat(radius), center + DVec3::splat(radius))
            }
            Shape::Tube { a, b, radius } => (
                a.min(b) - DVec3::splat(radius),
                a.max(b) + DVec3::splat(radius),
            ),
            Shape::Disc { center, radius, .. } => {
                (center - DVec3::splat(radius), center + DVec3::splat(radius))
            }
            Shape::Ring {
                center,
                radius,
                thickness,
                ..
            } => {
                let r = radius + thickness;
                (center - DVec3::splat(r), center + DVec3::splat(r))
            }
        }
    }
}

/// Query solid, expressed in the from-node's space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuerySolid {
    Ray { origin: DVec3, direction: DVec3 },
    Segment { a: DVec3, b: DVec3 },
    Sphere { center: DVec3, radius: f64 },
}

impl QuerySolid {
    /// Point used as the eye of backface tests and the origin of distances.
    pub fn origin(&self) -> DVec3 {
        match *self {
            QuerySolid::Ray { origin, .. } => origin,
            QuerySolid::Segment { a, .. } => a,
            QuerySolid::Sphere { center, .. } => center,
        }
    }

    fn transformed(&self, m: &DMat4) -> QuerySolid {
        match *self {
            QuerySolid::Ray { origin, direction } => QuerySolid::Ray {
                origin: m.transform_point3(origin),
                direction: m.transform_vector3(direction),
            },
            QuerySolid::Segment { a, b } => QuerySolid::Segment {
                a: m.transform_point3(a),
                b: m.transform_point3(b),
            },
            QuerySolid::Sphere { center, radius } => {
                let scale = m
                    .transform_vector3(DVec3::X)
                    .length()
                    .max(m.transform_vector3(DVec3::Y).length())
                    .max(m.transform_vector3(DVec3::Z).length());
                QuerySolid::Sphere {
                    center: m.transform_point3(center),
                    radius: radius * scale,
                }
            }
        }
    }
}

/// One hit of a traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEntry {
    pub into_node: NodeId,
    pub from_node: NodeId,
    /// Surface point in from-node space.
    pub surface_point: DVec3,
    /// Outward surface normal in from-node space, when the solid defines one.
    pub surface_normal: Option<DVec3>,
    /// Point the query started from, in from-node space.
    pub from_origin: DVec3,
    /// Distance from `from_origin`, used for sorting.
    pub distance: f64,
}

impl CollisionEntry {
    pub fn surface_point_in(&self, scene: &SceneGraph, other: NodeId) -> Option<DVec3> {
        let m = scene.mat_relative(self.from_node, other)?;
        Some(m.transform_point3(self.surface_point))
    }
}

struct LocalHit {
    point: DVec3,
    normal: Option<DVec3>,
}

impl SceneGraph {
    /// Tests every solid against the subtree under `target`, returning hits
    /// sorted nearest-first.
    pub fn collide(
        &self,
        target: NodeId,
        from: NodeId,
        solids: &[QuerySolid],
        from_mask: CollideMask,
    ) -> Vec<CollisionEntry> {
        let Some(from_world) = self.world_mat(from) else {
            return Vec::new();
        };
        if !self.contains(target) {
            return Vec::new();
        }
        let world_to_from = from_world.inverse();
        let mut entries = Vec::new();

        for node in self.descendants(target) {
            let Some(world) = self.world_mat(node) else {
                continue;
            };
            let mut shapes: Vec<Shape> = Vec::new();
            if from_mask.intersects(CollideMask::GEOM) {
                if let Some(shape) = self.shape(node) {
                    shapes.push(shape);
                }
            }
            if let Some((shape, into_mask)) = self.collider(node) {
                if from_mask.intersects(into_mask) {
                    shapes.push(shape);
                }
            }
            if shapes.is_empty() {
                continue;
            }
            let from_to_local = world.inverse() * from_world;
            let local_to_from = world_to_from * world;
            let normal_mat = local_to_from.inverse().transpose();

            for solid in solids {
                let local_solid = solid.transformed(&from_to_local);
                for shape in &shapes {
                    let Some(hit) = intersect(&local_solid, shape) else {
                        continue;
                    };
                    let point = local_to_from.transform_point3(hit.point);
                    let normal = hit
                        .normal
                        .map(|n| normal_mat.transform_vector3(n).normalize_or_zero())
                        .filter(|n| *n != DVec3::ZERO);
                    let origin = solid.origin();
                    entries.push(CollisionEntry {
                        into_node: node,
                        from_node: from,
                        surface_point: point,
                        surface_normal: normal,
                        from_origin: origin,
                        distance: (point - origin).length(),
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        entries
    }
}

fn intersect(solid: &QuerySolid, shape: &Shape) -> Option<LocalHit> {
    match *solid {
        QuerySolid::Ray { origin, direction } => line_hit(origin, direction, None, shape),
        QuerySolid::Segment { a, b } => line_hit(a, b - a, Some(1.0), shape),
        QuerySolid::Sphere { center, radius } => sphere_hit(center, radius, shape),
    }
}

fn line_hit(origin: DVec3, dir: DVec3, t_max: Option<f64>, shape: &Shape) -> Option<LocalHit> {
    if dir.length_squared() < 1e-18 {
        return None;
    }
    let limit = t_max.unwrap_or(f64::INFINITY);
    let in_range = |t: f64| t >= 0.0 && t <= limit;

    match *shape {
        Shape::Box { min, max } => {
            let mut t_near = f64::NEG_INFINITY;
            let mut t_far = f64::INFINITY;
            let mut near_axis = 0;
            let mut far_axis = 0;
            for i in 0..3 {
                if dir[i].abs() < 1e-12 {
                    if origin[i] < min[i] || origin[i] > max[i] {
                        return None;
                    }
                    continue;
                }
                let mut t0 = (min[i] - origin[i]) / dir[i];
                let mut t1 = (max[i] - origin[i]) / dir[i];
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                if t0 > t_near {
                    t_near = t0;
                    near_axis = i;
                }
                if t1 < t_far {
                    t_far = t1;
                    far_axis = i;
                }
            }
            if t_near > t_far {
                return None;
            }
            let (t, axis, sign) = if t_near >= 0.0 {
                (t_near, near_axis, -dir[near_axis].signum())
            } else {
                (t_far, far_axis, dir[far_axis].signum())
            };
            if !in_range(t) {
                return None;
            }
            let mut normal = DVec3::ZERO;
            normal[axis] = sign;
            Some(LocalHit {
                point: origin + dir * t,
                normal: Some(normal),
            })
        }
        Shape::Sphere { center, radius } => {
            let oc = origin - center;
            let a = dir.length_squared();
            let b = 2.0 * oc.dot(dir);
            let c = oc.length_squared() - radius * radius;
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            let t0 = (-b - sq) / (2.0 * a);
            let t1 = (-b + sq) / (2.0 * a);
            let t = if t0 >= 0.0 { t0 } else { t1 };
            if !in_range(t) {
                return None;
            }
            let point = origin + dir * t;
            Some(LocalHit {
                point,
                normal: Some((point - center) / radius),
            })
        }
        Shape::Tube { a, b, radius } => {
            let axis = b - a;
            let axis_len2 = axis.length_squared();
            if axis_len2 < 1e-18 {
                return None;
            }
            let m = origin - a;
            let d_perp = dir - axis * (dir.dot(axis) / axis_len2);
            let m_perp = m - axis * (m.dot(axis) / axis_len2);
            let qa = d_perp.length_squared();
            if qa < 1e-18 {
                return None;
            }
            let qb = 2.0 * m_perp.dot(d_perp);
            let qc = m_perp.length_squared() - radius * radius;
            let disc = qb * qb - 4.0 * qa * qc;
            if disc < 0.0 {
                return None;
            }
            let sq = disc.sqrt();
            [(-qb - sq) / (2.0 * qa), (-qb + sq) / (2.0 * qa)]
                .into_iter()
                .filter(|t| in_range(*t))
                .find_map(|t| {
                    let point = origin + dir * t;
                    let s = (point - a).dot(axis) / axis_len2;
                    if !(0.0..=1.0).contains(&s) {
                        return None;
                    }
                    let normal = (point - (a + axis * s)).normalize_or_zero();
                    Some(LocalHit {
                        point,
                        normal: (normal != DVec3::ZERO).then_some(normal),
                    })
                })
        }
        Shape::Disc {
            center,
            normal,
            radius,
        } => {
            let t = plane_param(origin, dir, center, normal)?;
            if !in_range(t) {
                return None;
            }
            let point = origin + dir * t;
            if (point - center).length() > radius {
                return None;
            }
            Some(LocalHit {
                point,
                normal: Some(normal),
            })
        }
        Shape::Ring {
            center,
            normal,
            radius,
            thickness,
        } => {
            let t = plane_param(origin, dir, center, normal)?;
            if !in_range(t) {
                return None;
            }
            let point = origin + dir * t;
            if ((point - center).length() - radius).abs() > thickness {
                return None;
            }
            Some(LocalHit {
                point,
                normal: Some(normal),
            })
        }
    }
}

fn sphere_hit(center: DVec3, radius: f64, shape: &Shape) -> Option<LocalHit> {
    match *shape {
        Shape::Box { min, max } => {
            let closest = center.clamp(min, max);
            let offset = center - closest;
            if offset.length() > radius {
                return None;
            }
            let normal = offset.normalize_or_zero();
            Some(LocalHit {
                point: closest,
                normal: (normal != DVec3::ZERO).then_some(normal),
            })
        }
        Shape::Sphere {
            center: other,
            radius: other_radius,
        } => {
            let offset = center - other;
            if offset.length() > radius + other_radius {
                return None;
            }
            let normal = offset.normalize_or_zero();
            Some(LocalHit {
                point: other + normal * other_radius,
                normal: (normal != DVec3::ZERO).then_some(normal),
            })
        }
        Shape::Tube { .. } | Shape::Disc { .. } | Shape::Ring { .. } => None,
    }
}

fn plane_param(origin: DVec3, dir: DVec3, center: DVec3, normal: DVec3) -> Option<f64> {
    let denom = dir.dot(normal);
    if denom.abs() < 1e-12 {
        return None;
    }
    Some((center - origin).dot(normal) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_enters_box_on_front_face() {
        let hit = line_hit(
            DVec3::new(0.0, -10.0, 0.0),
            DVec3::Y,
            None,
            &Shape::cube(1.0),
        )
        .unwrap();
        assert!((hit.point - DVec3::new(0.0, -1.0, 0.0)).length() < 1e-12);
        assert_eq!(hit.normal, Some(DVec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn ray_from_inside_box_reports_exit() {
        let hit = line_hit(DVec3::ZERO, DVec3::X, None, &Shape::cube(2.0)).unwrap();
        assert!((hit.point.x - 2.0).abs() < 1e-12);
        assert_eq!(hit.normal, Some(DVec3::X));
    }

    #[test]
    fn segment_respects_length() {
        let shape = Shape::Sphere {
            center: DVec3::new(0.0, 10.0, 0.0),
            radius: 1.0,
        };
        assert!(line_hit(DVec3::ZERO, DVec3::new(0.0, 5.0, 0.0), Some(1.0), &shape).is_none());
        assert!(line_hit(DVec3::ZERO, DVec3::new(0.0, 20.0, 0.0), Some(1.0), &shape).is_some());
    }

    #[test]
    fn ring_only_hits_near_radius() {
        let ring = Shape::Ring {
            center: DVec3::ZERO,
            normal: DVec3::Y,
            radius: 1.0,
            thickness: 0.1,
        };
        let down = DVec3::Y;
        assert!(line_hit(DVec3::new(0.0, -5.0, 0.0), down, None, &ring).is_none());
        assert!(line_hit(DVec3::new(1.0, -5.0, 0.0), down, None, &ring).is_some());
        assert!(line_hit(DVec3::new(0.0, -5.0, 1.05), down, None, &ring).is_some());
    }

    #[test]
    fn tube_hit_by_crossing_ray() {
        let tube = Shape::Tube {
            a: DVec3::ZERO,
            b: DVec3::X,
            radius: 0.1,
        };
        let hit = line_hit(DVec3::new(0.5, -3.0, 0.0), DVec3::Y, None, &tube).unwrap();
        assert!((hit.point - DVec3::new(0.5, -0.1, 0.0)).length() < 1e-9);
        assert!((hit.normal.unwrap() - DVec3::new(0.0, -1.0, 0.0)).length() < 1e-9);
        assert!(line_hit(DVec3::new(0.5, -3.0, 0.05), DVec3::Y, None, &tube).is_some());
        assert!(line_hit(DVec3::new(1.5, -3.0, 0.0), DVec3::Y, None, &tube).is_none());
    }

    #[test]
    fn sphere_query_touches_box() {
        let hit = sphere_hit(DVec3::new(0.0, 0.0, 1.5), 1.0, &Shape::cube(1.0)).unwrap();
        assert!((hit.point - DVec3::new(0.0, 0.0, 1.0)).length() < 1e-12);
        assert_eq!(hit.normal, Some(DVec3::Z));
        assert!(sphere_hit(DVec3::new(0.0, 0.0, 3.0), 1.0, &Shape::cube(1.0)).is_none());
    }

    #[test]
    fn mask_bits() {
        assert!(CollideMask::GEOM.intersects(CollideMask::ALL));
        assert!(!CollideMask::GEOM.intersects(CollideMask::WIDGET));
        assert_eq!(CollideMask::bit(31), CollideMask::WIDGET);
        assert!((CollideMask::GEOM | CollideMask::WIDGET).intersects(CollideMask::WIDGET));
    }
}
