//! Ray, segment and sphere picking with skip-flag filtering.
//!
//! A query runs the scene's collision traverser against a subtree, keeps the
//! sorted hit list, and hands out the first entry that survives the caller's
//! [`SkipFlags`]. The remaining entries stay available so callers can walk
//! through stacked geometry.

use crate::scene::{CollideMask, CollisionEntry, NodeId, QuerySolid, SceneGraph};
use bitflags::bitflags;
use glam::DVec3;
use std::collections::BTreeSet;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SkipFlags: u32 {
        const HIDDEN = 1;
        const BACKFACE = 1 << 1;
        const CAMERA = 1 << 2;
        const UNPICKABLE = 1 << 3;
        const WIDGET = 1 << 4;
    }
}

impl SkipFlags {
    pub const DEFAULT: Self = Self::HIDDEN.union(Self::BACKFACE);
}

/// Scene context the camera and widget skip rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickFilter {
    pub camera: NodeId,
    pub widget: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SelectionQueue {
    from_node: NodeId,
    solids: Vec<QuerySolid>,
    from_mask: CollideMask,
    entries: Vec<CollisionEntry>,
    index: Option<usize>,
    unpickable: BTreeSet<String>,
}

impl SelectionQueue {
    pub fn new(from_node: NodeId) -> Self {
        Self {
            from_node,
            solids: Vec::new(),
            from_mask: CollideMask::GEOM,
            entries: Vec::new(),
            index: None,
            unpickable: BTreeSet::new(),
        }
    }

    pub fn from_node(&self) -> NodeId {
        self.from_node
    }

    pub fn add_unpickable(&mut self, name: &str) {
        self.unpickable.insert(name.to_string());
    }

    pub fn remove_unpickable(&mut self, name: &str) {
        self.unpickable.remove(name);
    }

    pub fn is_unpickable(&self, name: &str) -> bool {
        self.unpickable.contains(name)
    }

    pub fn collide_with_geom(&mut self) {
        self.from_mask = CollideMask::GEOM;
    }

    pub fn collide_with_bit_mask(&mut self, mask: CollideMask) {
        self.from_mask = mask;
    }

    pub fn clear_solids(&mut self) {
        self.solids.clear();
    }

    pub fn add_solid(&mut self, solid: QuerySolid) {
        self.solids.push(solid);
    }

    pub fn solids(&self) -> &[QuerySolid] {
        &self.solids
    }

    /// Runs the traversal and stores the sorted hits.
    pub fn traverse(&mut self, scene: &SceneGraph, target: NodeId) {
        self.entries = scene.collide(target, self.from_node, &self.solids, self.from_mask);
        self.index = None;
    }

    pub fn entries(&self) -> &[CollisionEntry] {
        &self.entries
    }

    pub fn is_entry_backfacing(entry: &CollisionEntry) -> bool {
        let Some(normal) = entry.surface_normal else {
            return false;
        };
        let v = (entry.surface_point - entry.from_origin).normalize_or_zero();
        v.dot(normal) >= 0.0
    }

    pub fn is_skipped(
        &self,
        scene: &SceneGraph,
        entry: &CollisionEntry,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> bool {
        let node = entry.into_node;
        if skip.contains(SkipFlags::HIDDEN) && scene.is_net_hidden(node) {
            return true;
        }
        if skip.contains(SkipFlags::BACKFACE) && Self::is_entry_backfacing(entry) {
            return true;
        }
        if skip.contains(SkipFlags::CAMERA) && scene.is_same_or_ancestor(filter.camera, node) {
            return true;
        }
        if skip.contains(SkipFlags::UNPICKABLE)
            && scene.name(node).map(|n| self.is_unpickable(n)).unwrap_or(false)
        {
            return true;
        }
        if skip.contains(SkipFlags::WIDGET) {
            let owned = filter
                .widget
                .map(|w| scene.is_same_or_ancestor(w, node))
                .unwrap_or(false);
            if !owned {
                return true;
            }
        }
        false
    }

    /// First surviving entry at or after `start`; it becomes the current entry.
    pub fn find_collision_entry(
        &mut self,
        scene: &SceneGraph,
        skip: SkipFlags,
        filter: &PickFilter,
        start: usize,
    ) -> Option<CollisionEntry> {
        self.index = None;
        for i in start..self.entries.len() {
            if !self.is_skipped(scene, &self.entries[i], skip, filter) {
                self.index = Some(i);
                return Some(self.entries[i].clone());
            }
        }
        None
    }

    pub fn find_next_collision_entry(
        &mut self,
        scene: &SceneGraph,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        let start = self.index.map(|i| i + 1).unwrap_or(0);
        self.find_collision_entry(scene, skip, filter, start)
    }

    /// Every entry that survives `skip`, nearest first.
    pub fn surviving_entries(
        &self,
        scene: &SceneGraph,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Vec<CollisionEntry> {
        self.entries
            .iter()
            .filter(|e| !self.is_skipped(scene, e, skip, filter))
            .cloned()
            .collect()
    }
}

/// Infinite ray from a camera through the mouse.
#[derive(Debug, Clone)]
pub struct SelectionRay {
    pub queue: SelectionQueue,
}

impl SelectionRay {
    pub fn new(from_node: NodeId) -> Self {
        Self {
            queue: SelectionQueue::new(from_node),
        }
    }

    fn set_ray(&mut self, origin: DVec3, direction: DVec3) {
        self.queue.clear_solids();
        self.queue.add_solid(QuerySolid::Ray { origin, direction });
    }

    /// Runs the query without filtering. The ray is in from-node space.
    pub fn pick(&mut self, scene: &SceneGraph, target: NodeId, ray: (DVec3, DVec3)) {
        self.set_ray(ray.0, ray.1);
        self.queue.traverse(scene, target);
    }

    pub fn pick_geom(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        ray: (DVec3, DVec3),
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.queue.collide_with_geom();
        self.pick(scene, target, ray);
        self.queue.find_collision_entry(scene, skip, filter, 0)
    }

    pub fn pick_bit_mask(
        &mut self,
        scene: &SceneGraph,
        mask: CollideMask,
        target: NodeId,
        ray: (DVec3, DVec3),
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.queue.collide_with_bit_mask(mask);
        self.pick(scene, target, ray);
        self.queue.find_collision_entry(scene, skip, filter, 0)
    }

    pub fn pick_widget(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        ray: (DVec3, DVec3),
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.pick_bit_mask(scene, CollideMask::WIDGET, target, ray, SkipFlags::WIDGET, filter)
    }

    /// Picks with a ray given in world space instead of through the mouse.
    pub fn pick_3d(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        origin: DVec3,
        direction: DVec3,
        mask: CollideMask,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        let world_to_from = scene.world_mat(self.queue.from_node())?.inverse();
        let ray = (
            world_to_from.transform_point3(origin),
            world_to_from.transform_vector3(direction),
        );
        self.pick_bit_mask(scene, mask, target, ray, skip, filter)
    }

    pub fn pick_geom_3d(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        origin: DVec3,
        direction: DVec3,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.pick_3d(scene, target, origin, direction, CollideMask::GEOM, skip, filter)
    }
}

/// Batch of finite segments traversed together.
#[derive(Debug, Clone)]
pub struct SelectionSegment {
    pub queue: SelectionQueue,
}

impl SelectionSegment {
    pub fn new(from_node: NodeId) -> Self {
        Self {
            queue: SelectionQueue::new(from_node),
        }
    }

    pub fn add_segment(&mut self, a: DVec3, b: DVec3) {
        self.queue.add_solid(QuerySolid::Segment { a, b });
    }

    pub fn pick_geom(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.pick_bit_mask(scene, CollideMask::GEOM, target, skip, filter)
    }

    pub fn pick_bit_mask(
        &mut self,
        scene: &SceneGraph,
        mask: CollideMask,
        target: NodeId,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.queue.collide_with_bit_mask(mask);
        self.queue.traverse(scene, target);
        self.queue.find_collision_entry(scene, skip, filter, 0)
    }
}

/// Batch of spheres traversed together.
#[derive(Debug, Clone)]
pub struct SelectionSphere {
    pub queue: SelectionQueue,
}

impl SelectionSphere {
    pub fn new(from_node: NodeId) -> Self {
        Self {
            queue: SelectionQueue::new(from_node),
        }
    }

    pub fn add_sphere(&mut self, center: DVec3, radius: f64) {
        self.queue.add_solid(QuerySolid::Sphere { center, radius });
    }

    pub fn pick_geom(
        &mut self,
        scene: &SceneGraph,
        target: NodeId,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.pick_bit_mask(scene, CollideMask::GEOM, target, skip, filter)
    }

    pub fn pick_bit_mask(
        &mut self,
        scene: &SceneGraph,
        mask: CollideMask,
        target: NodeId,
        skip: SkipFlags,
        filter: &PickFilter,
    ) -> Option<CollisionEntry> {
        self.queue.collide_with_bit_mask(mask);
        self.queue.traverse(scene, target);
        self.queue.find_collision_entry(scene, skip, filter, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Shape;

    struct Fixture {
        scene: SceneGraph,
        cam: NodeId,
        near: NodeId,
        far: NodeId,
        filter: PickFilter,
    }

    /// Camera at the origin looking down +Y at two cubes.
    fn fixture() -> Fixture {
        let mut scene = SceneGraph::new();
        let cam = scene.attach_new_node(scene.root(), "cam").unwrap();
        let near = scene.attach_new_node(scene.root(), "near").unwrap();
        scene.set_shape(near, Shape::cube(0.5));
        scene.set_pos(near, DVec3::new(0.0, 5.0, 0.0));
        let far = scene.attach_new_node(scene.root(), "far").unwrap();
        scene.set_shape(far, Shape::cube(0.5));
        scene.set_pos(far, DVec3::new(0.0, 10.0, 0.0));
        Fixture {
            scene,
            cam,
            near,
            far,
            filter: PickFilter { camera: cam, widget: None },
        }
    }

    const FORWARD: (DVec3, DVec3) = (DVec3::ZERO, DVec3::Y);

    #[test]
    fn hits_sorted_nearest_first() {
        let mut f = fixture();
        let mut ray = SelectionRay::new(f.cam);
        let root = f.scene.root();
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::DEFAULT, &f.filter).unwrap();
        assert_eq!(hit.into_node, f.near);
        assert!((hit.surface_point - DVec3::new(0.0, 4.5, 0.0)).length() < 1e-9);
        let next = ray
            .queue
            .find_next_collision_entry(&f.scene, SkipFlags::DEFAULT, &f.filter)
            .unwrap();
        assert_eq!(next.into_node, f.far);
        assert!(ray
            .queue
            .find_next_collision_entry(&f.scene, SkipFlags::DEFAULT, &f.filter)
            .is_none());
    }

    #[test]
    fn hidden_and_unpickable_are_skipped() {
        let mut f = fixture();
        let mut ray = SelectionRay::new(f.cam);
        let root = f.scene.root();
        f.scene.hide(f.near);
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::HIDDEN, &f.filter).unwrap();
        assert_eq!(hit.into_node, f.far);
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::empty(), &f.filter).unwrap();
        assert_eq!(hit.into_node, f.near);

        ray.queue.add_unpickable("far");
        let hit = ray.pick_geom(
            &f.scene,
            root,
            FORWARD,
            SkipFlags::HIDDEN | SkipFlags::UNPICKABLE,
            &f.filter,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn backfaces_skipped_from_inside() {
        let mut f = fixture();
        let mut ray = SelectionRay::new(f.cam);
        let root = f.scene.root();
        f.scene.set_pos(f.cam, DVec3::new(0.0, 5.0, 0.0));
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::BACKFACE, &f.filter).unwrap();
        assert_eq!(hit.into_node, f.far);
        assert!(SelectionQueue::is_entry_backfacing(&ray.queue.entries()[0]));
    }

    #[test]
    fn camera_children_skipped() {
        let mut f = fixture();
        let attached = f.scene.attach_new_node(f.cam, "attached").unwrap();
        f.scene.set_shape(attached, Shape::cube(0.2));
        f.scene.set_pos(attached, DVec3::new(0.0, 2.0, 0.0));
        let mut ray = SelectionRay::new(f.cam);
        let root = f.scene.root();
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::empty(), &f.filter).unwrap();
        assert_eq!(hit.into_node, attached);
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::CAMERA, &f.filter).unwrap();
        assert_eq!(hit.into_node, f.near);
    }

    #[test]
    fn widget_mask_only_sees_active_widget() {
        let mut f = fixture();
        let root = f.scene.root();
        let widget = f.scene.attach_new_node(root, "widget").unwrap();
        let part = f.scene.attach_new_node(widget, "x-disc").unwrap();
        f.scene.set_collider(
            part,
            Shape::Disc {
                center: DVec3::new(0.0, 3.0, 0.0),
                normal: DVec3::Y,
                radius: 1.0,
            },
            CollideMask::WIDGET,
        );
        let mut ray = SelectionRay::new(f.cam);
        let filter = PickFilter {
            camera: f.cam,
            widget: Some(widget),
        };
        let hit = ray.pick_widget(&f.scene, root, FORWARD, &filter).unwrap();
        assert_eq!(hit.into_node, part);
        assert!(ray.pick_widget(&f.scene, root, FORWARD, &f.filter).is_none());
        // Geometry picks never see colliders.
        let hit = ray.pick_geom(&f.scene, root, FORWARD, SkipFlags::empty(), &f.filter).unwrap();
        assert_eq!(hit.into_node, f.near);
    }

    #[test]
    fn combined_flags_are_subset_of_each() {
        let mut f = fixture();
        f.scene.hide(f.far);
        let mut ray = SelectionRay::new(f.cam);
        ray.queue.add_unpickable("near");
        let root = f.scene.root();
        ray.pick(&f.scene, root, FORWARD);
        let a = SkipFlags::HIDDEN;
        let b = SkipFlags::UNPICKABLE;
        let both = ray.queue.surviving_entries(&f.scene, a | b, &f.filter);
        let only_a = ray.queue.surviving_entries(&f.scene, a, &f.filter);
        let only_b = ray.queue.surviving_entries(&f.scene, b, &f.filter);
        for entry in &both {
            assert!(only_a.contains(entry));
            assert!(only_b.contains(entry));
        }
        assert!(both.is_empty());
        assert_eq!(only_a.len(), 1);
    }

    #[test]
    fn world_space_ray_and_batches() {
        let mut f = fixture();
        f.scene.set_pos(f.cam, DVec3::new(100.0, 0.0, 0.0));
        let mut ray = SelectionRay::new(f.cam);
        let root = f.scene.root();
        let hit = ray
            .pick_geom_3d(
                &f.scene,
                root,
                DVec3::new(0.0, 20.0, 0.0),
                -DVec3::Y,
                SkipFlags::DEFAULT,
                &f.filter,
            )
            .unwrap();
        assert_eq!(hit.into_node, f.far);
        let world = hit.surface_point_in(&f.scene, root).unwrap();
        assert!((world - DVec3::new(0.0, 10.5, 0.0)).length() < 1e-9);

        let mut segments = SelectionSegment::new(root);
        segments.add_segment(DVec3::new(0.0, 0.0, 0.0), DVec3::new(0.0, 4.0, 0.0));
        assert!(segments.pick_geom(&f.scene, root, SkipFlags::DEFAULT, &f.filter).is_none());
        segments.add_segment(DVec3::new(0.0, 0.0, 0.0), DVec3::new(0.0, 12.0, 0.0));
        assert_eq!(
            segments
                .pick_geom(&f.scene, root, SkipFlags::DEFAULT, &f.filter)
                .map(|e| e.into_node),
            Some(f.near)
        );

        let mut spheres = SelectionSphere::new(root);
        spheres.add_sphere(DVec3::new(0.0, 10.0, 1.2), 1.0);
        assert_eq!(
            spheres
                .pick_geom(&f.scene, root, SkipFlags::DEFAULT, &f.filter)
                .map(|e| e.into_node),
            Some(f.far)
        );
    }
}
