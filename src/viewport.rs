//! Per-viewport camera and mouse state.
//!
//! Each display region wraps one camera node. The context caches the lens
//! parameters the controllers read every frame (near plane size, field of
//! view) and turns the window mouse into region-local NDC plus a point on
//! the near plane.

use crate::pick::SelectionRay;
use crate::scene::{NodeId, SceneGraph};
use glam::{DVec2, DVec3};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ViewportError {
    #[error("camera {0:?} of this display region no longer exists")]
    StaleContext(NodeId),
    #[error("display region list needs at least one region")]
    NoRegions,
}

pub type Result<T> = std::result::Result<T, ViewportError>;

/// Sub-rectangle of the window, in `[0, 1]` window fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRect {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl RegionRect {
    pub const FULL: Self = Self {
        left: 0.0,
        right: 1.0,
        bottom: 0.0,
        top: 1.0,
    };

    pub fn new(left: f64, right: f64, bottom: f64, top: f64) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Perspective,
    Orthographic,
    /// Orthographic region whose camera is rolled onto its side.
    OrthographicRotated,
}

impl RegionKind {
    pub fn is_orthographic(self) -> bool {
        !matches!(self, RegionKind::Perspective)
    }
}

#[derive(Debug, Clone)]
pub struct DisplayRegionContext {
    cam: NodeId,
    rect: RegionRect,
    origin: DVec2,
    scale: DVec2,
    sideways: bool,
    orthographic: bool,
    lens_revision: u64,
    ortho_factor: f64,
    film_base: DVec2,

    pub near: f64,
    pub far: f64,
    pub fov_h: f64,
    pub fov_v: f64,
    pub near_width: f64,
    pub near_height: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,

    /// Region-local NDC, `[-1, 1]` while the mouse is inside the region.
    pub mouse: DVec2,
    pub mouse_last: DVec2,
    pub mouse_delta: DVec2,
    /// Mouse position on the near plane, in camera space.
    pub near_vec: DVec3,

    pub ray: SelectionRay,
}

impl DisplayRegionContext {
    pub fn new(scene: &SceneGraph, cam: NodeId, rect: RegionRect) -> Result<Self> {
        if scene.lens(cam).is_none() {
            return Err(ViewportError::StaleContext(cam));
        }
        let mut dr = Self {
            cam,
            rect,
            origin: DVec2::new(rect.left + rect.right - 1.0, rect.top + rect.bottom - 1.0),
            scale: DVec2::new(1.0 / (rect.right - rect.left), 1.0 / (rect.top - rect.bottom)),
            sideways: false,
            orthographic: false,
            lens_revision: 0,
            ortho_factor: 0.1,
            film_base: DVec2::ZERO,
            near: 1.0,
            far: 1000.0,
            fov_h: 40.0,
            fov_v: 30.0,
            near_width: 0.0,
            near_height: 0.0,
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
            mouse: DVec2::ZERO,
            mouse_last: DVec2::ZERO,
            mouse_delta: DVec2::ZERO,
            near_vec: DVec3::ZERO,
            ray: SelectionRay::new(cam),
        };
        dr.set_orientation(scene)?;
        dr.cam_update(scene)?;
        if let Some(lens) = scene.lens(cam) {
            dr.film_base = lens.near_size() / dr.ortho_factor;
        }
        Ok(dr)
    }

    pub fn cam(&self) -> NodeId {
        self.cam
    }

    pub fn rect(&self) -> RegionRect {
        self.rect
    }

    pub fn is_sideways(&self) -> bool {
        self.sideways
    }

    pub fn kind(&self) -> RegionKind {
        match (self.orthographic, self.sideways) {
            (false, _) => RegionKind::Perspective,
            (true, false) => RegionKind::Orthographic,
            (true, true) => RegionKind::OrthographicRotated,
        }
    }

    /// Marks the region sideways when its camera is rolled by roughly 90°.
    pub fn set_orientation(&mut self, scene: &SceneGraph) -> Result<()> {
        let hpr = scene.hpr(self.cam).ok_or(ViewportError::StaleContext(self.cam))?;
        let roll = hpr.z;
        self.sideways = (roll > 45.0 && roll < 135.0)
            || (roll > 225.0 && roll < 315.0)
            || (roll < -45.0 && roll > -135.0)
            || (roll < -225.0 && roll > -315.0);
        Ok(())
    }

    /// Re-reads the lens and refreshes the derived near-plane values.
    pub fn cam_update(&mut self, scene: &SceneGraph) -> Result<()> {
        let lens = *scene.lens(self.cam).ok_or(ViewportError::StaleContext(self.cam))?;
        self.lens_revision = scene.lens_revision(self.cam).unwrap_or(0);
        self.orthographic = lens.is_orthographic();
        self.near = lens.near;
        self.far = lens.far;
        let fov = lens.fov();
        self.fov_h = fov.x;
        self.fov_v = fov.y;
        let size = lens.near_size();
        self.near_width = size.x;
        self.near_height = size.y;
        self.left = -self.near_width * 0.5;
        self.right = self.near_width * 0.5;
        self.top = self.near_height * 0.5;
        self.bottom = -self.near_height * 0.5;
        Ok(())
    }

    /// Refreshes cached lens values if the lens changed since the last update.
    pub fn check_lens(&mut self, scene: &SceneGraph) -> Result<bool> {
        let revision = scene
            .lens_revision(self.cam)
            .ok_or(ViewportError::StaleContext(self.cam))?;
        if revision == self.lens_revision {
            return Ok(false);
        }
        self.cam_update(scene)?;
        Ok(true)
    }

    /// `window_mouse` is whole-window NDC, `None` when the pointer is outside.
    pub fn mouse_update(&mut self, window_mouse: Option<DVec2>) {
        self.mouse_last = self.mouse;
        if let Some(m) = window_mouse {
            self.mouse = (m - self.origin) * self.scale;
        }
        self.mouse_delta = self.mouse - self.mouse_last;
        self.near_vec = DVec3::new(
            self.near_width * 0.5 * self.mouse.x,
            self.near,
            self.near_height * 0.5 * self.mouse.y,
        );
    }

    pub fn contains_mouse(&self) -> bool {
        (-1.0..=1.0).contains(&self.mouse.x) && (-1.0..=1.0).contains(&self.mouse.y)
    }

    /// Field of view as seen on screen, accounting for sideways cameras.
    pub fn hfov(&self) -> f64 {
        if self.sideways {
            self.fov_v
        } else {
            self.fov_h
        }
    }

    pub fn vfov(&self) -> f64 {
        if self.sideways {
            self.fov_h
        } else {
            self.fov_v
        }
    }

    pub fn set_fov(&mut self, scene: &mut SceneGraph, hfov: f64, vfov: f64) -> Result<()> {
        let (h, v) = if self.sideways { (vfov, hfov) } else { (hfov, vfov) };
        self.edit_lens(scene, |lens| lens.set_fov(h, v))
    }

    pub fn set_hfov(&mut self, scene: &mut SceneGraph, hfov: f64) -> Result<()> {
        let sideways = self.sideways;
        self.edit_lens(scene, |lens| {
            let fov = lens.fov();
            if sideways {
                lens.set_fov(fov.x, hfov);
            } else {
                lens.set_fov(hfov, fov.y);
            }
        })
    }

    pub fn set_vfov(&mut self, scene: &mut SceneGraph, vfov: f64) -> Result<()> {
        let sideways = self.sideways;
        self.edit_lens(scene, |lens| {
            let fov = lens.fov();
            if sideways {
                lens.set_fov(vfov, fov.y);
            } else {
                lens.set_fov(fov.x, vfov);
            }
        })
    }

    pub fn set_near_far(&mut self, scene: &mut SceneGraph, near: f64, far: f64) -> Result<()> {
        self.edit_lens(scene, |lens| lens.set_near_far(near, far))
    }

    pub fn ortho_factor(&self) -> f64 {
        self.ortho_factor
    }

    /// Sets the ortho zoom, clamped to `[min, max]`, and reapplies the film.
    pub fn set_ortho_factor(
        &mut self,
        scene: &mut SceneGraph,
        factor: f64,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.ortho_factor = factor.clamp(min, max);
        let base = self.film_base;
        self.update_film_size(scene, base.x, base.y)
    }

    /// Applies a window-sized film. Orthographic lenses are scaled by the
    /// ortho factor first; perspective lenses ignore film changes.
    pub fn update_film_size(&mut self, scene: &mut SceneGraph, width: f64, height: f64) -> Result<()> {
        self.film_base = DVec2::new(width, height);
        if !self.orthographic {
            return Ok(());
        }
        let factor = self.ortho_factor;
        self.edit_lens(scene, |lens| lens.set_film_size(width * factor, height * factor))
    }

    fn edit_lens(
        &mut self,
        scene: &mut SceneGraph,
        f: impl FnOnce(&mut crate::scene::Lens),
    ) -> Result<()> {
        let mut lens = *scene.lens(self.cam).ok_or(ViewportError::StaleContext(self.cam))?;
        f(&mut lens);
        scene
            .set_lens(self.cam, lens)
            .ok_or(ViewportError::StaleContext(self.cam))?;
        self.cam_update(scene)
    }

    /// Ray through `mouse` (region NDC), in camera space, as `(origin, direction)`.
    pub fn mouse_ray(&self, mouse: DVec2) -> (DVec3, DVec3) {
        let x = self.near_width * 0.5 * mouse.x;
        let z = self.near_height * 0.5 * mouse.y;
        if self.orthographic {
            (DVec3::new(x, 0.0, z), DVec3::Y)
        } else {
            (DVec3::ZERO, DVec3::new(x, self.near, z))
        }
    }
}

/// Flat list of viewports; the current one is the first containing the mouse.
#[derive(Debug, Clone)]
pub struct DisplayRegionList {
    regions: Vec<DisplayRegionContext>,
    current: usize,
    captured: bool,
}

impl DisplayRegionList {
    pub fn new(regions: Vec<DisplayRegionContext>) -> Result<Self> {
        if regions.is_empty() {
            return Err(ViewportError::NoRegions);
        }
        Ok(Self {
            regions,
            current: 0,
            captured: false,
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayRegionContext> {
        self.regions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DisplayRegionContext> {
        self.regions.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&DisplayRegionContext> {
        self.regions.get(index)
    }

    pub fn push(&mut self, region: DisplayRegionContext) {
        self.regions.push(region);
    }

    pub fn current(&self) -> &DisplayRegionContext {
        &self.regions[self.current]
    }

    pub fn current_mut(&mut self) -> &mut DisplayRegionContext {
        &mut self.regions[self.current]
    }

    /// While captured the current region stays put, so a drag that leaves
    /// its viewport keeps driving the same camera.
    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn mouse_update(&mut self, window_mouse: Option<DVec2>) {
        for region in &mut self.regions {
            region.mouse_update(window_mouse);
        }
        if self.captured {
            return;
        }
        self.current = self
            .regions
            .iter()
            .position(|r| r.contains_mouse())
            .unwrap_or(0);
    }

    /// Per-frame refresh: picks up lens changes and drops regions whose
    /// camera disappeared (the first region is always kept).
    pub fn context_task(&mut self, scene: &SceneGraph) {
        let mut index = 0;
        self.regions.retain_mut(|region| {
            let keep = match region.check_lens(scene) {
                Ok(_) => true,
                Err(err) => {
                    log::warn!("dropping display region: {err}");
                    index == 0
                }
            };
            index += 1;
            keep
        });
        if self.current >= self.regions.len() {
            self.current = 0;
        }
    }

    pub fn set_near_far(&mut self, scene: &mut SceneGraph, near: f64, far: f64) {
        for region in &mut self.regions {
            if let Err(err) = region.set_near_far(scene, near, far) {
                log::warn!("set_near_far: {err}");
            }
        }
    }

    pub fn set_fov(&mut self, scene: &mut SceneGraph, hfov: f64, vfov: f64) {
        for region in &mut self.regions {
            if let Err(err) = region.set_fov(scene, hfov, vfov) {
                log::warn!("set_fov: {err}");
            }
        }
    }
}
