use glam::DVec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Field of view in degrees.
    Perspective { hfov: f64, vfov: f64 },
    /// Film size in scene units.
    Orthographic { film_width: f64, film_height: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub near: f64,
    pub far: f64,
    pub projection: Projection,
}

impl Lens {
    pub fn perspective(hfov: f64, vfov: f64, near: f64, far: f64) -> Self {
        Self {
            near,
            far,
            projection: Projection::Perspective { hfov, vfov },
        }
    }

    pub fn orthographic(film_width: f64, film_height: f64, near: f64, far: f64) -> Self {
        Self {
            near,
            far,
            projection: Projection::Orthographic {
                film_width,
                film_height,
            },
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self.projection, Projection::Orthographic { .. })
    }

    /// Horizontal and vertical field of view. Orthographic lenses report the
    /// angle their film subtends at the near plane.
    pub fn fov(&self) -> DVec2 {
        match self.projection {
            Projection::Perspective { hfov, vfov } => DVec2::new(hfov, vfov),
            Projection::Orthographic {
                film_width,
                film_height,
            } => {
                let near = self.near.max(f64::EPSILON);
                DVec2::new(
                    2.0 * (0.5 * film_width / near).atan().to_degrees(),
                    2.0 * (0.5 * film_height / near).atan().to_degrees(),
                )
            }
        }
    }

    /// Width and height of the view volume at the near plane.
    pub fn near_size(&self) -> DVec2 {
        match self.projection {
            Projection::Perspective { hfov, vfov } => DVec2::new(
                (hfov * 0.5).to_radians().tan() * self.near * 2.0,
                (vfov * 0.5).to_radians().tan() * self.near * 2.0,
            ),
            Projection::Orthographic {
                film_width,
                film_height,
            } => DVec2::new(film_width, film_height),
        }
    }

    /// Only meaningful for perspective lenses; orthographic lenses keep their film.
    pub fn set_fov(&mut self, hfov: f64, vfov: f64) {
        if let Projection::Perspective { .. } = self.projection {
            self.projection = Projection::Perspective { hfov, vfov };
        }
    }

    pub fn set_film_size(&mut self, width: f64, height: f64) {
        if let Projection::Orthographic { .. } = self.projection {
            self.projection = Projection::Orthographic {
                film_width: width,
                film_height: height,
            };
        }
    }

    pub fn set_near_far(&mut self, near: f64, far: f64) {
        self.near = near;
        self.far = far;
    }
}
