// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The camera context shared by every pass of a frame.

use crate::math::{Extent2D, Mat4, Vec2, Vec3, Vec4};

/// View and projection of the camera rendering the frame, plus its viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-to-view transform. View space looks down +Z.
    pub view: Mat4,
    /// View-to-clip transform with a `[0, 1]` depth range.
    pub projection: Mat4,
    /// The viewport size in pixels, read once per frame.
    pub viewport: Extent2D,
}

impl Camera {
    /// Creates a perspective camera at `eye` looking along `direction`.
    ///
    /// The aspect ratio is taken from `viewport`. Returns `None` when the
    /// view or projection is degenerate.
    pub fn perspective(
        eye: Vec3,
        direction: Vec3,
        up: Vec3,
        fov_y_radians: f32,
        z_near: f32,
        z_far: f32,
        viewport: Extent2D,
    ) -> Option<Self> {
        let view = Mat4::look_to_lh(eye, direction, up)?;
        let projection =
            Mat4::perspective_lh_zo(fov_y_radians, viewport.aspect_ratio(), z_near, z_far)?;
        Some(Self {
            view,
            projection,
            viewport,
        })
    }

    /// Returns the inverse projection, used to reconstruct view-space positions.
    pub fn inverse_projection(&self) -> Option<Mat4> {
        self.projection.inverse()
    }

    /// Returns the view-projection matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Reconstructs a view-space position from an NDC coordinate and a view-space depth.
///
/// The NDC point is unprojected onto the far plane to get a ray through the
/// camera origin, which is then scaled so its `z` equals `view_z`.
///
/// # Examples
///
/// ```
/// use umbra_core::math::{Mat4, Vec2, FRAC_PI_2};
/// use umbra_core::renderer::camera::reconstruct_view_position;
/// let proj = Mat4::perspective_lh_zo(FRAC_PI_2, 1.0, 0.1, 100.0).unwrap();
/// let p = reconstruct_view_position(Vec2::new(1.0, 0.0), 5.0, &proj.inverse().unwrap());
/// assert!((p.x - 5.0).abs() < 1e-3 && (p.z - 5.0).abs() < 1e-4);
/// ```
pub fn reconstruct_view_position(ndc: Vec2, view_z: f32, inverse_projection: &Mat4) -> Vec3 {
    let far = *inverse_projection * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
    let ray = far.truncate() / far.w;
    if ray.z.abs() <= f32::EPSILON {
        return Vec3::new(0.0, 0.0, view_z);
    }
    ray * (view_z / ray.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{degrees_to_radians, FRAC_PI_2};
    use crate::renderer::api::pixel_to_ndc;
    use approx::assert_relative_eq;

    #[test]
    fn reconstruction_inverts_projection() {
        let camera = Camera::perspective(
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Y,
            degrees_to_radians(70.0),
            0.1,
            200.0,
            Extent2D::new(80, 60),
        )
        .unwrap();
        let inv = camera.inverse_projection().unwrap();

        let p_view = Vec3::new(-1.3, 0.7, 6.0);
        let clip = camera.projection * p_view.extend(1.0);
        let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
        let q = reconstruct_view_position(ndc, p_view.z, &inv);
        assert_relative_eq!(q.x, p_view.x, epsilon = 1e-4);
        assert_relative_eq!(q.y, p_view.y, epsilon = 1e-4);
        assert_relative_eq!(q.z, p_view.z, epsilon = 1e-4);
    }

    #[test]
    fn pixel_rays_span_the_frustum() {
        let extent = Extent2D::new(64, 64);
        let camera =
            Camera::perspective(Vec3::ZERO, Vec3::Z, Vec3::Y, FRAC_PI_2, 0.1, 100.0, extent)
                .unwrap();
        let inv = camera.inverse_projection().unwrap();
        // With a 90 degree field of view, x/z spans (-1, 1) across the image.
        let left = reconstruct_view_position(pixel_to_ndc([0, 32], extent), 1.0, &inv);
        let right = reconstruct_view_position(pixel_to_ndc([63, 32], extent), 1.0, &inv);
        assert!(left.x < -0.95 && right.x > 0.95);
        assert_relative_eq!(left.x, -right.x, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_camera_is_rejected() {
        let camera = Camera::perspective(
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::Y,
            FRAC_PI_2,
            0.1,
            100.0,
            Extent2D::new(8, 8),
        );
        assert!(camera.is_none());
    }
}
