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

//! Provides the 4x4 column-major matrix used for transforms and projections.

use super::{Quaternion, Vec3, Vec4, EPSILON};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Used for model transforms, the camera view matrix and the perspective
/// projection. `Mat4 * Vec4` treats the vector as a column.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns the element at `row`, `col`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.cols[col][row]
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0][index],
            self.cols[1][index],
            self.cols[2][index],
            self.cols[3][index],
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::from_vec3(v, 1.0))
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::X * scale.x,
            Vec4::Y * scale.y,
            Vec4::Z * scale.z,
            Vec4::W,
        )
    }

    /// Creates a rotation matrix from a unit quaternion.
    pub fn from_quat(q: Quaternion) -> Self {
        let q = q.normalize();
        let x_axis = q.rotate_vec3(Vec3::X);
        let y_axis = q.rotate_vec3(Vec3::Y);
        let z_axis = q.rotate_vec3(Vec3::Z);
        Self::from_cols(
            x_axis.extend(0.0),
            y_axis.extend(0.0),
            z_axis.extend(0.0),
            Vec4::W,
        )
    }

    /// Creates a left-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// View-space points with `z = z_near` map to depth 0 and `z = z_far` to 1;
    /// the clip-space `w` equals the view-space `z`.
    ///
    /// Returns `None` when the parameters cannot describe a frustum.
    pub fn perspective_lh_zo(
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        if !(z_near > 0.0 && z_far > z_near && aspect_ratio > 0.0 && fov_y_radians > 0.0) {
            return None;
        }
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range = z_far / (z_far - z_near);
        Some(Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, 1.0),
            Vec4::new(0.0, 0.0, -z_near * range, 0.0),
        ))
    }

    /// Creates a left-handed view matrix for a camera at `eye` looking along `direction`.
    ///
    /// In the resulting view space the camera looks down +Z with +Y up.
    /// Returns `None` if `direction` is degenerate or parallel to `up`.
    pub fn look_to_lh(eye: Vec3, direction: Vec3, up: Vec3) -> Option<Self> {
        if direction.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let f = direction.normalize();
        let s = up.cross(f);
        if s.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let s = s.normalize();
        let u = f.cross(s);
        Some(Self::from_cols(
            Vec4::new(s.x, u.x, f.x, 0.0),
            Vec4::new(s.y, u.y, f.y, 0.0),
            Vec4::new(s.z, u.z, f.z, 0.0),
            Vec4::new(-s.dot(eye), -u.dot(eye), -f.dot(eye), 1.0),
        ))
    }

    /// Returns the transpose of the matrix.
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.row(0), self.row(1), self.row(2), self.row(3))
    }

    /// Transforms a point (`w = 1`), applying the perspective divide when `w != 1`.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        let h = *self * p.extend(1.0);
        if (h.w - 1.0).abs() > f32::EPSILON && h.w.abs() > f32::EPSILON {
            h.truncate() / h.w
        } else {
            h.truncate()
        }
    }

    /// Transforms a direction (`w = 0`); translation is ignored.
    #[inline]
    pub fn transform_vector3(&self, v: Vec3) -> Vec3 {
        (*self * v.extend(0.0)).truncate()
    }

    /// Computes the inverse of the matrix using cofactor expansion.
    ///
    /// Returns `None` if the matrix is singular or its entries are not finite.
    pub fn inverse(&self) -> Option<Self> {
        // Row-major scratch copy keeps the cofactor indices readable.
        let m: [[f32; 4]; 4] = std::array::from_fn(|r| {
            let row = self.row(r);
            [row.x, row.y, row.z, row.w]
        });

        // 2x2 minors of the bottom two rows and of the top two rows.
        let s0 = m[0][0] * m[1][1] - m[1][0] * m[0][1];
        let s1 = m[0][0] * m[1][2] - m[1][0] * m[0][2];
        let s2 = m[0][0] * m[1][3] - m[1][0] * m[0][3];
        let s3 = m[0][1] * m[1][2] - m[1][1] * m[0][2];
        let s4 = m[0][1] * m[1][3] - m[1][1] * m[0][3];
        let s5 = m[0][2] * m[1][3] - m[1][2] * m[0][3];

        let c5 = m[2][2] * m[3][3] - m[3][2] * m[2][3];
        let c4 = m[2][1] * m[3][3] - m[3][1] * m[2][3];
        let c3 = m[2][1] * m[3][2] - m[3][1] * m[2][2];
        let c2 = m[2][0] * m[3][3] - m[3][0] * m[2][3];
        let c1 = m[2][0] * m[3][2] - m[3][0] * m[2][2];
        let c0 = m[2][0] * m[3][1] - m[3][0] * m[2][1];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if !det.is_finite() || det.abs() <= f32::MIN_POSITIVE {
            return None;
        }
        let inv = 1.0 / det;

        let r = [
            [
                (m[1][1] * c5 - m[1][2] * c4 + m[1][3] * c3) * inv,
                (-m[0][1] * c5 + m[0][2] * c4 - m[0][3] * c3) * inv,
                (m[3][1] * s5 - m[3][2] * s4 + m[3][3] * s3) * inv,
                (-m[2][1] * s5 + m[2][2] * s4 - m[2][3] * s3) * inv,
            ],
            [
                (-m[1][0] * c5 + m[1][2] * c2 - m[1][3] * c1) * inv,
                (m[0][0] * c5 - m[0][2] * c2 + m[0][3] * c1) * inv,
                (-m[3][0] * s5 + m[3][2] * s2 - m[3][3] * s1) * inv,
                (m[2][0] * s5 - m[2][2] * s2 + m[2][3] * s1) * inv,
            ],
            [
                (m[1][0] * c4 - m[1][1] * c2 + m[1][3] * c0) * inv,
                (-m[0][0] * c4 + m[0][1] * c2 - m[0][3] * c0) * inv,
                (m[3][0] * s4 - m[3][1] * s2 + m[3][3] * s0) * inv,
                (-m[2][0] * s4 + m[2][1] * s2 - m[2][3] * s0) * inv,
            ],
            [
                (-m[1][0] * c3 + m[1][1] * c1 - m[1][2] * c0) * inv,
                (m[0][0] * c3 - m[0][1] * c1 + m[0][2] * c0) * inv,
                (-m[3][0] * s3 + m[3][1] * s1 - m[3][2] * s0) * inv,
                (m[2][0] * s3 - m[2][1] * s1 + m[2][2] * s0) * inv,
            ],
        ];

        // `r` is row-major; transpose back into columns.
        Some(Self::from_cols(
            Vec4::new(r[0][0], r[1][0], r[2][0], r[3][0]),
            Vec4::new(r[0][1], r[1][1], r[2][1], r[3][1]),
            Vec4::new(r[0][2], r[1][2], r[2][2], r[3][2]),
            Vec4::new(r[0][3], r[1][3], r[2][3], r[3][3]),
        ))
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, v: Vec4) -> Vec4 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z + self.cols[3] * v.w
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    /// Composes two transforms; `(a * b) * v == a * (b * v)`.
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}
