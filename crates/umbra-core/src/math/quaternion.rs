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

//! Provides a Quaternion type for representing 3D rotations.

use super::{Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Represents a 3D rotation using a unit quaternion.
///
/// Light placement only needs to aim an axis, so the API is limited to
/// building rotations and applying them to vectors.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar (real) part.
    pub w: f32,
}

impl Quaternion {
    /// The identity quaternion, representing no rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a new quaternion from its raw components.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a rotation of `angle_radians` around `axis`.
    #[inline]
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c).normalize()
    }

    /// Creates the shortest rotation that turns unit direction `from` onto `to`.
    ///
    /// When the two directions are opposite, the half-turn axis is chosen
    /// perpendicular to `from`.
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let from = from.normalize();
        let to = to.normalize();
        let d = from.dot(to);
        if d >= 1.0 - EPSILON {
            return Self::IDENTITY;
        }
        if d <= -1.0 + EPSILON {
            let mut axis = Vec3::X.cross(from);
            if axis.length_squared() < EPSILON {
                axis = Vec3::Y.cross(from);
            }
            return Self::from_axis_angle(axis, std::f32::consts::PI);
        }
        let c = from.cross(to);
        Self::new(c.x, c.y, c.z, 1.0 + d).normalize()
    }

    /// Returns the squared magnitude.
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Returns a unit quaternion, or identity if the magnitude is near zero.
    #[inline]
    pub fn normalize(&self) -> Self {
        let mag_sq = self.magnitude_squared();
        if mag_sq > EPSILON * EPSILON {
            let inv = 1.0 / mag_sq.sqrt();
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Returns the conjugate, which is the inverse rotation for unit quaternions.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates a vector by this quaternion.
    #[inline]
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Quaternion> for Quaternion {
    type Output = Self;
    /// Hamilton product; `(a * b)` applies `b` first, then `a`.
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Mul<Vec3> for Quaternion {
    type Output = Vec3;
    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.rotate_vec3(rhs)
    }
}
