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

//! Defines the `AffineTransform` used to place surfaces and light volumes.

use super::{Mat4, Quaternion, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// A local-to-world transform composed of translation, rotation and scale.
///
/// This is a thin wrapper over [`Mat4`] that documents intent: the wrapped
/// matrix never carries a projective row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AffineTransform(pub Mat4);

impl AffineTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// Creates a pure translation.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self(Mat4::from_translation(v))
    }

    /// Creates a pure scale.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self(Mat4::from_scale(scale))
    }

    /// Creates a pure rotation.
    #[inline]
    pub fn from_quat(rotation: Quaternion) -> Self {
        Self(Mat4::from_quat(rotation))
    }

    /// Composes `translation * rotation * scale`, applied right to left.
    ///
    /// # Examples
    ///
    /// ```
    /// use umbra_core::math::{AffineTransform, Quaternion, Vec3};
    /// let t = AffineTransform::from_trs(Vec3::new(0.0, 0.0, 2.0), Quaternion::IDENTITY, Vec3::splat(3.0));
    /// assert_eq!(t.transform_point(Vec3::Z), Vec3::new(0.0, 0.0, 5.0));
    /// ```
    pub fn from_trs(translation: Vec3, rotation: Quaternion, scale: Vec3) -> Self {
        Self(
            Mat4::from_translation(translation)
                * Mat4::from_quat(rotation)
                * Mat4::from_scale(scale),
        )
    }

    /// Returns the underlying matrix.
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        self.0
    }

    /// Returns the translation component.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.0.cols[3].truncate()
    }

    /// Returns the transformed +Z axis (not normalized if the transform scales).
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.0.cols[2].truncate()
    }

    /// Transforms a point.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (self.0 * p.extend(1.0)).truncate()
    }

    /// Transforms a direction, ignoring translation.
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.0.transform_vector3(v)
    }

    /// Returns the inverse transform, or `None` if the scale is degenerate.
    #[inline]
    pub fn inverse(&self) -> Option<Self> {
        self.0.inverse().map(Self)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<AffineTransform> for Mat4 {
    #[inline]
    fn from(transform: AffineTransform) -> Self {
        transform.0
    }
}

impl Mul<AffineTransform> for Mat4 {
    type Output = Mat4;
    #[inline]
    fn mul(self, rhs: AffineTransform) -> Mat4 {
        self * rhs.0
    }
}
