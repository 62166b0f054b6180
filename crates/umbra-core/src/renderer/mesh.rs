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

//! Defines the CPU-side triangle mesh.

use crate::math::Vec3;

/// An indexed triangle list.
///
/// Front faces wind clockwise when seen from outside, which is the
/// left-handed convention used throughout the workspace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    /// Object-space vertex positions.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals. Either empty or as long as `positions`.
    pub normals: Vec<Vec3>,
    /// Triangle list indices, three per face.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Returns the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterates over the index triples of every triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Checks that indices reference existing vertices and that normals, if
    /// present, match the vertex count.
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(format!(
                "{} normals for {} vertices",
                self.normals.len(),
                self.positions.len()
            ));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(format!(
                "index {bad} out of range for {} vertices",
                self.positions.len()
            ));
        }
        Ok(())
    }

    /// Creates a square in the XY plane, centered at the origin, facing -Z.
    ///
    /// With the default camera looking down +Z the square faces the viewer.
    pub fn plane(half_extent: f32) -> Self {
        let h = half_extent;
        Self {
            positions: vec![
                Vec3::new(-h, -h, 0.0),
                Vec3::new(-h, h, 0.0),
                Vec3::new(h, h, 0.0),
                Vec3::new(h, -h, 0.0),
            ],
            normals: vec![-Vec3::Z; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Creates an axis-aligned cube centered at the origin with flat normals.
    pub fn cube(half_extent: f32) -> Self {
        // (outward normal, u, v) with u × v = -normal, so that the corner
        // order -u-v, -u+v, +u+v, +u-v is clockwise seen from outside.
        let faces = [
            (Vec3::Z, Vec3::Y, Vec3::X),
            (-Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::X, Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::Y, Vec3::X, Vec3::Z),
            (-Vec3::Y, Vec3::Z, Vec3::X),
        ];
        let mut mesh = Self::default();
        for (normal, u, v) in faces {
            let base = mesh.positions.len() as u32;
            let center = normal * half_extent;
            for (su, sv) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)] {
                mesh.positions
                    .push(center + u * (su * half_extent) + v * (sv * half_extent));
                mesh.normals.push(normal);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(mesh: &Mesh, tri: [u32; 3]) -> Vec3 {
        let [a, b, c] = tri.map(|i| mesh.positions[i as usize]);
        (b - a).cross(c - a)
    }

    #[test]
    fn plane_winding_points_toward_negative_z() {
        let plane = Mesh::plane(1.0);
        for tri in plane.triangles() {
            assert!(face_normal(&plane, tri).z < 0.0);
        }
        assert!(plane.validate().is_ok());
    }

    #[test]
    fn cube_faces_wind_outward() {
        let cube = Mesh::cube(0.5);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for (i, tri) in cube.triangles().enumerate() {
            let n = face_normal(&cube, tri);
            let declared = cube.normals[tri[0] as usize];
            assert!(n.dot(declared) > 0.0, "triangle {i} winds inward");
        }
    }

    #[test]
    fn validate_rejects_out_of_range_indices() {
        let mesh = Mesh {
            positions: vec![Vec3::ZERO; 3],
            normals: vec![],
            indices: vec![0, 1, 3],
        };
        assert!(mesh.validate().is_err());
    }
}
