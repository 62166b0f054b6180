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

//! Triangle setup and scan conversion.
//!
//! Triangles are clipped against the near plane only (`z_clip >= 0`), which
//! guarantees a positive `w` for every remaining vertex. Pixels outside the
//! viewport are never visited, so the side planes need no clipping.

use umbra_core::math::{Extent2D, Vec2, Vec4};
use umbra_core::renderer::api::{ndc_to_pixel, CullMode, Varyings, VertexOutput, MAX_VARYINGS};

/// A covered pixel with its interpolated attributes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fragment {
    pub pixel: [u32; 2],
    pub depth: f32,
    pub front_facing: bool,
    pub varyings: Varyings,
}

struct ScreenVertex {
    pos: Vec2,
    depth: f32,
    inv_w: f32,
    varyings: Varyings,
}

/// Scan-converts one triangle, calling `emit` for every covered pixel center.
pub(crate) fn rasterize_triangle(
    vertices: [VertexOutput; 3],
    extent: Extent2D,
    cull_mode: CullMode,
    mut emit: impl FnMut(Fragment),
) {
    if extent.is_empty() {
        return;
    }
    let polygon = clip_near(vertices);
    for i in 1..polygon.len().saturating_sub(1) {
        rasterize_clipped(
            [polygon[0], polygon[i], polygon[i + 1]],
            extent,
            cull_mode,
            &mut emit,
        );
    }
}

/// Sutherland-Hodgman against `z >= 0`. Returns a convex polygon of 0, 3 or 4 vertices.
fn clip_near(vertices: [VertexOutput; 3]) -> Vec<VertexOutput> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let current = vertices[i];
        let next = vertices[(i + 1) % 3];
        let current_in = current.clip.z >= 0.0;
        let next_in = next.clip.z >= 0.0;
        if current_in {
            out.push(current);
        }
        if current_in != next_in {
            // Interpolate from the inside vertex so a shared edge is split at
            // the same point by both triangles.
            let (inside, outside) = if current_in {
                (current, next)
            } else {
                (next, current)
            };
            let t = inside.clip.z / (inside.clip.z - outside.clip.z);
            out.push(lerp_vertex(&inside, &outside, t));
        }
    }
    out
}

fn lerp_vertex(a: &VertexOutput, b: &VertexOutput, t: f32) -> VertexOutput {
    let mut varyings = [Vec4::ZERO; MAX_VARYINGS];
    for (k, v) in varyings.iter_mut().enumerate() {
        *v = Vec4::lerp(a.varyings[k], b.varyings[k], t);
    }
    VertexOutput {
        clip: Vec4::lerp(a.clip, b.clip, t),
        varyings,
    }
}

/// Edge function of the directed edge `a -> b` evaluated at `p`.
///
/// Written so that `edge(b, a, p) == -edge(a, b, p)` bit for bit, which keeps
/// shared edges free of cracks.
#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (a.y - b.y) * p.x + (b.x - a.x) * p.y + (a.x * b.y - a.y * b.x)
}

fn to_screen(v: &VertexOutput, extent: Extent2D) -> ScreenVertex {
    let inv_w = 1.0 / v.clip.w;
    let ndc = Vec2::new(v.clip.x * inv_w, v.clip.y * inv_w);
    ScreenVertex {
        pos: ndc_to_pixel(ndc, extent),
        depth: v.clip.z * inv_w,
        inv_w,
        varyings: v.varyings,
    }
}

fn rasterize_clipped(
    vertices: [VertexOutput; 3],
    extent: Extent2D,
    cull_mode: CullMode,
    emit: &mut impl FnMut(Fragment),
) {
    let [a, b, c] = vertices.map(|v| to_screen(&v, extent));

    // Positive area means clockwise on screen (y grows downwards): a front face.
    let area = edge(a.pos, b.pos, c.pos);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    let front_facing = area > 0.0;
    if cull_mode == CullMode::Back && !front_facing {
        return;
    }

    let min = a.pos.min(b.pos).min(c.pos);
    let max = a.pos.max(b.pos).max(c.pos);
    let x0 = (min.x - 0.5).ceil().max(0.0) as u32;
    let y0 = (min.y - 0.5).ceil().max(0.0) as u32;
    let x1 = (max.x - 0.5).floor().min(extent.width as f32 - 1.0);
    let y1 = (max.y - 0.5).floor().min(extent.height as f32 - 1.0);
    if x1 < 0.0 || y1 < 0.0 {
        return;
    }
    let (x1, y1) = (x1 as u32, y1 as u32);

    let sign = area.signum();
    let inv_area = 1.0 / area;
    for py in y0..=y1 {
        for px in x0..=x1 {
            let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            let e0 = edge(b.pos, c.pos, p);
            let e1 = edge(c.pos, a.pos, p);
            let e2 = edge(a.pos, b.pos, p);
            if e0 * sign < 0.0 || e1 * sign < 0.0 || e2 * sign < 0.0 {
                continue;
            }
            let (w0, w1, w2) = (e0 * inv_area, e1 * inv_area, e2 * inv_area);

            let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            let inv_w = w0 * a.inv_w + w1 * b.inv_w + w2 * c.inv_w;
            let mut varyings = [Vec4::ZERO; MAX_VARYINGS];
            for (k, v) in varyings.iter_mut().enumerate() {
                *v = (a.varyings[k] * (w0 * a.inv_w)
                    + b.varyings[k] * (w1 * b.inv_w)
                    + c.varyings[k] * (w2 * c.inv_w))
                    / inv_w;
            }

            emit(Fragment {
                pixel: [px, py],
                depth,
                front_facing,
                varyings,
            });
        }
    }
}
