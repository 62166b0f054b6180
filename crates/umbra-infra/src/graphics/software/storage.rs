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

use umbra_core::math::{Extent2D, Vec4};
use umbra_core::renderer::api::{TextureDescriptor, TextureFormat};

/// Host-memory backing of one texture.
#[derive(Debug, Clone)]
pub(crate) struct TextureStorage {
    pub descriptor: TextureDescriptor<'static>,
    pub data: Vec<u8>,
}

impl TextureStorage {
    pub fn new(descriptor: TextureDescriptor<'static>) -> Self {
        let data = vec![0; descriptor.byte_len()];
        Self { descriptor, data }
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.descriptor.size
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        let size = self.descriptor.size;
        if x >= size.width || y >= size.height {
            return None;
        }
        Some((y as usize * size.width as usize + x as usize) * self.format().bytes_per_pixel())
    }

    /// Out-of-range loads read as zero.
    pub fn load(&self, x: u32, y: u32) -> Vec4 {
        match self.offset(x, y) {
            Some(o) => {
                let bpp = self.format().bytes_per_pixel();
                self.format().decode(&self.data[o..o + bpp])
            }
            None => Vec4::ZERO,
        }
    }

    /// Out-of-range stores are dropped.
    pub fn store(&mut self, x: u32, y: u32, value: Vec4) {
        if let Some(o) = self.offset(x, y) {
            let format = self.format();
            format.encode(value, &mut self.data[o..o + format.bytes_per_pixel()]);
        }
    }

    pub fn fill(&mut self, value: Vec4) {
        let format = self.format();
        let mut texel = vec![0u8; format.bytes_per_pixel()];
        format.encode(value, &mut texel);
        for chunk in self.data.chunks_exact_mut(texel.len()) {
            chunk.copy_from_slice(&texel);
        }
    }

    /// Writes `source` into `self`, converting formats and resampling with the
    /// nearest texel when the extents differ.
    pub fn blit_from(&mut self, source: &TextureStorage) {
        if source.descriptor.key() == self.descriptor.key() {
            self.data.copy_from_slice(&source.data);
            return;
        }
        let dst = self.extent();
        let src = source.extent();
        for y in 0..dst.height {
            let sy = ((y as u64 * src.height as u64) / dst.height.max(1) as u64) as u32;
            for x in 0..dst.width {
                let sx = ((x as u64 * src.width as u64) / dst.width.max(1) as u64) as u32;
                self.store(x, y, source.load(sx, sy));
            }
        }
    }
}
