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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::math::Extent2D;
use crate::renderer::api::{TextureFormat, TextureId};
use std::fmt;

/// An error related to the creation, lookup or access of a texture.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The texture id does not refer to a live texture.
    NotFound {
        /// The id that was looked up.
        id: TextureId,
    },
    /// A texture descriptor cannot be realized (zero size, for instance).
    InvalidDescriptor {
        /// The label of the offending descriptor, if any.
        label: Option<String>,
        /// Why the descriptor was rejected.
        reason: String,
    },
    /// Textures used together in one operation do not share an extent.
    SizeMismatch {
        /// The extent the operation expected.
        expected: Extent2D,
        /// The extent of the texture that was supplied.
        found: Extent2D,
    },
    /// A texture is bound both as a render target and as a shader input.
    ReadWriteHazard {
        /// The texture bound on both sides.
        id: TextureId,
        /// The binding slot that read it.
        slot: String,
    },
    /// A texture of the wrong format was supplied.
    FormatMismatch {
        /// The texture that was supplied.
        id: TextureId,
        /// The format the operation requires.
        expected: TextureFormat,
        /// The format the texture has.
        found: TextureFormat,
    },
    /// A pooled texture token was returned to a pool that does not track it.
    ForeignPooledTexture {
        /// The id carried by the token.
        id: TextureId,
    },
    /// A backend-specific failure.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { id } => write!(f, "Texture not found for ID: {id:?}"),
            ResourceError::InvalidDescriptor { label, reason } => write!(
                f,
                "Invalid texture descriptor '{}': {}",
                label.as_deref().unwrap_or("Unknown"),
                reason
            ),
            ResourceError::SizeMismatch { expected, found } => {
                write!(f, "Texture size mismatch: expected {expected}, found {found}")
            }
            ResourceError::ReadWriteHazard { id, slot } => write!(
                f,
                "Texture {id:?} is bound as a target and read through slot '{slot}'"
            ),
            ResourceError::FormatMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "Texture {id:?} has format {found:?}, expected {expected:?}"
            ),
            ResourceError::ForeignPooledTexture { id } => {
                write!(f, "Pooled texture {id:?} does not belong to this pool")
            }
            ResourceError::BackendError(msg) => write!(f, "Backend resource error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// The top-level error type for frame rendering operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A draw was issued with a mesh whose index buffer is malformed.
    InvalidMesh {
        /// The label of the draw.
        label: String,
        /// What was wrong with the mesh.
        reason: String,
    },
    /// A draw was issued with no color or depth target.
    NoRenderTarget {
        /// The label of the draw.
        label: String,
    },
    /// More color targets were bound than a program can write.
    TooManyColorTargets {
        /// The number of targets that were bound.
        count: usize,
        /// The supported maximum.
        max: usize,
    },
    /// An error occurred while managing a texture.
    ResourceError(ResourceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidMesh { label, reason } => {
                write!(f, "Invalid mesh submitted by '{label}': {reason}")
            }
            RenderError::NoRenderTarget { label } => {
                write!(f, "Draw '{label}' has no render target")
            }
            RenderError::TooManyColorTargets { count, max } => {
                write!(f, "{count} color targets bound, at most {max} supported")
            }
            RenderError::ResourceError(e) => {
                write!(f, "Graphics resource operation failed: {e}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn resource_error_display() {
        let err = ResourceError::SizeMismatch {
            expected: Extent2D::new(64, 64),
            found: Extent2D::new(32, 64),
        };
        assert_eq!(
            format!("{err}"),
            "Texture size mismatch: expected 64x64, found 32x64"
        );

        let err = ResourceError::ReadWriteHazard {
            id: TextureId(3),
            slot: "main".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Texture TextureId(3) is bound as a target and read through slot 'main'"
        );
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err = ResourceError::NotFound { id: TextureId(101) };
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Texture not found for ID: TextureId(101)"
        );
        assert!(render_err.source().is_some());
    }

    #[test]
    fn render_error_without_source() {
        let err = RenderError::NoRenderTarget {
            label: "mask".to_string(),
        };
        assert_eq!(format!("{err}"), "Draw 'mask' has no render target");
        assert!(err.source().is_none());
    }
}
