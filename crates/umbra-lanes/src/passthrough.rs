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

//! The single degrade path shared by every compositor pass.
//!
//! A pass that cannot run, because an input is missing or the device
//! rejected one of its draws, leaves the frame untouched: its input image is
//! copied to its output and the frame carries on.

use umbra_core::renderer::api::TextureId;
use umbra_core::renderer::{GraphicsDevice, RenderError, ResourceError};

/// A precondition a pass needs and did not get this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MissingInput {
    /// The geometry pass produced no G-buffer.
    #[error("no G-buffer was produced this frame")]
    GBuffer,
    /// The base lighting pass produced no lit-color buffer.
    #[error("no lit-color buffer is available")]
    LitBuffer,
    /// No enabled directional light was supplied.
    #[error("no enabled directional light was supplied")]
    DirectionalLight,
    /// The light list is empty.
    #[error("the light list is empty")]
    LightList,
    /// The light volume masks were not generated.
    #[error("no light volume masks were generated")]
    Masks,
    /// The pass has no shading material configured.
    #[error("the pass has no material")]
    Material,
}

/// Why a pass body stopped early.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// A precondition is not met; the pass is skipped silently.
    #[error(transparent)]
    Missing(#[from] MissingInput),
    /// The device rejected an operation of the pass.
    #[error("device failure: {0}")]
    Device(#[from] RenderError),
}

impl From<ResourceError> for PassError {
    fn from(e: ResourceError) -> Self {
        PassError::Device(RenderError::ResourceError(e))
    }
}

/// What a pass did with the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome<T> {
    /// The pass ran and produced `T`.
    Executed(T),
    /// The pass copied its input to its output unchanged.
    PassedThrough,
}

impl<T> PassOutcome<T> {
    /// Returns the produced value, if the pass ran.
    pub fn executed(self) -> Option<T> {
        match self {
            PassOutcome::Executed(value) => Some(value),
            PassOutcome::PassedThrough => None,
        }
    }

    /// Returns `true` if the pass copied its input through.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, PassOutcome::PassedThrough)
    }
}

/// Runs `pass`, falling back to copying `source` into `destination` when it fails.
///
/// Missing inputs are logged at `debug`, device failures at `warn`. Only a
/// failure of the fallback copy itself is returned as an error.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use umbra_core::math::{Extent2D, Vec4};
/// use umbra_core::renderer::api::{TextureDescriptor, TextureFormat, TextureKey};
/// use umbra_core::renderer::GraphicsDevice;
/// use umbra_infra::SoftwareDevice;
/// use umbra_lanes::{run_or_passthrough, MissingInput, PassOutcome};
///
/// let device = SoftwareDevice::new();
/// let key = TextureKey::new(Extent2D::new(2, 2), TextureFormat::Rgba8Unorm);
/// let src = device.create_texture(&TextureDescriptor::from_key("src", key)).unwrap();
/// let dst = device.create_texture(&TextureDescriptor::from_key("dst", key)).unwrap();
/// device.clear_texture(src, Vec4::ONE).unwrap();
///
/// let outcome = run_or_passthrough(&device, "Example", src, dst, || -> Result<(), _> {
///     Err(MissingInput::GBuffer.into())
/// })
/// .unwrap();
/// assert_eq!(outcome, PassOutcome::PassedThrough);
/// assert_eq!(device.read_texture(dst).unwrap().texel(1, 1), Vec4::ONE);
/// ```
pub fn run_or_passthrough<T>(
    device: &dyn GraphicsDevice,
    pass_name: &str,
    source: TextureId,
    destination: TextureId,
    pass: impl FnOnce() -> Result<T, PassError>,
) -> Result<PassOutcome<T>, RenderError> {
    match pass() {
        Ok(value) => Ok(PassOutcome::Executed(value)),
        Err(err) => {
            match &err {
                PassError::Missing(missing) => {
                    log::debug!("{pass_name}: passing through ({missing})");
                }
                PassError::Device(device_err) => {
                    log::warn!("{pass_name}: passing through after device failure: {device_err}");
                }
            }
            device.copy_texture(source, destination)?;
            Ok(PassOutcome::PassedThrough)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::{Extent2D, Vec4};
    use umbra_core::renderer::api::{TextureDescriptor, TextureFormat, TextureKey};
    use umbra_infra::SoftwareDevice;

    fn pair(device: &SoftwareDevice) -> (TextureId, TextureId) {
        let key = TextureKey::new(Extent2D::new(4, 4), TextureFormat::Rgba16Float);
        let src = device
            .create_texture(&TextureDescriptor::from_key("src", key))
            .unwrap();
        let dst = device
            .create_texture(&TextureDescriptor::from_key("dst", key))
            .unwrap();
        device
            .clear_texture(src, Vec4::new(0.5, 0.25, 1.0, 1.0))
            .unwrap();
        (src, dst)
    }

    #[test]
    fn successful_pass_leaves_destination_alone() {
        let device = SoftwareDevice::new();
        let (src, dst) = pair(&device);
        let outcome = run_or_passthrough(&device, "Test", src, dst, || Ok(7)).unwrap();
        assert_eq!(outcome, PassOutcome::Executed(7));
        assert!(device.read_texture(dst).unwrap().data.iter().all(|b| *b == 0));
    }

    #[test]
    fn device_failure_degrades_to_copy() {
        let device = SoftwareDevice::new();
        let (src, dst) = pair(&device);
        let outcome = run_or_passthrough(&device, "Test", src, dst, || -> Result<(), _> {
            Err(ResourceError::NotFound { id: TextureId(999) }.into())
        })
        .unwrap();
        assert!(outcome.is_passthrough());
        assert_eq!(
            device.read_texture(dst).unwrap().data,
            device.read_texture(src).unwrap().data
        );
    }

    #[test]
    fn failing_copy_surfaces_as_error() {
        let device = SoftwareDevice::new();
        let (src, _) = pair(&device);
        let result = run_or_passthrough(&device, "Test", src, TextureId(999), || -> Result<(), _> {
            Err(MissingInput::LitBuffer.into())
        });
        assert!(matches!(
            result,
            Err(RenderError::ResourceError(ResourceError::NotFound { .. }))
        ));
    }
}
