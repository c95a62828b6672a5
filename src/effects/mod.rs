// src/effects/mod.rs
//! Full-screen postprocess effects.
//!
//! Effects run after all opaque and transparent drawing for a 3D canvas.
//! They read the canvas's rendered color/depth images and write back into
//! them: when the canvas's own framebuffer is bound, output goes to the
//! second color attachment and the attachments flip (ping-pong), so the
//! effect can read the previous contents while writing the new ones.

pub mod fxaa;
pub mod shadow;

pub use fxaa::FxaaEffect;
pub use shadow::ShadowMapEffect;

use crate::error::Result;
use crate::renderer::FrameContext;

/// Redirect the bound framebuffer's color output into the canvas's spare
/// color attachment and flip the attachment pair. Returns the texture the
/// effect should sample: the canvas image rendered so far.
///
/// When the canvas is not rendering into its own framebuffer (top level)
/// the effect draws straight over the current target and reads the copy
/// captured on a previous pass.
pub(crate) fn flip_color_attachments(frame: &mut FrameContext<'_>) -> Result<crate::resources::TextureRef> {
    use crate::driver::AttachmentPoint;

    let (fbo, color0, color1) = {
        let atts = frame.cache.attachments(frame.driver, frame.canvas)?;
        (atts.framebuffer, atts.color0.clone(), atts.color1.clone())
    };
    let Some(color1) = color1 else {
        return Ok(color0);
    };
    if fbo.is_some() && frame.driver.bound_framebuffer() == fbo {
        let target = frame.cache.texture(frame.driver, &color1)?;
        frame.driver.attach_texture(AttachmentPoint::Color0, target);
        let atts = frame.cache.attachments_mut(frame.driver, frame.canvas)?;
        atts.color0 = color1;
        atts.color1 = Some(color0.clone());
    }
    Ok(color0)
}
