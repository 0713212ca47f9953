use std::path::Path;

use crate::assets::decode::{ImageSource, PreparedImage};
use crate::assets::label::{LabelRasterizer, LabelStyle};
use crate::foundation::core::{CssRect, Side};
use crate::foundation::error::{DiptychError, DiptychResult};
use crate::form::state::FormState;
use crate::render::frame::CanvasFrame;
use crate::render::side::{SideContent, render_side_content};

/// Sequences clear → decode → draw-bitmap → draw-label for each half.
///
/// The central contract: a side's half is cleared immediately, the image is
/// decoded asynchronously, and the label is attempted regardless of how the
/// decode ends: a label is never lost to a failed image. Superseded
/// decodes are guarded by per-side sequence numbers: only the latest issued
/// request may paint, stale results are dropped on arrival.
pub struct Compositor {
    form: FormState,
    frame: Option<CanvasFrame>,
    labels: LabelRasterizer,
    decode_seq: [u64; 2],
    device_pixel_ratio: Option<f64>,
}

/// What [`Compositor::begin_render_side`] decided.
pub(crate) enum SidePass {
    /// The half settled synchronously (label-only or blank).
    Done,
    /// An image decode must run; feed the result back through
    /// [`Compositor::complete_render_side`] with this sequence number.
    AwaitDecode { seq: u64, source: ImageSource },
    /// No drawing surface yet; nothing was drawn. Retried on the next
    /// render trigger.
    Skipped,
}

impl Compositor {
    pub fn new(
        style: LabelStyle,
        fonts_dir: Option<&Path>,
        device_pixel_ratio: Option<f64>,
    ) -> Self {
        Self {
            form: FormState::new(),
            frame: None,
            labels: LabelRasterizer::new(style, fonts_dir),
            decode_seq: [0; 2],
            device_pixel_ratio,
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn frame(&self) -> Option<&CanvasFrame> {
        self.frame.as_ref()
    }

    /// Install (or replace) the drawing surface for a viewport rectangle.
    ///
    /// Replacing the surface drops all pixels; callers re-render both sides
    /// afterwards.
    #[tracing::instrument(skip(self))]
    pub fn set_viewport(&mut self, rect: CssRect) -> DiptychResult<()> {
        self.frame = Some(CanvasFrame::new(rect, self.device_pixel_ratio)?);
        Ok(())
    }

    /// First stage of a side render: clear the half and decide how content
    /// settles.
    pub(crate) fn begin_render_side(&mut self, side: Side) -> SidePass {
        let Some(frame) = self.frame.as_mut() else {
            tracing::debug!(side = side.as_str(), "no canvas surface yet, skipping draw");
            return SidePass::Skipped;
        };
        frame.clear_side(side);

        match self.form.slot(side).image.clone() {
            Some(source) => {
                self.decode_seq[side.index()] += 1;
                SidePass::AwaitDecode {
                    seq: self.decode_seq[side.index()],
                    source,
                }
            }
            None => {
                self.render_settled(side, None);
                SidePass::Done
            }
        }
    }

    /// Second stage of the continuation; runs whether or not the decode
    /// succeeded, so the label is always attempted.
    pub(crate) fn complete_render_side(
        &mut self,
        side: Side,
        seq: u64,
        decoded: DiptychResult<PreparedImage>,
    ) {
        if seq != self.decode_seq[side.index()] {
            tracing::debug!(
                side = side.as_str(),
                seq,
                latest = self.decode_seq[side.index()],
                "dropping stale decode result"
            );
            return;
        }
        let bitmap = match decoded {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                tracing::warn!(
                    side = side.as_str(),
                    %err,
                    "image decode failed, rendering label only"
                );
                None
            }
        };
        self.render_settled(side, bitmap);
    }

    fn render_settled(&mut self, side: Side, bitmap: Option<PreparedImage>) {
        let label = self.form.slot(side).label.clone();
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let content = SideContent { bitmap, label };
        if let Err(err) = render_side_content(frame, &self.labels, side, &content) {
            tracing::warn!(side = side.as_str(), %err, "side render failed");
        }
    }

    /// Serialize the current canvas to PNG bytes.
    pub fn export_png(&self) -> DiptychResult<Vec<u8>> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| DiptychError::missing_context("no canvas surface to export"))?;
        frame.export_png()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::decode::decode_image;

    fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn compositor_with_viewport() -> Compositor {
        let mut c = Compositor::new(LabelStyle::default(), None, None);
        c.set_viewport(CssRect::new(40.0, 20.0)).unwrap();
        c
    }

    #[test]
    fn begin_without_surface_skips() {
        let mut c = Compositor::new(LabelStyle::default(), None, None);
        assert!(matches!(c.begin_render_side(Side::Before), SidePass::Skipped));
    }

    #[test]
    fn begin_without_image_settles_immediately() {
        let mut c = compositor_with_viewport();
        let rev0 = c.frame().unwrap().revision();
        assert!(matches!(c.begin_render_side(Side::Before), SidePass::Done));
        assert_eq!(c.frame().unwrap().revision(), rev0 + 1);
    }

    #[test]
    fn begin_with_image_issues_increasing_sequence_numbers() {
        let mut c = compositor_with_viewport();
        c.form_mut()
            .set_image(Side::Before, ImageSource::memory(png_bytes(2, 2, [255, 0, 0, 255])));
        let SidePass::AwaitDecode { seq: first, .. } = c.begin_render_side(Side::Before) else {
            panic!("expected a decode pass");
        };
        let SidePass::AwaitDecode { seq: second, .. } = c.begin_render_side(Side::Before) else {
            panic!("expected a decode pass");
        };
        assert!(second > first);
    }

    #[test]
    fn stale_decode_results_are_dropped() {
        let mut c = compositor_with_viewport();
        c.form_mut()
            .set_image(Side::Before, ImageSource::memory(png_bytes(2, 2, [255, 0, 0, 255])));
        let SidePass::AwaitDecode { seq: stale, .. } = c.begin_render_side(Side::Before) else {
            panic!("expected a decode pass");
        };
        let SidePass::AwaitDecode { seq: latest, .. } = c.begin_render_side(Side::Before) else {
            panic!("expected a decode pass");
        };

        let red = decode_image(&png_bytes(2, 2, [255, 0, 0, 255])).unwrap();
        let blue = decode_image(&png_bytes(2, 2, [0, 0, 255, 255])).unwrap();

        let rev0 = c.frame().unwrap().revision();
        c.complete_render_side(Side::Before, stale, Ok(red));
        assert_eq!(c.frame().unwrap().revision(), rev0, "stale result painted");

        c.complete_render_side(Side::Before, latest, Ok(blue));
        assert_eq!(c.frame().unwrap().revision(), rev0 + 1);
        // The latest issued selection wins: the half is blue.
        assert_eq!(c.frame().unwrap().pixel(2, 2), Some([0, 0, 255, 255]));
    }

    #[test]
    fn failed_decode_still_paints() {
        let mut c = compositor_with_viewport();
        c.form_mut()
            .set_image(Side::Before, ImageSource::memory(vec![0u8; 4]));
        let SidePass::AwaitDecode { seq, .. } = c.begin_render_side(Side::Before) else {
            panic!("expected a decode pass");
        };
        let rev0 = c.frame().unwrap().revision();
        c.complete_render_side(
            Side::Before,
            seq,
            Err(DiptychError::decode("not an image")),
        );
        assert_eq!(c.frame().unwrap().revision(), rev0 + 1);
    }

    #[test]
    fn export_without_surface_is_a_missing_context() {
        let c = Compositor::new(LabelStyle::default(), None, None);
        assert!(matches!(
            c.export_png(),
            Err(DiptychError::MissingContext(_))
        ));
    }
}
