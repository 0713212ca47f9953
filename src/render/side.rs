use std::sync::Arc;

use crate::assets::decode::PreparedImage;
use crate::assets::label::LabelRasterizer;
use crate::foundation::core::{Affine, Side};
use crate::foundation::error::{DiptychError, DiptychResult};
use crate::render::frame::CanvasFrame;

/// Settled content for one half: an optional decoded bitmap and an optional
/// label string.
#[derive(Clone, Debug, Default)]
pub(crate) struct SideContent {
    pub(crate) bitmap: Option<PreparedImage>,
    pub(crate) label: Option<String>,
}

/// One draw operation for a half, in paint order.
#[derive(Clone, Debug)]
pub(crate) enum SideDrawOp {
    Bitmap {
        image: PreparedImage,
        /// Target width in CSS pixels (= the half width).
        dst_width: f64,
        /// Target height in CSS pixels, aspect preserved.
        dst_height: f64,
    },
    Label {
        text: String,
    },
}

/// Plan a half's draw operations.
///
/// The bitmap, when present, always precedes the label: the label must end
/// up legible over the image, never under it. Empty labels draw nothing.
pub(crate) fn plan_side(half_width_css: f64, content: &SideContent) -> Vec<SideDrawOp> {
    let mut ops = Vec::new();
    if let Some(image) = &content.bitmap {
        let dst_width = half_width_css;
        let dst_height = dst_width / image.aspect_ratio();
        ops.push(SideDrawOp::Bitmap {
            image: image.clone(),
            dst_width,
            dst_height,
        });
    }
    if let Some(text) = content.label.as_deref() {
        if !text.is_empty() {
            ops.push(SideDrawOp::Label {
                text: text.to_string(),
            });
        }
    }
    ops
}

/// Draw one side's settled content into its half of the frame.
pub(crate) fn render_side_content(
    frame: &mut CanvasFrame,
    labels: &LabelRasterizer,
    side: Side,
    content: &SideContent,
) -> DiptychResult<()> {
    let css_width = frame.css_width();
    let css_height = frame.css_height();
    let scale = frame.scale();
    let half_css = css_width / 2.0;
    let x0_css = side.origin_x(css_width);

    let ops = plan_side(half_css, content);

    frame.render_scene_to_side(side, |ctx| {
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        for op in &ops {
            match op {
                SideDrawOp::Bitmap {
                    image,
                    dst_width,
                    dst_height,
                } => {
                    let paint =
                        rgba_premul_to_image(&image.rgba8_premul, image.width, image.height)?;
                    let sx = dst_width / f64::from(image.width);
                    let sy = dst_height / f64::from(image.height);
                    let tr = Affine::scale(scale)
                        * Affine::translate((x0_css, 0.0))
                        * Affine::scale_non_uniform(sx, sy);
                    ctx.set_transform(affine_to_cpu(tr));
                    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                    ctx.set_paint(paint);
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        0.0,
                        0.0,
                        f64::from(image.width),
                        f64::from(image.height),
                    ));
                }
                SideDrawOp::Label { text } => {
                    // The tile is rasterized at device resolution; position
                    // it at the half's device origin with no extra scaling.
                    let tile = labels.rasterize(text, half_css, css_height, scale)?;
                    let paint =
                        rgba_premul_to_image(&tile.rgba8_premul, tile.width, tile.height)?;
                    let tr = Affine::translate((x0_css * scale, 0.0));
                    ctx.set_transform(affine_to_cpu(tr));
                    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
                    ctx.set_paint(paint);
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        0.0,
                        0.0,
                        f64::from(tile.width),
                        f64::from(tile.height),
                    ));
                }
            }
        }
        Ok(())
    })
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> DiptychResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| DiptychError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| DiptychError::validation("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(DiptychError::validation("pixmap byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

fn rgba_premul_to_image(
    bytes_premul: &[u8],
    width: u32,
    height: u32,
) -> DiptychResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes_premul, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(w: u32, h: u32) -> PreparedImage {
        PreparedImage {
            width: w,
            height: h,
            rgba8_premul: Arc::new(vec![0xff; (w * h * 4) as usize]),
        }
    }

    #[test]
    fn bitmap_always_precedes_label() {
        let content = SideContent {
            bitmap: Some(bitmap(4, 2)),
            label: Some("tag".to_string()),
        };
        let ops = plan_side(100.0, &content);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], SideDrawOp::Bitmap { .. }));
        assert!(matches!(ops[1], SideDrawOp::Label { .. }));
    }

    #[test]
    fn bitmap_fills_the_half_width_preserving_aspect() {
        let content = SideContent {
            bitmap: Some(bitmap(40, 20)),
            label: None,
        };
        let ops = plan_side(100.0, &content);
        let SideDrawOp::Bitmap {
            dst_width,
            dst_height,
            ..
        } = &ops[0]
        else {
            panic!("expected a bitmap op");
        };
        assert_eq!(*dst_width, 100.0);
        assert_eq!(*dst_height, 50.0);
    }

    #[test]
    fn empty_or_missing_labels_draw_nothing() {
        let none = plan_side(100.0, &SideContent::default());
        assert!(none.is_empty());

        let cleared = plan_side(
            100.0,
            &SideContent {
                bitmap: None,
                label: Some(String::new()),
            },
        );
        assert!(cleared.is_empty());
    }

    #[test]
    fn pixmap_rejects_wrong_byte_len() {
        assert!(pixmap_from_premul_bytes(&[0u8; 8], 2, 2).is_err());
        assert!(pixmap_from_premul_bytes(&[0u8; 16], 2, 2).is_ok());
    }
}
