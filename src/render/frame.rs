use crate::foundation::core::{CanvasGeometry, CssRect, Side};
use crate::foundation::error::{DiptychError, DiptychResult};

const MAX_SURFACE_DIM: u16 = 16_384;

/// The physical drawing surface.
///
/// Holds a persistent premultiplied RGBA8 buffer at device-pixel
/// dimensions. Scene drawing happens in CSS-pixel coordinates scaled by
/// [`CanvasGeometry::scale`]; per-side clears and blits operate on raw
/// device pixels with no transform applied, so repeated clears can never
/// compound a scale.
pub struct CanvasFrame {
    rect: CssRect,
    geometry: CanvasGeometry,
    width: u16,
    height: u16,
    data: Vec<u8>,
    revision: u64,

    ctx: Option<vello_cpu::RenderContext>,
    scratch: Option<vello_cpu::Pixmap>,
}

impl CanvasFrame {
    /// Allocate a surface for a CSS rectangle at the given pixel ratio.
    pub fn new(rect: CssRect, device_pixel_ratio: Option<f64>) -> DiptychResult<Self> {
        if !rect.is_valid() {
            return Err(DiptychError::validation(format!(
                "canvas rect must have finite positive dimensions, got {}x{}",
                rect.width, rect.height
            )));
        }
        let geometry = CanvasGeometry::compute(rect, device_pixel_ratio);
        let width = to_surface_px(geometry.width_px)?;
        let height = to_surface_px(geometry.height_px)?;
        let len = usize::from(width) * usize::from(height) * 4;
        Ok(Self {
            rect,
            geometry,
            width,
            height,
            data: vec![0; len],
            revision: 0,
            ctx: None,
            scratch: None,
        })
    }

    pub fn rect(&self) -> CssRect {
        self.rect
    }

    pub fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    /// Surface width in device pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    /// Surface height in device pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// CSS-to-device scale applied to scene coordinates.
    pub fn scale(&self) -> f64 {
        self.geometry.scale
    }

    /// Drawing-space width (CSS pixels).
    pub fn css_width(&self) -> f64 {
        self.rect.width
    }

    /// Drawing-space height (CSS pixels).
    pub fn css_height(&self) -> f64 {
        self.rect.height
    }

    /// Number of completed side paints since allocation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current surface pixels, row-major premultiplied RGBA8.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One premultiplied RGBA8 pixel, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let i = (y as usize * usize::from(self.width) + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// Device-pixel column span `(x0, width)` of one half.
    pub(crate) fn side_span(&self, side: Side) -> (usize, usize) {
        let w = usize::from(self.width);
        let half = w / 2;
        match side {
            Side::Before => (0, half),
            Side::After => (half, w - half),
        }
    }

    /// Clear exactly this side's half; the other half's pixels stay put.
    pub fn clear_side(&mut self, side: Side) {
        let (x0, span) = self.side_span(side);
        let w = usize::from(self.width);
        for row in self.data.chunks_exact_mut(w * 4) {
            row[x0 * 4..(x0 + span) * 4].fill(0);
        }
    }

    /// Render a scene and copy this side's device columns into the surface.
    ///
    /// The scene is built against a scratch context covering the whole
    /// canvas; only the half belonging to `side` is copied back, so draws
    /// can never leak into the other half.
    pub(crate) fn render_scene_to_side(
        &mut self,
        side: Side,
        build: impl FnOnce(&mut vello_cpu::RenderContext) -> DiptychResult<()>,
    ) -> DiptychResult<()> {
        let mut ctx = self
            .ctx
            .take()
            .unwrap_or_else(|| vello_cpu::RenderContext::new(self.width, self.height));
        ctx.reset();

        let built = build(&mut ctx);
        if let Err(err) = built {
            self.ctx = Some(ctx);
            return Err(err);
        }
        ctx.flush();

        let mut scratch = self
            .scratch
            .take()
            .unwrap_or_else(|| vello_cpu::Pixmap::new(self.width, self.height));
        clear_pixmap_to_transparent(&mut scratch);
        ctx.render_to_pixmap(&mut scratch);

        let (x0, span) = self.side_span(side);
        let w = usize::from(self.width);
        let src = scratch.data_as_u8_slice();
        for y in 0..usize::from(self.height) {
            let row = y * w * 4;
            let a = row + x0 * 4;
            let b = row + (x0 + span) * 4;
            self.data[a..b].copy_from_slice(&src[a..b]);
        }
        self.revision += 1;

        self.ctx = Some(ctx);
        self.scratch = Some(scratch);
        Ok(())
    }

    /// Serialize the surface to PNG-encoded bytes.
    pub fn export_png(&self) -> DiptychResult<Vec<u8>> {
        let mut straight = self.data.clone();
        unpremultiply_in_place(&mut straight);
        let img = image::RgbaImage::from_raw(self.width(), self.height(), straight)
            .ok_or_else(|| DiptychError::export("canvas buffer size mismatch"))?;

        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| DiptychError::export(format!("encode png: {e}")))?;
        Ok(out)
    }
}

fn to_surface_px(v: f64) -> DiptychResult<u16> {
    if !v.is_finite() || v <= 0.0 {
        return Err(DiptychError::validation(
            "canvas dimensions must be finite and positive",
        ));
    }
    let px = v.round().max(1.0);
    if px > f64::from(MAX_SURFACE_DIM) {
        return Err(DiptychError::validation(format!(
            "canvas dimension {px} exceeds max {MAX_SURFACE_DIM}"
        )));
    }
    Ok(px as u16)
}

fn clear_pixmap_to_transparent(pixmap: &mut vello_cpu::Pixmap) {
    pixmap.data_as_u8_slice_mut().fill(0);
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: f64, h: f64, ratio: Option<f64>) -> CanvasFrame {
        CanvasFrame::new(CssRect::new(w, h), ratio).unwrap()
    }

    #[test]
    fn surface_dimensions_follow_the_ratio() {
        let f = frame(320.0, 180.0, Some(2.0));
        assert_eq!(f.width(), 640);
        assert_eq!(f.height(), 360);
        assert_eq!(f.scale(), 2.0);
        assert_eq!(f.data().len(), 640 * 360 * 4);
    }

    #[test]
    fn invalid_rects_are_rejected() {
        assert!(CanvasFrame::new(CssRect::new(0.0, 10.0), None).is_err());
        assert!(CanvasFrame::new(CssRect::new(10.0, f64::NAN), None).is_err());
        assert!(CanvasFrame::new(CssRect::new(1e9, 10.0), None).is_err());
    }

    #[test]
    fn side_spans_cover_the_surface_exactly() {
        let f = frame(101.0, 10.0, None);
        let (bx, bw) = f.side_span(Side::Before);
        let (ax, aw) = f.side_span(Side::After);
        assert_eq!((bx, bw), (0, 50));
        assert_eq!((ax, aw), (50, 51));
        assert_eq!(bw + aw, f.width() as usize);
    }

    #[test]
    fn clear_side_leaves_the_other_half_untouched() {
        let mut f = frame(4.0, 2.0, None);
        f.data.fill(0xff);
        f.clear_side(Side::Before);
        assert_eq!(f.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(f.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(f.pixel(2, 0), Some([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(f.pixel(3, 1), Some([0xff, 0xff, 0xff, 0xff]));
    }

    #[test]
    fn scene_blit_is_confined_to_the_side() {
        let mut f = frame(4.0, 2.0, None);
        f.data.fill(0xff);
        // Empty scene: the blit replaces the before-half with transparency.
        f.render_scene_to_side(Side::Before, |_| Ok(())).unwrap();
        assert_eq!(f.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(f.pixel(3, 1), Some([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(f.revision(), 1);
    }

    #[test]
    fn export_png_round_trips_dimensions() {
        let f = frame(8.0, 4.0, Some(2.0));
        let png = f.export_png().unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!(back.width(), 16);
        assert_eq!(back.height(), 8);
    }

    #[test]
    fn unpremultiply_inverts_opaque_and_zeroes_transparent() {
        let mut px = vec![128, 64, 32, 255, 10, 20, 30, 0];
        unpremultiply_in_place(&mut px);
        assert_eq!(&px[..4], &[128, 64, 32, 255]);
        assert_eq!(&px[4..], &[0, 0, 0, 0]);
    }
}
