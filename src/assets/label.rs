use std::path::Path;
use std::sync::Arc;

use crate::foundation::error::{DiptychError, DiptychResult};

// Raster tiles above this are a sign of a bogus viewport, not a real label.
const MAX_TILE_DIM: u32 = 16_384;

/// Styling for the side labels, in CSS-pixel units.
///
/// Defaults match the fixed overlay: 20px sans-serif, 10px inset from the
/// side's x-origin, baseline 30px from the top, white fill over a 2px
/// outline so the text stays legible on arbitrary image content.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LabelStyle {
    pub font_size: f64,
    pub inset_x: f64,
    pub baseline_y: f64,
    pub stroke_width: f64,
    pub font_family: String,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            inset_x: 10.0,
            baseline_y: 30.0,
            stroke_width: 2.0,
            font_family: "sans-serif".to_string(),
        }
    }
}

/// Rasterized label tile in premultiplied RGBA8, at device resolution.
pub(crate) struct LabelTile {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rgba8_premul: Vec<u8>,
}

/// Renders label strings through the SVG text pipeline.
///
/// Labels carry no font bytes of their own; resolution goes through a
/// fontdb seeded with the system fonts (plus an optional extra directory),
/// the same way SVG text assets resolve fonts.
pub(crate) struct LabelRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    style: LabelStyle,
}

impl LabelRasterizer {
    pub(crate) fn new(style: LabelStyle, fonts_dir: Option<&Path>) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(dir) = fonts_dir {
            load_fonts_from_dir(&mut db, dir);
        }
        Self {
            fontdb: Arc::new(db),
            style,
        }
    }

    /// Rasterize `text` into a `width_css x height_css` tile at `scale`
    /// device pixels per CSS pixel.
    pub(crate) fn rasterize(
        &self,
        text: &str,
        width_css: f64,
        height_css: f64,
        scale: f64,
    ) -> DiptychResult<LabelTile> {
        let markup = self.markup(text, width_css, height_css);
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(markup.as_bytes(), &opts)
            .map_err(|e| DiptychError::validation(format!("parse label markup: {e}")))?;

        let width = to_tile_px(width_css * scale)?;
        let height = to_tile_px(height_css * scale)?;
        let rgba8_premul = rasterize_tree_to_premul_rgba8(&tree, width, height)?;
        Ok(LabelTile {
            width,
            height,
            rgba8_premul,
        })
    }

    /// Build the SVG markup for one label tile.
    ///
    /// `paint-order: stroke` paints the outline under the fill, matching a
    /// stroke-then-fill text pass.
    fn markup(&self, text: &str, width_css: f64, height_css: f64) -> String {
        format!(
            concat!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"##,
                r##"<text x="{x}" y="{y}" font-family="{family}" font-size="{size}" "##,
                r##"fill="#ffffff" stroke="#000000" stroke-width="{stroke}" "##,
                r##"paint-order="stroke">{body}</text></svg>"##
            ),
            w = width_css,
            h = height_css,
            x = self.style.inset_x,
            y = self.style.baseline_y,
            family = xml_escape(&self.style.font_family),
            size = self.style.font_size,
            stroke = self.style.stroke_width,
            body = xml_escape(text),
        )
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        let _ = db.load_font_file(&path);
    }
}

fn to_tile_px(v: f64) -> DiptychResult<u32> {
    if !v.is_finite() || v <= 0.0 {
        return Err(DiptychError::validation(
            "label tile dimensions must be finite and positive",
        ));
    }
    let px = (v.ceil() as u32).max(1);
    if px > MAX_TILE_DIM {
        return Err(DiptychError::validation(format!(
            "label tile size too large: {px} (max {MAX_TILE_DIM})"
        )));
    }
    Ok(px)
}

fn rasterize_tree_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> DiptychResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| DiptychError::validation("failed to allocate label pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
