pub use kurbo::{Affine, Point, Rect, Vec2};

/// One half of the comparison canvas.
///
/// `Before` is the left half, `After` the right half. The same value indexes
/// the per-side slots in [`FormState`](crate::FormState).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left half.
    Before,
    /// Right half.
    After,
}

impl Side {
    /// Both sides, in paint order (left first).
    pub const ALL: [Side; 2] = [Side::Before, Side::After];

    /// Stable slot index (0 = before, 1 = after).
    pub fn index(self) -> usize {
        match self {
            Side::Before => 0,
            Side::After => 1,
        }
    }

    /// X origin of this side's half in CSS pixels for a canvas of
    /// `canvas_width` CSS pixels.
    pub fn origin_x(self, canvas_width: f64) -> f64 {
        match self {
            Side::Before => 0.0,
            Side::After => canvas_width / 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Before => "before",
            Side::After => "after",
        }
    }
}

/// CSS-pixel bounding rectangle of the canvas container.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CssRect {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
}

impl CssRect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A rectangle a drawing surface can be allocated for.
    pub fn is_valid(self) -> bool {
        self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0
    }
}

/// Device-pixel canvas dimensions plus the uniform CSS-to-device scale.
///
/// All drawing coordinates are expressed in CSS pixels and multiplied by
/// `scale` on the way to the surface, so high-density displays stay sharp.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanvasGeometry {
    /// Target surface width in device pixels.
    pub width_px: f64,
    /// Target surface height in device pixels.
    pub height_px: f64,
    /// Scale factor for all draw coordinates (= effective pixel ratio).
    pub scale: f64,
}

impl CanvasGeometry {
    /// Map a CSS rectangle and a device pixel ratio to surface dimensions.
    ///
    /// A missing, zero, negative, or non-finite ratio behaves as 1.0; the
    /// scale step always runs.
    pub fn compute(rect: CssRect, device_pixel_ratio: Option<f64>) -> Self {
        let ratio = match device_pixel_ratio {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => 1.0,
        };
        Self {
            width_px: rect.width * ratio,
            height_px: rect.height * ratio,
            scale: ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_scales_by_ratio() {
        let g = CanvasGeometry::compute(CssRect::new(300.0, 150.0), Some(2.0));
        assert_eq!(g.width_px, 600.0);
        assert_eq!(g.height_px, 300.0);
        assert_eq!(g.scale, 2.0);
    }

    #[test]
    fn geometry_defaults_bad_ratios_to_one() {
        let rect = CssRect::new(300.0, 150.0);
        for ratio in [None, Some(0.0), Some(-2.0), Some(f64::NAN)] {
            let g = CanvasGeometry::compute(rect, ratio);
            assert_eq!(g.width_px, 300.0);
            assert_eq!(g.height_px, 150.0);
            assert_eq!(g.scale, 1.0);
        }
    }

    #[test]
    fn side_origins_split_the_canvas() {
        assert_eq!(Side::Before.origin_x(640.0), 0.0);
        assert_eq!(Side::After.origin_x(640.0), 320.0);
        assert_eq!(Side::Before.index(), 0);
        assert_eq!(Side::After.index(), 1);
    }

    #[test]
    fn rect_validity() {
        assert!(CssRect::new(1.0, 1.0).is_valid());
        assert!(!CssRect::new(0.0, 1.0).is_valid());
        assert!(!CssRect::new(1.0, f64::INFINITY).is_valid());
        assert!(!CssRect::new(-4.0, 2.0).is_valid());
    }
}
