//! Diptych composites a "before" and an "after" image side by side onto a
//! single canvas, overlays a text label on each half, and exports the
//! result as PNG bytes.
//!
//! # Pipeline overview
//!
//! 1. **Geometry**: a CSS-pixel viewport rectangle + device pixel ratio
//!    become device-pixel surface dimensions and a uniform draw scale
//!    ([`CanvasGeometry`]).
//! 2. **Decode**: an [`ImageSource`] becomes a premultiplied RGBA8
//!    [`PreparedImage`], asynchronously, single attempt.
//! 3. **Compose**: each half is cleared, its bitmap is drawn scaled to the
//!    half width (aspect preserved), and its label paints on top, even when
//!    the decode fails ([`Compositor`]).
//! 4. **Export**: the surface serializes to PNG on explicit request.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single execution context**: all state mutation happens on one
//!   thread; async work (decodes, debounce timers, resize ticks) runs as
//!   local tasks and resumes on the same thread. No locking.
//! - **Premultiplied RGBA8 end-to-end**: the surface, decoded bitmaps, and
//!   label tiles all carry premultiplied pixels.
//! - **Last selection wins**: superseded image decodes are never
//!   cancelled, but per-side sequence numbers drop stale results so the
//!   half always converges to the user's latest choice.
//!
//! # Getting started
//!
//! Build a [`Session`] inside a current-thread tokio runtime with a
//! [`tokio::task::LocalSet`], feed it inputs, and export:
//!
//! ```no_run
//! use diptych::{CssRect, ImageSource, Session, SessionOpts, Side};
//!
//! # async fn demo() -> diptych::DiptychResult<()> {
//! let session = Session::new(SessionOpts {
//!     viewport: Some(CssRect::new(800.0, 450.0)),
//!     ..SessionOpts::default()
//! })?;
//! session.set_image(Side::Before, vec![ImageSource::path("old.png")])?;
//! session.set_image(Side::After, vec![ImageSource::path("new.png")])?;
//! session.flush().await;
//! let png = session.export_png()?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod assets;
mod form;
mod foundation;
mod render;
mod session;

pub use assets::decode::{ImageSource, PreparedImage, decode_image, decode_source};
pub use assets::label::LabelStyle;
pub use form::state::{
    DEFAULT_AFTER_LABEL, DEFAULT_BEFORE_LABEL, DEFAULT_FILE_NAME, FormState, SideSlot,
    single_selection,
};
pub use foundation::core::{Affine, CanvasGeometry, CssRect, Point, Rect, Side, Vec2};
pub use foundation::error::{DiptychError, DiptychResult};
pub use render::compositor::Compositor;
pub use render::frame::CanvasFrame;
pub use session::{Session, SessionOpts, TEXT_DEBOUNCE};
