use std::cell::{Cell, RefCell};
use std::future::Future;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::assets::decode::{ImageSource, decode_source};
use crate::assets::label::LabelStyle;
use crate::foundation::core::{CssRect, Side};
use crate::foundation::error::DiptychResult;
use crate::form::state::{FormState, single_selection};
use crate::render::compositor::{Compositor, SidePass};
use crate::render::frame::CanvasFrame;
use crate::session::debounce::TrailingDebounce;

pub(crate) mod debounce;

/// Trailing delay applied to text edits before they commit and redraw.
pub const TEXT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Session construction options.
#[derive(Clone, Debug, Default)]
pub struct SessionOpts {
    /// CSS-to-device pixel ratio; `None` behaves as 1.0.
    pub device_pixel_ratio: Option<f64>,
    /// Extra directory scanned for label fonts (system fonts always load).
    pub fonts_dir: Option<PathBuf>,
    /// Label overlay styling.
    pub label_style: LabelStyle,
    /// Initial viewport, when known at construction.
    pub viewport: Option<CssRect>,
}

struct Shared {
    compositor: RefCell<Compositor>,
    text_debounce: [TrailingDebounce; 2],
    resize: TrailingDebounce,
    pending_tasks: Cell<u64>,
    idle: Notify,
}

/// The core's external interface: owns Form State and the canvas, and runs
/// all asynchronous work as local tasks on the calling thread.
///
/// Everything happens on one execution context: construct the session on a
/// current-thread tokio runtime and drive it inside a
/// [`tokio::task::LocalSet`]. Draw triggers are fire-and-forget; await
/// [`Session::flush`] to reach quiescence before reading pixels in batch
/// flows.
#[derive(Clone)]
pub struct Session {
    shared: Rc<Shared>,
}

impl Session {
    pub fn new(opts: SessionOpts) -> DiptychResult<Self> {
        let mut compositor = Compositor::new(
            opts.label_style,
            opts.fonts_dir.as_deref(),
            opts.device_pixel_ratio,
        );
        if let Some(rect) = opts.viewport {
            compositor.set_viewport(rect)?;
        }
        Ok(Self {
            shared: Rc::new(Shared {
                compositor: RefCell::new(compositor),
                text_debounce: [
                    TrailingDebounce::new(TEXT_DEBOUNCE),
                    TrailingDebounce::new(TEXT_DEBOUNCE),
                ],
                resize: TrailingDebounce::new(Duration::ZERO),
                pending_tasks: Cell::new(0),
                idle: Notify::new(),
            }),
        })
    }

    /// Overwrite the output name field.
    pub fn set_file_name(&self, name: impl Into<String>) {
        self.shared.compositor.borrow_mut().form_mut().set_file_name(name);
    }

    /// Commit a file-picker selection for one side, then redraw that side.
    ///
    /// The selection must contain exactly one source; zero or several
    /// reject the call before anything is mutated.
    pub fn set_image(&self, side: Side, selection: Vec<ImageSource>) -> DiptychResult<()> {
        let source = single_selection(selection)?;
        self.shared
            .compositor
            .borrow_mut()
            .form_mut()
            .set_image(side, source);
        self.render_side(side);
        Ok(())
    }

    /// Route a text edit through the debounced channel: the value commits
    /// and redraws its side once no newer edit arrives for the trailing
    /// delay.
    pub fn set_text(&self, side: Side, raw_value: impl Into<String>) {
        let value = raw_value.into();
        let token = self.shared.text_debounce[side.index()].arm();
        let delay = self.shared.text_debounce[side.index()].delay();
        let session = self.clone();
        self.spawn_tracked(async move {
            tokio::time::sleep(delay).await;
            if !session.shared.text_debounce[side.index()].is_current(token) {
                return;
            }
            session
                .shared
                .compositor
                .borrow_mut()
                .form_mut()
                .set_label(side, value);
            session.render_side(side);
        });
    }

    /// Clear one half and redraw its content.
    ///
    /// The clear happens immediately; when an image is set, the decode runs
    /// as a local task and bitmap+label paint together once it settles
    /// (label alone on decode failure). Without a surface this is a no-op
    /// until the next viewport notification.
    pub fn render_side(&self, side: Side) {
        let pass = self.shared.compositor.borrow_mut().begin_render_side(side);
        if let SidePass::AwaitDecode { seq, source } = pass {
            let session = self.clone();
            self.spawn_tracked(async move {
                let decoded = decode_source(&source).await;
                session
                    .shared
                    .compositor
                    .borrow_mut()
                    .complete_render_side(side, seq, decoded);
            });
        }
    }

    /// Redraw both halves; used on initial load and after a resize.
    pub fn render_all(&self) {
        for side in Side::ALL {
            self.render_side(side);
        }
    }

    /// Route a viewport change to the resize reactor: deferred to the next
    /// scheduling tick and coalesced, then geometry is recomputed and both
    /// sides re-render. Idempotent for an unchanged rectangle.
    pub fn notify_viewport_resized(&self, rect: CssRect) {
        let token = self.shared.resize.arm();
        let session = self.clone();
        self.spawn_tracked(async move {
            tokio::task::yield_now().await;
            if !session.shared.resize.is_current(token) {
                return;
            }
            if let Err(err) = session.shared.compositor.borrow_mut().set_viewport(rect) {
                tracing::warn!(%err, "viewport resize rejected");
                return;
            }
            session.render_all();
        });
    }

    /// Serialize the current canvas to PNG bytes. Explicit call only.
    pub fn export_png(&self) -> DiptychResult<Vec<u8>> {
        self.shared.compositor.borrow().export_png()
    }

    /// The download name for the exported PNG.
    pub fn export_file_name(&self) -> String {
        self.shared.compositor.borrow().form().export_file_name()
    }

    /// True once the output name and both image slots are populated.
    pub fn is_complete(&self) -> bool {
        self.shared.compositor.borrow().form().is_complete()
    }

    /// Snapshot of the form for collaborator-side bookkeeping.
    pub fn form_state(&self) -> FormState {
        self.shared.compositor.borrow().form().clone()
    }

    /// Read the current canvas, if a viewport has been installed.
    pub fn with_canvas<R>(&self, f: impl FnOnce(&CanvasFrame) -> R) -> Option<R> {
        self.shared.compositor.borrow().frame().map(f)
    }

    /// Wait until every pending local task (decodes, debounce timers,
    /// resize ticks) has settled.
    pub async fn flush(&self) {
        loop {
            if self.shared.pending_tasks.get() == 0 {
                return;
            }
            self.shared.idle.notified().await;
        }
    }

    fn spawn_tracked<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.shared.pending_tasks.set(self.shared.pending_tasks.get() + 1);
        let tracker = Rc::clone(&self.shared);
        tokio::task::spawn_local(async move {
            fut.await;
            tracker.pending_tasks.set(tracker.pending_tasks.get() - 1);
            tracker.idle.notify_waiters();
        });
    }
}
