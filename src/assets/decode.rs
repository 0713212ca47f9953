use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::error::{DiptychError, DiptychResult};

/// Opaque handle to a user-chosen image.
///
/// A new source always triggers a fresh decode; decoded bitmaps are never
/// cached across sources.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Image file on disk, read asynchronously at decode time.
    Path(PathBuf),
    /// Already-loaded encoded bytes (e.g. from a drag-drop or a test).
    Memory(Arc<Vec<u8>>),
}

impl ImageSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn memory(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Arc::new(bytes.into()))
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Memory(b) => format!("<memory: {} bytes>", b.len()),
        }
    }
}

/// Decoded bitmap: natural dimensions plus premultiplied RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Natural width over natural height.
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Decode encoded image bytes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> DiptychResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| DiptychError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Read and decode an [`ImageSource`]. Single attempt, no retry.
///
/// Suspends on the byte read for path sources; the decode itself runs
/// inline on the calling execution context.
#[tracing::instrument(skip(source))]
pub async fn decode_source(source: &ImageSource) -> DiptychResult<PreparedImage> {
    tracing::debug!(source = %source.describe(), "decoding image source");
    match source {
        ImageSource::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                DiptychError::decode(format!("read image '{}': {e}", path.display()))
            })?;
            if bytes.is_empty() {
                return Err(DiptychError::decode(format!(
                    "image '{}' produced no bytes",
                    path.display()
                )));
            }
            decode_image(&bytes)
        }
        ImageSource::Memory(bytes) => {
            if bytes.is_empty() {
                return Err(DiptychError::decode("image source produced no bytes"));
            }
            decode_image(bytes)
        }
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
