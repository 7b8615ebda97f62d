use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use base64::Engine as _;

use crate::error::{VisorError, VisorResult};

/// Stable identifier for one prepared pixel buffer. Ids are never reused
/// within a process, so they are safe to key render caches by even after
/// the bitmap itself has been dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitmapId(u64);

impl BitmapId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Access raw 64-bit identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A decoded bitmap, premultiplied RGBA8, row-major, tightly packed.
///
/// Clones share the pixel buffer and keep the same [`BitmapId`].
#[derive(Clone, Debug)]
pub struct PreparedBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
    id: BitmapId,
}

impl PreparedBitmap {
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn id(&self) -> BitmapId {
        self.id
    }

    /// Build from straight-alpha RGBA8 bytes (tests and embedders that
    /// already hold pixels).
    pub fn from_rgba8(width: u32, height: u32, mut rgba8: Vec<u8>) -> VisorResult<Self> {
        if rgba8.len() != width as usize * height as usize * 4 {
            return Err(VisorError::bitmap_load("rgba8 byte length mismatch"));
        }
        premultiply_rgba8_in_place(&mut rgba8);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8),
            id: BitmapId::next(),
        })
    }
}

pub fn decode_bitmap(bytes: &[u8]) -> VisorResult<PreparedBitmap> {
    let dyn_img = image::load_from_memory(bytes).context("decode bitmap from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedBitmap {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
        id: BitmapId::next(),
    })
}

/// Load a bitmap from a URI: either a base64 `data:` URI or a filesystem
/// path. The compositor does not care how the URI was produced.
pub fn load_bitmap(uri: &str) -> VisorResult<PreparedBitmap> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| VisorError::bitmap_load("malformed data uri (missing ',')"))?;
        if !meta.ends_with(";base64") {
            return Err(VisorError::bitmap_load(
                "only base64-encoded data uris are supported",
            ));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| VisorError::bitmap_load(format!("data uri base64: {e}")))?;
        return decode_bitmap(&bytes);
    }

    let bytes = std::fs::read(uri)
        .map_err(|e| VisorError::bitmap_load(format!("read bitmap '{uri}': {e}")))?;
    decode_bitmap(&bytes)
}

/// The URIs for one scene's layers.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneSources {
    pub user: String,
    pub helmet: String,
    pub background: Option<String>,
}

/// All bitmaps a render needs, loaded up front so the compositor itself
/// stays IO-free.
#[derive(Clone, Debug)]
pub struct SceneBitmaps {
    pub user: PreparedBitmap,
    pub helmet: PreparedBitmap,
    pub background: Option<PreparedBitmap>,
}

impl SceneBitmaps {
    /// A failed load for any layer is an error; the background gets no
    /// special pass.
    pub fn load(sources: &SceneSources) -> VisorResult<Self> {
        let user = load_bitmap(&sources.user)
            .map_err(|e| VisorError::bitmap_load(format!("user image: {e}")))?;
        let helmet = load_bitmap(&sources.helmet)
            .map_err(|e| VisorError::bitmap_load(format!("helmet: {e}")))?;
        let background = match &sources.background {
            Some(uri) => Some(
                load_bitmap(uri)
                    .map_err(|e| VisorError::bitmap_load(format!("background: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            user,
            helmet,
            background,
        })
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

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes_1x1(rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(1, 1, rgba.to_vec()).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_bitmap_premultiplies() {
        let buf = png_bytes_1x1([100, 50, 200, 128]);
        let prepared = decode_bitmap(&buf).unwrap();
        assert_eq!(prepared.dims(), (1, 1));
        assert_eq!(
            prepared.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_bitmap(b"not an image").is_err());
    }

    #[test]
    fn data_uri_round_trips() {
        let buf = png_bytes_1x1([1, 2, 3, 255]);
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&buf)
        );
        let prepared = load_bitmap(&uri).unwrap();
        assert_eq!(prepared.dims(), (1, 1));
        assert_eq!(prepared.rgba8_premul.as_slice(), &[1, 2, 3, 255]);
    }

    #[test]
    fn data_uri_requires_base64_marker() {
        assert!(load_bitmap("data:image/png,rawbytes").is_err());
        assert!(load_bitmap("data:image/png;base64").is_err());
    }

    #[test]
    fn missing_file_is_a_bitmap_load_error() {
        let err = load_bitmap("/nonexistent/visor-test.png").unwrap_err();
        assert!(matches!(err, VisorError::BitmapLoad(_)));
    }

    #[test]
    fn scene_load_names_the_failing_layer() {
        let sources = SceneSources {
            user: "/nonexistent/user.png".to_string(),
            helmet: "/nonexistent/helmet.png".to_string(),
            background: None,
        };
        let err = SceneBitmaps::load(&sources).unwrap_err();
        assert!(err.to_string().contains("user image"));
    }

    #[test]
    fn background_failure_is_not_silently_ignored() {
        let buf = png_bytes_1x1([0, 0, 0, 255]);
        let ok_uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&buf)
        );
        let sources = SceneSources {
            user: ok_uri.clone(),
            helmet: ok_uri,
            background: Some("/nonexistent/bg.jpg".to_string()),
        };
        let err = SceneBitmaps::load(&sources).unwrap_err();
        assert!(err.to_string().contains("background"));
    }

    #[test]
    fn from_rgba8_checks_length() {
        assert!(PreparedBitmap::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(PreparedBitmap::from_rgba8(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn bitmap_ids_are_unique_per_buffer_and_shared_by_clones() {
        let a = PreparedBitmap::from_rgba8(1, 1, vec![0; 4]).unwrap();
        let id_a = a.id();
        let clone_id = a.clone().id();
        assert_eq!(clone_id, id_a);

        // Dropping a buffer never frees its id for reuse.
        drop(a);
        let b = PreparedBitmap::from_rgba8(1, 1, vec![0; 4]).unwrap();
        assert_ne!(b.id(), id_a);
    }
}
