use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use mosaic_cache::TileFormat;
use std::io::Cursor;

/// Image decoding and tile encoding.
pub trait Codec: Send + Sync {
    /// Whether `bytes` look like an image this codec can decode. `name` is
    /// only consulted when the content itself is inconclusive.
    fn sniff(&self, bytes: &[u8], name: Option<&str>) -> bool;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    fn encode(&self, image: &DynamicImage, format: TileFormat, quality: u8) -> Result<Vec<u8>>;
}

/// [`Codec`] backed by the `image` crate's built-in formats.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCodec;

impl ImageCodec {
    fn readable(format: ImageFormat) -> bool {
        format.reading_enabled()
    }
}

impl Codec for ImageCodec {
    fn sniff(&self, bytes: &[u8], name: Option<&str>) -> bool {
        if let Ok(format) = image::guess_format(bytes) {
            return Self::readable(format);
        }
        name.and_then(|name| ImageFormat::from_path(name).ok()).is_some_and(Self::readable)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|err| exn::Exn::from(ErrorKind::Decode(err.to_string())))
    }

    fn encode(&self, image: &DynamicImage, format: TileFormat, quality: u8) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        match format {
            TileFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
                image.to_rgb8().write_with_encoder(encoder).or_raise(|| ErrorKind::Encode)?;
            },
            TileFormat::Png => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut out, ImageFormat::Png)
                    .or_raise(|| ErrorKind::Encode)?;
            },
        }
        Ok(out.into_inner())
    }
}
