use crate::mesh::TextureData;

/// Decode an encoded PNG or JPEG image into RGBA8.
pub fn decode(bytes: &[u8], name: Option<String>) -> Result<TextureData, image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData {
        name,
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// 1x1 opaque white texture, bound when a mesh has none.
pub fn white() -> TextureData {
    TextureData {
        name: Some("white".into()),
        width: 1,
        height: 1,
        rgba: vec![255; 4],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 3, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png() {
        let tex = decode(&png_bytes(), Some("checker".into())).unwrap();
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(tex.rgba.len(), 2 * 3 * 4);
        assert_eq!(&tex.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(b"not an image", None).is_err());
    }
}
