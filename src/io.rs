// ============================================================================
// IMAGE FILE I/O – raster files <-> PixelBuffer
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{ImageEncoder, ImageError};

use crate::canvas::PixelBuffer;

#[derive(Debug)]
pub enum IoError {
    Io(std::io::Error),
    Image(ImageError),
    Unsupported(String),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Io(e) => write!(f, "I/O error: {}", e),
            IoError::Image(e) => write!(f, "Image error: {}", e),
            IoError::Unsupported(e) => write!(f, "Unsupported format: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e)
    }
}

impl From<ImageError> for IoError {
    fn from(e: ImageError) -> Self {
        IoError::Image(e)
    }
}

/// Raster formats the CLI can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    /// Format from a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

/// Decode any supported raster file into a dense color-string buffer.
pub fn load_image(path: &Path) -> Result<PixelBuffer, IoError> {
    let img = image::open(path)?.to_rgba8();
    Ok(PixelBuffer::from_rgba_image(&img))
}

/// Encode `buffer` to `path`, picking the codec from the extension.
pub fn save_image(buffer: &PixelBuffer, path: &Path) -> Result<(), IoError> {
    let format = SaveFormat::from_path(path)
        .ok_or_else(|| IoError::Unsupported(path.display().to_string()))?;
    let img = buffer.to_rgba_image();

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = img.dimensions();
    let color = image::ColorType::Rgba8;

    match format {
        SaveFormat::Png => PngEncoder::new(&mut writer).write_image(img.as_raw(), w, h, color)?,
        SaveFormat::Bmp => BmpEncoder::new(&mut writer).write_image(img.as_raw(), w, h, color)?,
        SaveFormat::Tga => TgaEncoder::new(&mut writer).write_image(img.as_raw(), w, h, color)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup() {
        assert_eq!(SaveFormat::from_path(Path::new("a/b.PNG")), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::from_path(Path::new("x.tga")), Some(SaveFormat::Tga));
        assert_eq!(SaveFormat::from_path(Path::new("x.jpg")), None);
        assert_eq!(SaveFormat::Bmp.extension(), "bmp");
    }

    #[test]
    fn png_keeps_pixels() {
        let mut buf = PixelBuffer::new(3, 2);
        buf.set(0, 0, "#FF0000");
        buf.set(2, 1, "#00FF00");
        let path = std::env::temp_dir().join(format!("pixelfe_io_{}.png", std::process::id()));
        save_image(&buf, &path).unwrap();
        let back = load_image(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, buf);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let buf = PixelBuffer::new(1, 1);
        let err = save_image(&buf, Path::new("out.xyz")).unwrap_err();
        assert!(matches!(err, IoError::Unsupported(_)));
    }
}
