//! Locating and normalizing the image a generated program produced.

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat as Codec;
use prism_core::image::{ImageFormat, ImageResult};

/// Output files looked up in the workspace, in priority order.
pub const OUTPUT_CANDIDATES: [&str; 5] = [
    "image.png",
    "image.jpg",
    "image.jpeg",
    "user_image.jpg",
    "image.ppm",
];

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("program produced no image")]
    Missing,

    #[error("unreadable image {source_name}: {reason}")]
    Invalid { source_name: String, reason: String },
}

/// Find the program's image in `dir` or, failing that, a PPM on `stdout`.
///
/// PNG and JPEG files are passed through; PPM is re-encoded as PNG.
pub async fn ingest(dir: &Path, stdout: &[u8]) -> Result<ImageResult, ArtifactError> {
    for name in OUTPUT_CANDIDATES {
        let path = dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => return normalize(name, bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(ArtifactError::Invalid {
                    source_name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    if looks_like_ppm(stdout) {
        return normalize("stdout", stdout.to_vec());
    }
    Err(ArtifactError::Missing)
}

fn looks_like_ppm(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    matches!(&bytes[start..], [b'P', b'3' | b'6', ..])
}

fn normalize(source_name: &str, bytes: Vec<u8>) -> Result<ImageResult, ArtifactError> {
    let invalid = |reason: String| ArtifactError::Invalid {
        source_name: source_name.to_string(),
        reason,
    };

    let bytes = if looks_like_ppm(&bytes) {
        // Leading whitespace confuses the PNM header parser.
        let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(0);
        bytes[start..].to_vec()
    } else {
        bytes
    };

    match image::guess_format(&bytes).map_err(|e| invalid(e.to_string()))? {
        Codec::Png => Ok(ImageResult::new(bytes, ImageFormat::Png)),
        Codec::Jpeg => Ok(ImageResult::new(bytes, ImageFormat::Jpeg)),
        Codec::Pnm => {
            let decoded = image::load_from_memory_with_format(&bytes, Codec::Pnm)
                .map_err(|e| invalid(e.to_string()))?
                .to_rgb8();
            let mut png = Cursor::new(Vec::new());
            decoded
                .write_to(&mut png, Codec::Png)
                .map_err(|e| invalid(e.to_string()))?;
            Ok(ImageResult::new(png.into_inner(), ImageFormat::Png))
        }
        other => Err(invalid(format!("unsupported format {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PPM: &[u8] = b"P3\n2 1\n255\n255 0 0  0 0 255\n";

    fn decode(result: &ImageResult) -> image::RgbImage {
        image::load_from_memory(&result.bytes).unwrap().to_rgb8()
    }

    #[tokio::test]
    async fn stdout_ppm_is_reencoded_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let result = ingest(dir.path(), PPM).await.unwrap();
        assert_eq!(result.format, ImageFormat::Png);
        let image = decode(&result);
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[tokio::test]
    async fn workspace_file_wins_over_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let mut jpeg = Cursor::new(Vec::new());
        image::RgbImage::new(4, 4).write_to(&mut jpeg, Codec::Jpeg).unwrap();
        std::fs::write(dir.path().join("user_image.jpg"), jpeg.get_ref()).unwrap();

        let result = ingest(dir.path(), PPM).await.unwrap();
        assert_eq!(result.format, ImageFormat::Jpeg);
        assert_eq!(result.bytes, *jpeg.get_ref());
    }

    #[tokio::test]
    async fn candidates_are_checked_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.ppm"), PPM).unwrap();
        let mut png = Cursor::new(Vec::new());
        image::RgbImage::new(3, 3).write_to(&mut png, Codec::Png).unwrap();
        std::fs::write(dir.path().join("image.png"), png.get_ref()).unwrap();

        let result = ingest(dir.path(), b"").await.unwrap();
        assert_eq!(decode(&result).dimensions(), (3, 3));
    }

    #[tokio::test]
    async fn nothing_produced_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ingest(dir.path(), b"rendering done\n").await;
        assert_matches!(result, Err(ArtifactError::Missing));
    }

    #[tokio::test]
    async fn garbage_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.png"), b"not an image").unwrap();
        let result = ingest(dir.path(), b"").await;
        assert_matches!(result, Err(ArtifactError::Invalid { .. }));
    }

    #[test]
    fn ppm_detection_skips_leading_whitespace() {
        assert!(looks_like_ppm(b"\n  P6 ..."));
        assert!(!looks_like_ppm(b"P5"));
        assert!(!looks_like_ppm(b""));
    }
}
