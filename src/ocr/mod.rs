//! Optical character recognition over images pulled out of uploaded PDFs.
//!
//! The production engine shells out to the Tesseract CLI, streaming a PNG rendition of each
//! image through stdin and reading the recognized text from stdout.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors raised by OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The OCR executable could not be found.
    #[error("OCR engine '{0}' is not installed or not on PATH")]
    Unavailable(String),
    /// The engine ran but reported a failure.
    #[error("OCR engine failed: {0}")]
    EngineFailed(String),
    /// The image could not be re-encoded for the engine.
    #[error("failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
    /// Communicating with the engine process failed.
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface implemented by OCR backends.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text contained in a single image.
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Run OCR over `images` in order, appending a newline after each recognized text.
///
/// Returns an empty string without touching the engine when there are no images.
pub async fn ocr_images(
    engine: &dyn OcrEngine,
    images: &[DynamicImage],
) -> Result<String, OcrError> {
    let mut text = String::new();
    for (index, image) in images.iter().enumerate() {
        let recognized = engine.recognize(image).await?;
        tracing::debug!(
            image = index,
            chars = recognized.chars().count(),
            "OCR completed for image"
        );
        text.push_str(&recognized);
        text.push('\n');
    }
    Ok(text)
}

/// OCR engine backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    /// Build an engine that invokes `command` with the given language code.
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| match error.kind() {
                std::io::ErrorKind::NotFound => OcrError::Unavailable(self.command.clone()),
                _ => OcrError::Io(error),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::EngineFailed("stdin was not captured".into()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        match writer.await {
            Ok(Ok(())) => {}
            // The engine may exit before draining stdin; its exit status is reported below.
            Ok(Err(error)) if error.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(error)) => return Err(OcrError::Io(error)),
            Err(error) => return Err(OcrError::EngineFailed(error.to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::sync::Mutex;

    struct ScriptedOcr {
        outputs: Mutex<Vec<Result<String, OcrError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedOcr {
        fn new(outputs: Vec<Result<String, OcrError>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            *self.calls.lock().unwrap() += 1;
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn blank_image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(4, 4))
    }

    #[tokio::test]
    async fn appends_newline_after_each_image() {
        let engine = ScriptedOcr::new(vec![Ok("first".into()), Ok("second".into())]);
        let text = ocr_images(&engine, &[blank_image(), blank_image()])
            .await
            .expect("ocr");
        assert_eq!(text, "first\nsecond\n");
        assert_eq!(*engine.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn no_images_skips_the_engine() {
        let engine = ScriptedOcr::new(vec![]);
        let text = ocr_images(&engine, &[]).await.expect("ocr");
        assert!(text.is_empty());
        assert_eq!(*engine.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn engine_failure_propagates() {
        let engine = ScriptedOcr::new(vec![
            Ok("ok".into()),
            Err(OcrError::EngineFailed("bad image".into())),
        ]);
        let error = ocr_images(&engine, &[blank_image(), blank_image()])
            .await
            .expect_err("failure");
        assert!(matches!(error, OcrError::EngineFailed(_)));
    }

    #[tokio::test]
    async fn missing_binary_reports_unavailable() {
        let engine = TesseractOcr::new("docdigest-no-such-ocr-binary", "eng");
        let error = engine
            .recognize(&blank_image())
            .await
            .expect_err("missing binary");
        assert!(matches!(error, OcrError::Unavailable(ref name) if name == "docdigest-no-such-ocr-binary"));
    }

    #[test]
    fn png_encoding_produces_png_signature() {
        let png = encode_png(&blank_image()).expect("png");
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
