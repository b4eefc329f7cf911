//! Tesseract CLI wrapper.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{check_program, stderr_tail};
use crate::error::{MediaError, MediaResult};

/// Builder and runner for `tesseract <input> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractCommand {
    /// Binary name or absolute path
    program: String,
    /// Tesseract language code(s), e.g. `ind` or `ind+eng`
    language: String,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl TesseractCommand {
    /// Create a new command for `language`.
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            timeout_secs: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Build the recognition arguments for an input file.
    pub fn build_args(&self, input: &Path) -> Vec<String> {
        vec![
            input.to_string_lossy().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ]
    }

    /// Languages installed for this Tesseract binary.
    pub async fn list_languages(&self) -> MediaResult<Vec<String>> {
        let program = check_program(&self.program)?;

        let output = Command::new(program)
            .arg("--list-langs")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::process_failed(
                &self.program,
                "--list-langs failed",
                Some(stderr_tail(&output.stderr, 500)),
                output.status.code(),
            ));
        }

        // Older releases print the list on stderr.
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(parse_language_list(&text))
    }

    /// Verify the binary exists and every configured language is installed.
    pub async fn verify(&self) -> MediaResult<()> {
        let installed = self.list_languages().await?;
        let missing: Vec<&str> = self
            .language
            .split('+')
            .filter(|lang| !installed.iter().any(|l| l == lang))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MediaError::internal(format!(
                "tesseract language data not installed: {}",
                missing.join(", ")
            )))
        }
    }

    /// Run OCR on an image file.
    pub async fn recognize_file(&self, input: &Path) -> MediaResult<String> {
        let program = check_program(&self.program)?;
        let args = self.build_args(input);
        debug!("Running Tesseract: {} {}", self.program, args.join(" "));

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output()).await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!("Tesseract timed out after {} seconds, killing process", secs);
                        return Err(MediaError::Timeout {
                            program: self.program.clone(),
                            secs,
                        });
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(MediaError::process_failed(
                &self.program,
                "Tesseract exited with non-zero status",
                Some(stderr_tail(&output.stderr, 500)),
                output.status.code(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run OCR on an in-memory image.
    ///
    /// The image is re-encoded as PNG into a temporary file so Tesseract never
    /// sees a format its image library might not support.
    pub async fn recognize_image(&self, image: DynamicImage) -> MediaResult<String> {
        let file = tokio::task::spawn_blocking(move || -> MediaResult<tempfile::NamedTempFile> {
            let file = tempfile::Builder::new()
                .prefix("mlsvc-ocr-")
                .suffix(".png")
                .tempfile()?;
            image
                .save_with_format(file.path(), ImageFormat::Png)
                .map_err(|e| MediaError::internal(format!("Failed to encode image: {}", e)))?;
            Ok(file)
        })
        .await
        .map_err(|e| MediaError::internal(format!("Image encoding task failed: {}", e)))??;

        self.recognize_file(file.path()).await
    }
}

fn parse_language_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(String::from)
        .collect()
}
