//! Locating external tools.

use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if an arbitrary program is available (absolute path or `PATH` lookup).
pub fn check_program(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::ProgramNotFound(program.to_string()))
}

/// Keep the tail of a tool's stderr for error messages.
pub(crate) fn stderr_tail(stderr: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        let err = check_program("definitely-not-a-real-binary-1234").unwrap_err();
        assert!(matches!(err, MediaError::ProgramNotFound(_)));
    }

    #[test]
    fn test_stderr_tail() {
        assert_eq!(stderr_tail(b"  short \n", 20), "short");
        assert_eq!(stderr_tail(b"0123456789", 4), "6789");
    }
}
