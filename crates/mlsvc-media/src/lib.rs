//! Media handling for the model services.
//!
//! This crate provides:
//! - Declared-type validation of uploads against per-kind allow-lists
//! - Image decoding with magic-byte sniffing
//! - Audio transcoding to 16 kHz mono PCM through an `ffmpeg` child process
//! - A `tesseract` CLI wrapper for OCR

pub mod audio;
pub mod command;
pub mod error;
pub mod image_decode;
pub mod tesseract;
pub mod upload;

pub use audio::{pcm_s16le_to_f32, AudioDecoder, FfmpegPipe, PcmAudio, WHISPER_SAMPLE_RATE};
pub use command::{check_ffmpeg, check_program};
pub use error::{MediaError, MediaResult};
pub use image_decode::{decode_image, DecodedImage};
pub use tesseract::TesseractCommand;
pub use upload::{MediaKind, Upload};
