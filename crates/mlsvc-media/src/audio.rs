//! Audio decoding through an FFmpeg child process.
//!
//! Uploaded audio is piped into `ffmpeg` on stdin and read back from stdout as
//! raw signed 16-bit little-endian mono PCM, which is then scaled to `f32`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{check_ffmpeg, stderr_tail};
use crate::error::{MediaError, MediaResult};

/// Sample rate expected by Whisper-family models.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

const FFMPEG_DURATION_SECONDS: &str = "mlsvc_ffmpeg_duration_seconds";

/// Builder for a pipe-to-pipe FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegPipe {
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl Default for FfmpegPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegPipe {
    /// Create a new pipe command reading stdin and writing stdout.
    pub fn new() -> Self {
        Self {
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Preset: raw s16le mono PCM at `sample_rate`.
    pub fn pcm_s16le_mono(sample_rate: u32) -> Self {
        Self::new()
            .input_arg("-threads")
            .input_arg("0")
            .output_format("s16le")
            .channels(1)
            .sample_rate(sample_rate)
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set output container/format.
    pub fn output_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set output channel count.
    pub fn channels(self, channels: u8) -> Self {
        self.output_arg("-ac").output_arg(channels.to_string())
    }

    /// Set output sample rate.
    pub fn sample_rate(self, rate: u32) -> Self {
        self.output_arg("-ar").output_arg(rate.to_string())
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-v".to_string(),
            "error".to_string(),
        ];

        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push("pipe:0".to_string());

        args.extend(self.output_args.clone());
        args.push("pipe:1".to_string());

        args
    }
}

/// Decoded mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    /// Samples scaled to `[-1.0, 1.0)`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmAudio {
    /// A buffer of silence, used for health probes.
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Convert raw s16le bytes to `f32` samples. A trailing odd byte is ignored.
pub fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Decodes arbitrary audio containers to PCM with FFmpeg.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    sample_rate: u32,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecoder {
    /// Create a decoder producing 16 kHz mono PCM.
    pub fn new() -> Self {
        Self {
            sample_rate: WHISPER_SAMPLE_RATE,
            timeout_secs: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Decode `bytes` to mono PCM.
    ///
    /// A non-zero FFmpeg exit, or no samples at all, means the upload could
    /// not be decoded and is reported as [`MediaError::UndecodableAudio`].
    pub async fn decode(&self, bytes: &[u8]) -> MediaResult<PcmAudio> {
        let ffmpeg = check_ffmpeg()?;
        let args = FfmpegPipe::pcm_s16le_mono(self.sample_rate).build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let start = Instant::now();
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin not captured"))?;

        // Feed stdin concurrently with reading stdout so neither pipe fills up.
        let input = bytes.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = match self.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output()).await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing process", secs);
                        return Err(MediaError::Timeout {
                            program: "ffmpeg".to_string(),
                            secs,
                        });
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        // FFmpeg closes stdin early on input it cannot parse; that broken pipe
        // is reported through the exit status instead.
        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                warn!(error = %e, "Failed writing audio to FFmpeg stdin");
            }
            Err(e) => warn!(error = %e, "FFmpeg stdin writer task failed"),
            _ => {}
        }

        histogram!(FFMPEG_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr, 500);
            return Err(MediaError::UndecodableAudio(if stderr.is_empty() {
                format!("ffmpeg exited with status {:?}", output.status.code())
            } else {
                stderr
            }));
        }

        let samples = pcm_s16le_to_f32(&output.stdout);
        if samples.is_empty() {
            return Err(MediaError::UndecodableAudio(
                "no audio samples decoded".to_string(),
            ));
        }

        let audio = PcmAudio {
            samples,
            sample_rate: self.sample_rate,
        };

        debug!(
            samples = audio.samples.len(),
            duration_secs = audio.duration_secs(),
            "Decoded audio"
        );

        Ok(audio)
    }
}
