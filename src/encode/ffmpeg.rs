use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::capture::FrameSink;

/// Codec settings handed to ffmpeg for a recording.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderOptions {
    pub codec: String,
    pub audio_codec: String,
    pub pix_fmt: String,
    /// Constant-quality level. Ignored when `bitrate` is set.
    pub crf: u32,
    pub bitrate: Option<String>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            codec: "libvpx-vp9".into(),
            audio_codec: "libopus".into(),
            pix_fmt: "yuv420p".into(),
            crf: 32,
            bitrate: None,
        }
    }
}

impl EncoderOptions {
    /// Full ffmpeg argument list: raw RGBA frames on stdin, audio taken from
    /// `input_audio` starting at `audio_offset_secs`.
    pub fn args(
        &self,
        output_path: &Path,
        input_audio: &Path,
        audio_offset_secs: f64,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = Vec::new();
        let mut push = |s: &str| args.push(s.into());
        push("-y");
        push("-f");
        push("rawvideo");
        push("-pixel_format");
        push("rgba");
        push("-video_size");
        push(&format!("{}x{}", width, height));
        push("-framerate");
        push(&fps.to_string());
        push("-i");
        push("pipe:0");
        if audio_offset_secs > 0.0 {
            push("-ss");
            push(&format!("{:.3}", audio_offset_secs));
        }
        push("-i");
        args.push(input_audio.as_os_str().to_owned());

        let mut push = |s: &str| args.push(s.into());
        push("-map");
        push("0:v");
        push("-map");
        push("1:a");
        push("-c:v");
        push(&self.codec);
        push("-pix_fmt");
        push(&self.pix_fmt);
        match &self.bitrate {
            Some(br) => {
                push("-b:v");
                push(br);
            }
            None => {
                push("-crf");
                push(&self.crf.to_string());
                // VP9 only honors -crf as constant quality with a zero bitrate.
                if self.codec.contains("vpx") {
                    push("-b:v");
                    push("0");
                }
            }
        }
        push("-c:a");
        push(&self.audio_codec);
        push("-b:a");
        push("128k");
        push("-shortest");
        args.push(output_path.as_os_str().to_owned());
        args
    }
}

/// Returns whether an `ffmpeg` binary can be launched.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub struct FfmpegEncoder {
    child: Child,
}

impl FfmpegEncoder {
    pub fn new(
        output_path: &Path,
        input_audio: &Path,
        audio_offset_secs: f64,
        width: u32,
        height: u32,
        fps: u32,
        options: &EncoderOptions,
    ) -> Result<Self> {
        let args = options.args(output_path, input_audio, audio_offset_secs, width, height, fps);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}/{}",
            width,
            height,
            fps,
            options.codec,
            options.audio_codec
        );

        Ok(Self { child })
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        // EOF on stdin tells ffmpeg to flush and write the container trailer.
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}
