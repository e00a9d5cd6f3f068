pub mod ffmpeg;

pub use ffmpeg::{EncoderOptions, FfmpegEncoder};
