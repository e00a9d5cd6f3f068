use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chromaviz",
    about = "Spectral audio visualizer with a fixed-resolution video capture"
)]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "audio-visualization.webm")]
    pub output: PathBuf,

    /// Visual style (bars, wave, circle, dual_bars, particles, galaxy, grid) or "all"
    #[arg(short, long, default_value = "bars")]
    pub style: String,

    /// Primary drawing color (#RGB or #RRGGBB)
    #[arg(long, default_value = "#E040FB")]
    pub color: String,

    /// Background color (#RGB or #RRGGBB)
    #[arg(long, default_value = "#0D0D1A")]
    pub background: String,

    /// Stroke width for wave and circle, in reference units
    #[arg(long, default_value_t = 2.0)]
    pub line_width: f32,

    /// Particle speed multiplier
    #[arg(long, default_value_t = 1.0)]
    pub particle_speed: f32,

    /// Capture resolution (720p, 1080p, 1440p, 2160p)
    #[arg(short, long, default_value = "1080p")]
    pub resolution: String,

    /// Capture frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Display refresh rate driving the analysis loop
    #[arg(long, default_value_t = 60)]
    pub refresh_hz: u32,

    /// Display container width in CSS pixels
    #[arg(long, default_value_t = 960.0)]
    pub display_width: f32,

    /// Display container height in CSS pixels
    #[arg(long, default_value_t = 540.0)]
    pub display_height: f32,

    /// Device pixel ratio of the display
    #[arg(long, default_value_t = 1.0)]
    pub dpr: f32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libvpx-vp9")]
    pub codec: String,

    /// FFmpeg audio codec
    #[arg(long, default_value = "libopus")]
    pub audio_codec: String,

    /// Constant-quality level. Ignored when --bitrate is set.
    #[arg(long, default_value_t = 32)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Palette JSON ({"backgroundColor": ..., "primaryColor": ...}) to apply
    #[arg(long)]
    pub palette: Option<PathBuf>,

    /// Write the last display frame to this PNG
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Visualize without recording a video
    #[arg(long)]
    pub no_record: bool,

    /// Seed for particle randomness
    #[arg(long)]
    pub seed: Option<u64>,

    /// List available styles and exit
    #[arg(long)]
    pub list_styles: bool,

    /// Config file (defaults to ./chromaviz.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
