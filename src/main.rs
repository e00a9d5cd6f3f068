use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use chromaviz::audio;
use chromaviz::capture::DEFAULT_OUTPUT;
use chromaviz::config;
use chromaviz::encode::EncoderOptions;
use chromaviz::palette::Palette;
use chromaviz::render::DisplayViewport;
use chromaviz::session::{Session, SessionOptions};
use chromaviz::visual::{Resolution, StylePlan, VisualStyle, VisualizerSettings};

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let config_path = config::discover(cli.config.as_deref());
    let mut palette_path = cli.palette.clone();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.output.as_os_str() == DEFAULT_OUTPUT { cli.output = cfg.output.path; }
            if cli.style == "bars" { cli.style = cfg.visual.style; }
            if cli.color == "#E040FB" { cli.color = cfg.visual.primary_color.to_string(); }
            if cli.background == "#0D0D1A" { cli.background = cfg.visual.background_color.to_string(); }
            if cli.line_width == 2.0 { cli.line_width = cfg.visual.line_width; }
            if cli.particle_speed == 1.0 { cli.particle_speed = cfg.visual.particle_speed; }
            if cli.resolution == "1080p" { cli.resolution = cfg.output.resolution.key().to_string(); }
            if cli.fps == 30 { cli.fps = cfg.output.fps; }
            if cli.codec == "libvpx-vp9" { cli.codec = cfg.output.codec; }
            if cli.audio_codec == "libopus" { cli.audio_codec = cfg.output.audio_codec; }
            if cli.crf == 32 { cli.crf = cfg.output.crf; }
            if cli.pix_fmt == "yuv420p" { cli.pix_fmt = cfg.output.pix_fmt; }
            if cli.refresh_hz == 60 { cli.refresh_hz = cfg.display.refresh_hz; }
            if cli.display_width == 960.0 { cli.display_width = cfg.display.width; }
            if cli.display_height == 540.0 { cli.display_height = cfg.display.height; }
            if cli.dpr == 1.0 { cli.dpr = cfg.display.device_pixel_ratio; }
            if palette_path.is_none() {
                palette_path = cfg.visual.palette;
            }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.list_styles {
        println!("Available styles:");
        for style in VisualStyle::all() {
            let note = if style.is_stateful() { "(stateful)" } else { "" };
            println!("  {:<12} {:<12} {}", style.key(), style.label(), note);
        }
        println!("  {:<12} every style in turn", "all");
        println!("Resolutions:");
        for res in Resolution::all() {
            let (w, h) = res.dimensions();
            println!("  {:<12} {:<16} {}x{}", res.key(), res.label(), w, h);
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let styles: Vec<VisualStyle> = if cli.style == "all" {
        VisualStyle::all().to_vec()
    } else {
        vec![cli.style.parse()?]
    };

    let mut settings = VisualizerSettings {
        style: styles[0],
        primary_color: cli.color.parse()?,
        background_color: cli.background.parse()?,
        line_width: cli.line_width,
        particle_speed: cli.particle_speed,
        resolution: cli.resolution.parse()?,
    };
    if let Some(ref path) = palette_path {
        match Palette::load(path) {
            Ok(palette) => {
                log::info!("Palette: background {} primary {}", palette.background, palette.primary);
                palette.apply(&mut settings);
            }
            Err(err) => log::warn!("Palette {} not applied: {}", path.display(), err),
        }
    }

    let (capture_w, capture_h) = settings.resolution.dimensions();
    log::info!("chromaviz - spectral audio visualizer");
    log::info!("Input: {}", input.display());
    if cli.no_record {
        log::info!("Output: none (recording disabled)");
    } else {
        log::info!("Output: {}", cli.output.display());
    }
    log::info!("Style: {}", cli.style);
    log::info!("Capture: {}x{} @ {}fps", capture_w, capture_h, cli.fps);

    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(input)?;
    let duration = audio_data.duration_secs();

    let plan = StylePlan::new(styles, duration);
    let options = SessionOptions {
        viewport: DisplayViewport::new(cli.display_width, cli.display_height, cli.dpr),
        refresh_hz: cli.refresh_hz,
        capture_fps: cli.fps,
        output: cli.output.clone(),
        encoder: EncoderOptions {
            codec: cli.codec.clone(),
            audio_codec: cli.audio_codec.clone(),
            pix_fmt: cli.pix_fmt.clone(),
            crf: cli.crf,
            bitrate: cli.bitrate.clone(),
        },
        record: !cli.no_record,
        seed: cli.seed,
    };
    let refresh_hz = options.refresh_hz.max(1);
    let mut session = Session::new(options, settings);
    session.load(audio_data);
    session.play();

    let total_refreshes = (duration * refresh_hz as f64).ceil() as u64 + 2;
    let pb = ProgressBar::new(total_refreshes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} refreshes ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    // Headroom past the nominal length in case playback overruns a refresh.
    let max_refreshes = total_refreshes * 2;
    let mut refreshes = 0u64;
    loop {
        if let Some(style) = plan.style_at(session.current_time()) {
            if style != session.settings().style {
                log::info!("Switching to style: {}", style.label());
                session.update_settings(|s| s.style = style);
            }
        }
        session.step();
        refreshes += 1;
        pb.set_position(refreshes.min(total_refreshes));
        let stopped = !session.is_playing() && !session.spectrum().is_polling();
        if stopped || refreshes >= max_refreshes {
            break;
        }
    }
    pb.finish_with_message("Playback complete");

    if let Some(ref path) = cli.snapshot {
        session
            .renderer()
            .display()
            .save_png(path)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        log::info!("Snapshot: {}", path.display());
    }

    log::info!(
        "Published {} frequency frames over {:.1}s",
        session.frames_published(),
        session.current_time()
    );
    let artifacts = session.finish();
    for message in session.messages() {
        eprintln!("{}", message);
    }
    for artifact in &artifacts {
        log::info!(
            "Done! Output: {} ({} frames, {}x{})",
            artifact.path.display(),
            artifact.frames_written,
            artifact.width,
            artifact.height
        );
    }
    Ok(())
}
