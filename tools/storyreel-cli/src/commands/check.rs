//! Check renderer availability and configured directories.

use storyreel_common::config::{config_file_path, AssemblyConfig};
use storyreel_render_engine::ffmpeg::command_exists;
use storyreel_render_engine::{FfmpegRenderer, Renderer};

pub fn run(config: &AssemblyConfig) -> anyhow::Result<()> {
    println!("Storyreel System Check");
    println!("{}", "=".repeat(50));

    let renderer = FfmpegRenderer::from_config(config);
    let renderer_ok = renderer.is_available();
    if renderer_ok {
        println!("[OK] Renderer: {}", config.ffmpeg_binary);
    } else {
        println!("[FAIL] Renderer not found: {}", config.ffmpeg_binary);
    }

    if command_exists(&config.ffprobe_binary) {
        println!("[OK] Probe: {}", config.ffprobe_binary);
    } else {
        println!(
            "[WARN] Probe not found: {} (durations and base audio cannot be detected)",
            config.ffprobe_binary
        );
    }

    match config.validate() {
        Ok(()) => println!("[OK] Configuration valid"),
        Err(e) => println!("[FAIL] Configuration: {e}"),
    }

    println!();
    println!("  Config file: {}", config_file_path().display());
    println!("  Output dir:  {}", config.output_dir.display());
    println!("  Temp dir:    {}", config.temp_dir.display());
    let (width, height) = config.dimensions();
    println!(
        "  Resolution:  {} ({width}x{height}) @ {} fps",
        config.resolution.as_str(),
        config.fps
    );
    println!("  Max concurrent renders: {}", config.max_concurrent_renders);

    println!();
    if renderer_ok {
        println!("Storyreel is ready.");
    } else {
        println!("Install ffmpeg or set ffmpeg_binary in the config file.");
    }
    Ok(())
}
