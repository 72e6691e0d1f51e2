//! Validate a scene manifest without rendering anything.

use std::path::PathBuf;

use super::load_scene;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating scene at: {}", path.display());

    let request = load_scene(&path)?;
    let scene = &request.scene;
    println!("  Scene: {}", scene.id);
    println!("  Lines: {}", scene.lines.len());

    let timeline = scene
        .timeline()
        .map_err(|e| anyhow::anyhow!("Invalid script: {e}"))?;

    println!("\n  {:>5}  {:>8}  {:>8}  {:<12}  Text", "Order", "Start", "End", "Speaker");
    for entry in timeline.entries() {
        let speaker = entry.line.speaker().unwrap_or("(narration)");
        let text = if entry.line.has_content() {
            entry.line.content.trim()
        } else {
            "(silent)"
        };
        println!(
            "  {:>5}  {:>8.3}  {:>8.3}  {:<12}  {}",
            entry.line.order, entry.start_secs, entry.end_secs, speaker, text
        );
    }
    println!("  Total duration: {:.3}s", timeline.total_duration());

    let mut issues = Vec::new();
    if !request.background.is_file() {
        issues.push(format!(
            "Background missing: {} (scene cannot be composed)",
            request.background.display()
        ));
    }
    for (name, clip) in &request.character_clips {
        if !clip.is_file() {
            issues.push(format!(
                "Character clip for {name} missing: {} (character will be omitted)",
                clip.display()
            ));
        }
    }
    for (name, clip) in &request.audio_clips {
        if !clip.is_file() {
            issues.push(format!(
                "Audio for {name} missing: {} (lines will be silent)",
                clip.display()
            ));
        }
    }
    for speaker in scene.speakers() {
        println!(
            "  {speaker}: {:?}{}{}",
            scene.character_position(speaker),
            if request.character_clips.contains_key(speaker) {
                ", clip"
            } else {
                ""
            },
            if request.audio_clips.contains_key(speaker) {
                ", audio"
            } else {
                ""
            }
        );
    }

    if issues.is_empty() {
        println!("\nScene is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!("\n{} issue(s) found.", issues.len());
    }
    Ok(())
}
