//! Composition layers and their paint order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storyreel_common::error::{StoryreelError, StoryreelResult};

use crate::dialogue::ScreenPosition;

/// Reference frame that logical positions are expressed in.
pub const REFERENCE_WIDTH: u32 = 1920;
pub const REFERENCE_HEIGHT: u32 = 1080;

/// What a layer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Character,
    Ui,
    Text,
}

impl LayerKind {
    /// Default z-index for layers of this kind.
    pub fn default_z_index(self) -> i32 {
        match self {
            Self::Background => 0,
            Self::Character => 1,
            Self::Ui => 2,
            Self::Text => 3,
        }
    }
}

/// Top-left pixel offset in target-resolution space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: i32,
    pub y: i32,
}

impl PixelPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Resolve a logical slot to pixels, scaling the 1080p reference table
    /// to the target resolution.
    pub fn for_slot(slot: ScreenPosition, width: u32, height: u32) -> Self {
        let (x, y) = slot.reference_offset();
        Self {
            x: scale_axis(x, width, REFERENCE_WIDTH),
            y: scale_axis(y, height, REFERENCE_HEIGHT),
        }
    }
}

/// Scale a reference-space coordinate to a target axis length.
pub fn scale_axis(value: i32, target: u32, reference: u32) -> i32 {
    (value as f64 * target as f64 / reference as f64).round() as i32
}

/// One positioned, time-windowed visual input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionLayer {
    pub kind: LayerKind,
    pub source_path: PathBuf,
    pub position: PixelPosition,
    pub scale: f64,
    pub opacity: f64,
    pub z_index: i32,
    pub start_secs: f64,
    /// `None` means "until the end of the scene".
    pub duration_secs: Option<f64>,
}

impl CompositionLayer {
    /// Full-frame background spanning `duration_secs`.
    pub fn background(source: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            kind: LayerKind::Background,
            source_path: source.into(),
            position: PixelPosition::default(),
            scale: 1.0,
            opacity: 1.0,
            z_index: LayerKind::Background.default_z_index(),
            start_secs: 0.0,
            duration_secs: Some(duration_secs),
        }
    }

    /// Character clip placed at `position` for the whole scene.
    pub fn character(
        source: impl Into<PathBuf>,
        position: PixelPosition,
        duration_secs: f64,
    ) -> Self {
        Self {
            kind: LayerKind::Character,
            source_path: source.into(),
            position,
            scale: 1.0,
            opacity: 1.0,
            z_index: LayerKind::Character.default_z_index(),
            start_secs: 0.0,
            duration_secs: Some(duration_secs),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_window(mut self, start_secs: f64, duration_secs: f64) -> Self {
        self.start_secs = start_secs;
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source_path
    }

    /// End of the active window, given the scene length.
    pub fn end_secs(&self, scene_duration: f64) -> f64 {
        match self.duration_secs {
            Some(d) => (self.start_secs + d).min(scene_duration),
            None => scene_duration,
        }
    }

    /// Whether the layer is visible for the entire scene.
    pub fn spans(&self, scene_duration: f64) -> bool {
        self.start_secs <= 0.0 && self.end_secs(scene_duration) >= scene_duration - 1e-9
    }

    pub fn validate(&self) -> StoryreelResult<()> {
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(StoryreelError::invalid_input(format!(
                "Layer {} has invalid scale {}",
                self.source_path.display(),
                self.scale
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(StoryreelError::invalid_input(format!(
                "Layer {} has invalid opacity {}",
                self.source_path.display(),
                self.opacity
            )));
        }
        if !self.start_secs.is_finite() || self.start_secs < 0.0 {
            return Err(StoryreelError::invalid_input(format!(
                "Layer {} starts at {}",
                self.source_path.display(),
                self.start_secs
            )));
        }
        Ok(())
    }
}

/// The full set of layers for one scene, held in paint order.
///
/// Exactly one background exists; it sits at z-index 0 and spans the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<CompositionLayer>,
    duration_secs: f64,
}

impl LayerStack {
    pub fn new(
        background: CompositionLayer,
        others: Vec<CompositionLayer>,
        duration_secs: f64,
    ) -> StoryreelResult<Self> {
        if background.kind != LayerKind::Background {
            return Err(StoryreelError::invalid_input(
                "First layer of a stack must be the background",
            ));
        }
        if background.z_index != 0 {
            return Err(StoryreelError::invalid_input(format!(
                "Background must sit at z-index 0, got {}",
                background.z_index
            )));
        }
        if !background.spans(duration_secs) {
            return Err(StoryreelError::invalid_input(
                "Background must span the whole scene",
            ));
        }
        background.validate()?;

        for layer in &others {
            if layer.kind == LayerKind::Background {
                return Err(StoryreelError::invalid_input(
                    "A scene has exactly one background layer",
                ));
            }
            if layer.z_index <= 0 {
                return Err(StoryreelError::invalid_input(format!(
                    "Layer {} must paint above the background",
                    layer.source_path.display()
                )));
            }
            layer.validate()?;
        }

        let mut layers = Vec::with_capacity(others.len() + 1);
        layers.push(background);
        layers.extend(others);
        // Stable: equal z-indices keep insertion order.
        layers.sort_by_key(|layer| layer.z_index);

        Ok(Self {
            layers,
            duration_secs,
        })
    }

    /// Layers in paint order; the background is first.
    pub fn layers(&self) -> &[CompositionLayer] {
        &self.layers
    }

    pub fn background(&self) -> &CompositionLayer {
        &self.layers[0]
    }

    /// Everything painted above the background.
    pub fn overlays(&self) -> &[CompositionLayer] {
        &self.layers[1..]
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_positions_at_reference_resolution() {
        assert_eq!(
            PixelPosition::for_slot(ScreenPosition::Left, 1920, 1080),
            PixelPosition::new(200, 150)
        );
        assert_eq!(
            PixelPosition::for_slot(ScreenPosition::Center, 1920, 1080),
            PixelPosition::new(760, 150)
        );
        assert_eq!(
            PixelPosition::for_slot(ScreenPosition::Right, 1920, 1080),
            PixelPosition::new(1320, 150)
        );
    }

    #[test]
    fn test_slot_positions_scale_with_resolution() {
        assert_eq!(
            PixelPosition::for_slot(ScreenPosition::Right, 1280, 720),
            PixelPosition::new(880, 100)
        );
        assert_eq!(
            PixelPosition::for_slot(ScreenPosition::Left, 3840, 2160),
            PixelPosition::new(400, 300)
        );
    }

    #[test]
    fn test_stack_sorts_by_z_index_with_background_first() {
        let bg = CompositionLayer::background("bg.png", 5.0);
        let ui = CompositionLayer {
            kind: LayerKind::Ui,
            ..CompositionLayer::character("box.png", PixelPosition::default(), 5.0)
        }
        .with_z_index(5);
        let alice = CompositionLayer::character("alice.mp4", PixelPosition::new(200, 150), 5.0);
        let bob = CompositionLayer::character("bob.mp4", PixelPosition::new(1320, 150), 5.0);

        let stack = LayerStack::new(bg, vec![ui, alice, bob], 5.0).unwrap();
        let order: Vec<&str> = stack
            .layers()
            .iter()
            .map(|l| l.source_path.to_str().unwrap())
            .collect();
        assert_eq!(order, vec!["bg.png", "alice.mp4", "bob.mp4", "box.png"]);
        assert_eq!(stack.overlays().len(), 3);
    }

    #[test]
    fn test_stack_rejects_second_background() {
        let bg = CompositionLayer::background("bg.png", 5.0);
        let other = CompositionLayer::background("bg2.png", 5.0).with_z_index(1);
        assert!(LayerStack::new(bg, vec![other], 5.0).is_err());
    }

    #[test]
    fn test_stack_rejects_short_background() {
        let bg = CompositionLayer::background("bg.png", 3.0);
        assert!(LayerStack::new(bg, vec![], 5.0).is_err());
    }

    #[test]
    fn test_layer_validation() {
        let layer = CompositionLayer::character("a.mp4", PixelPosition::default(), 1.0);
        assert!(layer.clone().with_scale(0.0).validate().is_ok());
        assert!(layer.clone().with_scale(-0.5).validate().is_err());
        assert!(layer.clone().with_opacity(1.2).validate().is_err());
        assert!(layer.with_opacity(0.4).validate().is_ok());
    }

    #[test]
    fn test_end_secs_clamps_to_scene() {
        let layer = CompositionLayer::character("a.mp4", PixelPosition::default(), 1.0)
            .with_window(2.0, 10.0);
        assert!((layer.end_secs(6.0) - 6.0).abs() < 1e-9);
        assert!(!layer.spans(6.0));
    }
}
