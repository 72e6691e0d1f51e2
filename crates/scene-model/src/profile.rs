//! Export profiles: closed `(format, quality)` presets.
//!
//! Quality presets are resolved to a fixed [`EncodeParams`] record. There is
//! no string lookup at encode time; unknown names are rejected when the
//! profile is parsed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use storyreel_common::error::StoryreelError;

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Mov,
    Mkv,
    Webm,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 4] = [
        ContainerFormat::Mp4,
        ContainerFormat::Mov,
        ContainerFormat::Mkv,
        ContainerFormat::Webm,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }

    pub fn video_codec(self) -> VideoCodec {
        match self {
            Self::Webm => VideoCodec::Vp9,
            _ => VideoCodec::H264,
        }
    }

    pub fn audio_codec(self) -> AudioCodec {
        match self {
            Self::Webm => AudioCodec::Opus,
            _ => AudioCodec::Aac,
        }
    }
}

impl FromStr for ContainerFormat {
    type Err = StoryreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                StoryreelError::invalid_input(format!(
                    "Unknown format: {s}. Use: mp4, mov, mkv, webm"
                ))
            })
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    High,
    Medium,
    Low,
}

impl QualityProfile {
    pub const ALL: [QualityProfile; 3] = [
        QualityProfile::High,
        QualityProfile::Medium,
        QualityProfile::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Constant-rate-factor: lower is higher fidelity.
    pub fn crf(self) -> u8 {
        match self {
            Self::High => 18,
            Self::Medium => 23,
            Self::Low => 28,
        }
    }

    /// Encoder speed: slower presets spend more time for smaller, better output.
    pub fn preset(self) -> EncoderPreset {
        match self {
            Self::High => EncoderPreset::Slow,
            Self::Medium => EncoderPreset::Medium,
            Self::Low => EncoderPreset::Fast,
        }
    }
}

impl FromStr for QualityProfile {
    type Err = StoryreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|quality| quality.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StoryreelError::invalid_input(format!(
                    "Unknown quality: {s}. Use: high, medium, low"
                ))
            })
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// x264-style speed presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreset {
    Fast,
    Medium,
    Slow,
}

impl EncoderPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Vp9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
}

/// Fixed encoder settings for one export profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodeParams {
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub crf: u8,
    pub preset: EncoderPreset,
    pub audio_bitrate_kbps: u32,
}

/// Audio bitrate shared by every export profile.
pub const EXPORT_AUDIO_BITRATE_KBPS: u32 = 128;

/// A named `(format, quality)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExportProfile {
    pub format: ContainerFormat,
    pub quality: QualityProfile,
}

impl ExportProfile {
    pub fn new(format: ContainerFormat, quality: QualityProfile) -> Self {
        Self { format, quality }
    }

    /// Every combination of the given formats and qualities, formats outermost.
    pub fn matrix(formats: &[ContainerFormat], qualities: &[QualityProfile]) -> Vec<Self> {
        let mut profiles = Vec::with_capacity(formats.len() * qualities.len());
        for format in formats {
            for quality in qualities {
                let profile = Self::new(*format, *quality);
                if !profiles.contains(&profile) {
                    profiles.push(profile);
                }
            }
        }
        profiles
    }

    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            video_codec: self.format.video_codec(),
            audio_codec: self.format.audio_codec(),
            crf: self.quality.crf(),
            preset: self.quality.preset(),
            audio_bitrate_kbps: EXPORT_AUDIO_BITRATE_KBPS,
        }
    }

    /// Output filename for a source with the given stem.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}_{}.{}", self.quality, self.format.extension())
    }
}

impl fmt::Display for ExportProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.format, self.quality)
    }
}
