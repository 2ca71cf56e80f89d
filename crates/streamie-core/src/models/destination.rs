use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Streaming destination. The set is fixed; the server stores exactly these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "youtube")]
    YouTube,
    Twitch,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::YouTube, Platform::Twitch, Platform::Facebook];

    /// Identifier used on the wire and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Twitch => "twitch",
            Platform::Facebook => "facebook",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Twitch => "Twitch",
            Platform::Facebook => "Facebook",
        }
    }

    /// RTMP endpoint the server pushes to with this platform's key appended.
    /// Facebook goes through a local RTMPS relay on the server.
    pub fn ingest_url(&self) -> &'static str {
        match self {
            Platform::YouTube => "rtmp://a.rtmp.youtube.com/live2/",
            Platform::Twitch => "rtmp://ams03.contribute.live-video.net/app/",
            Platform::Facebook => "rtmp://localhost:19350/rtmp/",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Platform::YouTube),
            "twitch" => Ok(Platform::Twitch),
            "facebook" | "fb" => Ok(Platform::Facebook),
            other => Err(format!(
                "Unknown platform '{}' (expected youtube, twitch or facebook)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct DestinationConfig {
    pub stream_key: String,
    pub enabled: bool,
}

impl DestinationConfig {
    pub fn new(stream_key: impl Into<String>, enabled: bool) -> Self {
        Self {
            stream_key: stream_key.into(),
            enabled,
        }
    }

    /// Stream key with all but the last four characters hidden.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.stream_key.chars().collect();
        if chars.is_empty() {
            return "(not set)".to_string();
        }
        let visible = chars.len().min(4);
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

/// A single-field change to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    StreamKey(String),
    Enabled(bool),
}

/// Configuration for every platform. Always complete: the server replaces
/// the whole record on each update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct StreamConfig {
    pub youtube: DestinationConfig,
    pub twitch: DestinationConfig,
    pub facebook: DestinationConfig,
}

impl StreamConfig {
    pub fn get(&self, platform: Platform) -> &DestinationConfig {
        match platform {
            Platform::YouTube => &self.youtube,
            Platform::Twitch => &self.twitch,
            Platform::Facebook => &self.facebook,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut DestinationConfig {
        match platform {
            Platform::YouTube => &mut self.youtube,
            Platform::Twitch => &mut self.twitch,
            Platform::Facebook => &mut self.facebook,
        }
    }

    pub fn apply(&mut self, platform: Platform, edit: FieldEdit) {
        let dest = self.get_mut(platform);
        match edit {
            FieldEdit::StreamKey(key) => dest.stream_key = key,
            FieldEdit::Enabled(enabled) => dest.enabled = enabled,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, &DestinationConfig)> + '_ {
        Platform::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    /// Platforms whose entry differs from `other`.
    pub fn diff(&self, other: &StreamConfig) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.get(*p) != other.get(*p))
            .collect()
    }
}

/// Flat JSON body of `GET /getconf` and `POST /update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfigPayload {
    #[serde(rename = "streamkey_youtube", default)]
    pub stream_key_youtube: String,
    #[serde(rename = "streamkey_twitch", default)]
    pub stream_key_twitch: String,
    #[serde(rename = "streamkey_facebook", default)]
    pub stream_key_facebook: String,
    #[serde(default)]
    pub enable_youtube: bool,
    #[serde(default)]
    pub enable_twitch: bool,
    #[serde(default)]
    pub enable_facebook: bool,
}

impl From<StreamConfigPayload> for StreamConfig {
    fn from(p: StreamConfigPayload) -> Self {
        Self {
            youtube: DestinationConfig::new(p.stream_key_youtube, p.enable_youtube),
            twitch: DestinationConfig::new(p.stream_key_twitch, p.enable_twitch),
            facebook: DestinationConfig::new(p.stream_key_facebook, p.enable_facebook),
        }
    }
}

impl From<&StreamConfig> for StreamConfigPayload {
    fn from(c: &StreamConfig) -> Self {
        Self {
            stream_key_youtube: c.youtube.stream_key.clone(),
            stream_key_twitch: c.twitch.stream_key.clone(),
            stream_key_facebook: c.facebook.stream_key.clone(),
            enable_youtube: c.youtube.enabled,
            enable_twitch: c.twitch.enabled,
            enable_facebook: c.facebook.enabled,
        }
    }
}
