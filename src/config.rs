//! Phone Configuration
//!
//! Settings for the call coordinator and the console dialer.

use serde::{Deserialize, Serialize};

/// Media requested from the signaling client when connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOptions {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Phone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    /// Name shown by the native call UI
    pub app_name: String,

    /// Number pre-filled in the dialer
    pub default_number: String,

    /// Media the signaling client is connected with
    pub media: MediaOptions,

    /// Show the local camera preview while no call is in progress
    pub local_preview: bool,

    /// Skip the native "end call" command when a video call ends with the camera on
    pub suppress_end_call_with_camera: bool,

    /// Bring the app to the foreground when a video call is answered from the native UI
    pub foreground_on_video_answer: bool,

    /// Capacity of the coordinator event channel
    pub event_buffer: usize,

    /// Delay before the loopback signaling client reports a dialed call as answered
    pub loopback_answer_delay_ms: u64,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            app_name: "Softphone".to_string(),
            default_number: "8008".to_string(),
            media: MediaOptions::default(),
            local_preview: true,
            suppress_end_call_with_camera: false,
            foreground_on_video_answer: true,
            event_buffer: 100,
            loopback_answer_delay_ms: 500,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name)
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

impl PhoneConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            app_name: std::env::var("PHONE_APP_NAME").unwrap_or(defaults.app_name),
            default_number: std::env::var("PHONE_DEFAULT_NUMBER")
                .unwrap_or(defaults.default_number),
            media: MediaOptions {
                audio: env_flag("PHONE_MEDIA_AUDIO", defaults.media.audio),
                video: env_flag("PHONE_MEDIA_VIDEO", defaults.media.video),
            },
            local_preview: env_flag("PHONE_LOCAL_PREVIEW", defaults.local_preview),
            suppress_end_call_with_camera: env_flag(
                "PHONE_SUPPRESS_END_CALL_WITH_CAMERA",
                defaults.suppress_end_call_with_camera,
            ),
            foreground_on_video_answer: env_flag(
                "PHONE_FOREGROUND_ON_VIDEO_ANSWER",
                defaults.foreground_on_video_answer,
            ),
            event_buffer: std::env::var("PHONE_EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.event_buffer),
            loopback_answer_delay_ms: std::env::var("PHONE_LOOPBACK_ANSWER_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.loopback_answer_delay_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.app_name.trim().is_empty() {
            return Err("App name is required".to_string());
        }
        if !self.media.audio && !self.media.video {
            return Err("At least one of audio or video must be enabled".to_string());
        }
        if self.event_buffer == 0 {
            return Err("Event buffer must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PhoneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_number, "8008");
        assert!(!config.suppress_end_call_with_camera);
    }

    #[test]
    fn test_validate_rejects_no_media() {
        let config = PhoneConfig {
            media: MediaOptions {
                audio: false,
                video: false,
            },
            ..PhoneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_buffer() {
        let config = PhoneConfig {
            event_buffer: 0,
            ..PhoneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = PhoneConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PhoneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.app_name, config.app_name);
        assert_eq!(parsed.media, config.media);
    }
}
