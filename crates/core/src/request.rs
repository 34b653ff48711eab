//! Render request model.
//!
//! [`RenderRequest`] carries exactly one mode-specific payload: a preset
//! name, custom scene settings, or generated source text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Prompt value on `POST /render` that selects the procedural custom scene.
pub const CUSTOM_PROMPT: &str = "custom";

/// Maximum accepted length of a free-text generation prompt.
pub const MAX_PROMPT_LEN: usize = 4000;

/// Which kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Preset,
    Custom,
    Generated,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderMode::Preset => "preset",
            RenderMode::Custom => "custom",
            RenderMode::Generated => "generated",
        };
        f.write_str(s)
    }
}

/// The seven built-in scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    BouncingSpheres,
    CheckeredSpheres,
    Earth,
    PerlinSpheres,
    Quads,
    SimpleLight,
    CornellBox,
}

impl PresetName {
    pub const ALL: [PresetName; 7] = [
        PresetName::BouncingSpheres,
        PresetName::CheckeredSpheres,
        PresetName::Earth,
        PresetName::PerlinSpheres,
        PresetName::Quads,
        PresetName::SimpleLight,
        PresetName::CornellBox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresetName::BouncingSpheres => "bouncing_spheres",
            PresetName::CheckeredSpheres => "checkered_spheres",
            PresetName::Earth => "earth",
            PresetName::PerlinSpheres => "perlin_spheres",
            PresetName::Quads => "quads",
            PresetName::SimpleLight => "simple_light",
            PresetName::CornellBox => "cornell_box",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = PresetName::ALL.iter().map(|p| p.as_str()).collect();
                CoreError::Validation(format!(
                    "Unknown preset '{s}'. Must be one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// Client-supplied parameters for the procedural custom scene.
///
/// Every field is optional; the builder fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomSettings {
    #[validate(range(min = 0.1, max = 10.0))]
    pub aspect_ratio: Option<f64>,
    #[validate(range(min = 1, max = 4096))]
    pub image_width: Option<u32>,
    #[validate(range(min = 1, max = 10000))]
    pub samples_per_pixel: Option<u32>,
    #[validate(range(min = 1, max = 500))]
    pub max_depth: Option<u32>,
    /// `#RRGGBB`; malformed values decode to black.
    pub background_color: Option<String>,
    #[validate(range(min = 1.0, max = 179.0))]
    pub vfov: Option<f64>,
    pub lookfrom: Option<[f64; 3]>,
    pub lookat: Option<[f64; 3]>,
    pub vup: Option<[f64; 3]>,
    #[validate(range(min = 0.0, max = 90.0))]
    pub defocus_angle: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub focus_dist: Option<f64>,
    #[validate(range(max = 1000))]
    pub num_spheres: Option<u32>,
    #[validate(range(max = 1000))]
    pub num_quads: Option<u32>,
}

/// Body of `POST /render`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderBody {
    pub prompt: String,
    pub custom_settings: Option<CustomSettings>,
}

/// Body of `POST /renderAI`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
}

/// A validated request for one render job.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    Preset(PresetName),
    Custom(CustomSettings),
    Generated {
        /// The free-text prompt the source was generated from.
        prompt: String,
        /// Raw generated source text, before sanitization.
        source: String,
    },
}

impl RenderRequest {
    pub fn mode(&self) -> RenderMode {
        match self {
            RenderRequest::Preset(_) => RenderMode::Preset,
            RenderRequest::Custom(_) => RenderMode::Custom,
            RenderRequest::Generated { .. } => RenderMode::Generated,
        }
    }

    /// Turn a `POST /render` body into a request.
    ///
    /// `prompt == "custom"` selects the custom scene (settings default when
    /// absent); any other prompt must name a preset.
    pub fn from_body(body: RenderBody) -> Result<Self, CoreError> {
        if body.prompt == CUSTOM_PROMPT {
            let settings = body.custom_settings.unwrap_or_default();
            settings.validate()?;
            return Ok(RenderRequest::Custom(settings));
        }
        let preset = body.prompt.trim().parse::<PresetName>()?;
        Ok(RenderRequest::Preset(preset))
    }
}

/// Validate a free-text generation prompt: non-empty and within length limit.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    if prompt.len() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt too long: {} chars (max {MAX_PROMPT_LEN})",
            prompt.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn body(value: serde_json::Value) -> RenderBody {
        serde_json::from_value(value).expect("valid body")
    }

    #[test]
    fn preset_names_round_trip_through_from_str() {
        for preset in PresetName::ALL {
            assert_eq!(preset.as_str().parse::<PresetName>().unwrap(), preset);
        }
    }

    #[test]
    fn unknown_preset_is_validation_error() {
        let err = RenderRequest::from_body(body(json!({ "prompt": "teapot" }))).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("teapot"));
    }

    #[test]
    fn custom_prompt_without_settings_uses_defaults() {
        let request = RenderRequest::from_body(body(json!({ "prompt": "custom" }))).unwrap();
        assert_eq!(request, RenderRequest::Custom(CustomSettings::default()));
        assert_eq!(request.mode(), RenderMode::Custom);
    }

    #[test]
    fn custom_settings_parse_camel_case() {
        let request = RenderRequest::from_body(body(json!({
            "prompt": "custom",
            "customSettings": {
                "imageWidth": 64,
                "backgroundColor": "#102030",
                "lookfrom": [1.0, 2.0, 3.0],
                "numSpheres": 4
            }
        })))
        .unwrap();
        assert_matches!(request, RenderRequest::Custom(s) => {
            assert_eq!(s.image_width, Some(64));
            assert_eq!(s.background_color.as_deref(), Some("#102030"));
            assert_eq!(s.lookfrom, Some([1.0, 2.0, 3.0]));
            assert_eq!(s.num_spheres, Some(4));
        });
    }

    #[test]
    fn out_of_range_custom_settings_are_rejected() {
        let err = RenderRequest::from_body(body(json!({
            "prompt": "custom",
            "customSettings": { "imageWidth": 0 }
        })))
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));

        let err = RenderRequest::from_body(body(json!({
            "prompt": "custom",
            "customSettings": { "focusDist": 0.0 }
        })))
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn preset_ignores_custom_settings() {
        let request = RenderRequest::from_body(body(json!({
            "prompt": "quads",
            "customSettings": { "numSpheres": 3 }
        })))
        .unwrap();
        assert_eq!(request, RenderRequest::Preset(PresetName::Quads));
    }

    #[test]
    fn prompt_validation() {
        assert!(validate_prompt("three glass spheres").is_ok());
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"x".repeat(MAX_PROMPT_LEN + 1)).is_err());
    }
}
