//! Translation of free-text prompts into program source by an external
//! text-generation service.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

/// Errors from the source generator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("source generator is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generator API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed generator response: {0}")]
    MalformedResponse(String),
}

/// Anything that can turn a prompt into program source text.
#[async_trait]
pub trait SourceGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// `None` disables generation; requests fail with
    /// [`GeneratorError::NotConfigured`].
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

const INSTRUCTIONS: &str = "\
Write a complete C++17 program that renders the scene the user describes \
using the ray tracing headers that are already available on the include \
path: constants.h (include it first), bvh.h, camera.h, hittable.h, \
hittable_list.h, material.h, quad.h, sphere.h, texture.h.

Return only the source file, no explanations.

The program must write the finished image as a PPM (P3) to stdout or to a \
file named image.ppm in the working directory, and should print its \
progress to stderr as lines of the form `progress NN`.

Example scene:
int main() {
    hittable_list world;

    auto checker = make_shared<checker_texture>(0.32, color(.2, .3, .1), color(.9, .9, .9));
    world.add(make_shared<sphere>(point3(0,-10, 0), 10, make_shared<lambertian>(checker)));
    world.add(make_shared<sphere>(point3(0, 10, 0), 10, make_shared<lambertian>(checker)));

    camera cam;
    cam.aspect_ratio      = 16.0 / 9.0;
    cam.image_width       = 400;
    cam.samples_per_pixel = 100;
    cam.max_depth         = 50;
    cam.background        = color(0.70, 0.80, 1.00);
    cam.vfov     = 20;
    cam.lookfrom = point3(13,2,3);
    cam.lookat   = point3(0,0,0);
    cam.vup      = vec3(0,1,0);
    cam.defocus_angle = 0;

    cam.render(world);
}";

const EXAMPLE_ANSWER: &str = "\
```cpp
#include \"constants.h\"
#include \"camera.h\"
#include \"hittable_list.h\"
#include \"material.h\"
#include \"sphere.h\"

int main() {
    hittable_list world;

    auto ground = make_shared<lambertian>(color(0.2, 0.2, 0.2));
    world.add(make_shared<sphere>(point3(0,-1000,0), 1000, ground));

    auto glass = make_shared<dielectric>(1.5);
    world.add(make_shared<sphere>(point3(0, 1, 0), 1.0, glass));
    world.add(make_shared<sphere>(point3(-2, 1, 1), 1.0, glass));
    world.add(make_shared<sphere>(point3(2, 1, -1), 1.0, glass));

    auto light = make_shared<diffuse_light>(color(0.5, 0.5, 0.5));
    world.add(make_shared<sphere>(point3(0,5,0), 2, light));

    camera cam;
    cam.aspect_ratio      = 16.0 / 9.0;
    cam.image_width       = 400;
    cam.samples_per_pixel = 100;
    cam.max_depth         = 50;
    cam.background        = color(0.0, 0.0, 0.0);
    cam.vfov     = 20;
    cam.lookfrom = point3(10,3,5);
    cam.lookat   = point3(0,0,0);
    cam.vup      = vec3(0,1,0);
    cam.defocus_angle = 0.0;

    cam.render(world);
}
```";

/// [`SourceGenerator`] backed by the Gemini `generateContent` API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// Few-shot request body: instructions and an example answer, then the
/// user's prompt.
pub fn build_payload(prompt: &str) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [{ "text": INSTRUCTIONS }] },
            { "role": "model", "parts": [{ "text": EXAMPLE_ANSWER }] },
            { "role": "user", "parts": [{ "text": prompt }] }
        ],
        "generationConfig": {
            "temperature": 1,
            "topK": 40,
            "topP": 0.95,
            "maxOutputTokens": 8192,
            "responseMimeType": "text/plain"
        }
    })
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
pub fn extract_text(body: &Value) -> Result<String, GeneratorError> {
    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GeneratorError::MalformedResponse("missing candidates[0].content.parts[0].text".into())
        })
}

#[async_trait]
impl SourceGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GeneratorError::NotConfigured)?;

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&build_payload(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))?;
        let text = extract_text(&body)?;
        tracing::debug!(chars = text.len(), "Generated source received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn payload_is_few_shot_with_prompt_last() {
        let payload = build_payload("three glass spheres");
        let roles: Vec<&str> = payload["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(
            payload["contents"][2]["parts"][0]["text"],
            "three glass spheres"
        );
        assert_eq!(payload["generationConfig"]["topK"], 40);
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "int main() {}" }] } }]
        });
        assert_eq!(extract_text(&body).unwrap(), "int main() {}");
    }

    #[test]
    fn missing_text_is_malformed() {
        assert_matches!(
            extract_text(&json!({ "candidates": [] })),
            Err(GeneratorError::MalformedResponse(_))
        );
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let generator = GeminiGenerator::new(GeneratorConfig {
            base_url: "http://localhost:9000/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            generator.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[tokio::test]
    async fn unconfigured_generator_refuses() {
        let generator = GeminiGenerator::new(GeneratorConfig::default()).unwrap();
        assert_matches!(
            generator.generate("anything").await,
            Err(GeneratorError::NotConfigured)
        );
    }
}
