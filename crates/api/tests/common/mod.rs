#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use prism_api::config::{JobConfig, RenderConfig, ServerConfig};
use prism_api::router::build_app_router;
use prism_api::state::AppState;
use prism_engine::RenderLimits;
use prism_pipeline::compiler::CompilerConfig;
use prism_pipeline::sandbox::SandboxPolicy;
use prism_pipeline::{GeneratorConfig, GeneratorError, PipelineConfig, SourceGenerator};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Stand-in compiler: "compiles" by copying the source to the output path,
/// so generated sources in these tests are shell scripts. Sources containing
/// `COMPILE_ERROR` fail to compile.
const FAKE_COMPILER: &str = r#"#!/bin/sh
out=""
src=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) src="$1"; shift ;;
  esac
done
if grep -q COMPILE_ERROR "$src"; then
  echo "main.cpp:1:1: error: COMPILE_ERROR" >&2
  exit 1
fi
cp "$src" "$out" && chmod +x "$out"
"#;

/// Prints a 2x1 red/blue PPM on stdout, with progress on stderr.
pub const RED_BLUE_PROGRAM: &str = "```cpp
#!/bin/sh
echo \"progress 20\" >&2
sleep 0.1
echo \"progress 40\" >&2
sleep 0.1
echo \"progress 70\" >&2
printf 'P3\\n2 1\\n255\\n255 0 0  0 0 255\\n'
```";

/// Runs until killed.
pub const SLEEPING_PROGRAM: &str = "#!/bin/sh
echo \"progress 5\" >&2
sleep 30
";

pub const BROKEN_PROGRAM: &str = "int main() { COMPILE_ERROR }";

/// Source generator returning canned answers.
pub enum StubGenerator {
    Source(String),
    Unavailable,
}

impl StubGenerator {
    pub fn source(text: &str) -> Arc<dyn SourceGenerator> {
        Arc::new(StubGenerator::Source(text.to_string()))
    }

    pub fn unavailable() -> Arc<dyn SourceGenerator> {
        Arc::new(StubGenerator::Unavailable)
    }
}

#[async_trait]
impl SourceGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
        match self {
            StubGenerator::Source(text) => Ok(text.clone()),
            StubGenerator::Unavailable => Err(GeneratorError::Api {
                status: 503,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

/// A router over real state, plus the temporary directory it works in.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _root: TempDir,
}

/// Build a test `ServerConfig` rooted at `root`.
///
/// Renders are capped to tiny previews and the pipeline uses the stand-in
/// compiler without namespace isolation.
pub fn test_config(root: &std::path::Path) -> ServerConfig {
    let compiler = root.join("fake-cc");
    std::fs::write(&compiler, FAKE_COMPILER).unwrap();
    std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jobs: JobConfig {
            job_timeout: Duration::from_secs(30),
            ..Default::default()
        },
        render: RenderConfig {
            limits: RenderLimits {
                max_image_width: Some(16),
                max_samples_per_pixel: Some(2),
            },
            asset_dir: root.join("assets"),
            ..Default::default()
        },
        pipeline: PipelineConfig {
            work_dir: root.join("work"),
            compiler: CompilerConfig {
                program: compiler,
                timeout: Duration::from_secs(10),
                ..Default::default()
            },
            sandbox: SandboxPolicy {
                wall_timeout: Duration::from_secs(20),
                isolate_namespaces: false,
                restrict_filesystem: false,
                ..Default::default()
            },
        },
        generator: GeneratorConfig::default(),
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(StubGenerator::source(RED_BLUE_PROGRAM), |_| {})
}

/// Like [`build_test_app`], with a chosen generator and config overrides.
pub fn build_test_app_with(
    generator: Arc<dyn SourceGenerator>,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    configure(&mut config);

    let state = AppState::new(config.clone(), generator);
    let app = build_app_router(state.clone(), &config);
    TestApp {
        app,
        state,
        _root: root,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Submit through `uri` and return the new job id, asserting 202.
pub async fn submit(app: &Router, uri: &str, body: Value) -> String {
    let response = post_json(app, uri, body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    json["data"]["job_id"].as_str().unwrap().to_string()
}

pub async fn job(app: &Router, id: &str) -> Value {
    let response = get(app, &format!("/api/v1/jobs/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

/// Poll a job until `done` holds for its snapshot.
pub async fn wait_for(app: &Router, id: &str, done: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..1500 {
        let snapshot = job(app, id).await;
        if done(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {id} did not reach the expected state");
}

pub async fn wait_terminal(app: &Router, id: &str) -> Value {
    wait_for(app, id, |job| {
        matches!(
            job["status"].as_str(),
            Some("completed" | "failed" | "cancelled")
        )
    })
    .await
}

pub async fn wait_running(app: &Router, id: &str) -> Value {
    wait_for(app, id, |job| job["status"] == "running").await
}

/// Decode an image response body and return its top-left pixel and size.
pub async fn first_pixel(response: Response) -> ([u8; 3], (u32, u32)) {
    let bytes = body_bytes(response).await;
    let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
    (image.get_pixel(0, 0).0, image.dimensions())
}
