#![allow(dead_code)]

use async_trait::async_trait;
use convert_service::config::{ConversionConfig, ConvertConfig, TelemetryConfig, WorkspaceConfig};
use convert_service::models::TargetFormat;
use convert_service::startup::Application;
use convert_service::workers::Converter;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const LANDING_HTML: &str = "<html><body>landing page</body></html>";

/// Engine stand-in:
/// - `docx`, `pdf`, `odt` and `txt` are "supported"; the output is
///   `<format>:` followed by the upper-cased input.
/// - input starting with `CORRUPT` fails, like a damaged document would.
/// - input starting with `HOLD` blocks until the test releases `release`.
pub struct FakeConverter {
    pub release: Arc<Semaphore>,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self {
            release: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn expected_output(format: &str, input: &[u8]) -> Vec<u8> {
        let mut out = format!("{}:", format).into_bytes();
        out.extend(input.to_ascii_uppercase());
        out
    }
}

#[async_trait]
impl Converter for FakeConverter {
    fn name(&self) -> &str {
        "fake"
    }

    async fn convert(&self, input: Vec<u8>, format: &TargetFormat) -> Result<Vec<u8>, AppError> {
        if !matches!(format.as_str(), "docx" | "pdf" | "odt" | "txt") {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "no export filter for {}",
                format
            )));
        }
        if input.starts_with(b"CORRUPT") {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "source file could not be loaded"
            )));
        }
        if input.starts_with(b"HOLD") {
            let permit = self
                .release
                .acquire()
                .await
                .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;
            permit.forget();
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Self::expected_output(format.as_str(), &input))
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub converter: Arc<FakeConverter>,
    _root: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(ConversionConfig::default()).await
    }

    pub async fn spawn_with(conversion: ConversionConfig) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp directory");
        let upload_dir = root.path().join("uploads");
        let public_dir = root.path().join("public");
        std::fs::create_dir_all(public_dir.join("css")).unwrap();
        std::fs::write(public_dir.join("index.html"), LANDING_HTML).unwrap();
        std::fs::write(public_dir.join("css").join("site.css"), "body{}").unwrap();

        let config = ConvertConfig {
            common: CoreConfig { port: 0 }, // Random port for testing
            workspace: WorkspaceConfig {
                upload_dir: upload_dir.clone(),
                public_dir,
            },
            conversion,
            telemetry: TelemetryConfig::default(),
        };

        let converter = Arc::new(FakeConverter::new());
        let app = Application::build_with_converter(config, converter.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            port,
            upload_dir,
            converter,
            _root: root,
        }
    }

    pub async fn convert(
        &self,
        file_name: &str,
        bytes: impl AsRef<[u8]>,
        to: Option<&str>,
    ) -> reqwest::Response {
        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes.as_ref().to_vec())
                .file_name(file_name.to_string())
                .mime_str("application/octet-stream")
                .unwrap(),
        );
        if let Some(to) = to {
            form = form.text("to", to.to_string());
        }
        self.post_form(form).await
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/convert", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn scratch_files(&self) -> Vec<String> {
        list_files(&self.upload_dir)
    }

    /// Scratch files go away when the response body is dropped on the
    /// server side, which can trail the client seeing the last byte.
    pub async fn wait_for_clean_workspace(&self) -> Vec<String> {
        for _ in 0..100 {
            let files = self.scratch_files();
            if files.is_empty() {
                return files;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.scratch_files()
    }
}

pub fn list_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
