use crate::models::TargetFormat;
use crate::workers::converter::Converter;
use crate::workers::executor::CommandExecutor;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use url::Url;

const SOURCE_NAME: &str = "source";

/// The engine can exit before its output is fully on disk; poll for it a
/// few times (about three attempts, 200ms apart) before giving up.
const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const OUTPUT_POLL_WINDOW: Duration = Duration::from_millis(500);

/// Headless LibreOffice (`soffice --convert-to`).
///
/// Every call gets a private directory holding the input, the output and a
/// throwaway user profile, so concurrent calls never share engine state.
/// The directory is removed when the call returns, whatever the outcome.
pub struct LibreOfficeConverter {
    binary: String,
    executor: CommandExecutor,
}

impl LibreOfficeConverter {
    pub fn new(binary: impl Into<String>, executor: CommandExecutor) -> Self {
        Self {
            binary: binary.into(),
            executor,
        }
    }

    fn output_backoff() -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(OUTPUT_POLL_INTERVAL)
            .with_multiplier(1.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(Some(OUTPUT_POLL_WINDOW))
            .build()
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    fn name(&self) -> &str {
        "libreoffice"
    }

    async fn convert(&self, input: Vec<u8>, format: &TargetFormat) -> Result<Vec<u8>, AppError> {
        let work_dir = tempfile::Builder::new()
            .prefix("convert-")
            .tempdir()
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to create engine directory: {}", e))
            })?;

        let source = work_dir.path().join(SOURCE_NAME);
        let profile = work_dir.path().join("profile");
        tokio::fs::write(&source, &input).await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to stage engine input: {}", e))
        })?;

        let profile_arg = format!("-env:UserInstallation={}", profile_url(&profile)?);
        let out_dir = work_dir.path().to_string_lossy().into_owned();
        let source_arg = source.to_string_lossy().into_owned();

        tracing::info!(
            engine = self.name(),
            format = %format,
            input_size = input.len(),
            "Starting engine"
        );

        self.executor
            .execute(
                &self.binary,
                &[
                    profile_arg.as_str(),
                    "--headless",
                    "--convert-to",
                    format.as_str(),
                    "--outdir",
                    out_dir.as_str(),
                    source_arg.as_str(),
                ],
                None,
            )
            .await?;

        let output_path = work_dir.path().join(format!("{}.{}", SOURCE_NAME, format));
        let data = read_output(&output_path).await?;

        tracing::info!(
            engine = self.name(),
            format = %format,
            output_size = data.len(),
            "Engine finished"
        );

        Ok(data)
    }
}

/// `file://` URL for the engine profile directory, percent-encoded.
fn profile_url(dir: &Path) -> Result<Url, AppError> {
    Url::from_directory_path(dir).map_err(|_| {
        AppError::InternalError(anyhow::anyhow!(
            "Profile directory {} is not an absolute path",
            dir.display()
        ))
    })
}

async fn read_output(path: &Path) -> Result<Vec<u8>, AppError> {
    retry(LibreOfficeConverter::output_backoff(), || async move {
        tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
    .map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "Engine produced no output at {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Stand-in for `soffice` that checks the argument layout and "converts"
    /// by copying the source next to it under the requested extension.
    const FAKE_SOFFICE: &str = r#"#!/bin/sh
case "$1" in -env:UserInstallation=file://*) ;; *) echo "bad profile arg: $1" >&2; exit 2 ;; esac
[ "$2" = "--headless" ] || { echo "not headless" >&2; exit 2; }
[ "$3" = "--convert-to" ] || exit 2
[ "$5" = "--outdir" ] || exit 2
cp "$7" "$6/source.$4"
"#;

    /// Mimics the engine exiting cleanly without writing anything, which is
    /// what soffice does for input it cannot load.
    const SILENT_SOFFICE: &str = "#!/bin/sh\nexit 0\n";

    fn install_script(dir: &Path, body: &str) -> String {
        let path = dir.join("soffice");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn profile_url_escapes_awkward_paths() {
        let url = profile_url(Path::new("/tmp/my docs/100%/profile")).unwrap();
        assert_eq!(url.as_str(), "file:///tmp/my%20docs/100%25/profile/");
    }

    #[test]
    fn relative_profile_paths_are_rejected() {
        assert!(profile_url(Path::new("profile")).is_err());
    }

    #[tokio::test]
    async fn returns_the_engine_output() {
        let bin_dir = tempfile::tempdir().unwrap();
        let converter = LibreOfficeConverter::new(
            install_script(bin_dir.path(), FAKE_SOFFICE),
            CommandExecutor::new(Duration::from_secs(10)),
        );

        let output = converter
            .convert(b"hello".to_vec(), &TargetFormat::new("docx").unwrap())
            .await
            .unwrap();

        assert_eq!(output, b"hello");
    }

    #[tokio::test]
    async fn missing_output_is_a_failure() {
        let bin_dir = tempfile::tempdir().unwrap();
        let converter = LibreOfficeConverter::new(
            install_script(bin_dir.path(), SILENT_SOFFICE),
            CommandExecutor::new(Duration::from_secs(10)),
        );

        let err = converter
            .convert(b"garbage".to_vec(), &TargetFormat::new("pdf").unwrap())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no output"));
    }

    #[tokio::test]
    async fn missing_engine_is_a_failure() {
        let converter = LibreOfficeConverter::new(
            "/nonexistent/soffice",
            CommandExecutor::new(Duration::from_secs(10)),
        );

        assert!(converter
            .convert(b"x".to_vec(), &TargetFormat::new("pdf").unwrap())
            .await
            .is_err());
    }
}
