use crate::error::ConvertError;
use crate::models::{ConversionRequest, ConvertedFile, TargetFormat, UploadedFile};
use crate::services::workspace::{source_extension, ScratchFile, Workspace};
use crate::startup::AppState;
use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use futures::Stream;
use service_core::middleware::RequestId;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

pub const FILE_FIELD: &str = "file";
pub const FORMAT_FIELD: &str = "to";

#[derive(Debug, Default)]
struct ConvertForm {
    file: Option<UploadedFile>,
    to: Option<String>,
}

/// `POST /convert`: multipart `file` plus optional `to`, answered with the
/// converted file as an attachment.
pub async fn convert_document(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ConvertError> {
    let id = Uuid::new_v4();
    let request_id = request_id
        .map(|Extension(r)| r.0)
        .unwrap_or_else(|| id.to_string());

    // A body that is not multipart at all carries no file either.
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(request_id = %request_id, error = %rejection, "Not a multipart request");
        ConvertError::NoFile
    })?;

    let form = read_form(&state.workspace, &id, multipart).await?;
    let upload = form.file.ok_or(ConvertError::NoFile)?;
    let target = TargetFormat::resolve(form.to.as_deref(), &state.default_format)?;

    tracing::info!(
        request_id = %request_id,
        conversion_id = %id,
        input = %upload.file.path().display(),
        original_name = upload.original_name.as_deref().unwrap_or("-"),
        input_size = upload.size,
        format = %target,
        "Converting"
    );

    let converted = state
        .conversions
        .run(
            ConversionRequest {
                source: upload,
                target,
            },
            &id,
        )
        .await?;

    download_response(converted, request_id).await
}

async fn read_form(
    workspace: &Workspace,
    id: &Uuid,
    mut multipart: Multipart,
) -> Result<ConvertForm, ConvertError> {
    let mut form = ConvertForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        let is_file = field.file_name().is_some();

        match name.as_deref() {
            Some(FILE_FIELD) if is_file && form.file.is_none() => {
                form.file = Some(persist_upload(workspace, id, field).await?);
            }
            Some(FORMAT_FIELD) if !is_file => {
                form.to = Some(field.text().await?);
            }
            _ => {
                // Unknown parts, repeated files and a `file` sent as plain
                // text are skipped.
                while field.chunk().await?.is_some() {}
            }
        }
    }

    Ok(form)
}

/// Stream one file part to its scratch slot chunk by chunk.
async fn persist_upload(
    workspace: &Workspace,
    id: &Uuid,
    mut field: Field<'_>,
) -> Result<UploadedFile, ConvertError> {
    let original_name = field.file_name().map(str::to_string);
    let file = workspace.upload_slot(id, &source_extension(original_name.as_deref()));

    let mut out = tokio::fs::File::create(file.path())
        .await
        .with_context(|| format!("Failed to create {}", file.path().display()))?;

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        out.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", file.path().display()))?;
        size += chunk.len() as u64;
    }
    out.flush()
        .await
        .with_context(|| format!("Failed to flush {}", file.path().display()))?;

    Ok(UploadedFile {
        original_name,
        file,
        size,
    })
}

async fn download_response(
    converted: ConvertedFile,
    request_id: String,
) -> Result<Response, ConvertError> {
    let name = converted.download_name();
    let ConvertedFile { file, format, size } = converted;

    let handle = tokio::fs::File::open(file.path())
        .await
        .with_context(|| format!("Failed to open {}", file.path().display()))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .context("Output name is not a valid header value")?;

    let body = DownloadBody {
        inner: ReaderStream::new(handle),
        file,
        request_id,
        sent: 0,
        expected: size,
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Response body that owns the converted file. Once the body is dropped
/// (sent in full, failed, or abandoned by the client) the file goes too.
struct DownloadBody {
    inner: ReaderStream<tokio::fs::File>,
    file: ScratchFile,
    request_id: String,
    sent: u64,
    expected: u64,
}

impl Stream for DownloadBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!(
                    request_id = %this.request_id,
                    path = %this.file.path().display(),
                    error = %e,
                    "Error sending file"
                );
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Drop for DownloadBody {
    fn drop(&mut self) {
        if self.sent < self.expected {
            tracing::warn!(
                request_id = %self.request_id,
                sent = self.sent,
                expected = self.expected,
                "Download ended before the whole file was sent"
            );
        } else {
            tracing::debug!(
                request_id = %self.request_id,
                sent = self.sent,
                "Download completed"
            );
        }
    }
}
