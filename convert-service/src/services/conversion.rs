use crate::error::ConvertError;
use crate::models::{ConversionRequest, ConvertedFile};
use crate::services::metrics::record_conversion;
use crate::services::workspace::Workspace;
use crate::workers::{ConversionGate, Converter};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Drives one upload through the engine: read it back, wait for a slot,
/// convert, persist the result next to it.
#[derive(Clone)]
pub struct ConversionService {
    workspace: Workspace,
    converter: Arc<dyn Converter>,
    gate: ConversionGate,
}

impl ConversionService {
    pub fn new(workspace: Workspace, converter: Arc<dyn Converter>, gate: ConversionGate) -> Self {
        Self {
            workspace,
            converter,
            gate,
        }
    }

    pub fn gate(&self) -> &ConversionGate {
        &self.gate
    }

    pub async fn run(
        &self,
        request: ConversionRequest,
        id: &Uuid,
    ) -> Result<ConvertedFile, ConvertError> {
        let start = Instant::now();
        let format = request.target.clone();

        let result = self.convert(request, id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(ConvertError::Busy { .. }) => "rejected",
            Err(_) => "failure",
        };
        record_conversion(format.as_str(), outcome, start.elapsed());

        match &result {
            Ok(converted) => tracing::info!(
                conversion_id = %id,
                format = %format,
                output_size = converted.size,
                duration_ms = start.elapsed().as_millis(),
                "Conversion succeeded"
            ),
            Err(e) => tracing::warn!(
                conversion_id = %id,
                format = %format,
                error = %e,
                duration_ms = start.elapsed().as_millis(),
                "Conversion did not complete"
            ),
        }

        result
    }

    async fn convert(
        &self,
        request: ConversionRequest,
        id: &Uuid,
    ) -> Result<ConvertedFile, ConvertError> {
        let ConversionRequest { source, target } = request;

        // Admission comes first so queued requests hold no upload in memory.
        let permit = self.gate.admit().await.map_err(|e| ConvertError::Busy {
            retry_after_secs: e.waited_secs.max(1),
        })?;

        let input = tokio::fs::read(source.file.path())
            .await
            .with_context(|| format!("Failed to read upload {}", source.file.path().display()))?;

        tracing::debug!(
            conversion_id = %id,
            engine = self.converter.name(),
            input_size = input.len(),
            "Conversion slot acquired"
        );

        let output = self.converter.convert(input, &target).await?;
        drop(permit);

        let file = self.workspace.output_slot(id, &target);
        tokio::fs::write(file.path(), &output)
            .await
            .with_context(|| format!("Failed to write output {}", file.path().display()))?;

        // The upload is no longer needed once the result is on disk.
        source.file.remove().await;

        Ok(ConvertedFile {
            file,
            format: target,
            size: output.len() as u64,
        })
    }
}
