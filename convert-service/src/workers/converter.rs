use crate::models::TargetFormat;
use async_trait::async_trait;
use service_core::error::AppError;

/// An opaque document conversion engine: bytes in, bytes of the requested
/// format out. One call is one conversion; implementations own their own
/// time limits and temporary state.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    async fn convert(&self, input: Vec<u8>, format: &TargetFormat) -> Result<Vec<u8>, AppError>;
}
