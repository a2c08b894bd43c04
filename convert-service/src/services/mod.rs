pub mod conversion;
pub mod metrics;
pub mod workspace;

pub use conversion::ConversionService;
pub use self::metrics::{get_metrics, init_metrics};
pub use workspace::{source_extension, ScratchFile, Workspace};
