mod converter;
mod executor;
mod gate;
mod libreoffice;

pub use converter::Converter;
pub use executor::CommandExecutor;
pub use gate::{ConversionGate, GatePermit, Saturated};
pub use libreoffice::LibreOfficeConverter;
