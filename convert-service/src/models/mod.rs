pub mod conversion;

pub use conversion::{
    ConversionRequest, ConvertedFile, FormatError, TargetFormat, UploadedFile, MAX_FORMAT_LEN,
};
