use deptrack_core::PayloadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("zip container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("document xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("package is missing part {0}")]
    MissingPart(&'static str),
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// The data block required by the notification kind was not supplied.
    #[error("precondition violated: {0}")]
    Payload(#[from] PayloadError),
    #[error("writing document package: {0}")]
    Package(#[from] DocxError),
}
