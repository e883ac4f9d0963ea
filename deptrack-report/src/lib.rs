//! deptrack-report: renders notification reports into paginated `.docx` packages.

pub mod branding;
pub mod document;
pub mod docx;
pub mod error;
pub mod render;

pub use branding::{load_branding, BrandingImage, ImageFormat};
pub use document::{Block, Document, Paragraph, Run};
pub use docx::{read_paragraphs, write_docx};
pub use error::{DocxError, RenderError};
pub use render::{
    attachment_name, build_document, overdue_banner, render, render_request, RenderContext,
    RenderedDocument,
};
