//! PDF post-processing: page selection and merging, image pages, encryption.

pub mod encrypt;
pub mod image_page;
pub mod merge;
pub mod page_range;

pub use encrypt::{encrypt_pdf, owner_password};
pub use image_page::image_to_pdf;
pub use merge::{load_pdf, merge_pdfs, PdfMerger};
pub use page_range::{PageRange, PageRangeError};

pub const PDF_MAGIC: &[u8] = b"%PDF-";
pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
