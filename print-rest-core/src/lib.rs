#![doc = "print-rest-core: document assembly and PDF post-processing for print-rest."]

//! This crate holds every piece of print-rest that is not HTTP or process
//! glue: the template registry and asset resolver, request decoding and the
//! document builder, the conversion orchestrator with its rendering-backend
//! adapters, and the PDF post-processor (merge, page ranges, encryption).
//!
//! # Usage
//! Build a [`pipeline::PrintService`] once at startup and share it with
//! every request handler.

pub mod access;
pub mod builder;
pub mod config;
pub mod contract;
pub mod engines;
pub mod error;
pub mod fetch;
pub mod pdf;
pub mod pipeline;
pub mod printer;
pub mod qr;
pub mod registry;
pub mod report;
pub mod request;
pub mod template;
pub mod workspace;

pub use error::PrintError;
pub use pipeline::{PrintService, PrintedDocument};
pub use qr::generate_qrcode;
pub use registry::TemplateRegistry;
pub use template::{FileItem, Template};
