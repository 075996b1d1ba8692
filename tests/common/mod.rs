//! Common test utilities and helpers.
//!
//! - `fakes`: in-memory renderer, OCR engine and document writer
//! - `fixtures`: printpdf builders for real test documents
//! - `pdf_helpers`: inspecting produced PDFs

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod pdf_helpers;

pub use fakes::*;
pub use fixtures::*;
pub use pdf_helpers::*;
