//! Catalog domain: model designs published by the factory.
//!
//! Publishing a model writes a `CatalogEntry` to the table and broadcasts
//! the `Prospect` on the model-design topic. The prospect generator consumes
//! those events and renders a prospect sheet into the object store.

mod generator;
mod service;

use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::PublishError;
use crate::error::{Classify, ErrorKind};
use crate::store::{Record, StoreError};

const SHEET_WIDTH_MM: f32 = 247.0;
const SHEET_HEIGHT_MM: f32 = 210.0;
const SHEET_FONT_SIZE: f32 = 24.0;

/// Partition holding catalog entries.
pub const CATALOG_PARTITION: &str = "catalog";

/// A model design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    pub name: String,
    pub model: String,
}

impl Prospect {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }

    /// Names and models must be non-empty and usable in an object key.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [("name", &self.name), ("model", &self.model)] {
            if value.trim().is_empty() {
                return Err(format!("{field} must not be empty"));
            }
            if value.contains('/') {
                return Err(format!("{field} must not contain '/'"));
            }
        }
        Ok(())
    }

    /// Object key of the rendered prospect sheet.
    pub fn document_key(&self) -> String {
        format!("prospect/{}-{}.pdf", self.name, self.model)
    }

    /// Render the prospect sheet as a single landscape PDF page.
    pub fn render_sheet(&self) -> Result<Vec<u8>, printpdf::Error> {
        let (doc, page, layer) = PdfDocument::new(
            format!("PROSPECT: {}", self.name),
            Mm(SHEET_WIDTH_MM),
            Mm(SHEET_HEIGHT_MM),
            "INTRO".to_string(),
        );
        let font = doc.add_builtin_font(BuiltinFont::Courier)?;
        let layer = doc.get_page(page).get_layer(layer);

        let lines = [
            ("PROSPECT".to_string(), 70.0),
            ("-".repeat(48), 60.0),
            (format!("BIKE:         {}", self.name), 30.0),
            (format!("MODEL:    {}", self.model), 20.0),
        ];
        for (text, y) in lines {
            layer.use_text(text, SHEET_FONT_SIZE, Mm(20.0), Mm(y), &font);
        }

        doc.save_to_bytes()
    }
}

/// Catalog row keyed by model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub model: String,
}

impl From<&Prospect> for CatalogEntry {
    fn from(prospect: &Prospect) -> Self {
        Self {
            name: prospect.name.clone(),
            model: prospect.model.clone(),
        }
    }
}

impl Record for CatalogEntry {
    const PARTITION: &'static str = CATALOG_PARTITION;

    fn sort_key(&self) -> String {
        self.name.clone()
    }
}

/// Errors from the model-publish entry point.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("rejected: {0}")]
    Invalid(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

impl Classify for CatalogError {
    fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Decode(_) | CatalogError::Invalid(_) => ErrorKind::PoisonMessage,
            CatalogError::Store(e) => e.kind(),
            CatalogError::Publish(e) => e.kind(),
        }
    }
}

impl CatalogError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::Decode(_) => 400,
            CatalogError::Invalid(_) => 422,
            CatalogError::Store(_) | CatalogError::Publish(_) if self.kind().is_retryable() => 503,
            CatalogError::Store(_) | CatalogError::Publish(_) => 500,
        }
    }
}

pub use generator::ProspectGenerator;
pub use service::{CatalogService, PublishReceipt};
