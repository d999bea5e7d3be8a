//! Spatial clustering and field binding for OCR'd certification documents.
//!
//! The crate turns raw detection output (text regions with polygons or
//! bounding boxes) into structured database records:
//!
//! 1. [`domain::fragments_from_regions`] normalizes engine output into
//!    [`domain::Fragment`]s in pixel space.
//! 2. [`processors::sort_reading_order`] orders fragments the way a human
//!    reads the page, and [`processors::cluster_blocks`] groups them into
//!    visual blocks.
//! 3. [`editor::OrderingEditor`] lets a user correct the machine ordering
//!    with full undo/redo.
//! 4. [`binding`] maps fragments onto a user-authored [`domain::FieldSchema`]
//!    list, producing [`domain::Record`]s in single-document or table mode.
//! 5. [`store::RecordStore`] persists records to SQLite with per-record
//!    source provenance.
//!
//! [`pipeline`] ties the stages together for interactive and batch use.
//!
//! # Example
//!
//! ```no_run
//! use certbind::core::ClusterPolicy;
//! use certbind::pipeline::{DocumentProcessor, DetectionOutput};
//!
//! let processor = DocumentProcessor::with_policy(ClusterPolicy::default());
//! let output = DetectionOutput { regions: Vec::new(), image_size: (800, 600) };
//! let processed = processor.process(&output);
//! assert!(processed.fragments.is_empty());
//! ```

pub mod binding;
pub mod core;
pub mod domain;
pub mod editor;
pub mod pipeline;
pub mod processors;
pub mod store;
pub mod templates;
pub mod utils;

pub use binding::{apply_schema, extract_single, extract_table, PkStrategy};
pub use crate::core::{ClusterPolicy, ExtractError, ExtractResult};
pub use domain::{Binding, FieldSchema, Fragment, RawRegion, Record, SqlType};
pub use editor::OrderingEditor;
pub use pipeline::{
    BatchImporter, BatchSummary, DetectionEngine, DetectionOutput, DocumentProcessor, ImportMode,
    OcrDispatcher, ProcessedDocument, ProcessedRegistry,
};
pub use processors::{cluster_blocks, sort_reading_order, Rect, TextBlock, Viewport};
pub use store::{ImportSummary, RecordStore};
pub use templates::SchemaTemplates;
