//! Data model for the extraction pipeline.
//!
//! This module contains the core entities the pipeline operates on:
//! - [`Fragment`]: one OCR-recognized text unit with geometry
//! - [`RawRegion`]: the detection engine's wire format
//! - [`FieldSchema`] / [`Binding`]: user-authored output schema and its
//!   association to source regions
//! - [`Record`]: one candidate row for the target table

pub mod fragment;
pub mod record;
pub mod region;
pub mod schema;

pub use fragment::{Fragment, TableCellInfo};
pub use record::Record;
pub use region::{fragments_from_regions, RawRegion};
pub use schema::{Binding, FieldSchema, SqlType};
