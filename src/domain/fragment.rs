//! Fragment: one OCR-recognized text unit with geometry.

use crate::processors::Rect;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Logical grid position of a fragment that originated from a recognized
/// tabular region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableCellInfo {
    /// Zero-based row index in the recognized table grid.
    pub row: u32,
    /// Zero-based column index in the recognized table grid.
    pub col: u32,
    /// Number of rows this cell spans.
    #[serde(default = "default_span")]
    pub rowspan: u32,
    /// Number of columns this cell spans.
    #[serde(default = "default_span")]
    pub colspan: u32,
    /// Whether the cell belongs to a header row.
    #[serde(default)]
    pub is_header: bool,
}

fn default_span() -> u32 {
    1
}

/// One OCR-recognized text unit.
///
/// Fragments are created in bulk when a document is processed, mutated only
/// through the ordering editor, and dropped when the editing session for the
/// document ends. A fragment without a rectangle is permitted only when it is
/// a user-inserted placeholder (`is_empty`).
///
/// Detection engines attach arbitrary extra keys to regions; those are kept
/// in an explicit `extras` map instead of widening the core contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fragment {
    /// The recognized text.
    pub text: String,
    /// Bounding rectangle in source-image pixel space, `None` only for
    /// placeholders.
    pub rect: Option<Rect>,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    /// True for user-inserted placeholders with no OCR backing.
    #[serde(default)]
    pub is_empty: bool,
    /// Index of the reading-order line this fragment was grouped into.
    /// Assigned by the line sorter; `None` before sorting.
    #[serde(default)]
    pub line_index: Option<usize>,
    /// Grid position when the fragment originated from a tabular region.
    #[serde(default)]
    pub table_cell: Option<TableCellInfo>,
    /// Engine-specific extension keys carried through the pipeline untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Fragment {
    /// Creates a recognized fragment from text, geometry, and confidence.
    pub fn new(text: impl Into<String>, rect: Rect, confidence: f32) -> Self {
        Self {
            text: text.into(),
            rect: Some(rect),
            confidence,
            is_empty: false,
            line_index: None,
            table_cell: None,
            extras: Map::new(),
        }
    }

    /// Creates a user-inserted placeholder with no OCR backing.
    pub fn placeholder() -> Self {
        Self {
            text: String::new(),
            rect: None,
            confidence: 0.0,
            is_empty: true,
            line_index: None,
            table_cell: None,
            extras: Map::new(),
        }
    }

    /// Attaches table grid information to the fragment.
    pub fn with_table_cell(mut self, cell: TableCellInfo) -> Self {
        self.table_cell = Some(cell);
        self
    }
}
