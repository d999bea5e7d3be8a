//! Spatial processing algorithms.
//!
//! This module provides the geometry primitives and the clustering passes run
//! over detection output: reading-order line sorting, connected-component
//! block clustering, and viewport coordinate mapping.

pub mod block_cluster;
pub mod geometry;
pub mod line_sort;
pub mod viewport;

pub use block_cluster::{cluster_blocks, TextBlock};
pub use geometry::{Point, Rect};
pub use line_sort::sort_reading_order;
pub use viewport::{Calibration, Viewport, MAX_ZOOM, MIN_ZOOM};
