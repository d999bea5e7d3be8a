//! Shared configuration types for the clustering pipeline.

use serde::{Deserialize, Serialize};

/// Thresholds driving line grouping and block clustering.
///
/// The defaults are empirically tuned against scanned certification
/// documents and are load-bearing for behavioral compatibility: changing
/// them without a labeled regression corpus will silently alter grouping.
/// They are configuration rather than constants so operators can tune them
/// per document class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterPolicy {
    /// Minimum vertical overlap, as a fraction of the smaller height, for a
    /// fragment to join the current reading-order line.
    /// Default: 0.4
    #[serde(default = "ClusterPolicy::default_line_overlap_ratio")]
    pub line_overlap_ratio: f32,

    /// Minimum vertical (same-line test) or horizontal (same-paragraph test)
    /// overlap, as a fraction of the smaller dimension, for two fragments to
    /// join the same block.
    /// Default: 0.5
    #[serde(default = "ClusterPolicy::default_block_overlap_ratio")]
    pub block_overlap_ratio: f32,

    /// Maximum horizontal gap between same-line fragments, as a multiple of
    /// the document's average fragment height.
    /// Default: 1.5
    #[serde(default = "ClusterPolicy::default_horizontal_gap_factor")]
    pub horizontal_gap_factor: f32,

    /// Maximum vertical gap between same-paragraph fragments, as a multiple
    /// of the document's average fragment height.
    /// Default: 0.8
    #[serde(default = "ClusterPolicy::default_vertical_gap_factor")]
    pub vertical_gap_factor: f32,

    /// Average fragment height (pixels) assumed when the document has no
    /// measurable fragment heights.
    /// Default: 20.0
    #[serde(default = "ClusterPolicy::default_fallback_avg_height")]
    pub fallback_avg_height: f32,
}

impl ClusterPolicy {
    /// Creates a policy with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    fn default_line_overlap_ratio() -> f32 {
        0.4
    }

    fn default_block_overlap_ratio() -> f32 {
        0.5
    }

    fn default_horizontal_gap_factor() -> f32 {
        1.5
    }

    fn default_vertical_gap_factor() -> f32 {
        0.8
    }

    fn default_fallback_avg_height() -> f32 {
        20.0
    }
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        Self {
            line_overlap_ratio: Self::default_line_overlap_ratio(),
            block_overlap_ratio: Self::default_block_overlap_ratio(),
            horizontal_gap_factor: Self::default_horizontal_gap_factor(),
            vertical_gap_factor: Self::default_vertical_gap_factor(),
            fallback_avg_height: Self::default_fallback_avg_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_partial_deserialization() {
        let policy: ClusterPolicy = serde_json::from_str(r#"{"line_overlap_ratio": 0.6}"#).unwrap();
        assert_eq!(policy.line_overlap_ratio, 0.6);
        assert_eq!(policy.block_overlap_ratio, 0.5);
        assert_eq!(policy.horizontal_gap_factor, 1.5);
        assert_eq!(policy.vertical_gap_factor, 0.8);
        assert_eq!(policy.fallback_avg_height, 20.0);
    }
}
