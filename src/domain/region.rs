//! Wire format for detection/recognition engine output.
//!
//! The engine is an external collaborator: per image it returns a list of
//! regions carrying either a polygon (`coordinates`) or an axis-aligned box
//! (`box`), plus recognized text and a confidence score. This module
//! deserializes that contract and converts regions into [`Fragment`]s,
//! normalizing coordinates to absolute pixels before anything is clustered.

use crate::domain::{Fragment, TableCellInfo};
use crate::processors::Rect;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Coordinates below this bound are treated as normalized `[0, 1]` values
/// when the image is wider than [`MIN_PIXEL_IMAGE_WIDTH`].
const NORMALIZED_COORD_BOUND: f32 = 1.5;

/// Minimum image width (pixels) for the normalized-coordinate heuristic to
/// apply; tiny images legitimately produce small pixel coordinates.
const MIN_PIXEL_IMAGE_WIDTH: u32 = 100;

/// One region as produced by the detection/recognition engine.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRegion {
    /// Polygon coordinates, if the detector returned a polygon.
    #[serde(default)]
    pub coordinates: Option<Vec<[f32; 2]>>,
    /// Axis-aligned box, if the detector returned one directly.
    #[serde(default, rename = "box")]
    pub bbox: Option<[f32; 4]>,
    /// The recognized text.
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    /// Grid position when the region came from a recognized table.
    #[serde(default)]
    pub table_info: Option<TableCellInfo>,
    /// Any extra keys the engine attached to the region.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl RawRegion {
    /// Derives the region's bounding rectangle, preferring the polygon.
    fn rect(&self) -> Option<Rect> {
        if let Some(ref poly) = self.coordinates {
            return Rect::from_polygon(poly);
        }
        self.bbox.and_then(|b| {
            if b.iter().any(|v| !v.is_finite()) {
                None
            } else {
                Some(Rect::new(b[0], b[1], b[2], b[3]))
            }
        })
    }
}

/// Converts engine regions into fragments in absolute pixel space.
///
/// Regions without usable geometry are dropped with a warning; geometry
/// problems are recovered locally and never abort the document. If every
/// coordinate in the document fits inside `[0, 1.5]` while the image is
/// wider than 100 px, the coordinates are taken as normalized and scaled by
/// the image dimensions.
pub fn fragments_from_regions(regions: &[RawRegion], image_size: (u32, u32)) -> Vec<Fragment> {
    let (img_w, img_h) = image_size;

    let mut rects = Vec::with_capacity(regions.len());
    let mut max_coord = f32::NEG_INFINITY;
    for (idx, region) in regions.iter().enumerate() {
        let rect = region.rect();
        match rect {
            Some(r) => max_coord = max_coord.max(r.x2).max(r.y2),
            None => warn!(
                region = idx,
                text = %region.text,
                "dropping region without usable geometry"
            ),
        }
        rects.push(rect);
    }

    let normalized = max_coord.is_finite()
        && max_coord <= NORMALIZED_COORD_BOUND
        && img_w > MIN_PIXEL_IMAGE_WIDTH;

    regions
        .iter()
        .zip(rects)
        .filter_map(|(region, rect)| {
            let mut rect = rect?;
            if normalized {
                rect = rect.scale(img_w as f32, img_h as f32);
            }
            let mut fragment = Fragment::new(region.text.clone(), rect, region.confidence);
            fragment.table_cell = region.table_info;
            fragment.extras = region.extras.clone();
            Some(fragment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_json(body: &str) -> RawRegion {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_polygon_reduces_to_bounding_box() {
        let r = region_json(
            r#"{"coordinates": [[10,10],[100,12],[98,30],[12,28]], "text": "张三", "confidence": 0.99}"#,
        );
        let frags = fragments_from_regions(&[r], (800, 600));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].rect, Some(Rect::new(10.0, 10.0, 100.0, 30.0)));
        assert_eq!(frags[0].text, "张三");
    }

    #[test]
    fn test_normalized_coordinates_scale_to_pixels() {
        let r = region_json(r#"{"box": [0.1, 0.1, 0.5, 0.2], "text": "a", "confidence": 1.0}"#);
        let frags = fragments_from_regions(&[r], (1000, 500));
        assert_eq!(frags[0].rect, Some(Rect::new(100.0, 50.0, 500.0, 100.0)));
    }

    #[test]
    fn test_small_pixel_coordinates_not_mistaken_for_normalized() {
        // Image narrower than the heuristic floor: coordinates stay as-is.
        let r = region_json(r#"{"box": [0.5, 0.5, 1.0, 1.0], "text": "a", "confidence": 1.0}"#);
        let frags = fragments_from_regions(&[r], (64, 64));
        assert_eq!(frags[0].rect, Some(Rect::new(0.5, 0.5, 1.0, 1.0)));
    }

    #[test]
    fn test_region_without_geometry_is_dropped() {
        let good = region_json(r#"{"box": [10, 10, 50, 30], "text": "kept", "confidence": 0.9}"#);
        let bad = region_json(r#"{"text": "no geometry", "confidence": 0.9}"#);
        let frags = fragments_from_regions(&[bad, good], (800, 600));
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].text, "kept");
    }

    #[test]
    fn test_table_info_and_extras_carry_through() {
        let r = region_json(
            r#"{"box": [0, 0, 10, 10], "text": "cell", "confidence": 0.8,
                "table_info": {"row": 2, "col": 3, "rowspan": 1, "colspan": 1, "is_header": false},
                "engine_tag": "v3"}"#,
        );
        let frags = fragments_from_regions(&[r], (800, 600));
        let cell = frags[0].table_cell.unwrap();
        assert_eq!((cell.row, cell.col), (2, 3));
        assert_eq!(frags[0].extras.get("engine_tag").unwrap(), "v3");
    }
}
