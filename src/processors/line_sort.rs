//! Reading-order reconstruction from raw fragment geometry.
//!
//! Produces the total order a human would read the document in: top line
//! before bottom line, left before right within a line. Line membership is
//! decided by vertical-extent overlap rather than center distance so that
//! fragments with very different font sizes on one baseline (a chapter
//! number next to a title) still land on the same line.

use crate::core::ClusterPolicy;
use crate::domain::Fragment;
use crate::processors::Rect;

/// Groups positioned items into reading-order lines.
///
/// Items are seed-sorted by top edge, then walked greedily: an item joins
/// the current line when its vertical extent overlaps the line anchor's by
/// more than `overlap_ratio` of the smaller of the two heights. The anchor
/// is the first member added to the line, not necessarily its topmost.
/// Each returned line is sorted by left edge.
pub(crate) fn partition_lines<T: Copy>(
    items: &[(T, Rect)],
    overlap_ratio: f32,
) -> Vec<Vec<(T, Rect)>> {
    let mut seeded: Vec<(T, Rect)> = items.to_vec();
    seeded.sort_by(|a, b| {
        a.1.y1
            .partial_cmp(&b.1.y1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines: Vec<Vec<(T, Rect)>> = Vec::new();
    let mut current: Vec<(T, Rect)> = Vec::new();
    for (item, rect) in seeded {
        match current.first() {
            None => current.push((item, rect)),
            Some((_, anchor)) => {
                let overlap = anchor.vertical_overlap(&rect);
                let min_height = anchor.height().min(rect.height());
                if overlap > overlap_ratio * min_height {
                    current.push((item, rect));
                } else {
                    lines.push(std::mem::take(&mut current));
                    current.push((item, rect));
                }
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    for line in &mut lines {
        line.sort_by(|a, b| {
            a.1.x1
                .partial_cmp(&b.1.x1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    lines
}

/// Sorts fragments into reading order and tags each with its line index.
///
/// Fragments without geometry are routed through unchanged after all
/// positioned fragments, with no line index. The function is pure and
/// idempotent: sorting an already-sorted list is a fixed point.
pub fn sort_reading_order(fragments: &[Fragment], policy: &ClusterPolicy) -> Vec<Fragment> {
    let positioned: Vec<(usize, Rect)> = fragments
        .iter()
        .enumerate()
        .filter_map(|(idx, f)| f.rect.map(|r| (idx, r)))
        .collect();

    let lines = partition_lines(&positioned, policy.line_overlap_ratio);

    let mut sorted = Vec::with_capacity(fragments.len());
    for (line_index, line) in lines.into_iter().enumerate() {
        for (idx, _) in line {
            let mut fragment = fragments[idx].clone();
            fragment.line_index = Some(line_index);
            sorted.push(fragment);
        }
    }
    sorted.extend(fragments.iter().filter(|f| f.rect.is_none()).cloned());
    sorted
}
