//! Connected-component clustering of fragments into text blocks.
//!
//! A block is a coarser grouping than a reading-order line: it may span
//! several lines (a paragraph, or a label with its value underneath) and is
//! used for visual highlighting and click-to-select, never for persisted
//! ordering. Fragments are connected when they sit on the same line close
//! together, or stack vertically close enough to read as one paragraph;
//! connected components of that graph become blocks.

use crate::core::ClusterPolicy;
use crate::domain::{Fragment, TableCellInfo};
use crate::processors::line_sort::partition_lines;
use crate::processors::Rect;
use tracing::debug;

/// A visually coherent cluster of fragments.
///
/// Derived from the fragment list; recomputed whenever fragments or their
/// geometry change. Only the constituent fragment texts are ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Block index within one clustering pass.
    pub id: usize,
    /// Union of the member fragments' rectangles, image-pixel space.
    pub rect: Rect,
    /// Member fragment indices in reading order.
    pub member_indices: Vec<usize>,
    /// Member texts in reading order, sub-lines joined with newlines.
    pub text: String,
    /// Grid info propagated from the first member that carries any.
    pub table_cell: Option<TableCellInfo>,
}

/// Union-find over fragment indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression.
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Clusters fragments into text blocks.
///
/// Thresholds adapt to the document: the maximum horizontal gap is
/// `horizontal_gap_factor` times the mean fragment height, the maximum
/// vertical gap `vertical_gap_factor` times it. Two fragments connect when
/// EITHER
/// - same-line: vertical overlap exceeds `block_overlap_ratio` of the
///   smaller height AND the horizontal gap is under the horizontal
///   threshold, OR
/// - same-paragraph: horizontal overlap exceeds `block_overlap_ratio` of
///   the smaller width AND the vertical gap is under the vertical threshold.
///
/// The pass is O(n²) over fragment pairs. Documents are bounded by practical
/// OCR density (hundreds of fragments), so the quadratic pass is cheaper
/// than maintaining a spatial index; revisit only with profiling evidence.
pub fn cluster_blocks(fragments: &[Fragment], policy: &ClusterPolicy) -> Vec<TextBlock> {
    let positioned: Vec<(usize, Rect)> = fragments
        .iter()
        .enumerate()
        .filter_map(|(idx, f)| f.rect.map(|r| (idx, r)))
        .collect();
    if positioned.is_empty() {
        return Vec::new();
    }

    let height_sum: f32 = positioned.iter().map(|(_, r)| r.height()).sum();
    let mut avg_height = height_sum / positioned.len() as f32;
    if avg_height <= 0.0 {
        avg_height = policy.fallback_avg_height;
    }
    let threshold_x = policy.horizontal_gap_factor * avg_height;
    let threshold_y = policy.vertical_gap_factor * avg_height;
    debug!(
        avg_height,
        threshold_x, threshold_y, "clustering {} fragments", positioned.len()
    );

    let mut uf = UnionFind::new(positioned.len());
    for i in 0..positioned.len() {
        for j in (i + 1)..positioned.len() {
            let (_, a) = positioned[i];
            let (_, b) = positioned[j];
            if connected(&a, &b, policy, threshold_x, threshold_y) {
                uf.union(i, j);
            }
        }
    }

    // Group by component root, keeping first-seen order for stable block ids.
    let mut roots: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<(usize, Rect)>> = Vec::new();
    for (pos, &(idx, rect)) in positioned.iter().enumerate() {
        let root = uf.find(pos);
        match roots.iter().position(|&r| r == root) {
            Some(c) => components[c].push((idx, rect)),
            None => {
                roots.push(root);
                components.push(vec![(idx, rect)]);
            }
        }
    }

    components
        .into_iter()
        .enumerate()
        .map(|(id, members)| build_block(id, &members, fragments, policy))
        .collect()
}

/// Pairwise connectivity test between two fragment rectangles.
fn connected(a: &Rect, b: &Rect, policy: &ClusterPolicy, threshold_x: f32, threshold_y: f32) -> bool {
    let min_height = a.height().min(b.height());
    let same_line = a.vertical_overlap(b) > policy.block_overlap_ratio * min_height
        && a.horizontal_gap(b) < threshold_x;
    if same_line {
        return true;
    }
    let min_width = a.width().min(b.width());
    a.horizontal_overlap(b) > policy.block_overlap_ratio * min_width
        && a.vertical_gap(b) < threshold_y
}

/// Reduces one connected component to a block: reading-order members, union
/// rectangle, and newline-joined sub-line text.
fn build_block(
    id: usize,
    members: &[(usize, Rect)],
    fragments: &[Fragment],
    policy: &ClusterPolicy,
) -> TextBlock {
    let lines = partition_lines(members, policy.line_overlap_ratio);

    let mut member_indices = Vec::with_capacity(members.len());
    let mut line_texts = Vec::with_capacity(lines.len());
    for line in &lines {
        let mut words = Vec::with_capacity(line.len());
        for &(idx, _) in line {
            member_indices.push(idx);
            words.push(fragments[idx].text.as_str());
        }
        line_texts.push(words.join(" "));
    }

    let rect = members
        .iter()
        .skip(1)
        .fold(members[0].1, |acc, (_, r)| acc.union(r));
    let table_cell = member_indices
        .iter()
        .find_map(|&idx| fragments[idx].table_cell);

    TextBlock {
        id,
        rect,
        member_indices,
        text: line_texts.join("\n"),
        table_cell,
    }
}
