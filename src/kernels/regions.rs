//! Connected-component (region group) labeling.
//!
//! Cells belong to the same region when they hold the same value and touch
//! under the chosen connectivity (rook or queen). Zero cells and null
//! cells are background. Labels are numbered consecutively from 1,
//! grouped by cell value in ascending order, with regions of equal value
//! ordered by scan position, so the numbering is deterministic and
//! independent of how many values are present.

use num_traits::AsPrimitive;

use crate::traits::RasterElement;

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            // Path halving.
            self.parent[x as usize] = self.parent[self.parent[x as usize] as usize];
            x = self.parent[x as usize];
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Smaller index wins so roots stay in scan order.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Labels the regions of one band.
///
/// `unique_values`, when given, restricts labeling to cells holding one of
/// the listed values; everything else is background.
pub fn label_regions<T: RasterElement>(
    data: &[T],
    mask: Option<&[u8]>,
    rows: usize,
    cols: usize,
    eight_connected: bool,
    unique_values: Option<&[f64]>,
) -> Vec<u64> {
    debug_assert_eq!(data.len(), rows * cols);

    let foreground = |idx: usize| -> Option<f64> {
        if mask.map(|m| m[idx] != 0).unwrap_or(false) {
            return None;
        }
        let v: f64 = data[idx].as_();
        if v.is_nan() || v == 0.0 {
            return None;
        }
        if let Some(allowed) = unique_values {
            if !allowed.contains(&v) {
                return None;
            }
        }
        Some(v)
    };

    let mut uf = UnionFind::new(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let idx = r * cols + c;
            let Some(v) = foreground(idx) else { continue };
            // Connect to already-visited neighbors holding the same value.
            if c > 0 && foreground(idx - 1) == Some(v) {
                uf.union(idx as u32, (idx - 1) as u32);
            }
            if r > 0 {
                let up = idx - cols;
                if foreground(up) == Some(v) {
                    uf.union(idx as u32, up as u32);
                }
                if eight_connected {
                    if c > 0 && foreground(up - 1) == Some(v) {
                        uf.union(idx as u32, (up - 1) as u32);
                    }
                    if c + 1 < cols && foreground(up + 1) == Some(v) {
                        uf.union(idx as u32, (up + 1) as u32);
                    }
                }
            }
        }
    }

    // Collect roots with (value, first scan index), then number them so
    // labels group by ascending value and scan order within a value.
    let mut components: Vec<(f64, u32)> = Vec::new();
    let mut root_of: Vec<u32> = vec![u32::MAX; rows * cols];
    for idx in 0..rows * cols {
        if foreground(idx).is_some() {
            let root = uf.find(idx as u32);
            root_of[idx] = root;
            if root == idx as u32 {
                components.push((foreground(idx).unwrap(), root));
            }
        }
    }
    components.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));

    let mut label_of_root = std::collections::HashMap::with_capacity(components.len());
    for (label, (_, root)) in components.iter().enumerate() {
        label_of_root.insert(*root, (label + 1) as u64);
    }

    (0..rows * cols)
        .map(|idx| {
            if root_of[idx] == u32::MAX {
                0
            } else {
                label_of_root[&root_of[idx]]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rook_vs_queen_connectivity() {
        // Two diagonal cells of the same value: separate regions under
        // rook connectivity, one region under queen.
        #[rustfmt::skip]
        let data: Vec<i32> = vec![
            1, 0,
            0, 1,
        ];
        let rook = label_regions(&data, None, 2, 2, false, None);
        assert_eq!(rook, vec![1, 0, 0, 2]);
        let queen = label_regions(&data, None, 2, 2, true, None);
        assert_eq!(queen, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_labels_group_by_value() {
        // Regions of value 1 must be numbered before regions of value 2.
        #[rustfmt::skip]
        let data: Vec<i32> = vec![
            2, 0, 1,
            0, 0, 1,
        ];
        let labels = label_regions(&data, None, 2, 3, false, None);
        assert_eq!(labels, vec![2, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_distinct_values_do_not_merge() {
        #[rustfmt::skip]
        let data: Vec<i32> = vec![
            1, 2,
            1, 2,
        ];
        let labels = label_regions(&data, None, 2, 2, false, None);
        assert_eq!(labels, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_null_cells_are_background() {
        let data: Vec<i32> = vec![1, 1, 1, 1];
        let mask = vec![0u8, 1, 1, 0];
        let labels = label_regions(&data, Some(&mask[..]), 1, 4, false, None);
        assert_eq!(labels, vec![1, 0, 0, 2]);
    }

    #[test]
    fn test_unique_values_filter() {
        #[rustfmt::skip]
        let data: Vec<i32> = vec![
            1, 2, 2,
            3, 3, 2,
        ];
        let labels = label_regions(&data, None, 2, 3, false, Some(&[2.0][..]));
        assert_eq!(labels, vec![0, 1, 1, 0, 0, 1]);
    }
}
