//! Uniform grid spatial hash
//!
//! Broad-phase index: items are bucketed into every integer cell their AABB
//! touches, and searches return the union of the buckets a query box touches.
//! Results are candidates, not exact overlaps; callers that need exactness
//! test [`Aabb::overlaps`] themselves.

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::IndexSet;

use crate::foundation::math::Vector;

/// Axis-aligned box in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Bottom-left corner
    pub min: Vector,
    /// Top-right corner
    pub max: Vector,
}

impl Aabb {
    /// Box of `size` centered on `center`. Negative sizes are treated by magnitude.
    pub fn from_center(center: Vector, size: Vector) -> Self {
        let half = size.abs() / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Center point
    pub fn center(&self) -> Vector {
        (self.min + self.max) / 2.0
    }

    /// Width and height
    pub fn size(&self) -> Vector {
        self.max - self.min
    }

    /// Strict overlap; touching edges do not count
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Whether `point` lies inside or on the border
    pub fn contains(&self, point: Vector) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Whether `other` lies entirely inside
    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }
}

type Cell = (i32, i32);

/// Widest run of cells one box may cover on a single axis
pub const MAX_CELLS_PER_AXIS: i32 = 1024;

struct Entry<K> {
    cells: Vec<Cell>,
    kinds: Vec<K>,
    aabb: Aabb,
}

/// Grid index from cells to items, plus a kind index for filtered searches
pub struct SpatialHash<T, K> {
    cell_size: f32,
    table: HashMap<Cell, IndexSet<T>>,
    kinds: HashMap<K, IndexSet<T>>,
    entries: HashMap<T, Entry<K>>,
}

impl<T, K> SpatialHash<T, K>
where
    T: Copy + Eq + Hash,
    K: Clone + Eq + Hash,
{
    /// Empty hash with cells of `cell_size` world units
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            table: HashMap::new(),
            kinds: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Edge length of one cell
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Integer cells overlapped by `aabb`: from `floor(min / cs)` while
    /// `c * cs < max`, on both axes, at most [`MAX_CELLS_PER_AXIS`] per axis.
    /// A degenerate box still gets its home cell; a non-finite one gets none.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn cells_for(&self, aabb: &Aabb) -> Vec<Cell> {
        let bounds = [aabb.min.x, aabb.min.y, aabb.max.x, aabb.max.y];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Vec::new();
        }
        let cs = self.cell_size;
        let span = |min: f32, max: f32| {
            let first = (min / cs).floor();
            let end = (max / cs).ceil().min(first + MAX_CELLS_PER_AXIS as f32);
            (first as i32, end as i32)
        };
        let (first_x, end_x) = span(aabb.min.x, aabb.max.x);
        let (first_y, end_y) = span(aabb.min.y, aabb.max.y);
        if end_x <= first_x || end_y <= first_y {
            return vec![(first_x, first_y)];
        }
        (first_y..end_y)
            .flat_map(|cy| (first_x..end_x).map(move |cx| (cx, cy)))
            .collect()
    }

    /// Insert `item` with bounds `aabb` under `kinds`. Re-adding an item moves it.
    pub fn add(&mut self, item: T, aabb: Aabb, kinds: &[K]) {
        if self.entries.contains_key(&item) {
            self.remove(item);
        }
        let cells = self.cells_for(&aabb);
        for cell in &cells {
            self.table.entry(*cell).or_default().insert(item);
        }
        for kind in kinds {
            self.kinds.entry(kind.clone()).or_default().insert(item);
        }
        self.entries.insert(
            item,
            Entry {
                cells,
                kinds: kinds.to_vec(),
                aabb,
            },
        );
    }

    /// Remove `item` from every cell and kind bucket. Returns whether it was present.
    pub fn remove(&mut self, item: T) -> bool {
        let Some(entry) = self.entries.remove(&item) else {
            return false;
        };
        for cell in entry.cells {
            if let Some(bucket) = self.table.get_mut(&cell) {
                bucket.shift_remove(&item);
                if bucket.is_empty() {
                    self.table.remove(&cell);
                }
            }
        }
        for kind in entry.kinds {
            if let Some(bucket) = self.kinds.get_mut(&kind) {
                bucket.shift_remove(&item);
                if bucket.is_empty() {
                    self.kinds.remove(&kind);
                }
            }
        }
        true
    }

    /// Move `item` to new bounds, keeping its kinds
    pub fn update(&mut self, item: T, aabb: Aabb) {
        let kinds = match self.entries.get(&item) {
            Some(entry) if entry.aabb == aabb => return,
            Some(entry) => entry.kinds.clone(),
            None => return,
        };
        self.add(item, aabb, &kinds);
    }

    /// Candidates in the cells `aabb` touches, optionally restricted to items
    /// registered under any of `kinds`. Order is insertion order per cell.
    pub fn search(&self, aabb: &Aabb, kinds: &[K]) -> Vec<T> {
        let mut found: IndexSet<T> = IndexSet::new();
        for cell in self.cells_for(aabb) {
            if let Some(bucket) = self.table.get(&cell) {
                found.extend(bucket.iter().copied());
            }
        }
        if kinds.is_empty() {
            return found.into_iter().collect();
        }
        found
            .into_iter()
            .filter(|item| {
                kinds
                    .iter()
                    .any(|kind| self.kinds.get(kind).is_some_and(|bucket| bucket.contains(item)))
            })
            .collect()
    }

    /// Stored bounds of `item`
    pub fn bounds(&self, item: T) -> Option<Aabb> {
        self.entries.get(&item).map(|entry| entry.aabb)
    }

    /// Whether `item` is indexed
    pub fn contains(&self, item: T) -> bool {
        self.entries.contains_key(&item)
    }

    /// Whether any cell still references `item`
    pub fn is_referenced(&self, item: T) -> bool {
        self.table.values().any(|bucket| bucket.contains(&item))
            || self.kinds.values().any(|bucket| bucket.contains(&item))
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.table.len()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.table.clear();
        self.kinds.clear();
        self.entries.clear();
    }
}
