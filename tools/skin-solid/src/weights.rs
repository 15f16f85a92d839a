//! Per-vertex group weight table

use smallvec::SmallVec;

use crate::scene::{Mesh, VertexWeight};

/// Snapshot of every vertex's (group, weight) pairs, index-aligned with the mesh vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    entries: Vec<SmallVec<[VertexWeight; 4]>>,
}

impl WeightTable {
    pub fn new(entries: Vec<SmallVec<[VertexWeight; 4]>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self, vertex: usize) -> &[VertexWeight] {
        self.entries.get(vertex).map(|e| e.as_slice()).unwrap_or(&[])
    }

    /// Weight of `group` on `vertex`, if the vertex belongs to it
    pub fn weight(&self, vertex: usize, group: usize) -> Option<f32> {
        self.entries(vertex)
            .iter()
            .find(|entry| entry.group == group)
            .map(|entry| entry.weight)
    }

    /// True when the vertex belongs to `group` with at least `threshold` influence
    pub fn qualifies(&self, vertex: usize, group: usize, threshold: f32) -> bool {
        let mut found = false;
        for entry in self.entries(vertex).iter().filter(|e| e.group == group) {
            if entry.weight < threshold {
                return false;
            }
            found = true;
        }
        found
    }

    /// Keep-mask of the vertices qualifying for `group`
    pub fn retained_mask(&self, group: usize, threshold: f32) -> Vec<bool> {
        (0..self.entries.len())
            .map(|vertex| self.qualifies(vertex, group, threshold))
            .collect()
    }

    pub fn count_qualifying(&self, group: usize, threshold: f32) -> usize {
        (0..self.entries.len())
            .filter(|&vertex| self.qualifies(vertex, group, threshold))
            .count()
    }

    /// Vertices that qualify for no group at all
    pub fn count_unassigned(&self, threshold: f32) -> usize {
        (0..self.entries.len())
            .filter(|&vertex| {
                !self
                    .entries(vertex)
                    .iter()
                    .any(|entry| self.qualifies(vertex, entry.group, threshold))
            })
            .count()
    }
}

/// Extract the weight table of a mesh. Vertices without weights get an empty entry.
pub fn build_weight_table(mesh: &Mesh) -> WeightTable {
    WeightTable::new(
        (0..mesh.vertex_count())
            .map(|vertex| SmallVec::from_slice(mesh.vertex_weights(vertex)))
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::Vec3;
    use smallvec::smallvec;

    /// Four vertices: v0 -> A 0.9, v1 -> A 0.2, v2 -> B 1.0, v3 -> nothing
    pub(crate) fn four_vertex_mesh() -> Mesh {
        Mesh {
            name: "Quad".to_string(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            faces: vec![smallvec![0, 1, 2], smallvec![0, 2, 3]],
            weights: vec![
                smallvec![VertexWeight::new(0, 0.9)],
                smallvec![VertexWeight::new(0, 0.2)],
                smallvec![VertexWeight::new(1, 1.0)],
                SmallVec::new(),
            ],
        }
    }

    #[test]
    fn test_table_is_index_aligned() {
        let mut mesh = four_vertex_mesh();
        mesh.weights.truncate(2);
        let table = build_weight_table(&mesh);
        assert_eq!(table.len(), 4);
        assert_eq!(table.weight(0, 0), Some(0.9));
        assert_eq!(table.weight(0, 1), None);
        assert!(table.entries(3).is_empty());
    }

    #[test]
    fn test_retained_mask_applies_threshold() {
        let table = build_weight_table(&four_vertex_mesh());
        assert_eq!(table.retained_mask(0, 0.3), vec![true, false, false, false]);
        assert_eq!(table.retained_mask(1, 0.3), vec![false, false, true, false]);
        assert_eq!(table.count_unassigned(0.3), 2);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let table = build_weight_table(&four_vertex_mesh());
        assert!(table.qualifies(1, 0, 0.2));
        assert!(!table.qualifies(1, 0, 0.21));
        assert_eq!(table.count_qualifying(0, 0.0), 2);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let mesh = Mesh {
            weights: vec![
                smallvec![VertexWeight::new(0, 0.5), VertexWeight::new(1, 0.5)],
                smallvec![VertexWeight::new(0, 0.7), VertexWeight::new(1, 0.3)],
                smallvec![VertexWeight::new(2, 0.1)],
                smallvec![VertexWeight::new(1, 1.0)],
            ],
            ..four_vertex_mesh()
        };
        let table = build_weight_table(&mesh);
        let threshold = 0.6;
        for vertex in 0..table.len() {
            let owners: Vec<usize> = (0..3)
                .filter(|&group| table.qualifies(vertex, group, threshold))
                .collect();
            let expected: Vec<usize> = table
                .entries(vertex)
                .iter()
                .filter(|e| e.weight >= threshold)
                .map(|e| e.group)
                .collect();
            assert_eq!(owners, expected, "vertex {vertex}");
            assert!(owners.len() <= 1);
        }
    }
}
