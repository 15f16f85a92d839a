//! Mesh data: vertex positions, polygon faces and per-vertex group weights

use glam::Vec3;
use smallvec::SmallVec;

/// Enclosed volumes below this are treated as flat (open or degenerate) meshes
const VOLUME_EPSILON: f32 = 1e-8;

/// Polygon as indices into the owning mesh's vertices (triangles and quads stay inline)
pub type Face = SmallVec<[u32; 4]>;

/// Group weights of a single vertex
pub type VertexWeights = SmallVec<[VertexWeight; 4]>;

/// Influence of one vertex group on one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    /// Index of the vertex group on the owning object
    pub group: usize,
    /// Influence in [0, 1]
    pub weight: f32,
}

impl VertexWeight {
    pub fn new(group: usize, weight: f32) -> Self {
        Self { group, weight }
    }
}

/// Mesh owned by exactly one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub faces: Vec<Face>,
    /// Group weights, index-aligned with `positions`. Missing entries mean "no groups".
    pub weights: Vec<VertexWeights>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Weights of a vertex (empty when the vertex belongs to no group)
    pub fn vertex_weights(&self, vertex: usize) -> &[VertexWeight] {
        self.weights.get(vertex).map(|w| w.as_slice()).unwrap_or(&[])
    }

    /// Copy of this mesh holding only the vertices flagged in `keep`.
    ///
    /// Faces that reference any dropped vertex are dropped with it; surviving
    /// faces are re-indexed. Vertices past the end of `keep` are dropped.
    pub fn retain_vertices(&self, keep: &[bool]) -> Mesh {
        let mut remap: Vec<Option<u32>> = vec![None; self.positions.len()];
        let mut positions = Vec::new();
        let mut weights = Vec::new();

        for (vertex, position) in self.positions.iter().enumerate() {
            if keep.get(vertex).copied().unwrap_or(false) {
                remap[vertex] = Some(positions.len() as u32);
                positions.push(*position);
                weights.push(VertexWeights::from_slice(self.vertex_weights(vertex)));
            }
        }

        let faces = self
            .faces
            .iter()
            .filter_map(|face| {
                face.iter()
                    .map(|&index| remap.get(index as usize).copied().flatten())
                    .collect::<Option<Face>>()
            })
            .collect();

        Mesh {
            name: self.name.clone(),
            positions,
            faces,
            weights,
        }
    }

    /// Drop every weight of `group` and shift higher group indices down by one
    pub fn remove_group(&mut self, group: usize) {
        for vertex in &mut self.weights {
            vertex.retain(|w| w.group != group);
            for w in vertex.iter_mut() {
                if w.group > group {
                    w.group -= 1;
                }
            }
        }
    }

    /// Fan triangulation of every face with at least three corners
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.faces.iter().flat_map(|face| {
            (1..face.len().saturating_sub(1)).map(move |i| [face[0], face[i], face[i + 1]])
        })
    }

    /// Center of the enclosed volume in mesh space.
    ///
    /// Uses signed tetrahedra against the origin, so the faces must be
    /// consistently wound. Falls back to the vertex mean for open or flat
    /// meshes. Returns `None` for a mesh without vertices.
    pub fn volume_center(&self) -> Option<Vec3> {
        if self.positions.is_empty() {
            return None;
        }

        let mut volume = 0.0f32;
        let mut weighted = Vec3::ZERO;
        for [a, b, c] in self.triangles() {
            let (Some(&a), Some(&b), Some(&c)) = (
                self.positions.get(a as usize),
                self.positions.get(b as usize),
                self.positions.get(c as usize),
            ) else {
                continue;
            };
            let tetra = a.dot(b.cross(c)) / 6.0;
            volume += tetra;
            weighted += (a + b + c) * (tetra / 4.0);
        }

        if volume.abs() > VOLUME_EPSILON {
            Some(weighted / volume)
        } else {
            let sum: Vec3 = self.positions.iter().copied().sum();
            Some(sum / self.positions.len() as f32)
        }
    }

    pub fn translate(&mut self, offset: Vec3) {
        for position in &mut self.positions {
            *position += offset;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::weighted_box;
    use super::*;
    use smallvec::smallvec;

    fn strip() -> Mesh {
        // 0 - 1 - 2
        // | A | B |
        // 3 - 4 - 5
        Mesh {
            name: "Strip".to_string(),
            positions: (0..6)
                .map(|i| Vec3::new((i % 3) as f32, (i / 3) as f32, 0.0))
                .collect(),
            faces: vec![smallvec![0, 3, 4, 1], smallvec![1, 4, 5, 2]],
            weights: (0..6)
                .map(|i| smallvec![VertexWeight::new(i % 2, 0.5)])
                .collect(),
        }
    }

    #[test]
    fn test_retain_vertices_drops_faces_touching_removed_vertices() {
        let mesh = strip();
        let keep = [false, true, true, false, true, true];
        let kept = mesh.retain_vertices(&keep);

        assert_eq!(kept.vertex_count(), 4);
        assert_eq!(kept.faces.len(), 1);
        assert_eq!(kept.faces[0].as_slice(), &[0, 2, 3, 1]);
        assert_eq!(kept.positions[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(kept.weights.len(), 4);
        assert_eq!(kept.name, "Strip");
    }

    #[test]
    fn test_retain_vertices_leaves_source_untouched() {
        let mesh = strip();
        let before = mesh.clone();
        let kept = mesh.retain_vertices(&[true; 2]);
        assert_eq!(kept.vertex_count(), 2);
        assert!(kept.faces.is_empty());
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_remove_group_reindexes_higher_groups() {
        let mut mesh = Mesh::new("m");
        mesh.positions = vec![Vec3::ZERO];
        mesh.weights = vec![smallvec![
            VertexWeight::new(0, 0.2),
            VertexWeight::new(1, 0.3),
            VertexWeight::new(2, 0.5),
        ]];
        mesh.remove_group(1);
        assert_eq!(
            mesh.vertex_weights(0),
            &[VertexWeight::new(0, 0.2), VertexWeight::new(1, 0.5)]
        );
    }

    #[test]
    fn test_triangles_fan_quads() {
        let mesh = strip();
        let triangles: Vec<_> = mesh.triangles().collect();
        assert_eq!(triangles, vec![[0, 3, 4], [0, 4, 1], [1, 4, 5], [1, 5, 2]]);
    }

    #[test]
    fn test_volume_center_of_box() {
        let mesh = weighted_box("Box", Vec3::new(1.0, 2.0, 3.0), Vec3::new(3.0, 6.0, 4.0), None);
        let center = mesh.volume_center().unwrap();
        assert!(center.abs_diff_eq(Vec3::new(2.0, 4.0, 3.5), 1e-5), "{center}");
    }

    #[test]
    fn test_volume_center_falls_back_to_mean_for_flat_mesh() {
        let center = strip().volume_center().unwrap();
        assert!(center.abs_diff_eq(Vec3::new(1.0, 0.5, 0.0), 1e-6));
    }

    #[test]
    fn test_volume_center_of_empty_mesh() {
        assert_eq!(Mesh::new("empty").volume_center(), None);
    }
}
