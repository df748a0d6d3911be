//! Marching-tetrahedra surface extraction with streaming vertex welding.
//!
//! The [`marching_tets`] module holds the extraction engine: it walks a
//! sampled scalar field two z slices at a time, triangulates the iso-surface
//! through a fixed six-tetrahedron decomposition of each grid cell, and
//! streams out welded mesh chunks whose vertices carry 64-bit spatial keys.
//! Equal keys identify equal vertex locations, which is what lets downstream
//! consumers stitch chunks - and adjacent blocks of a larger volume -
//! without geometric comparisons.
//!
//! Field producers and mesh consumers plug in through the
//! [`marching_tets::SliceSource`] and [`marching_tets::MeshSink`] traits.

pub mod marching_tets;
pub mod stl;

pub use marching_tets::{GenerateStats, KeyMesh, MarchingTets, MeshSink, SliceImage, SliceSource};

/// Errors surfaced by the extraction engine.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A dimension was out of range, reported before any work runs.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A single layer alone overflows the accumulation buffers; allocators
    /// upstream are expected to have sized the engine from `resource_usage`.
    #[error(
        "layer needs {needed_vertices} vertices / {needed_indices} indices \
         but the engine holds {vertex_space} / {index_space}"
    )]
    ResourceExhausted {
        needed_vertices: u32,
        needed_indices: u32,
        vertex_space: usize,
        index_space: usize,
    },
    /// The slice input functor failed.
    #[error("slice input failed")]
    Input(#[source] anyhow::Error),
    /// The mesh output functor failed.
    #[error("mesh output failed")]
    Output(#[source] anyhow::Error),
}

/// A triangle with a precomputed facet normal, as written to STL.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub vertices: [(f32, f32, f32); 3],
    pub normal: (f32, f32, f32),
}

impl Triangle {
    /// Build a triangle, deriving the normal from the winding (right-hand
    /// rule). Degenerate triangles get a zero normal.
    pub fn new(vertices: [(f32, f32, f32); 3]) -> Self {
        let [a, b, c] = vertices;
        let ab = (b.0 - a.0, b.1 - a.1, b.2 - a.2);
        let ac = (c.0 - a.0, c.1 - a.1, c.2 - a.2);
        let n = (
            ab.1 * ac.2 - ab.2 * ac.1,
            ab.2 * ac.0 - ab.0 * ac.2,
            ab.0 * ac.1 - ab.1 * ac.0,
        );
        let len_sq = n.0 * n.0 + n.1 * n.1 + n.2 * n.2;
        let normal = if len_sq > 1e-12 {
            let inv_len = 1.0 / len_sq.sqrt();
            (n.0 * inv_len, n.1 * inv_len, n.2 * inv_len)
        } else {
            (0.0, 0.0, 0.0)
        };
        Self { vertices, normal }
    }
}

/// Flatten an indexed mesh into triangles.
pub fn mesh_triangles(vertices: &[[f32; 3]], triangles: &[[u32; 3]]) -> Vec<Triangle> {
    triangles
        .iter()
        .map(|tri| {
            Triangle::new([
                vertex_tuple(vertices[tri[0] as usize]),
                vertex_tuple(vertices[tri[1] as usize]),
                vertex_tuple(vertices[tri[2] as usize]),
            ])
        })
        .collect()
}

fn vertex_tuple(v: [f32; 3]) -> (f32, f32, f32) {
    (v[0], v[1], v[2])
}
