//! Case tables for the tetrahedral decomposition of a cube.
//!
//! A cube spans 8 grid samples; its corners are numbered with a 3-bit code
//! where bit 0 is the x offset, bit 1 the y offset and bit 2 the z offset.
//! The cube is split into six tetrahedra around the main diagonal (0, 7), and
//! each of the 256 inside/outside corner configurations is triangulated by
//! rotating every tetrahedron into one of three canonical configurations.
//!
//! The tables are pure combinatorics: they are built once on first use and
//! shared between engines.

use std::sync::OnceLock;

pub const NUM_CUBES: usize = 256;
pub const NUM_EDGES: usize = 19;
pub const NUM_TETRAHEDRA: usize = 6;

/// The 19 directed edges used by the decomposition, as (lo, hi) corner pairs.
/// The position of a pair in this list is the edge's canonical index.
pub const EDGE_VERTICES: [[u8; 2]; NUM_EDGES] = [
    [0, 1],
    [0, 2],
    [0, 3],
    [1, 3],
    [2, 3],
    [0, 4],
    [0, 5],
    [1, 5],
    [4, 5],
    [0, 6],
    [2, 6],
    [4, 6],
    [0, 7],
    [1, 7],
    [2, 7],
    [3, 7],
    [4, 7],
    [5, 7],
    [6, 7],
];

/// The six tetrahedra as ordered corner 4-tuples. The order defines each
/// tetrahedron's reference orientation; all six share the diagonal (0, 7).
pub const TET_VERTICES: [[u8; 4]; NUM_TETRAHEDRA] = [
    [0, 7, 1, 3],
    [0, 7, 3, 2],
    [0, 7, 2, 6],
    [0, 7, 6, 4],
    [0, 7, 4, 5],
    [0, 7, 5, 1],
];

/// Canonical edge index for a pair of cube corners.
///
/// Callers must only pass corner pairs that actually occur among the 19 edges
/// of the decomposition.
pub fn find_edge_by_vertex_ids(v0: u8, v1: u8) -> u8 {
    let (lo, hi) = if v0 <= v1 { (v0, v1) } else { (v1, v0) };
    for (i, e) in EDGE_VERTICES.iter().enumerate() {
        if e[0] == lo && e[1] == hi {
            return i as u8;
        }
    }
    panic!("({lo}, {hi}) is not an edge of the tetrahedral decomposition");
}

/// Parity (0 or 1) of the permutation needed to sort `items` ascending.
fn permutation_parity<T: Ord>(items: &[T]) -> u32 {
    let mut parity = 0;
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if items[i] > items[j] {
                parity ^= 1;
            }
        }
    }
    parity
}

/// Advance `items` to the lexicographically next permutation, returning false
/// once the sequence wraps back to sorted order (C++ `std::next_permutation`).
fn next_permutation<T: Ord>(items: &mut [T]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        items.reverse();
        return false;
    }
    let mut j = n - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

/// The four immutable tables driving extraction.
///
/// For each cube case `i`:
/// - `counts[i]` is `(nVerts, nIndices)`;
/// - `data[starts[i][0]..][..nVerts]` lists the edge indices at which vertices
///   are interpolated;
/// - `data[starts[i][1]..][..nIndices]` lists triangle corners as compact
///   per-case vertex indices (`starts[..][1]` is pre-offset past the vertex
///   section, so one buffer serves both lookups);
/// - `keys[starts[i][0] + k]` holds the per-axis key deltas of vertex `k`,
///   each in {0, 1, 2}.
///
/// `starts[256]` is a sentinel giving the section lengths.
pub struct CaseTables {
    counts: [[u8; 2]; NUM_CUBES],
    starts: [[u16; 2]; NUM_CUBES + 1],
    data: Vec<u8>,
    keys: Vec<[u8; 3]>,
    max_cell_vertices: usize,
    max_cell_indices: usize,
}

impl CaseTables {
    /// The shared table instance, built on first use.
    pub fn get() -> &'static CaseTables {
        static TABLES: OnceLock<CaseTables> = OnceLock::new();
        TABLES.get_or_init(CaseTables::build)
    }

    fn build() -> CaseTables {
        let mut vertex_table: Vec<u8> = Vec::new();
        let mut index_table: Vec<u8> = Vec::new();
        let mut keys: Vec<[u8; 3]> = Vec::new();
        let mut counts = [[0u8; 2]; NUM_CUBES];
        let mut starts = [[0u16; 2]; NUM_CUBES + 1];

        for cube in 0..NUM_CUBES {
            starts[cube] = [vertex_table.len() as u16, index_table.len() as u16];

            // Triangles for this case, recorded as edge indices for now and
            // compacted into per-case vertex slots afterwards.
            let mut triangles: Vec<u8> = Vec::new();
            for tet in &TET_VERTICES {
                // Each entry pairs a corner id with its outside flag.
                let mut tvtxs: [(u8, bool); 4] = [(0, false); 4];
                let mut outside = 0;
                for (k, &v) in tet.iter().enumerate() {
                    let o = cube & (1 << v) != 0;
                    outside += o as u32;
                    tvtxs[k] = (v, o);
                }
                let mut base_parity = permutation_parity(&tvtxs);

                // Flip inside/outside so that at most two corners are outside.
                // The winding must flip with it, hence the parity toggle.
                if outside > 2 {
                    base_parity ^= 1;
                    for t in &mut tvtxs {
                        t.1 = !t.1;
                    }
                }

                // Rotate the tetrahedron into a canonical configuration: try
                // the 24 permutations in lexicographic order and take the
                // first rotation (parity match, not a reflection) whose
                // outside mask is one of the three handled configurations.
                tvtxs.sort();
                loop {
                    if permutation_parity(&tvtxs) == base_parity {
                        let t0 = tvtxs[0].0;
                        let t1 = tvtxs[1].0;
                        let t2 = tvtxs[2].0;
                        let t3 = tvtxs[3].0;
                        let mut mask = 0u32;
                        for (k, t) in tvtxs.iter().enumerate() {
                            mask |= (t.1 as u32) << k;
                        }
                        if mask == 0 {
                            // No outside corners, no triangles.
                            break;
                        } else if mask == 1 {
                            // One outside corner: a single triangle cuts it off.
                            triangles.push(find_edge_by_vertex_ids(t0, t1));
                            triangles.push(find_edge_by_vertex_ids(t0, t3));
                            triangles.push(find_edge_by_vertex_ids(t0, t2));
                            break;
                        } else if mask == 3 {
                            // Two outside corners: two triangles tile a quad.
                            triangles.push(find_edge_by_vertex_ids(t0, t2));
                            triangles.push(find_edge_by_vertex_ids(t1, t2));
                            triangles.push(find_edge_by_vertex_ids(t1, t3));

                            triangles.push(find_edge_by_vertex_ids(t1, t3));
                            triangles.push(find_edge_by_vertex_ids(t0, t3));
                            triangles.push(find_edge_by_vertex_ids(t0, t2));
                            break;
                        }
                    }
                    if !next_permutation(&mut tvtxs) {
                        break;
                    }
                }
            }

            // Assign compact per-case vertex slots to the edges in use, in
            // canonical edge order, and record each slot's key deltas.
            let mut edge_compact = [0u8; NUM_EDGES];
            let mut pool = 0u8;
            for edge in 0..NUM_EDGES as u8 {
                if triangles.contains(&edge) {
                    edge_compact[edge as usize] = pool;
                    pool += 1;
                    vertex_table.push(edge);
                    let [v0, v1] = EDGE_VERTICES[edge as usize];
                    let mut delta = [0u8; 3];
                    for (axis, d) in delta.iter_mut().enumerate() {
                        *d = ((v0 >> axis) & 1) + ((v1 >> axis) & 1);
                    }
                    keys.push(delta);
                }
            }
            for &edge in &triangles {
                index_table.push(edge_compact[edge as usize]);
            }

            counts[cube] = [
                (vertex_table.len() - starts[cube][0] as usize) as u8,
                (index_table.len() - starts[cube][1] as usize) as u8,
            ];
        }

        starts[NUM_CUBES] = [vertex_table.len() as u16, index_table.len() as u16];

        // The two sections are concatenated into one buffer, so the index
        // starts shift by the vertex section's total length.
        let vertex_len = vertex_table.len() as u16;
        for s in &mut starts {
            s[1] += vertex_len;
        }
        let mut data = vertex_table;
        data.extend_from_slice(&index_table);

        let max_cell_vertices = counts.iter().map(|c| c[0] as usize).max().unwrap_or(0);
        let max_cell_indices = counts.iter().map(|c| c[1] as usize).max().unwrap_or(0);

        CaseTables {
            counts,
            starts,
            data,
            keys,
            max_cell_vertices,
            max_cell_indices,
        }
    }

    /// Number of interpolated vertices the case emits.
    #[inline]
    pub fn vertex_count(&self, cube: u8) -> usize {
        self.counts[cube as usize][0] as usize
    }

    /// Number of triangle indices the case emits (a multiple of 3).
    #[inline]
    pub fn index_count(&self, cube: u8) -> usize {
        self.counts[cube as usize][1] as usize
    }

    /// Edge indices at which the case's vertices are interpolated.
    #[inline]
    pub fn vertex_edges(&self, cube: u8) -> &[u8] {
        let start = self.starts[cube as usize][0] as usize;
        &self.data[start..start + self.vertex_count(cube)]
    }

    /// Triangle corners as compact indices into [`Self::vertex_edges`].
    #[inline]
    pub fn triangle_indices(&self, cube: u8) -> &[u8] {
        let start = self.starts[cube as usize][1] as usize;
        &self.data[start..start + self.index_count(cube)]
    }

    /// Per-axis key deltas for the case's vertices, parallel to
    /// [`Self::vertex_edges`].
    #[inline]
    pub fn key_deltas(&self, cube: u8) -> &[[u8; 3]] {
        let start = self.starts[cube as usize][0] as usize;
        &self.keys[start..start + self.vertex_count(cube)]
    }

    /// Upper bound on vertices emitted by any single cell.
    #[inline]
    pub fn max_cell_vertices(&self) -> usize {
        self.max_cell_vertices
    }

    /// Upper bound on triangle indices emitted by any single cell.
    #[inline]
    pub fn max_cell_indices(&self) -> usize {
        self.max_cell_indices
    }
}
