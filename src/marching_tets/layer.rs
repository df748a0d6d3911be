//! Per-layer kernels: occupancy marking, cell compaction, element counting
//! and element generation.
//!
//! A layer is the slab of cells between the samples at z-1 and z. Each kernel
//! is a per-item function applied over the layer's cells; the driver scans the
//! results in between to turn counts into write positions.

use glam::Vec3;

use crate::marching_tets::parallel_iter;
use crate::marching_tets::slice::SliceImage;
use crate::marching_tets::tables::{CaseTables, EDGE_VERTICES};
use crate::marching_tets::types::{pack_vertex_key, CellRecord};

/// Cube case for the cell at (x, y) spanning `slice_a` (z-1) and `slice_b` (z).
///
/// Bit v is set iff corner v is outside. A field value equal to the threshold
/// counts as outside.
#[inline]
pub fn cube_case(slice_a: &SliceImage, slice_b: &SliceImage, x: usize, y: usize) -> u8 {
    let mut cube = 0u8;
    for v in 0..8usize {
        let sx = x + (v & 1);
        let sy = y + ((v >> 1) & 1);
        let field = if v & 4 == 0 {
            slice_a.get(sx, sy)
        } else {
            slice_b.get(sx, sy)
        };
        if field >= 0.0 {
            cube |= 1 << v;
        }
    }
    cube
}

/// Mark cells that will emit vertices: `occupied[i]` becomes 0 or 1 for each
/// of the layer's `(width-1)*(height-1)` cells. The slot one past the end is
/// left for the scan total.
pub fn count_occupied(
    tables: &CaseTables,
    slice_a: &SliceImage,
    slice_b: &SliceImage,
    width: usize,
    height: usize,
    occupied: &mut [u32],
) {
    let row = width - 1;
    let cells = row * (height - 1);
    let flags = parallel_iter::map_range(0..cells, |i| {
        let cube = cube_case(slice_a, slice_b, i % row, i / row);
        (tables.vertex_count(cube) > 0) as u32
    });
    occupied[..cells].copy_from_slice(&flags);
}

/// Scatter each occupied cell's record to its scan position.
///
/// `occupied` must already be exclusive-scanned, so `occupied[i]` is the write
/// position and `occupied[i] != occupied[i + 1]` identifies occupied cells.
pub fn compact(
    slice_a: &SliceImage,
    slice_b: &SliceImage,
    width: usize,
    height: usize,
    occupied: &[u32],
    cells_out: &mut [CellRecord],
) {
    let row = width - 1;
    let cells = row * (height - 1);
    for i in 0..cells {
        if occupied[i] != occupied[i + 1] {
            let x = i % row;
            let y = i / row;
            cells_out[occupied[i] as usize] = CellRecord {
                x: x as u16,
                y: y as u16,
                cube: cube_case(slice_a, slice_b, x, y),
            };
        }
    }
}

/// Fill `vi_count[i]` with the (vertex, index) counts of each compacted cell.
/// The slot one past the end is left for the scan total.
pub fn count_elements(tables: &CaseTables, cells: &[CellRecord], vi_count: &mut [[u32; 2]]) {
    let counts = parallel_iter::map_slice(cells, |cell| {
        [
            tables.vertex_count(cell.cube) as u32,
            tables.index_count(cell.cube) as u32,
        ]
    });
    vi_count[..cells.len()].copy_from_slice(&counts);
}

/// One cell's emitted elements, staged before the scatter into the shared
/// buffers.
struct CellEmission {
    v_off: usize,
    i_off: usize,
    vertices: Vec<([f32; 4], u64)>,
    indices: Vec<u32>,
}

/// Emit every compacted cell's vertices, spatial keys and triangle indices at
/// its scanned offsets.
///
/// `z` is the layer index: the cells span samples at z-1 (`slice_a`) and z
/// (`slice_b`). `vi_count` must hold the exclusive-scanned per-cell counts and
/// `offsets` the layer's base (vertex, index) offsets within the accumulation
/// buffers. Positions are in grid coordinates; each vertex's payload word
/// carries its unwelded index for the welder's index remap.
#[allow(clippy::too_many_arguments)]
pub fn generate_elements(
    tables: &CaseTables,
    slice_a: &SliceImage,
    slice_b: &SliceImage,
    cells: &[CellRecord],
    vi_count: &[[u32; 2]],
    z: usize,
    offsets: [u32; 2],
    unwelded_vertices: &mut [[f32; 4]],
    unwelded_keys: &mut [u64],
    indices: &mut [u32],
) {
    debug_assert!(z >= 1);
    let cell_z = z - 1;

    let emissions = parallel_iter::map_range(0..cells.len(), |i| {
        let cell = cells[i];
        let v_off = (offsets[0] + vi_count[i][0]) as usize;
        let i_off = (offsets[1] + vi_count[i][1]) as usize;
        let x = cell.x as usize;
        let y = cell.y as usize;

        let mut field = [0.0f32; 8];
        for (v, f) in field.iter_mut().enumerate() {
            let sx = x + (v & 1);
            let sy = y + ((v >> 1) & 1);
            *f = if v & 4 == 0 {
                slice_a.get(sx, sy)
            } else {
                slice_b.get(sx, sy)
            };
        }
        let corner = |v: u8| {
            Vec3::new(
                (x + (v & 1) as usize) as f32,
                (y + ((v >> 1) & 1) as usize) as f32,
                (cell_z + ((v >> 2) & 1) as usize) as f32,
            )
        };

        let edges = tables.vertex_edges(cell.cube);
        let deltas = tables.key_deltas(cell.cube);
        let mut vertices = Vec::with_capacity(edges.len());
        for (k, (&edge, delta)) in edges.iter().zip(deltas).enumerate() {
            let [v0, v1] = EDGE_VERTICES[edge as usize];
            let f0 = field[v0 as usize];
            let f1 = field[v1 as usize];
            // The endpoints straddle the surface, so f0 != f1.
            let t = f0 / (f0 - f1);
            let pos = corner(v0).lerp(corner(v1), t);
            let payload = f32::from_bits((v_off + k) as u32);

            let x2 = 2 * x as u32 + delta[0] as u32;
            let y2 = 2 * y as u32 + delta[1] as u32;
            let z2 = 2 * cell_z as u32 + delta[2] as u32;
            vertices.push(([pos.x, pos.y, pos.z, payload], pack_vertex_key(x2, y2, z2)));
        }

        let indices = tables
            .triangle_indices(cell.cube)
            .iter()
            .map(|&ci| v_off as u32 + ci as u32)
            .collect();

        CellEmission {
            v_off,
            i_off,
            vertices,
            indices,
        }
    });

    for emission in emissions {
        for (k, (vertex, key)) in emission.vertices.into_iter().enumerate() {
            unwelded_vertices[emission.v_off + k] = vertex;
            unwelded_keys[emission.v_off + k] = key;
        }
        for (j, index) in emission.indices.into_iter().enumerate() {
            indices[emission.i_off + j] = index;
        }
    }
}
