//! Type definitions for the marching-tetrahedra pipeline.
//!
//! Contains the packed-key layout, the input/output functor traits, the
//! welded output mesh, statistics, and resource accounting.

use crate::marching_tets::slice::SliceImage;

// =============================================================================
// PACKED VERTEX KEYS
// =============================================================================

/// Bits reserved per axis in a packed spatial key.
pub const KEY_AXIS_BITS: u32 = 21;

/// log2 of the maximum grid dimension per axis.
pub const MAX_DIMENSION_LOG2: u32 = 13;

/// Maximum supported grid dimension per axis.
pub const MAX_DIMENSION: usize = 1 << MAX_DIMENSION_LOG2;

// A doubled coordinate (2c + d, d in {0, 1, 2}) must fit in an axis field.
const _: () = assert!(2 * MAX_DIMENSION < 1 << KEY_AXIS_BITS);

/// Pack doubled per-axis coordinates into a 64-bit spatial key.
///
/// Each component is `2 * coordinate + delta` with delta in {0, 1, 2}: even
/// values name positions on cell faces, odd values name edge midpoints. The
/// low bit is reserved and left zero for vertex keys.
///
/// Keys order vertices by (z, y, x), which is what lets the ship-out stage
/// find the external boundary with a single comparison after sorting.
#[inline]
pub fn pack_vertex_key(x2: u32, y2: u32, z2: u32) -> u64 {
    ((z2 as u64) << (2 * KEY_AXIS_BITS + 1))
        | ((y2 as u64) << (KEY_AXIS_BITS + 1))
        | ((x2 as u64) << 1)
}

// =============================================================================
// INPUT / OUTPUT FUNCTORS
// =============================================================================

/// Producer of field slices.
///
/// `fill_slice` must fill the scalar field at slice `z` into the destination
/// image, covering at least the width x height region the extractor was asked
/// to generate. Field values are signed distances to the surface; a sample is
/// outside iff its value is >= 0.
pub trait SliceSource {
    fn fill_slice(&mut self, dest: &mut SliceImage, z: usize) -> anyhow::Result<()>;
}

impl<F> SliceSource for F
where
    F: FnMut(&mut SliceImage, usize) -> anyhow::Result<()>,
{
    fn fill_slice(&mut self, dest: &mut SliceImage, z: usize) -> anyhow::Result<()> {
        self(dest, z)
    }
}

/// Consumer of welded mesh chunks.
///
/// The mesh borrows the engine's output buffers; the extractor does not start
/// the next ship-out until `consume` returns.
pub trait MeshSink {
    fn consume(&mut self, mesh: KeyMesh<'_>) -> anyhow::Result<()>;
}

impl<F> MeshSink for F
where
    F: FnMut(KeyMesh<'_>) -> anyhow::Result<()>,
{
    fn consume(&mut self, mesh: KeyMesh<'_>) -> anyhow::Result<()> {
        self(mesh)
    }
}

/// One welded mesh chunk, as handed to a [`MeshSink`].
///
/// `vertex_keys` are global: the engine has already added the block's key
/// offset. Vertices are ordered by key, so the internal vertices (those
/// strictly below the chunk's upper-z boundary) occupy indices
/// `0..num_internal_vertices` and the external stitching surface occupies the
/// rest.
#[derive(Clone, Copy, Debug)]
pub struct KeyMesh<'a> {
    /// Welded vertex positions in grid coordinates.
    pub vertices: &'a [[f32; 3]],
    /// Welded per-vertex spatial keys, globally unique across blocks.
    pub vertex_keys: &'a [u64],
    /// Triangles as welded vertex indices.
    pub triangles: &'a [[u32; 3]],
    /// Count of vertices strictly interior to the shipped region.
    pub num_internal_vertices: u32,
}

// =============================================================================
// COMPACTED CELLS
// =============================================================================

/// A nonempty cell surviving occupancy compaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct CellRecord {
    pub x: u16,
    pub y: u16,
    pub cube: u8,
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Counters and timings for one `generate` call.
#[derive(Clone, Debug, Default)]
pub struct GenerateStats {
    /// Layers processed (depth - 1).
    pub slices: usize,
    /// Layers that contained at least one occupied cell.
    pub nonempty_slices: usize,
    /// Number of ship-outs delivered to the output functor.
    pub ship_outs: usize,
    /// Occupied cells across all layers.
    pub cells: u64,
    /// Vertices emitted before welding.
    pub unwelded_vertices: u64,
    /// Vertices delivered after welding.
    pub welded_vertices: u64,
    /// Triangles delivered.
    pub triangles: u64,
    /// Total wall-clock time for the call (seconds).
    pub total_time_secs: f64,
    /// Time spent filling slices through the input functor.
    pub input_time_secs: f64,
    /// Time spent in the per-layer passes (occupancy, count, generate).
    pub layer_time_secs: f64,
    /// Time spent welding and delivering output (includes the sink call).
    pub shipout_time_secs: f64,
}

impl GenerateStats {
    /// Print a human-readable report to stdout.
    pub fn print_report(&self) {
        println!("=== Marching Tetrahedra Report ===");
        println!("Total time: {:.2}ms", self.total_time_secs * 1000.0);
        println!(
            "  input {:.2}ms, layers {:.2}ms, ship-out {:.2}ms",
            self.input_time_secs * 1000.0,
            self.layer_time_secs * 1000.0,
            self.shipout_time_secs * 1000.0
        );
        println!("Layers: {} ({} nonempty)", self.slices, self.nonempty_slices);
        println!("Occupied cells: {}", self.cells);
        println!(
            "Vertices: {} unwelded -> {} welded",
            self.unwelded_vertices, self.welded_vertices
        );
        println!("Triangles: {}", self.triangles);
        println!("Ship-outs: {}", self.ship_outs);
        println!("==================================");
    }
}

// =============================================================================
// RESOURCE ACCOUNTING
// =============================================================================

/// Memory the engine will allocate for given maximum slice dimensions.
///
/// Mirrors the actual allocations in `MarchingTets::new` so embedders can
/// validate sizes before construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub image_bytes: u64,
    pub buffer_bytes: u64,
}

impl ResourceUsage {
    pub(crate) fn add_image(&mut self, width: usize, height: usize, bytes_per_texel: usize) {
        self.image_bytes += (width * height * bytes_per_texel) as u64;
    }

    pub(crate) fn add_buffer(&mut self, bytes: u64) {
        self.buffer_bytes += bytes;
    }

    /// Combined image and buffer footprint.
    pub fn total_bytes(&self) -> u64 {
        self.image_bytes + self.buffer_bytes
    }
}
