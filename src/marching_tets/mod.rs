//! Marching tetrahedra over slices of a sampled scalar field.
//!
//! The extractor consumes a volume two z slices at a time and streams out
//! welded, key-tagged mesh chunks. Work proceeds in passes over flat buffers:
//!
//! 1. **Occupancy** - mark cells whose cube case emits vertices, scan the
//!    flags into compaction positions.
//! 2. **Counting** - look up each compacted cell's (vertex, index) counts and
//!    scan them into write offsets.
//! 3. **Generation** - interpolate each cell's vertices, tag them with packed
//!    spatial keys, and write triangle indices into the accumulation buffers.
//! 4. **Ship-out** - once the next layer would overflow the buffers (or the
//!    volume ends), sort vertices by key, weld duplicates, split internal from
//!    external vertices, reindex the triangles and hand the chunk to the
//!    output functor.
//!
//! Equal keys mean equal vertex locations, so neighbouring cells (and
//! neighbouring blocks, via the key offset) weld and stitch without any
//! geometric comparison.

use glam::UVec3;
use web_time::Instant;

pub mod layer;
pub mod parallel_iter;
pub mod primitives;
pub mod shipout;
pub mod slice;
pub mod tables;
pub mod types;


pub use slice::SliceImage;
pub use tables::CaseTables;
pub use types::{
    GenerateStats, KeyMesh, MeshSink, ResourceUsage, SliceSource, KEY_AXIS_BITS, MAX_DIMENSION,
    MAX_DIMENSION_LOG2,
};

use crate::ExtractError;
use types::CellRecord;

/// Upper bound on vertices a `(max_width, max_height)` engine can emit per
/// layer.
pub fn max_vertices(max_width: usize, max_height: usize) -> u64 {
    let slice_cells = (max_width as u64 - 1) * (max_height as u64 - 1);
    slice_cells * CaseTables::get().max_cell_vertices() as u64
}

/// Upper bound on triangles a `(max_width, max_height)` engine can emit per
/// layer.
pub fn max_triangles(max_width: usize, max_height: usize) -> u64 {
    let slice_cells = (max_width as u64 - 1) * (max_height as u64 - 1);
    slice_cells * (CaseTables::get().max_cell_indices() / 3) as u64
}

/// Exact memory an engine with these limits will allocate.
///
/// Kept in sync with the allocations in [`MarchingTets::new`].
pub fn resource_usage(max_width: usize, max_height: usize) -> Result<ResourceUsage, ExtractError> {
    validate_max_dims(max_width, max_height)?;

    let tables = CaseTables::get();
    let slice_cells = ((max_width - 1) * (max_height - 1)) as u64;
    let vertex_space = slice_cells * tables.max_cell_vertices() as u64;
    let index_space = slice_cells * tables.max_cell_indices() as u64;

    let mut usage = ResourceUsage::default();
    for _ in 0..2 {
        usage.add_image(max_width, max_height, std::mem::size_of::<f32>());
    }
    usage.add_buffer((slice_cells + 1) * 4); // occupied
    usage.add_buffer(slice_cells * std::mem::size_of::<CellRecord>() as u64); // cells
    usage.add_buffer((slice_cells + 1) * 8); // viCount
    usage.add_buffer(vertex_space * 16); // unwelded vertices
    usage.add_buffer((vertex_space + 1) * 8); // unwelded keys (+ sentinel)
    usage.add_buffer((vertex_space + 1) * 4); // vertexUnique
    usage.add_buffer(vertex_space * 4); // indexRemap
    usage.add_buffer(vertex_space * 12); // welded vertices
    usage.add_buffer(vertex_space * 8); // welded keys
    usage.add_buffer(index_space * 4); // indices
    usage.add_buffer(vertex_space * 8); // sort scratch keys
    usage.add_buffer(vertex_space * 16); // sort scratch vertices
    Ok(usage)
}

fn validate_max_dims(max_width: usize, max_height: usize) -> Result<(), ExtractError> {
    if !(2..=MAX_DIMENSION).contains(&max_width) || !(2..=MAX_DIMENSION).contains(&max_height) {
        return Err(ExtractError::InvalidArgument(format!(
            "slice dimensions {max_width}x{max_height} outside 2..={MAX_DIMENSION}"
        )));
    }
    Ok(())
}

/// The extraction engine.
///
/// Construction sizes every buffer for the worst case of a single layer at
/// `(max_width, max_height)`; `generate` may then be called any number of
/// times with sizes up to those limits, recycling the same storage.
pub struct MarchingTets {
    max_width: usize,
    max_height: usize,
    pub(crate) vertex_space: usize,
    pub(crate) index_space: usize,
    pub(crate) sort_key_bits: u32,
    pub(crate) tables: &'static CaseTables,

    pub(crate) slices: [SliceImage; 2],
    pub(crate) occupied: Vec<u32>,
    pub(crate) cells: Vec<CellRecord>,
    pub(crate) vi_count: Vec<[u32; 2]>,
    pub(crate) unwelded_vertices: Vec<[f32; 4]>,
    pub(crate) unwelded_keys: Vec<u64>,
    pub(crate) vertex_unique: Vec<u32>,
    pub(crate) index_remap: Vec<u32>,
    pub(crate) welded_vertices: Vec<[f32; 3]>,
    pub(crate) welded_keys: Vec<u64>,
    pub(crate) indices: Vec<u32>,
    pub(crate) tmp_keys: Vec<u64>,
    pub(crate) tmp_vertices: Vec<[f32; 4]>,
}

impl MarchingTets {
    pub fn new(max_width: usize, max_height: usize) -> Result<Self, ExtractError> {
        validate_max_dims(max_width, max_height)?;

        let tables = CaseTables::get();
        let slice_cells = (max_width - 1) * (max_height - 1);
        let vertex_space = slice_cells * tables.max_cell_vertices();
        let index_space = slice_cells * tables.max_cell_indices();

        // If these change, update resource_usage above.
        Ok(Self {
            max_width,
            max_height,
            vertex_space,
            index_space,
            sort_key_bits: 64,
            tables,
            slices: [
                SliceImage::new(max_width, max_height),
                SliceImage::new(max_width, max_height),
            ],
            occupied: vec![0; slice_cells + 1],
            cells: vec![CellRecord::default(); slice_cells],
            vi_count: vec![[0; 2]; slice_cells + 1],
            unwelded_vertices: vec![[0.0; 4]; vertex_space],
            unwelded_keys: vec![0; vertex_space + 1],
            vertex_unique: vec![0; vertex_space + 1],
            index_remap: vec![0; vertex_space],
            welded_vertices: vec![[0.0; 3]; vertex_space],
            welded_keys: vec![0; vertex_space],
            indices: vec![0; index_space],
            tmp_keys: vec![0; vertex_space],
            tmp_vertices: vec![[0.0; 4]; vertex_space],
        })
    }

    /// Restrict the radix sort to the low `bits` key bits.
    ///
    /// All 64 bits are significant in the worst case, which is the default;
    /// callers that bound their grids more tightly can shave sort passes.
    pub fn set_sort_key_bits(&mut self, bits: u32) {
        self.sort_key_bits = bits.clamp(1, 64);
    }

    /// Shrink the accumulation limits below their allocated sizes, to force
    /// mid-run ship-outs in tests.
    #[cfg(test)]
    pub(crate) fn limit_spaces(&mut self, vertex_space: usize, index_space: usize) {
        assert!(vertex_space <= self.unwelded_vertices.len());
        assert!(index_space <= self.indices.len());
        self.vertex_space = vertex_space;
        self.index_space = index_space;
    }

    /// Extract the surface of a `(width, height, depth)` volume.
    ///
    /// The input functor fills one slice at a time; the output functor
    /// receives one or more welded chunks, each spanning a whole number of
    /// layers. `key_offset` is the block's origin in doubled key units and is
    /// folded into every delivered vertex key.
    pub fn generate<I, O>(
        &mut self,
        input: &mut I,
        output: &mut O,
        size: (usize, usize, usize),
        key_offset: UVec3,
    ) -> Result<GenerateStats, ExtractError>
    where
        I: SliceSource,
        O: MeshSink,
    {
        let (width, height, depth) = size;
        if !(2..=self.max_width).contains(&width) || !(2..=self.max_height).contains(&height) {
            return Err(ExtractError::InvalidArgument(format!(
                "volume {width}x{height} exceeds engine limits {}x{}",
                self.max_width, self.max_height
            )));
        }
        if depth < 1 {
            return Err(ExtractError::InvalidArgument(
                "depth must be at least 1".to_string(),
            ));
        }

        let total_start = Instant::now();
        let mut stats = GenerateStats::default();
        let layer_cells = (width - 1) * (height - 1);

        let input_start = Instant::now();
        input
            .fill_slice(&mut self.slices[1], 0)
            .map_err(ExtractError::Input)?;
        stats.input_time_secs += input_start.elapsed().as_secs_f64();

        // Accumulated (vertex, index) counts not yet shipped.
        let mut offsets = [0u32; 2];

        for z in 1..depth {
            self.slices.swap(0, 1);
            let input_start = Instant::now();
            input
                .fill_slice(&mut self.slices[1], z)
                .map_err(ExtractError::Input)?;
            stats.input_time_secs += input_start.elapsed().as_secs_f64();

            let layer_start = Instant::now();
            stats.slices += 1;

            layer::count_occupied(
                self.tables,
                &self.slices[0],
                &self.slices[1],
                width,
                height,
                &mut self.occupied,
            );
            primitives::exclusive_scan(&mut self.occupied[..=layer_cells]);
            let compacted = self.occupied[layer_cells] as usize;
            if compacted == 0 {
                stats.layer_time_secs += layer_start.elapsed().as_secs_f64();
                continue;
            }
            stats.nonempty_slices += 1;
            stats.cells += compacted as u64;

            layer::compact(
                &self.slices[0],
                &self.slices[1],
                width,
                height,
                &self.occupied,
                &mut self.cells,
            );
            layer::count_elements(
                self.tables,
                &self.cells[..compacted],
                &mut self.vi_count,
            );
            primitives::exclusive_scan_pairs(&mut self.vi_count[..=compacted]);
            let counts = self.vi_count[compacted];
            stats.layer_time_secs += layer_start.elapsed().as_secs_f64();

            if offsets[0] + counts[0] > self.vertex_space as u32
                || offsets[1] + counts[1] > self.index_space as u32
            {
                // The engine must be able to hold at least one layer.
                if counts[0] > self.vertex_space as u32 || counts[1] > self.index_space as u32 {
                    return Err(ExtractError::ResourceExhausted {
                        needed_vertices: counts[0],
                        needed_indices: counts[1],
                        vertex_space: self.vertex_space,
                        index_space: self.index_space,
                    });
                }

                // Too much in this layer to just append: ship what we have
                // before processing it. The cut lands between layers, so the
                // whole cut plane becomes the external stitching surface.
                self.ship_out(key_offset, offsets, 2 * (z as u32 - 1), output, &mut stats)?;
                offsets = [0, 0];
            }

            let layer_start = Instant::now();
            layer::generate_elements(
                self.tables,
                &self.slices[0],
                &self.slices[1],
                &self.cells[..compacted],
                &self.vi_count,
                z,
                offsets,
                &mut self.unwelded_vertices,
                &mut self.unwelded_keys,
                &mut self.indices,
            );
            offsets[0] += counts[0];
            offsets[1] += counts[1];
            stats.unwelded_vertices += counts[0] as u64;
            stats.layer_time_secs += layer_start.elapsed().as_secs_f64();
        }

        if offsets[0] > 0 {
            self.ship_out(key_offset, offsets, 2 * (depth as u32 - 1), output, &mut stats)?;
        }

        stats.total_time_secs = total_start.elapsed().as_secs_f64();
        Ok(stats)
    }
}
