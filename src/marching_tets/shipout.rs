//! The ship-out pipeline: weld accumulated vertices, split internal from
//! external, reindex triangles and deliver the chunk.
//!
//! Vertices are welded purely through their spatial keys: sorting brings
//! duplicates together, a uniqueness scan numbers the welded slots, and a
//! compaction pass writes each duplicate run's representative while recording
//! the old-index -> welded-index remap through the payload word each vertex
//! carries. A vertex is external when its key lies on the shipped region's
//! upper-z boundary; because keys order by z first, the externals are exactly
//! the tail of the welded arrays.

use glam::UVec3;

use crate::marching_tets::parallel_iter;
use crate::marching_tets::primitives;
use crate::marching_tets::types::{GenerateStats, KeyMesh, MeshSink, KEY_AXIS_BITS};
use crate::marching_tets::MarchingTets;
use crate::ExtractError;

impl MarchingTets {
    /// Weld `sizes = (V, I)` accumulated elements and hand them to `output`.
    ///
    /// `z_max` is the doubled z coordinate of the region's upper boundary:
    /// welded vertices with key z at or beyond it are classified external.
    pub(crate) fn ship_out<O: MeshSink>(
        &mut self,
        key_offset: UVec3,
        sizes: [u32; 2],
        z_max: u32,
        output: &mut O,
        stats: &mut GenerateStats,
    ) -> Result<(), ExtractError> {
        let start = web_time::Instant::now();
        let num_unwelded = sizes[0] as usize;
        let num_indices = sizes[1] as usize;

        // A sentinel above every real key keeps the uniqueness pass from
        // special-casing the last element.
        self.unwelded_keys[num_unwelded] = u64::MAX;
        primitives::sort_pairs(
            &mut self.unwelded_keys,
            &mut self.unwelded_vertices,
            num_unwelded,
            self.sort_key_bits,
            &mut self.tmp_keys,
            &mut self.tmp_vertices,
        );

        // Count unique keys: a 1 at every run start, scanned into welded slots.
        let keys = &self.unwelded_keys;
        let flags = parallel_iter::map_range(0..num_unwelded, |i| {
            (i == 0 || keys[i] != keys[i - 1]) as u32
        });
        self.vertex_unique[..num_unwelded].copy_from_slice(&flags);
        primitives::exclusive_scan(&mut self.vertex_unique[..=num_unwelded]);
        let num_welded = self.vertex_unique[num_unwelded];

        let min_external_key = (z_max as u64) << (2 * KEY_AXIS_BITS + 1);
        let key_offset_l = ((key_offset.z as u64) << (2 * KEY_AXIS_BITS + 1))
            | ((key_offset.y as u64) << (KEY_AXIS_BITS + 1))
            | ((key_offset.x as u64) << 1);

        // Compact each duplicate run to one welded vertex, globalize its key,
        // find the first external slot and build the index remap.
        let mut first_external = num_welded;
        for i in 0..num_unwelded {
            let welded = self.vertex_unique[i + 1] - 1;
            let vertex = self.unwelded_vertices[i];
            if self.vertex_unique[i] != self.vertex_unique[i + 1] {
                self.welded_vertices[welded as usize] = [vertex[0], vertex[1], vertex[2]];
                let key = self.unwelded_keys[i];
                self.welded_keys[welded as usize] = key + key_offset_l;
                if key >= min_external_key && first_external == num_welded {
                    first_external = welded;
                }
            }
            self.index_remap[vertex[3].to_bits() as usize] = welded;
        }

        // Rewrite the triangles against the welded numbering.
        let remap = &self.index_remap;
        let old_indices = &self.indices;
        let remapped =
            parallel_iter::map_range(0..num_indices, |j| remap[old_indices[j] as usize]);
        self.indices[..num_indices].copy_from_slice(&remapped);

        let mesh = KeyMesh {
            vertices: &self.welded_vertices[..num_welded as usize],
            vertex_keys: &self.welded_keys[..num_welded as usize],
            triangles: bytemuck::cast_slice(&self.indices[..num_indices]),
            num_internal_vertices: first_external,
        };
        stats.ship_outs += 1;
        stats.welded_vertices += num_welded as u64;
        stats.triangles += (num_indices / 3) as u64;

        let result = output.consume(mesh).map_err(ExtractError::Output);
        stats.shipout_time_secs += start.elapsed().as_secs_f64();
        result
    }
}
