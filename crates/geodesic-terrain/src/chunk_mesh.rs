//! Writes chunk vertices, faces and normals into flat buffers a renderer can upload directly.
//!
//! Vertex normals are the normalized sum of the unweighted normals of the faces around them. Since
//! shared vertices are used by many chunks, every chunk remembers what it added to their sums, so
//! removing or restitching a chunk subtracts exactly that without revisiting its neighbors.

use crate::chunk::{ChunkSkeleton, ChunkStitch};
use crate::chunk_utils::*;
use crate::ids::*;
use crate::skeleton::SubdivTriangleSkeleton;
use crate::skeleton_data::SkeletonVertexData;

use geodesic_core::glam::{DVec3, I64Vec3, Vec3};
use geodesic_core::{Id, IdSet, MaybeNewId, SmallKeyHashMap};
use itertools::Itertools;
use std::{io, mem};

/// Elevation of the terrain above the sphere.
pub trait Heightmap {
    /// Meters above the sphere at `position`, a point on the sphere in planet-centered meters.
    fn height(&self, position: DVec3) -> f64;
}

impl<F: Fn(DVec3) -> f64> Heightmap for F {
    fn height(&self, position: DVec3) -> f64 {
        self(position)
    }
}

/// A smooth sphere.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flat;

impl Heightmap for Flat {
    fn height(&self, _position: DVec3) -> f64 {
        0.0
    }
}

/// What a chunk's fan faces added to the normal of one shared vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FanNormalContrib {
    pub shared: Option<SharedVrtxId>,
    pub sum: Vec3,
}

/// Vertex and index buffers for all chunks, laid out by [`ChunkMeshBufferInfo`].
///
/// Positions are in meters, relative to `origin_skel_pos`.
#[derive(Clone, Debug)]
pub struct ChunkMeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<[VertexIdx; 3]>,

    /// Per shared vertex, the sum of the normals of every face around it.
    pub shared_normal_sum: Vec<Vec3>,
    /// Per shared vertex, the position before the heightmap is applied.
    pub shared_pos_no_heightmap: Vec<Vec3>,
    /// Per chunk and local shared vertex, what the fill faces added to `shared_normal_sum`.
    pub chunk_fill_shared_normals: Vec<Vec3>,
    /// Per chunk, what the fan faces added to `shared_normal_sum`.
    pub chunk_fan_normal_contrib: Vec<FanNormalContrib>,

    /// Skeleton position that maps to `(0, 0, 0)` in the mesh.
    pub origin_skel_pos: I64Vec3,
}

impl ChunkMeshGeometry {
    pub fn new(info: &ChunkMeshBufferInfo, chunks: &ChunkSkeleton) -> Self {
        let max_chunks = chunks.chunk_ids().capacity();
        let max_shared = chunks.shared_ids().capacity();
        Self {
            positions: vec![Vec3::ZERO; info.vrtx_total as usize],
            normals: vec![Vec3::ZERO; info.vrtx_total as usize],
            indices: vec![[0; 3]; info.face_total as usize],
            shared_normal_sum: vec![Vec3::ZERO; max_shared],
            shared_pos_no_heightmap: vec![Vec3::ZERO; max_shared],
            chunk_fill_shared_normals: vec![Vec3::ZERO; max_chunks * chunks.chunk_shared_count()],
            chunk_fan_normal_contrib: vec![
                FanNormalContrib::default();
                max_chunks * info.fan_max_shared_count as usize
            ],
            origin_skel_pos: I64Vec3::ZERO,
        }
    }

    /// Faces of one chunk. Unused trailing faces are `[0, 0, 0]`.
    pub fn chunk_faces(&self, info: &ChunkMeshBufferInfo, chunk: ChunkId) -> &[[VertexIdx; 3]] {
        let stride = info.chunk_max_face_count as usize;
        &self.indices[chunk.index() * stride..(chunk.index() + 1) * stride]
    }

    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normals_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn indices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Reusable state for updating chunks.
#[derive(Clone, Debug)]
pub struct ChunkScratchpad {
    pub lut: ChunkFillSubdivLUT,
    /// Per chunk, the stitch to apply in the next [`update_faces`].
    pub stitch_cmds: Vec<ChunkStitch>,
    pub edge_vertices: [Vec<MaybeNewId<SkVrtxId>>; 3],

    pub chunks_added: IdSet<ChunkId>,
    pub chunks_removed: IdSet<ChunkId>,
    pub shared_added: IdSet<SharedVrtxId>,
    pub shared_removed: IdSet<SharedVrtxId>,
    pub shared_normals_dirty: IdSet<SharedVrtxId>,

    fan_contrib_slots: SmallKeyHashMap<SharedVrtxId, usize>,
    chunk_buffer: Vec<ChunkId>,
}

impl ChunkScratchpad {
    pub fn new(chunks: &ChunkSkeleton) -> Self {
        let max_chunks = chunks.chunk_ids().capacity();
        let max_shared = chunks.shared_ids().capacity();
        let edge_len = chunks.chunk_width() - 1;
        Self {
            lut: ChunkFillSubdivLUT::new(chunks.chunk_subdiv_level()),
            stitch_cmds: vec![ChunkStitch::DISABLED; max_chunks],
            edge_vertices: [(); 3].map(|_| Vec::with_capacity(edge_len)),
            chunks_added: IdSet::with_capacity(max_chunks),
            chunks_removed: IdSet::with_capacity(max_chunks),
            shared_added: IdSet::with_capacity(max_shared),
            shared_removed: IdSet::with_capacity(max_shared),
            shared_normals_dirty: IdSet::with_capacity(max_shared),
            fan_contrib_slots: SmallKeyHashMap::default(),
            chunk_buffer: Vec::with_capacity(max_chunks),
        }
    }

    /// Takes the empty chunk buffer. Hand it back with [`Self::return_chunk_buffer`].
    pub fn take_chunk_buffer(&mut self) -> Vec<ChunkId> {
        mem::take(&mut self.chunk_buffer)
    }

    pub fn return_chunk_buffer(&mut self, mut buffer: Vec<ChunkId>) {
        buffer.clear();
        self.chunk_buffer = buffer;
    }

    /// Forgets the changes recorded by the last update.
    pub fn clear_changes(&mut self) {
        self.chunks_added.clear();
        self.chunks_removed.clear();
        self.shared_added.clear();
        self.shared_removed.clear();
        self.shared_normals_dirty.clear();
    }
}

/// Queues stitch commands for a new chunk and for the chunks around it.
///
/// Neighbors of the same detail get a plain stitch (unless they already stitch towards someone
/// else). Less detailed neighbors get a 2x detail stitch towards this chunk, and this chunk gets
/// a 2x detail stitch when a neighbor is subdivided into chunks.
pub fn restitch_check(
    chunk: ChunkId,
    tri: SkTriId,
    chunks: &ChunkSkeleton,
    skel: &SubdivTriangleSkeleton,
    sp: &mut ChunkScratchpad,
) {
    let mut own_cmd = ChunkStitch::SAME_DETAIL;

    for (edge, neighbor) in skel.tri_at(tri).neighbors().iter().enumerate() {
        if let Some(neighbor) = *neighbor {
            if let Some(neighbor_chunk) = chunks.tri_chunk(neighbor) {
                let cmd = &mut sp.stitch_cmds[neighbor_chunk.index()];
                if cmd.enabled {
                    // Another new chunk already decided.
                    continue;
                }
                let current = chunks.stitch(neighbor_chunk);
                if current.enabled && !current.detail_x2 {
                    continue;
                }
                if current.detail_x2
                    && skel.tri_at(neighbor).neighbor(usize::from(current.x2_own_edge)) != Some(tri)
                {
                    // Stitched to more detail elsewhere.
                    continue;
                }
                // Either not stitched yet, or stitched towards detail that was just removed here.
                *cmd = ChunkStitch::SAME_DETAIL;
            } else {
                let neighbor_tri = skel.tri_at(neighbor);
                let children = match neighbor_tri.children() {
                    Some(children) => children,
                    // Hole in the terrain.
                    None => continue,
                };
                let neighbor_edge = neighbor_tri.find_neighbor_index(tri);
                let child_a = chunks.tri_chunk(tri_id(children, neighbor_edge));
                let child_b = chunks.tri_chunk(tri_id(children, (neighbor_edge + 1) % 3));
                let (child_a, child_b) = match (child_a, child_b) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                };

                // The children may still stitch towards even more detail that used to be here.
                for child in [child_a, child_b] {
                    let current = chunks.stitch(child);
                    let cmd = &mut sp.stitch_cmds[child.index()];
                    if !cmd.enabled
                        && current.detail_x2
                        && usize::from(current.x2_own_edge) == neighbor_edge
                    {
                        *cmd = ChunkStitch::SAME_DETAIL;
                    }
                }

                own_cmd = ChunkStitch::detail_x2(edge, neighbor_edge);
            }
        } else if tri_sibling_index(tri) != 3 {
            // The parent's neighbor across this edge may be a leaf. Sibling 3 sits in the middle
            // of its parent and never touches the parent's neighbors.
            let parent = match skel.tri_group_at(tri_group_id(tri)).parent() {
                Some(parent) => parent,
                None => continue,
            };
            let parent_neighbor = match skel.tri_at(parent).neighbor(edge) {
                Some(parent_neighbor) => parent_neighbor,
                None => continue,
            };
            if let Some(parent_neighbor_chunk) = chunks.tri_chunk(parent_neighbor) {
                let desired = ChunkStitch::detail_x2(
                    skel.tri_at(parent_neighbor).find_neighbor_index(parent),
                    edge,
                );
                let cmd = &mut sp.stitch_cmds[parent_neighbor_chunk.index()];
                debug_assert!(!cmd.enabled || !cmd.detail_x2 || *cmd == desired);
                *cmd = desired;
            }
        }
    }

    sp.stitch_cmds[chunk.index()] = own_cmd;
}

struct TerrainFaceWriter<'a> {
    positions: &'a [Vec3],
    normals: &'a mut [Vec3],
    shared_normal_sum: &'a mut [Vec3],
    fill_normal_contrib: &'a mut [Vec3],
    fan_normal_contrib: &'a mut [FanNormalContrib],
    fan_contrib_slots: &'a mut SmallKeyHashMap<SharedVrtxId, usize>,
    shared_used: &'a [Option<SharedVrtxOwner>],
    shared_normals_dirty: &'a mut IdSet<SharedVrtxId>,
    faces: &'a mut [[VertexIdx; 3]],
    face_cursor: usize,
    face_normal: Vec3,
}

impl TerrainFaceWriter<'_> {
    fn add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx) {
        let [pa, pb, pc] = [a, b, c].map(|v| self.positions[v as usize]);
        self.face_normal = (pb - pa).cross(pc - pa).normalize_or_zero();
        self.faces[self.face_cursor] = [a, b, c];
        self.face_cursor += 1;
    }
}

impl FaceWriter for TerrainFaceWriter<'_> {
    fn fill_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx) {
        self.add_face(a, b, c);
    }

    fn fill_add_normal_filled(&mut self, vertex: VertexIdx) {
        self.normals[vertex as usize] += self.face_normal;
    }

    fn fill_add_normal_shared(&mut self, _vertex: VertexIdx, local: usize) {
        let shared = match &self.shared_used[local] {
            Some(owner) => owner.id(),
            None => panic!("chunk border is missing shared vertex {}", local),
        };
        self.fill_normal_contrib[local] += self.face_normal;
        self.shared_normal_sum[shared.index()] += self.face_normal;
        self.shared_normals_dirty.insert(shared);
    }

    fn fan_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx) {
        self.add_face(a, b, c);
    }

    fn fan_add_normal_shared(&mut self, _vertex: VertexIdx, shared: SharedVrtxId) {
        self.shared_normal_sum[shared.index()] += self.face_normal;
        self.shared_normals_dirty.insert(shared);

        let next_slot = self.fan_contrib_slots.len();
        let slot = *self.fan_contrib_slots.entry(shared).or_insert(next_slot);
        let contrib = &mut self.fan_normal_contrib[slot];
        if slot == next_slot {
            *contrib = FanNormalContrib {
                shared: Some(shared),
                sum: Vec3::ZERO,
            };
        }
        contrib.sum += self.face_normal;
    }
}

/// Rewrites the faces of a chunk as requested by its stitch command.
///
/// Newly added chunks get their fill faces and fill normals. Fan faces are only rewritten when a
/// stitch command is queued, after subtracting what the previous fan added to shared normals.
/// Positions of every vertex the chunk uses must already be written.
#[allow(clippy::too_many_arguments)]
pub fn update_faces(
    chunk: ChunkId,
    tri: SkTriId,
    newly_added: bool,
    skel: &SubdivTriangleSkeleton,
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    sp: &mut ChunkScratchpad,
    chunks: &mut ChunkSkeleton,
) {
    let cmd = sp.stitch_cmds[chunk.index()];
    if !newly_added && !cmd.enabled {
        return;
    }

    let fill_count = info.fill_vrtx_count as usize;
    let fill_start = info.chunk_fill_offset(chunk) as usize;
    let shared_count = chunks.chunk_shared_count();
    let fan_stride = info.fan_max_shared_count as usize;
    let face_stride = info.chunk_max_face_count as usize;
    let fill_face_count = info.fill_face_count as usize;

    if newly_added {
        // Whatever a removed chunk left behind.
        geom.normals[fill_start..fill_start + fill_count].fill(Vec3::ZERO);
        chunk_row_mut(&mut geom.chunk_fill_shared_normals, chunk, shared_count).fill(Vec3::ZERO);
        chunk_row_mut(&mut geom.chunk_fan_normal_contrib, chunk, fan_stride)
            .fill(FanNormalContrib::default());

        let width = chunks.chunk_width() as u32;

        let mut writer = face_writer(chunk, geom, info, sp, chunks, 0);
        let vrtx = |x, y| chunk_coord_to_vrtx(chunks, info, chunk, x, y);
        let add_fill_tri = |writer: &mut TerrainFaceWriter, coords: [(u32, u32); 3]| {
            let [a, b, c] = coords.map(|(x, y)| vrtx(x, y));
            writer.fill_add_face(a.vertex, b.vertex, c.vertex);
            for v in [a, b, c] {
                match v.local_shared {
                    Some(local) => writer.fill_add_normal_shared(v.vertex, local),
                    None => writer.fill_add_normal_filled(v.vertex),
                }
            }
        };
        for (x, y) in (0..width).flat_map(|y| (0..y).map(move |x| (x, y))) {
            // Pointing down.
            add_fill_tri(&mut writer, [(x + 1, y + 1), (x + 1, y), (x, y)]);
            // Pointing up, unless that would put a whole edge on the border.
            if x + 1 != y && y != width - 1 {
                add_fill_tri(&mut writer, [(x + 1, y), (x + 1, y + 1), (x + 2, y + 1)]);
            }
        }
        debug_assert_eq!(writer.face_cursor, fill_face_count);

        for normal in &mut geom.normals[fill_start..fill_start + fill_count] {
            *normal = normal.normalize_or_zero();
        }
    }

    let mut face_cursor = fill_face_count;

    if cmd.enabled {
        if chunks.stitch(chunk).enabled {
            subtract_normal_contrib(chunk, false, geom, info, sp, chunks);
        }
        chunks.set_stitch(chunk, cmd);
        chunk_row_mut(&mut geom.chunk_fan_normal_contrib, chunk, fan_stride)
            .fill(FanNormalContrib::default());
        sp.fan_contrib_slots.clear();

        let chunks: &ChunkSkeleton = chunks;
        let (edge0, edge1) = if cmd.detail_x2 {
            // Shared vertices of the 2 detailed chunks along the edge, in the neighbor's order.
            let neighbor = skel
                .tri_at(tri)
                .neighbor(usize::from(cmd.x2_own_edge))
                .and_then(|neighbor| skel.tri_at(neighbor).children());
            let children = match neighbor {
                Some(children) => children,
                None => panic!("{:?} stitches towards a neighbor without children", chunk),
            };
            let neighbor_edge = usize::from(cmd.x2_neighbor_edge);
            let child_edge = move |sibling: usize| match chunks.tri_chunk(tri_id(children, sibling)) {
                Some(child) => chunks.shared_edge(child, neighbor_edge),
                None => panic!("{:?} stitches towards a neighbor without chunks", chunk),
            };
            (child_edge(neighbor_edge), child_edge((neighbor_edge + 1) % 3))
        } else {
            (&[][..], &[][..])
        };

        let stitcher = ChunkFanStitcher::new(chunk, edge0, edge1, chunks, info);
        let mut writer = face_writer(chunk, geom, info, sp, chunks, fill_face_count);
        stitcher.stitch(cmd, &mut writer);
        face_cursor = writer.face_cursor;
        debug_assert!(writer.fan_contrib_slots.len() <= fan_stride);
    }

    let faces = chunk_row_mut(&mut geom.indices, chunk, face_stride);
    faces[face_cursor..].fill([0; 3]);
}

fn face_writer<'a>(
    chunk: ChunkId,
    geom: &'a mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    sp: &'a mut ChunkScratchpad,
    chunks: &'a ChunkSkeleton,
    face_cursor: usize,
) -> TerrainFaceWriter<'a> {
    let ChunkMeshGeometry {
        positions,
        normals,
        indices,
        shared_normal_sum,
        chunk_fill_shared_normals,
        chunk_fan_normal_contrib,
        ..
    } = geom;
    TerrainFaceWriter {
        positions,
        normals,
        shared_normal_sum,
        fill_normal_contrib: chunk_row_mut(chunk_fill_shared_normals, chunk, chunks.chunk_shared_count()),
        fan_normal_contrib: chunk_row_mut(
            chunk_fan_normal_contrib,
            chunk,
            info.fan_max_shared_count as usize,
        ),
        fan_contrib_slots: &mut sp.fan_contrib_slots,
        shared_used: chunks.shared_vertices_used(chunk),
        shared_normals_dirty: &mut sp.shared_normals_dirty,
        faces: chunk_row_mut(indices, chunk, info.chunk_max_face_count as usize),
        face_cursor,
        face_normal: Vec3::ZERO,
    }
}

fn chunk_row_mut<T>(buffer: &mut [T], chunk: ChunkId, stride: usize) -> &mut [T] {
    &mut buffer[chunk.index() * stride..(chunk.index() + 1) * stride]
}

/// Takes back what a chunk added to shared vertex normals: always the fan faces, and the fill faces
/// too if `include_fill`. Shared vertices removed during this update are skipped.
pub fn subtract_normal_contrib(
    chunk: ChunkId,
    include_fill: bool,
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    sp: &mut ChunkScratchpad,
    chunks: &ChunkSkeleton,
) {
    let is_live = |shared: SharedVrtxId| {
        chunks.shared_ids().exists(shared) && !sp.shared_removed.contains(shared)
    };

    let fan_row = chunk_row_mut(
        &mut geom.chunk_fan_normal_contrib,
        chunk,
        info.fan_max_shared_count as usize,
    );
    for contrib in fan_row {
        let shared = match contrib.shared {
            Some(shared) => shared,
            None => break,
        };
        if is_live(shared) {
            geom.shared_normal_sum[shared.index()] -= contrib.sum;
            sp.shared_normals_dirty.insert(shared);
        }
        *contrib = FanNormalContrib::default();
    }

    if !include_fill {
        return;
    }
    let fill_row = chunk_row_mut(
        &mut geom.chunk_fill_shared_normals,
        chunk,
        chunks.chunk_shared_count(),
    );
    for (slot, contrib) in chunks.shared_vertices_used(chunk).iter().zip(fill_row) {
        if let Some(owner) = slot {
            let shared = owner.id();
            if is_live(shared) {
                geom.shared_normal_sum[shared.index()] -= *contrib;
                sp.shared_normals_dirty.insert(shared);
            }
        }
        *contrib = Vec3::ZERO;
    }
}

/// Normalizes the summed normals of every shared vertex touched since the last call.
pub fn update_dirty_shared_normals(
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    sp: &mut ChunkScratchpad,
) {
    for shared in sp.shared_normals_dirty.iter() {
        geom.normals[info.shared_vrtx(shared) as usize] =
            geom.shared_normal_sum[shared.index()].normalize_or_zero();
    }
    sp.shared_normals_dirty.clear();
}

/// Writes the positions of a shared vertex from its skeleton vertex.
pub fn update_shared_vrtx_position(
    shared: SharedVrtxId,
    chunks: &ChunkSkeleton,
    data: &SkeletonVertexData,
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    heightmap: &impl Heightmap,
) {
    let skvrtx = match chunks.shared_skvrtx(shared) {
        Some(skvrtx) => skvrtx,
        None => panic!("{:?} has no skeleton vertex", shared),
    };
    let scale = data.scale();
    let skel_pos = data.positions[skvrtx.index()];
    let planet_pos = skel_pos.as_dvec3() / scale;
    let radial_dir = planet_pos.normalize_or_zero();

    let pos = ((skel_pos - geom.origin_skel_pos).as_dvec3() / scale).as_vec3();
    geom.shared_pos_no_heightmap[shared.index()] = pos;
    geom.positions[info.shared_vrtx(shared) as usize] =
        pos + (radial_dir * heightmap.height(planet_pos)).as_vec3();
}

/// Moves the mesh so that `origin` maps to `(0, 0, 0)`. Every shared vertex is recomputed and
/// the fill vertices of chunks not in `skip` are translated.
pub fn translate_origin(
    origin: I64Vec3,
    skip: &IdSet<ChunkId>,
    chunks: &ChunkSkeleton,
    data: &SkeletonVertexData,
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    heightmap: &impl Heightmap,
) {
    log::info!(
        "Translating terrain mesh origin {:?} -> {:?}",
        geom.origin_skel_pos,
        origin
    );
    let delta = ((geom.origin_skel_pos - origin).as_dvec3() / data.scale()).as_vec3();
    geom.origin_skel_pos = origin;

    for shared in chunks.shared_ids().iter() {
        update_shared_vrtx_position(shared, chunks, data, geom, info, heightmap);
    }
    let fill_count = info.fill_vrtx_count as usize;
    for chunk in chunks.chunk_ids().iter().filter(|&chunk| !skip.contains(chunk)) {
        let start = info.chunk_fill_offset(chunk) as usize;
        for pos in &mut geom.positions[start..start + fill_count] {
            *pos += delta;
        }
    }
}

/// Computes the fill vertices of a chunk from its shared vertices.
///
/// Middles are pushed out to the sphere before the heightmap is applied, so the fill follows the
/// curvature of the planet.
#[allow(clippy::too_many_arguments)]
pub fn calc_fill_positions(
    chunk: ChunkId,
    radius: f64,
    lut: &ChunkFillSubdivLUT,
    chunks: &ChunkSkeleton,
    data: &SkeletonVertexData,
    geom: &mut ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    heightmap: &impl Heightmap,
) {
    let scale = data.scale();
    let origin = geom.origin_skel_pos.as_dvec3() / scale;
    let center = -origin;
    let start = info.chunk_fill_offset(chunk) as usize;
    let fill_count = info.fill_vrtx_count as usize;

    let shared_pos = |geom: &ChunkMeshGeometry, local: u32| match chunks.shared_at(chunk, local as usize) {
        Some(shared) => geom.shared_pos_no_heightmap[shared.index()],
        None => panic!("{:?} has no shared vertex at {}", chunk, local),
    };

    for entry in lut.data() {
        let a = if entry.a_is_shared {
            shared_pos(geom, entry.vrtx_a)
        } else {
            geom.positions[start + entry.vrtx_a as usize]
        };
        let b = if entry.b_is_shared {
            shared_pos(geom, entry.vrtx_b)
        } else {
            geom.positions[start + entry.vrtx_b as usize]
        };

        let middle = 0.5 * (a.as_dvec3() + b.as_dvec3());
        let center_diff = middle - center;
        let center_dist = center_diff.length();
        let radial_dir = center_diff / center_dist;
        geom.positions[start + entry.fill_out as usize] =
            (middle + radial_dir * (radius - center_dist)).as_vec3();
    }

    for pos in &mut geom.positions[start..start + fill_count] {
        let planet_pos = pos.as_dvec3() + origin;
        let radial_dir = planet_pos.normalize_or_zero();
        *pos += (radial_dir * heightmap.height(planet_pos)).as_vec3();
    }
}

/// A vertex normal that isn't unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BadNormal {
    pub vertex: VertexIdx,
    pub length: f32,
}

/// Returns the normals of live shared vertices and of the fill vertices of live chunks that are
/// more than 0.05 away from unit length.
pub fn debug_check_normals(
    geom: &ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    chunks: &ChunkSkeleton,
) -> Vec<BadNormal> {
    let shared = chunks.shared_ids().iter().map(|s| info.shared_vrtx(s));
    let fill = chunks.chunk_ids().iter().flat_map(|chunk| {
        let start = info.chunk_fill_offset(chunk);
        start..start + info.fill_vrtx_count
    });

    shared
        .chain(fill)
        .filter_map(|vertex| {
            let length = geom.normals[vertex as usize].length();
            ((length - 1.0).abs() >= 0.05).then(|| BadNormal { vertex, length })
        })
        .collect()
}

/// Writes the whole mesh as a Wavefront OBJ, for inspection in other tools.
pub fn write_obj(
    out: &mut impl io::Write,
    geom: &ChunkMeshGeometry,
    info: &ChunkMeshBufferInfo,
    chunks: &ChunkSkeleton,
) -> io::Result<()> {
    writeln!(out, "# Terrain mesh debug output")?;
    writeln!(
        out,
        "# Chunks: {}/{}",
        chunks.chunk_ids().size(),
        chunks.chunk_ids().capacity()
    )?;
    writeln!(
        out,
        "# Shared Vertices: {}/{}",
        chunks.shared_ids().size(),
        chunks.shared_ids().capacity()
    )?;
    writeln!(out, "o Planet")?;

    for v in &geom.positions {
        writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for n in &geom.normals {
        writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for chunk in chunks.chunk_ids().iter() {
        for face in geom.chunk_faces(info, chunk) {
            if *face == [0; 3] {
                continue;
            }
            // OBJ indices start at 1.
            let line = face.iter().map(|&v| format!("{0}//{0}", v + 1)).join(" ");
            writeln!(out, "f {}", line)?;
        }
    }
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use crate::config::TerrainConfig;
    use crate::terrain::Terrain;

    fn small_planet(max_subdiv_levels: u8) -> Terrain {
        let config = TerrainConfig {
            radius: 1000.0,
            height: 10.0,
            precision: 10,
            max_subdiv_levels,
            chunk_subdiv_level: 2,
            max_chunks: Some(80),
            max_shared_vertices: None,
            unsubdiv_threshold_scale: 2.0,
        };
        Terrain::new(&config).unwrap()
    }

    fn first_corner(terrain: &Terrain) -> I64Vec3 {
        let vrtx = terrain.skeleton().tri_at(terrain.root_triangles()[0]).vertex(0);
        terrain.vertex_data().positions[vrtx.index()]
    }

    fn live_face_count(terrain: &Terrain, chunk: ChunkId) -> usize {
        terrain
            .geometry()
            .chunk_faces(terrain.buffer_info(), chunk)
            .iter()
            .filter(|face| **face != [0; 3])
            .count()
    }

    #[test]
    fn seed_chunks_close_the_sphere() {
        let mut terrain = small_planet(0);
        let stats = terrain.update(I64Vec3::ZERO, I64Vec3::ZERO, &Flat).unwrap();
        assert_eq!(stats.chunks, 20);
        // 30 icosahedron edges with 3 vertices each, plus the 12 corners.
        assert_eq!(stats.shared_vertices, 102);

        let chunks = terrain.chunks();
        for chunk in chunks.chunk_ids().iter() {
            assert_eq!(chunks.stitch(chunk), ChunkStitch::SAME_DETAIL);
            assert_eq!(live_face_count(&terrain, chunk), 16);
        }
        assert!(terrain.debug_check_normals().is_empty());

        // Normals point away from the planet.
        let geom = terrain.geometry();
        let info = terrain.buffer_info();
        for shared in chunks.shared_ids().iter() {
            let i = info.shared_vrtx(shared) as usize;
            assert!(geom.normals[i].dot(geom.positions[i]) > 0.0);
        }
    }

    #[test]
    fn subdivided_neighbors_get_detailed_stitches() {
        let mut terrain = small_planet(1);
        terrain.update(first_corner(&terrain), I64Vec3::ZERO, &Flat).unwrap();

        let skel = terrain.skeleton();
        let chunks = terrain.chunks();
        let width = chunks.chunk_width();
        let mut detailed = 0;
        for chunk in chunks.chunk_ids().iter() {
            let tri = chunks.chunk_tri(chunk).unwrap();
            let stitch = chunks.stitch(chunk);
            assert!(stitch.enabled);

            let subdived_edge = (0..3).find(|&e| {
                skel.tri_at(tri)
                    .neighbor(e)
                    .map_or(false, |n| skel.is_tri_subdivided(n))
            });
            match subdived_edge {
                Some(edge) => {
                    let neighbor = skel.tri_at(tri).neighbor(edge).unwrap();
                    assert_eq!(
                        stitch,
                        ChunkStitch::detail_x2(edge, skel.tri_at(neighbor).find_neighbor_index(tri))
                    );
                    assert_eq!(live_face_count(&terrain, chunk), width * width + width);
                    detailed += 1;
                }
                None => {
                    assert_eq!(stitch, ChunkStitch::SAME_DETAIL);
                    assert_eq!(live_face_count(&terrain, chunk), width * width);
                }
            }
        }
        assert!(detailed > 0);
        assert!(terrain.debug_check_normals().is_empty());
    }

    #[test]
    fn removed_chunks_leave_no_faces_behind() {
        let mut terrain = small_planet(1);
        terrain.update(first_corner(&terrain), I64Vec3::ZERO, &Flat).unwrap();
        let far = I64Vec3::new(i64::MAX / 4, 0, 0);
        let stats = terrain.update(far, I64Vec3::ZERO, &Flat).unwrap();

        assert_eq!(stats.chunks, 20);
        assert!(stats.chunks_removed > 0);
        let info = terrain.buffer_info();
        let chunks = terrain.chunks();
        for chunk in terrain.changes().chunks_removed.iter() {
            if !chunks.chunk_ids().exists(chunk) {
                assert!(terrain
                    .geometry()
                    .chunk_faces(info, chunk)
                    .iter()
                    .all(|face| *face == [0; 3]));
            }
        }
        for chunk in chunks.chunk_ids().iter() {
            assert_eq!(chunks.stitch(chunk), ChunkStitch::SAME_DETAIL);
        }
        assert!(terrain.debug_check_normals().is_empty());
    }

    #[test]
    fn obj_lists_every_vertex_and_live_face() {
        let mut terrain = small_planet(0);
        terrain.update(I64Vec3::ZERO, I64Vec3::ZERO, &Flat).unwrap();

        let mut out = Vec::new();
        terrain.write_obj(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("# Terrain mesh debug output"));
        assert_eq!(lines.next(), Some("# Chunks: 20/80"));
        let count = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        let vrtx_total = terrain.buffer_info().vrtx_total as usize;
        assert_eq!(count("v "), vrtx_total);
        assert_eq!(count("vn "), vrtx_total);
        assert_eq!(count("f "), 20 * 16);
        assert!(text.lines().filter(|l| l.starts_with("f ")).all(|l| !l.contains(" 0//")));
    }

    #[test]
    fn updates_reuse_the_chunk_buffer() {
        let mut terrain = small_planet(1);
        let buffer = terrain.changes().chunk_buffer.as_ptr();
        let capacity = terrain.changes().chunk_buffer.capacity();
        assert_eq!(capacity, 80);

        let corner = first_corner(&terrain);
        terrain.update(corner, I64Vec3::ZERO, &Flat).unwrap();
        terrain.update(I64Vec3::new(i64::MAX / 4, 0, 0), corner, &Flat).unwrap();

        let sp = terrain.changes();
        assert!(sp.chunk_buffer.is_empty());
        assert_eq!(sp.chunk_buffer.capacity(), capacity);
        assert_eq!(sp.chunk_buffer.as_ptr(), buffer);
    }

    #[test]
    fn byte_views_cover_the_buffers() {
        let mut terrain = small_planet(0);
        terrain.update(I64Vec3::ZERO, I64Vec3::ZERO, &Flat).unwrap();
        let geom = terrain.geometry();
        let info = terrain.buffer_info();

        let positions = geom.positions_bytes();
        assert_eq!(positions.len(), info.vrtx_total as usize * 12);
        let shared = terrain.chunks().shared_ids().iter().next().unwrap();
        let v = info.shared_vrtx(shared) as usize;
        let x = f32::from_ne_bytes(positions[v * 12..v * 12 + 4].try_into().unwrap());
        assert_eq!(x, geom.positions[v].x);

        let normals = geom.normals_bytes();
        assert_eq!(normals.len(), positions.len());
        let nz = f32::from_ne_bytes(normals[v * 12 + 8..v * 12 + 12].try_into().unwrap());
        assert_eq!(nz, geom.normals[v].z);

        let indices = geom.indices_bytes();
        assert_eq!(indices.len(), geom.indices.len() * 12);
        let first = u32::from_ne_bytes(indices[4..8].try_into().unwrap());
        assert_eq!(first, geom.indices[0][1]);
    }
}
