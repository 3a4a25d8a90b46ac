//! Vertex and index buffer layout for chunk meshes, and the triangle patterns that fill them.
//!
//! Inside a chunk, vertices are addressed by triangular coordinates `(x, y)` with
//! `0 <= x <= y <= chunk_width`. `(0, 0)` is corner 0, `(0, w)` is corner 1 and `(w, w)` is
//! corner 2.
//!
//! ```text
//!         (0,0)
//!          /\
//!   edge 0/  \edge 2
//!        /    \
//!  (0,w)/______\(w,w)
//!        edge 1
//! ```

use crate::chunk::{ChunkSkeleton, ChunkStitch};
use crate::ids::*;

use geodesic_core::glam::UVec2;
use geodesic_core::Id;

/// Index into the vertex buffer.
pub type VertexIdx = u32;

/// Number of fan faces in a chunk of each subdivision level, when all neighbors have the same
/// detail.
pub const FAN_FACES_VS_SUBDIV_LEVEL: [u32; 10] = [1, 3, 9, 21, 45, 93, 189, 381, 765, 1533];

/// Where things go in the vertex and index buffers.
///
/// The vertex buffer holds one row of fill vertices per chunk followed by one vertex per shared
/// vertex. The index buffer holds one row of `chunk_max_face_count` faces per chunk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkMeshBufferInfo {
    /// Vertices inside a chunk that no other chunk uses.
    pub fill_vrtx_count: u32,
    /// Faces that don't have a whole edge on the chunk border.
    pub fill_face_count: u32,
    /// Faces along the border, including the extras for a 2x detail edge.
    pub fan_max_face_count: u32,
    /// Distinct shared vertices the fan faces of one chunk can touch.
    pub fan_max_shared_count: u32,
    pub chunk_max_face_count: u32,
    pub face_total: u32,
    pub vbuf_fill_offset: u32,
    pub vbuf_shared_offset: u32,
    pub vrtx_total: u32,
}

impl ChunkMeshBufferInfo {
    pub fn new(chunks: &ChunkSkeleton) -> Self {
        let level = usize::from(chunks.chunk_subdiv_level());
        assert!(
            level < FAN_FACES_VS_SUBDIV_LEVEL.len(),
            "chunk subdivision level {} is not supported",
            level
        );
        let max_chunks = chunks.chunk_ids().capacity() as u32;
        let max_shared = chunks.shared_ids().capacity() as u32;
        let width = chunks.chunk_width() as u32;

        let fill_vrtx_count = (width - 2) * (width - 1) / 2;
        let fill_total = fill_vrtx_count * max_chunks;
        let fan_face_count = FAN_FACES_VS_SUBDIV_LEVEL[level];
        let fill_face_count = width * width - fan_face_count;
        let fan_max_face_count = fan_face_count + fan_face_count / 3 + 1;
        let chunk_max_face_count = fill_face_count + fan_max_face_count;

        Self {
            fill_vrtx_count,
            fill_face_count,
            fan_max_face_count,
            fan_max_shared_count: fan_max_face_count + 4,
            chunk_max_face_count,
            face_total: max_chunks * chunk_max_face_count,
            vbuf_fill_offset: 0,
            vbuf_shared_offset: fill_total,
            vrtx_total: fill_total + max_shared,
        }
    }

    #[inline]
    pub fn shared_vrtx(&self, shared: SharedVrtxId) -> VertexIdx {
        self.vbuf_shared_offset + shared.index() as u32
    }

    #[inline]
    pub fn chunk_fill_offset(&self, chunk: ChunkId) -> VertexIdx {
        self.vbuf_fill_offset + self.fill_vrtx_count * chunk.index() as u32
    }
}

/// ```text
///  0
///  1  2
///  3  4  5
///  6  7  8  9
/// ```
#[inline]
pub const fn xy_to_triangular(x: u32, y: u32) -> u32 {
    y * (y + 1) / 2 + x
}

/// Position of `(x, y)` among a chunk's shared vertices, if it lies on the border.
#[inline]
pub const fn coord_to_shared(x: u32, y: u32, chunk_width: u32) -> Option<usize> {
    if x == 0 {
        Some(y as usize)
    } else if y == chunk_width {
        Some((chunk_width + x) as usize)
    } else if x == y {
        Some((chunk_width * 3 - x) as usize)
    } else {
        None
    }
}

/// Fill vertex index of the inner coordinate `(x, y)`.
#[inline]
pub const fn coord_to_fill(x: u32, y: u32) -> u32 {
    xy_to_triangular(x - 1, y - 2)
}

#[inline]
pub fn fill_to_vrtx(info: &ChunkMeshBufferInfo, chunk: ChunkId, triangular: u32) -> VertexIdx {
    info.chunk_fill_offset(chunk) + triangular
}

/// A vertex of a chunk, given by its coordinates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkVertex {
    /// Set when the vertex is on the border.
    pub local_shared: Option<usize>,
    pub vertex: VertexIdx,
}

pub fn chunk_coord_to_vrtx(
    chunks: &ChunkSkeleton,
    info: &ChunkMeshBufferInfo,
    chunk: ChunkId,
    x: u32,
    y: u32,
) -> ChunkVertex {
    let local_shared = coord_to_shared(x, y, chunks.chunk_width() as u32);
    let vertex = match local_shared {
        Some(local) => match chunks.shared_at(chunk, local) {
            Some(shared) => info.shared_vrtx(shared),
            None => panic!("{:?} has no shared vertex at {}", chunk, local),
        },
        None => fill_to_vrtx(info, chunk, coord_to_fill(x, y)),
    };
    ChunkVertex {
        local_shared,
        vertex,
    }
}

/// One fill vertex to compute as the middle of two others.
///
/// `vrtx_a` and `vrtx_b` are chunk-local shared indices when the matching `*_is_shared` is set,
/// and fill indices otherwise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ToSubdiv {
    pub vrtx_a: u32,
    pub vrtx_b: u32,
    pub fill_out: u32,
    pub a_is_shared: bool,
    pub b_is_shared: bool,
}

/// Order in which to compute the fill vertices of a chunk. Each entry only depends on border
/// vertices and on earlier entries.
#[derive(Clone, Debug, Default)]
pub struct ChunkFillSubdivLUT {
    data: Vec<ToSubdiv>,
    chunk_width: u32,
}

impl ChunkFillSubdivLUT {
    pub fn new(chunk_subdiv_level: u8) -> Self {
        let chunk_width = 1u32 << chunk_subdiv_level;
        let fill_count = (chunk_width - 2) * (chunk_width - 1) / 2;
        let mut lut = Self {
            data: Vec::with_capacity(fill_count as usize),
            chunk_width,
        };
        lut.fill_tri_recurse(
            UVec2::new(0, 0),
            UVec2::new(0, chunk_width),
            UVec2::new(chunk_width, chunk_width),
            chunk_subdiv_level,
        );
        debug_assert_eq!(lut.data.len(), fill_count as usize);
        lut
    }

    pub fn data(&self) -> &[ToSubdiv] {
        &self.data
    }

    fn subdiv_line_recurse(&mut self, a: UVec2, b: UVec2, level: u8) {
        let mid = (a + b) / 2;
        let shared_a = coord_to_shared(a.x, a.y, self.chunk_width);
        let shared_b = coord_to_shared(b.x, b.y, self.chunk_width);

        self.data.push(ToSubdiv {
            vrtx_a: shared_a.map_or_else(|| coord_to_fill(a.x, a.y), |local| local as u32),
            vrtx_b: shared_b.map_or_else(|| coord_to_fill(b.x, b.y), |local| local as u32),
            fill_out: coord_to_fill(mid.x, mid.y),
            a_is_shared: shared_a.is_some(),
            b_is_shared: shared_b.is_some(),
        });

        if level > 1 {
            self.subdiv_line_recurse(a, mid, level - 1);
            self.subdiv_line_recurse(mid, b, level - 1);
        }
    }

    fn fill_tri_recurse(&mut self, top: UVec2, lft: UVec2, rte: UVec2, level: u8) {
        let mid = [(top + lft) / 2, (lft + rte) / 2, (rte + top) / 2];

        if level > 1 {
            self.subdiv_line_recurse(mid[0], mid[1], level - 1);
            self.subdiv_line_recurse(mid[1], mid[2], level - 1);
            self.subdiv_line_recurse(mid[2], mid[0], level - 1);
        }

        if level > 2 {
            self.fill_tri_recurse(top, mid[0], mid[2], level - 1);
            self.fill_tri_recurse(mid[0], lft, mid[1], level - 1);
            self.fill_tri_recurse(mid[1], mid[2], mid[0], level - 1);
            self.fill_tri_recurse(mid[2], mid[1], rte, level - 1);
        }
    }
}

/// Receives the faces of a chunk and the normal contributions of each face.
///
/// Every `*_add_normal_*` call refers to the face added just before it.
pub trait FaceWriter {
    fn fill_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx);

    fn fill_add_normal_filled(&mut self, vertex: VertexIdx);

    /// `local` is the vertex's position among the chunk's shared vertices.
    fn fill_add_normal_shared(&mut self, vertex: VertexIdx, local: usize);

    fn fan_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx);

    fn fan_add_normal_shared(&mut self, vertex: VertexIdx, shared: SharedVrtxId);
}

/// Which side of a corner borders the more detailed neighbor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CornerDetail {
    None,
    /// The edge arriving at the corner.
    Left,
    /// The edge leaving the corner.
    Right,
}

/// One step of laying fan faces around a chunk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FanStep {
    Corner { corner: usize, detail: CornerDetail },
    Edge { side: usize, detail_x2: bool },
}

/// The 6 steps that walk once around a chunk, starting at corner 0.
pub fn fan_steps(stitch: ChunkStitch) -> [FanStep; 6] {
    use CornerDetail::*;

    let corner = |corner, detail| FanStep::Corner { corner, detail };
    let edge = |side, detail_x2| FanStep::Edge { side, detail_x2 };

    if !stitch.detail_x2 {
        return [
            corner(0, None),
            edge(0, false),
            corner(1, None),
            edge(1, false),
            corner(2, None),
            edge(2, false),
        ];
    }
    match stitch.x2_own_edge {
        0 => [
            corner(0, Left),
            edge(0, true),
            corner(1, Right),
            edge(1, false),
            corner(2, None),
            edge(2, false),
        ],
        1 => [
            corner(0, None),
            edge(0, false),
            corner(1, Left),
            edge(1, true),
            corner(2, Right),
            edge(2, false),
        ],
        2 => [
            corner(0, Right),
            edge(0, false),
            corner(1, None),
            edge(1, false),
            corner(2, Left),
            edge(2, true),
        ],
        edge => panic!("triangles have no edge {}", edge),
    }
}

/// Lays the fan faces of one chunk.
///
/// For a 2x detail stitch, `detail_x2_edge0` and `detail_x2_edge1` are the shared vertex rows of
/// the two detailed chunks along the edge, in the neighbor's direction. Both are empty otherwise.
pub struct ChunkFanStitcher<'a> {
    pub chunk_shared: &'a [Option<SharedVrtxOwner>],
    pub detail_x2_edge0: &'a [Option<SharedVrtxOwner>],
    pub detail_x2_edge1: &'a [Option<SharedVrtxOwner>],
    pub shared_offset: VertexIdx,
    pub chunk_fill_offset: VertexIdx,
    pub chunk_width: usize,
}

impl<'a> ChunkFanStitcher<'a> {
    pub fn new(
        chunk: ChunkId,
        detail_x2_edge0: &'a [Option<SharedVrtxOwner>],
        detail_x2_edge1: &'a [Option<SharedVrtxOwner>],
        chunks: &'a ChunkSkeleton,
        info: &ChunkMeshBufferInfo,
    ) -> Self {
        debug_assert_eq!(detail_x2_edge0.len(), detail_x2_edge1.len());
        debug_assert!(detail_x2_edge0.is_empty() || detail_x2_edge0.len() == chunks.chunk_width());
        Self {
            chunk_shared: chunks.shared_vertices_used(chunk),
            detail_x2_edge0,
            detail_x2_edge1,
            shared_offset: info.vbuf_shared_offset,
            chunk_fill_offset: info.chunk_fill_offset(chunk),
            chunk_width: chunks.chunk_width(),
        }
    }

    pub fn stitch(&self, stitch: ChunkStitch, writer: &mut impl FaceWriter) {
        for step in fan_steps(stitch) {
            match step {
                FanStep::Corner { corner, detail } => self.corner(corner, detail, writer),
                FanStep::Edge { side, detail_x2 } => self.edge(side, detail_x2, writer),
            }
        }
    }

    fn corner(&self, corner: usize, detail: CornerDetail, writer: &mut impl FaceWriter) {
        let width = self.chunk_width;
        let count = 3 * width;
        let locals = [(corner * width + count - 1) % count, corner * width, corner * width + 1];
        let shared = locals.map(|local| owned_id(&self.chunk_shared[local]));
        let vrtx = shared.map(|s| self.vrtx(s));

        match detail {
            CornerDetail::None => {
                //     1
                //    / \
                //   2---0
                writer.fan_add_face(vrtx[0], vrtx[1], vrtx[2]);
                for i in 0..3 {
                    writer.fan_add_normal_shared(vrtx[i], shared[i]);
                }
            }
            CornerDetail::Left => {
                //      1
                //     / \
                //   MID  \
                //   / `-_ \
                //  2------`0
                let mid = owned_id(&self.detail_x2_edge1[self.detail_x2_edge1.len() - 1]);
                let vrtx_mid = self.vrtx(mid);

                writer.fan_add_face(vrtx[0], vrtx[1], vrtx_mid);
                writer.fan_add_normal_shared(vrtx[0], shared[0]);
                writer.fan_add_normal_shared(vrtx[1], shared[1]);
                writer.fan_add_normal_shared(vrtx_mid, mid);

                writer.fan_add_face(vrtx[0], vrtx_mid, vrtx[2]);
                writer.fan_add_normal_shared(vrtx[0], shared[0]);
                writer.fan_add_normal_shared(vrtx_mid, mid);
                writer.fan_add_normal_shared(vrtx[2], shared[2]);
            }
            CornerDetail::Right => {
                //      1
                //     / \
                //    /  MID
                //   / _-' \
                //  2'------0
                let mid = owned_id(&self.detail_x2_edge0[1]);
                let vrtx_mid = self.vrtx(mid);

                writer.fan_add_face(vrtx[2], vrtx_mid, vrtx[1]);
                writer.fan_add_normal_shared(vrtx[2], shared[2]);
                writer.fan_add_normal_shared(vrtx_mid, mid);
                writer.fan_add_normal_shared(vrtx[1], shared[1]);

                writer.fan_add_face(vrtx[2], vrtx[0], vrtx_mid);
                writer.fan_add_normal_shared(vrtx[2], shared[2]);
                writer.fan_add_normal_shared(vrtx[0], shared[0]);
                writer.fan_add_normal_shared(vrtx_mid, mid);
            }
        }
    }

    fn edge(&self, side: usize, detail_x2: bool, writer: &mut impl FaceWriter) {
        let width = self.chunk_width;
        let fill_width = width as u32 - 2;
        let half = fill_width / 2;

        let mut local_a = side * width + 1;
        // Walks the fill vertices next to this edge.
        let (mut fill, mut row) = match side {
            0 => (xy_to_triangular(0, 0), 1),
            1 => (xy_to_triangular(0, fill_width.saturating_sub(1)), 0),
            _ => (
                xy_to_triangular(fill_width.saturating_sub(1), fill_width.saturating_sub(1)),
                fill_width,
            ),
        };

        // Middles of the detailed edge run against this edge, 2 detailed steps per own step.
        let mut mids = if detail_x2 {
            let first = self.detail_x2_edge1[..width - 2].iter().rev().step_by(2);
            let second = self.detail_x2_edge0.iter().rev().step_by(2);
            Some(first.take(half as usize).chain(second.take(half as usize)))
        } else {
            None
        };

        for _ in 0..2 * half {
            let shared_a = owned_id(&self.chunk_shared[local_a]);
            let shared_b = owned_id(&self.chunk_shared[local_a + 1]);
            let vrtx_a = self.vrtx(shared_a);
            let vrtx_b = self.vrtx(shared_b);
            let vrtx_c = self.chunk_fill_offset + fill;

            match mids.as_mut().and_then(Iterator::next) {
                Some(mid) => {
                    //      A
                    //     / \
                    //    /  MID
                    //   / _-' \
                    //  C'------B
                    let mid = owned_id(mid);
                    let vrtx_mid = self.vrtx(mid);

                    writer.fan_add_face(vrtx_a, vrtx_mid, vrtx_c);
                    writer.fan_add_normal_shared(vrtx_a, shared_a);
                    writer.fan_add_normal_shared(vrtx_mid, mid);

                    writer.fan_add_face(vrtx_c, vrtx_mid, vrtx_b);
                    writer.fan_add_normal_shared(vrtx_mid, mid);
                    writer.fan_add_normal_shared(vrtx_b, shared_b);
                }
                None => {
                    debug_assert!(!detail_x2);
                    writer.fan_add_face(vrtx_a, vrtx_b, vrtx_c);
                    writer.fan_add_normal_shared(vrtx_a, shared_a);
                    writer.fan_add_normal_shared(vrtx_b, shared_b);
                }
            }

            local_a += 1;
            match side {
                0 => {
                    fill += row;
                    row += 1;
                }
                1 => fill += 1,
                _ => {
                    fill = fill.wrapping_sub(row);
                    row = row.saturating_sub(1);
                }
            }
        }
    }

    #[inline]
    fn vrtx(&self, shared: SharedVrtxId) -> VertexIdx {
        self.shared_offset + shared.index() as u32
    }
}

fn owned_id(slot: &Option<SharedVrtxOwner>) -> SharedVrtxId {
    match slot {
        Some(owner) => owner.id(),
        None => panic!("chunk border is missing a shared vertex"),
    }
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

    use geodesic_core::IdRefCount;
    use std::collections::BTreeSet;

    #[test]
    fn border_coordinates_walk_the_shared_vertices_in_order() {
        let w = 4;
        let border: Vec<_> = (0..w)
            .map(|y| (0, y))
            .chain((0..w).map(|x| (x, w)))
            .chain((0..w).map(|i| (w - i, w - i)))
            .collect();
        for (local, &(x, y)) in border.iter().enumerate() {
            assert_eq!(coord_to_shared(x, y, w), Some(local));
        }
        assert_eq!(coord_to_shared(1, 2, w), None);
        assert_eq!(coord_to_fill(1, 2), 0);
        assert_eq!(coord_to_fill(2, 3), 2);
    }

    #[test]
    fn fill_lut_computes_every_fill_vertex_once_from_known_vertices() {
        for level in 1..=6u8 {
            let width = 1u32 << level;
            let fill_count = ((width - 2) * (width - 1) / 2) as usize;
            let lut = ChunkFillSubdivLUT::new(level);
            assert_eq!(lut.data().len(), fill_count);

            let mut known = vec![false; fill_count];
            for entry in lut.data() {
                assert!(entry.a_is_shared || known[entry.vrtx_a as usize]);
                assert!(entry.b_is_shared || known[entry.vrtx_b as usize]);
                assert!(!known[entry.fill_out as usize]);
                known[entry.fill_out as usize] = true;
            }
            assert!(known.iter().all(|&k| k));
        }
    }

    #[derive(Default)]
    struct CountingWriter {
        faces: Vec<[VertexIdx; 3]>,
        shared_normals: Vec<SharedVrtxId>,
    }

    impl FaceWriter for CountingWriter {
        fn fill_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx) {
            self.faces.push([a, b, c]);
        }
        fn fill_add_normal_filled(&mut self, _vertex: VertexIdx) {}
        fn fill_add_normal_shared(&mut self, _vertex: VertexIdx, _local: usize) {}
        fn fan_add_face(&mut self, a: VertexIdx, b: VertexIdx, c: VertexIdx) {
            self.faces.push([a, b, c]);
        }
        fn fan_add_normal_shared(&mut self, _vertex: VertexIdx, shared: SharedVrtxId) {
            self.shared_normals.push(shared);
        }
    }

    fn owners(refs: &mut IdRefCount<SharedVrtxId>, ids: std::ops::Range<usize>) -> Vec<Option<SharedVrtxOwner>> {
        ids.map(|i| Some(refs.store(SharedVrtxId::from_index(i)))).collect()
    }

    const SHARED_OFFSET: VertexIdx = 1000;

    fn stitch_faces(level: u8, stitch: ChunkStitch) -> CountingWriter {
        let width = 1usize << level;
        let mut refs = IdRefCount::default();
        let own = owners(&mut refs, 0..3 * width);
        let (edge0, edge1) = if stitch.detail_x2 {
            (
                owners(&mut refs, 100..100 + width),
                owners(&mut refs, 200..200 + width),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let stitcher = ChunkFanStitcher {
            chunk_shared: &own,
            detail_x2_edge0: &edge0,
            detail_x2_edge1: &edge1,
            shared_offset: SHARED_OFFSET,
            chunk_fill_offset: 0,
            chunk_width: width,
        };
        let mut writer = CountingWriter::default();
        stitcher.stitch(stitch, &mut writer);
        writer
    }

    #[test]
    fn same_detail_fan_has_the_tabulated_face_count() {
        for level in 1..=5u8 {
            let width = 1u32 << level;
            let writer = stitch_faces(level, ChunkStitch::SAME_DETAIL);
            assert_eq!(writer.faces.len() as u32, 3 * width - 3);
            let fill_count = (width - 2) * (width - 1) / 2;

            for face in &writer.faces {
                // Every fan face uses 2 shared vertices, and a third one or a fill vertex.
                let shared = face.iter().filter(|&&v| v >= SHARED_OFFSET).count();
                assert!(shared >= 2);
                assert!(face.iter().all(|&v| v >= SHARED_OFFSET || v < fill_count));
            }
        }
    }

    #[test]
    fn detail_x2_fan_uses_every_middle_of_the_detailed_edge() {
        for level in 1..=5u8 {
            let width = 1usize << level;
            for own_edge in 0..3 {
                let writer = stitch_faces(level, ChunkStitch::detail_x2(own_edge, 1));
                assert_eq!(writer.faces.len(), 4 * width - 3);

                let mids: BTreeSet<_> = writer
                    .shared_normals
                    .iter()
                    .filter(|s| s.index() >= 100)
                    .map(|s| s.index())
                    .collect();
                // Odd positions of the 2x edge: indices 1, 3.. of edge0 and edge1.
                let expected: BTreeSet<_> = (1..width)
                    .step_by(2)
                    .flat_map(|i| [100 + i, 200 + i])
                    .collect();
                assert_eq!(mids, expected);
            }
        }
    }

    #[test]
    fn buffer_info_matches_face_counts() {
        let chunks = ChunkSkeleton::new(2, 10, 50);
        let info = ChunkMeshBufferInfo::new(&chunks);
        assert_eq!(info.fill_vrtx_count, 3);
        assert_eq!(info.fill_face_count, 7);
        assert_eq!(info.fan_max_face_count, 13);
        assert_eq!(info.fan_max_shared_count, 17);
        assert_eq!(info.chunk_max_face_count, 20);
        assert_eq!(info.face_total, 200);
        assert_eq!(info.vbuf_shared_offset, 30);
        assert_eq!(info.vrtx_total, 80);
    }
}
