//! Chunks are fixed-resolution patches placed on leaf skeleton triangles.
//!
//! Every skeleton vertex on the border of a chunk gets a dense [`SharedVrtxId`], so that chunks
//! touching the same vertex also share one row of the vertex buffer.

use crate::error::TerrainError;
use crate::ids::*;
use crate::skeleton::SubdivTriangleSkeleton;

use geodesic_core::{Id, IdRefCount, IdRegistry, IdSet, MaybeNewId};

/// How the fan triangles along the border of a chunk are laid out.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChunkStitch {
    pub enabled: bool,
    /// One edge borders two chunks that are one level more detailed.
    pub detail_x2: bool,
    /// Edge of this chunk's triangle with the detailed neighbors.
    pub x2_own_edge: u8,
    /// Edge of the subdivided neighbor that faces this chunk.
    pub x2_neighbor_edge: u8,
}

impl ChunkStitch {
    pub const DISABLED: Self = Self {
        enabled: false,
        detail_x2: false,
        x2_own_edge: 0,
        x2_neighbor_edge: 0,
    };

    pub const SAME_DETAIL: Self = Self {
        enabled: true,
        detail_x2: false,
        x2_own_edge: 0,
        x2_neighbor_edge: 0,
    };

    pub fn detail_x2(own_edge: usize, neighbor_edge: usize) -> Self {
        Self {
            enabled: true,
            detail_x2: true,
            x2_own_edge: own_edge as u8,
            x2_neighbor_edge: neighbor_edge as u8,
        }
    }
}

/// Chunk and shared vertex bookkeeping.
///
/// Each chunk owns `3 * chunk_width` shared vertices, one row per triangle edge. Row `e` starts
/// with corner `e` and continues along the edge towards corner `e + 1`.
#[derive(Debug)]
pub struct ChunkSkeleton {
    chunk_subdiv_level: u8,
    chunk_width: usize,

    chunk_ids: IdRegistry<ChunkId>,
    chunk_shared_used: Vec<Option<SharedVrtxOwner>>,
    chunk_stitch: Vec<ChunkStitch>,
    chunk_to_tri: Vec<Option<SkTriId>>,
    tri_to_chunk: Vec<Option<ChunkId>>,

    shared_ids: IdRegistry<SharedVrtxId>,
    shared_refcount: IdRefCount<SharedVrtxId>,
    shared_to_skvrtx: Vec<Option<SkVrtxOwner>>,
    skvrtx_to_shared: Vec<Option<SharedVrtxId>>,
}

impl ChunkSkeleton {
    pub fn new(chunk_subdiv_level: u8, max_chunks: usize, max_shared: usize) -> Self {
        assert!(chunk_subdiv_level >= 1, "chunks must be subdivided at least once");
        let chunk_width = 1 << chunk_subdiv_level;
        let mut shared_refcount = IdRefCount::default();
        shared_refcount.resize(max_shared);

        Self {
            chunk_subdiv_level,
            chunk_width,
            chunk_ids: IdRegistry::with_fixed_capacity(max_chunks),
            chunk_shared_used: std::iter::repeat_with(|| None)
                .take(max_chunks * 3 * chunk_width)
                .collect(),
            chunk_stitch: vec![ChunkStitch::DISABLED; max_chunks],
            chunk_to_tri: vec![None; max_chunks],
            tri_to_chunk: Vec::new(),
            shared_ids: IdRegistry::with_fixed_capacity(max_shared),
            shared_refcount,
            shared_to_skvrtx: std::iter::repeat_with(|| None).take(max_shared).collect(),
            skvrtx_to_shared: Vec::new(),
        }
    }

    #[inline]
    pub fn chunk_subdiv_level(&self) -> u8 {
        self.chunk_subdiv_level
    }

    /// Skeleton edge segments along one side of a chunk.
    #[inline]
    pub fn chunk_width(&self) -> usize {
        self.chunk_width
    }

    #[inline]
    pub fn chunk_shared_count(&self) -> usize {
        3 * self.chunk_width
    }

    pub fn chunk_ids(&self) -> &IdRegistry<ChunkId> {
        &self.chunk_ids
    }

    pub fn shared_ids(&self) -> &IdRegistry<SharedVrtxId> {
        &self.shared_ids
    }

    /// Makes the chunk for leaf `tri`.
    ///
    /// `edges[e]` holds the `chunk_width - 1` skeleton vertices between corner `e` and corner
    /// `e + 1`, as made by [`SubdivTriangleSkeleton::vrtx_create_chunk_edge_recurse`]. Shared
    /// vertices created here are inserted into `shared_added`.
    pub fn chunk_create(
        &mut self,
        tri: SkTriId,
        skel: &mut SubdivTriangleSkeleton,
        shared_added: &mut IdSet<SharedVrtxId>,
        edges: [&[MaybeNewId<SkVrtxId>]; 3],
    ) -> Result<ChunkId, TerrainError> {
        let width = self.chunk_width;
        debug_assert!(edges.iter().all(|edge| edge.len() == width - 1));
        debug_assert!(self.tri_chunk(tri).is_none(), "{:?} already has a chunk", tri);

        let corners = skel.tri_at(tri).vertices();

        // Check everything up front so a failure leaves nothing half made.
        let new_shared = corners
            .iter()
            .copied()
            .chain(edges.iter().flat_map(|edge| edge.iter().map(|v| v.id)))
            .filter(|&vrtx| self.skvrtx_shared(vrtx).is_none())
            .count();
        let free_shared = self.shared_ids.capacity() - self.shared_ids.size();
        if new_shared > free_shared {
            return Err(TerrainError::SharedVertexCapacityExceeded {
                capacity: self.shared_ids.capacity(),
            });
        }
        let chunk = self
            .chunk_ids
            .try_create()
            .ok_or(TerrainError::ChunkCapacityExceeded {
                capacity: self.chunk_ids.capacity(),
            })?;

        if self.tri_to_chunk.len() < skel.tri_capacity() {
            self.tri_to_chunk.resize(skel.tri_capacity(), None);
        }
        self.chunk_to_tri[chunk.index()] = Some(tri);
        self.tri_to_chunk[tri.index()] = Some(chunk);

        let row_start = chunk.index() * self.chunk_shared_count();
        for (side, edge) in edges.iter().enumerate() {
            let row = row_start + side * width;
            let vertices = std::iter::once(corners[side]).chain(edge.iter().map(|v| v.id));
            for (i, vrtx) in vertices.enumerate() {
                let shared = self.shared_get_or_create(vrtx, skel);
                if shared.is_new {
                    shared_added.insert(shared.id);
                }
                let owner = self.shared_refcount.store(shared.id);
                debug_assert!(self.chunk_shared_used[row + i].is_none());
                self.chunk_shared_used[row + i] = Some(owner);
            }
        }

        Ok(chunk)
    }

    /// Removes a chunk, inserting shared vertices that nothing uses anymore into `shared_removed`.
    pub fn chunk_remove(
        &mut self,
        chunk: ChunkId,
        skel: &mut SubdivTriangleSkeleton,
        shared_removed: &mut IdSet<SharedVrtxId>,
    ) {
        let range = self.shared_range(chunk);
        for i in range {
            if let Some(owner) = self.chunk_shared_used[i].take() {
                let shared = owner.id();
                if self.shared_refcount.release(owner) == 0 {
                    self.shared_remove(shared, skel);
                    shared_removed.insert(shared);
                }
            }
        }

        if let Some(tri) = self.chunk_to_tri[chunk.index()].take() {
            self.tri_to_chunk[tri.index()] = None;
        }
        self.chunk_ids.remove(chunk);
        self.chunk_stitch[chunk.index()] = ChunkStitch::DISABLED;
    }

    /// Shared vertices of a chunk, as 3 rows of `chunk_width`. Empty slots belong to removed or
    /// never created chunks.
    pub fn shared_vertices_used(&self, chunk: ChunkId) -> &[Option<SharedVrtxOwner>] {
        &self.chunk_shared_used[self.shared_range(chunk)]
    }

    /// Shared vertex at `local` position of a chunk's border.
    #[inline]
    pub fn shared_at(&self, chunk: ChunkId, local: usize) -> Option<SharedVrtxId> {
        debug_assert!(local < self.chunk_shared_count());
        self.chunk_shared_used[chunk.index() * self.chunk_shared_count() + local]
            .as_ref()
            .map(|owner| owner.id())
    }

    /// One side of a chunk's border, corner first.
    pub fn shared_edge(&self, chunk: ChunkId, side: usize) -> &[Option<SharedVrtxOwner>] {
        debug_assert!(side < 3);
        let start = chunk.index() * self.chunk_shared_count() + side * self.chunk_width;
        &self.chunk_shared_used[start..start + self.chunk_width]
    }

    pub fn shared_refcount(&self, shared: SharedVrtxId) -> u16 {
        self.shared_refcount.count(shared)
    }

    pub fn shared_skvrtx(&self, shared: SharedVrtxId) -> Option<SkVrtxId> {
        self.shared_to_skvrtx
            .get(shared.index())
            .and_then(|owner| owner.as_ref().map(|owner| owner.id()))
    }

    pub fn skvrtx_shared(&self, vrtx: SkVrtxId) -> Option<SharedVrtxId> {
        self.skvrtx_to_shared.get(vrtx.index()).copied().flatten()
    }

    pub fn tri_chunk(&self, tri: SkTriId) -> Option<ChunkId> {
        self.tri_to_chunk.get(tri.index()).copied().flatten()
    }

    pub fn chunk_tri(&self, chunk: ChunkId) -> Option<SkTriId> {
        self.chunk_to_tri[chunk.index()]
    }

    #[inline]
    pub fn stitch(&self, chunk: ChunkId) -> ChunkStitch {
        self.chunk_stitch[chunk.index()]
    }

    pub fn set_stitch(&mut self, chunk: ChunkId, stitch: ChunkStitch) {
        self.chunk_stitch[chunk.index()] = stitch;
    }

    /// Removes every chunk and shared vertex, giving all skeleton vertices back to `skel`.
    pub fn clear(&mut self, skel: &mut SubdivTriangleSkeleton) {
        let chunks: Vec<_> = self.chunk_ids.iter().collect();
        let mut removed = IdSet::default();
        for chunk in chunks {
            self.chunk_remove(chunk, skel, &mut removed);
        }
        debug_assert_eq!(self.shared_ids.size(), 0);
    }

    fn shared_range(&self, chunk: ChunkId) -> std::ops::Range<usize> {
        let count = self.chunk_shared_count();
        let start = chunk.index() * count;
        start..start + count
    }

    fn shared_get_or_create(
        &mut self,
        vrtx: SkVrtxId,
        skel: &mut SubdivTriangleSkeleton,
    ) -> MaybeNewId<SharedVrtxId> {
        if self.skvrtx_to_shared.len() < skel.vrtx_capacity() {
            self.skvrtx_to_shared.resize(skel.vrtx_capacity(), None);
        }
        if let Some(id) = self.skvrtx_to_shared[vrtx.index()] {
            return MaybeNewId { id, is_new: false };
        }
        // Capacity was checked by chunk_create.
        let id = self.shared_ids.create();
        self.shared_to_skvrtx[id.index()] = Some(skel.vrtx_store(vrtx));
        self.skvrtx_to_shared[vrtx.index()] = Some(id);
        MaybeNewId { id, is_new: true }
    }

    fn shared_remove(&mut self, shared: SharedVrtxId, skel: &mut SubdivTriangleSkeleton) {
        if let Some(owner) = self.shared_to_skvrtx[shared.index()].take() {
            self.skvrtx_to_shared[owner.id().index()] = None;
            skel.vrtx_release(owner);
        }
        self.shared_ids.remove(shared);
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

    use crate::icosahedron::create_skeleton_icosahedron;
    use crate::skeleton_data::SkeletonVertexData;

    fn make_chunk(
        chunks: &mut ChunkSkeleton,
        skel: &mut SubdivTriangleSkeleton,
        tri: SkTriId,
        shared_added: &mut IdSet<SharedVrtxId>,
    ) -> Result<ChunkId, TerrainError> {
        let level = chunks.chunk_subdiv_level();
        let corners = skel.tri_at(tri).vertices();
        let mut edges: [Vec<MaybeNewId<SkVrtxId>>; 3] = Default::default();
        for (side, edge) in edges.iter_mut().enumerate() {
            skel.vrtx_create_chunk_edge_recurse(level, corners[side], corners[(side + 1) % 3], edge);
        }
        chunks.chunk_create(
            tri,
            skel,
            shared_added,
            [&edges[0][..], &edges[1][..], &edges[2][..]],
        )
    }

    #[test]
    fn neighboring_chunks_share_their_edge() {
        let mut data = SkeletonVertexData::new(8);
        let (mut skel, ids) = create_skeleton_icosahedron(10.0, &mut data);
        let mut chunks = ChunkSkeleton::new(2, 20, 200);
        let mut added = IdSet::default();

        let a = make_chunk(&mut chunks, &mut skel, ids.triangles[0], &mut added).unwrap();
        assert_eq!(added.len(), 12);
        let neighbor = skel.tri_at(ids.triangles[0]).neighbor(0).unwrap();
        added.clear();
        let b = make_chunk(&mut chunks, &mut skel, neighbor, &mut added).unwrap();
        // 5 of the 12 border vertices were already there: 2 corners and 3 edge vertices.
        assert_eq!(added.len(), 7);
        assert_eq!(chunks.shared_ids().size(), 19);

        assert_eq!(chunks.tri_chunk(neighbor), Some(b));
        assert_eq!(chunks.chunk_tri(a), Some(ids.triangles[0]));
        assert_eq!(chunks.shared_edge(a, 0).len(), 4);
        // The shared edge runs the other way round in the neighbor.
        let a_edge: Vec<_> = chunks.shared_edge(a, 0).iter().flatten().map(|o| o.id()).collect();
        let b_side = skel.tri_at(neighbor).find_neighbor_index(ids.triangles[0]);
        let b_next_corner = chunks.shared_at(b, ((b_side + 1) % 3) * 4).unwrap();
        assert_eq!(a_edge[0], b_next_corner);
        assert!(chunks.shared_vertices_used(a).iter().all(Option::is_some));

        let corner = chunks.shared_at(a, 0).unwrap();
        assert_eq!(
            chunks.shared_skvrtx(corner),
            Some(skel.tri_at(ids.triangles[0]).vertex(0))
        );

        let mut removed = IdSet::default();
        chunks.chunk_remove(a, &mut skel, &mut removed);
        assert_eq!(removed.len(), 7);
        assert_eq!(chunks.tri_chunk(ids.triangles[0]), None);

        chunks.clear(&mut skel);
        assert_eq!(chunks.chunk_ids().size(), 0);
        // Chunk edge vertices were only held by chunks, so only the icosahedron is left.
        assert_eq!(skel.vertex_ids().size(), 12);
    }

    #[test]
    fn running_out_of_shared_vertices_is_an_error() {
        let mut data = SkeletonVertexData::new(8);
        let (mut skel, ids) = create_skeleton_icosahedron(10.0, &mut data);
        let mut chunks = ChunkSkeleton::new(2, 20, 8);
        let mut added = IdSet::default();

        let result = make_chunk(&mut chunks, &mut skel, ids.triangles[0], &mut added);
        assert!(matches!(
            result,
            Err(TerrainError::SharedVertexCapacityExceeded { capacity: 8 })
        ));
        assert_eq!(chunks.chunk_ids().size(), 0);
        assert!(added.is_empty());
    }

    #[test]
    fn running_out_of_chunks_is_an_error() {
        let mut data = SkeletonVertexData::new(8);
        let (mut skel, ids) = create_skeleton_icosahedron(10.0, &mut data);
        let mut chunks = ChunkSkeleton::new(1, 1, 100);
        let mut added = IdSet::default();

        make_chunk(&mut chunks, &mut skel, ids.triangles[0], &mut added).unwrap();
        let result = make_chunk(&mut chunks, &mut skel, ids.triangles[1], &mut added);
        assert!(matches!(
            result,
            Err(TerrainError::ChunkCapacityExceeded { capacity: 1 })
        ));
    }
}
