use geodesic_core::{def_id, Id, IdOwner};

def_id!(
    /// A vertex of the subdivision skeleton.
    SkVrtxId
);
def_id!(
    /// A skeleton triangle. Triangles live in groups of 4, so the group and sibling index are
    /// encoded in the ID itself.
    SkTriId
);
def_id!(SkTriGroupId);
def_id!(
    /// A drawable patch covering one leaf triangle.
    ChunkId
);
def_id!(
    /// A skeleton vertex on the edge of at least one chunk, and its row in the shared region of the
    /// vertex buffer.
    SharedVrtxId
);

pub type SkVrtxOwner = IdOwner<SkVrtxId>;
pub type SkTriOwner = IdOwner<SkTriId>;
pub type SharedVrtxOwner = IdOwner<SharedVrtxId>;

#[inline]
pub fn tri_id(group: SkTriGroupId, sibling: usize) -> SkTriId {
    debug_assert!(sibling < 4);
    SkTriId::from_index(group.index() * 4 + sibling)
}

#[inline]
pub fn tri_group_id(tri: SkTriId) -> SkTriGroupId {
    SkTriGroupId::from_index(tri.index() / 4)
}

#[inline]
pub fn tri_sibling_index(tri: SkTriId) -> usize {
    tri.index() % 4
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
