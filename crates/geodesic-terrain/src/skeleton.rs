//! The subdivision skeleton: topology of vertices and triangles, with no geometry attached.
//!
//! Triangles are created four at a time by subdividing a parent triangle:
//!
//! ```text
//!             c0
//!            /  \
//!           / t0 \
//!         m0------m2
//!         / \ t3 / \
//!        / t1\  / t2\
//!      c1-----m1-----c2
//! ```
//!
//! Corners are ordered `[top, left, right]` and edge `e` goes from corner `e` to corner `(e + 1) % 3`.
//! Every triangle keeps a counted reference to each of its vertices and to each of its neighbors.

use crate::ids::*;

use geodesic_core::{Id, IdRefCount, IdRegistry, IdSet, MaybeNewId, SubdivIdRegistry};

pub const MAX_SUBDIV_LEVELS: usize = 24;

#[derive(Debug)]
pub struct SkeletonTriangle {
    vertices: [SkVrtxOwner; 3],
    neighbors: [Option<SkTriOwner>; 3],
    children: Option<SkTriGroupId>,
}

impl SkeletonTriangle {
    #[inline]
    pub fn vertex(&self, corner: usize) -> SkVrtxId {
        self.vertices[corner].id()
    }

    pub fn vertices(&self) -> [SkVrtxId; 3] {
        [self.vertex(0), self.vertex(1), self.vertex(2)]
    }

    #[inline]
    pub fn neighbor(&self, edge: usize) -> Option<SkTriId> {
        self.neighbors[edge].as_ref().map(|n| n.id())
    }

    pub fn neighbors(&self) -> [Option<SkTriId>; 3] {
        [self.neighbor(0), self.neighbor(1), self.neighbor(2)]
    }

    #[inline]
    pub fn children(&self) -> Option<SkTriGroupId> {
        self.children
    }

    #[inline]
    pub fn is_subdivided(&self) -> bool {
        self.children.is_some()
    }

    /// The edge shared with `neighbor`.
    pub fn try_find_neighbor_index(&self, neighbor: SkTriId) -> Option<usize> {
        (0..3).find(|&e| self.neighbor(e) == Some(neighbor))
    }

    /// Like [`try_find_neighbor_index`](Self::try_find_neighbor_index), but `neighbor` must be one.
    pub fn find_neighbor_index(&self, neighbor: SkTriId) -> usize {
        match self.try_find_neighbor_index(neighbor) {
            Some(edge) => edge,
            None => panic!("{:?} is not a neighbor", neighbor),
        }
    }
}

#[derive(Debug)]
pub struct SkTriGroup {
    triangles: [SkeletonTriangle; 4],
    parent: Option<SkTriId>,
    depth: u8,
}

impl SkTriGroup {
    pub fn triangles(&self) -> &[SkeletonTriangle; 4] {
        &self.triangles
    }

    pub fn triangle(&self, sibling: usize) -> &SkeletonTriangle {
        &self.triangles[sibling]
    }

    /// `None` for the root groups.
    pub fn parent(&self) -> Option<SkTriId> {
        self.parent
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }
}

/// One edge of a group's parent triangle, as `(group, edge)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SkTriGroupEdge {
    pub group: SkTriGroupId,
    pub edge: usize,
}

impl SkTriGroupEdge {
    /// The two children lying along this edge, in the edge's direction.
    pub fn children(&self) -> EdgeChildren {
        EdgeChildren {
            child_a: tri_id(self.group, self.edge),
            child_b: tri_id(self.group, (self.edge + 1) % 3),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EdgeChildren {
    pub child_a: SkTriId,
    pub child_b: SkTriId,
}

/// Per-level bookkeeping for the boundary between subdivided and leaf triangles.
#[derive(Clone, Debug, Default)]
pub struct SkeletonLevel {
    /// Leaf triangles with at least one subdivided neighbor.
    pub has_subdived_neighbor: IdSet<SkTriId>,
    /// Subdivided triangles with at least one leaf neighbor.
    pub has_non_subdived_neighbor: IdSet<SkTriId>,
}

/// A broken rule found by [`SubdivTriangleSkeleton::debug_check_invariants`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkeletonViolation {
    /// The neighbor doesn't exist or doesn't point back.
    BrokenNeighborLink { tri: SkTriId, edge: usize },
    /// An edge without a neighbor although the parent's neighbor across it is subdivided.
    MissingNeighbor { tri: SkTriId, edge: usize },
    /// A leaf next to more than one subdivided triangle.
    LeafNextToManySubdivided { tri: SkTriId, count: usize },
    /// A subdivided triangle next to a leaf one level coarser, or a root without a neighbor.
    DetailJump { tri: SkTriId, edge: usize },
    /// Reference count disagrees with the number of neighbors pointing at the triangle.
    RefCountMismatch { tri: SkTriId, expected: u16, actual: u16 },
}

#[derive(Debug, Default)]
pub struct SubdivTriangleSkeleton {
    vertex_ids: SubdivIdRegistry<SkVrtxId>,
    group_ids: IdRegistry<SkTriGroupId>,
    groups: Vec<Option<SkTriGroup>>,
    tri_refcount: IdRefCount<SkTriId>,
    pub levels: [SkeletonLevel; MAX_SUBDIV_LEVELS],
}

impl SubdivTriangleSkeleton {
    //  █   █ █▀▀ █▀█ ▀█▀ █ █▀▀ █▀▀ █▀▀
    //  ▀▄ ▄▀ █▀▀ █▀▄  █  █ █   █▀▀ ▀▀█
    //    ▀   ▀▀▀ ▀ ▀  ▀  ▀ ▀▀▀ ▀▀▀ ▀▀▀

    pub fn vrtx_create_root(&mut self) -> SkVrtxId {
        self.vertex_ids.create_root()
    }

    pub fn vrtx_create_or_get_child(&mut self, a: SkVrtxId, b: SkVrtxId) -> MaybeNewId<SkVrtxId> {
        self.vertex_ids.create_or_get(a, b)
    }

    pub fn vrtx_store(&mut self, vrtx: SkVrtxId) -> SkVrtxOwner {
        self.vertex_ids.store(vrtx)
    }

    /// Removes the vertex (and unreferenced ancestors) if this was the last owner.
    pub fn vrtx_release(&mut self, owner: SkVrtxOwner) {
        self.vertex_ids.release(owner)
    }

    pub fn vertex_ids(&self) -> &SubdivIdRegistry<SkVrtxId> {
        &self.vertex_ids
    }

    /// Gets or creates the middles of the edges `[c0 c1, c1 c2, c2 c0]`.
    pub fn vrtx_create_middles(&mut self, corners: [SkVrtxId; 3]) -> [MaybeNewId<SkVrtxId>; 3] {
        let [c0, c1, c2] = corners;
        [
            self.vrtx_create_or_get_child(c0, c1),
            self.vrtx_create_or_get_child(c1, c2),
            self.vrtx_create_or_get_child(c2, c0),
        ]
    }

    /// Appends the `2^level - 1` vertices strictly between `a` and `b`, made by bisecting the edge
    /// `level` times, in order from `a` to `b`.
    pub fn vrtx_create_chunk_edge_recurse(
        &mut self,
        level: u8,
        a: SkVrtxId,
        b: SkVrtxId,
        out: &mut Vec<MaybeNewId<SkVrtxId>>,
    ) {
        if level == 0 {
            return;
        }
        let mid = self.vrtx_create_or_get_child(a, b);
        self.vrtx_create_chunk_edge_recurse(level - 1, a, mid.id, out);
        out.push(mid);
        self.vrtx_create_chunk_edge_recurse(level - 1, mid.id, b, out);
    }

    //  ▀█▀ █▀█ █ ▄▀█ █▄ █ █▀▀ █   █▀▀ █▀
    //   █  █▀▄ █ █▀█ █ ▀█ █▄█ █▄▄ ██▄ ▄█

    pub fn tri_group_create_root(&mut self, vertices: [[SkVrtxId; 3]; 4]) -> SkTriGroupId {
        self.tri_group_create(None, 0, vertices)
    }

    /// Creates the 4 children of the leaf `tri` from its corners and the `[c0 c1, c1 c2, c2 c0]`
    /// edge middles. Only sibling neighbors are linked; outer edges are linked with
    /// [`tri_group_set_neighboring`](Self::tri_group_set_neighboring).
    pub fn tri_subdiv(&mut self, tri: SkTriId, middles: [SkVrtxId; 3]) -> SkTriGroupId {
        let parent = self.tri_at(tri);
        assert!(!parent.is_subdivided(), "{:?} is already subdivided", tri);
        let [c0, c1, c2] = parent.vertices();
        let [m0, m1, m2] = middles;
        let depth = self.tri_group_at(tri_group_id(tri)).depth + 1;
        assert!(
            usize::from(depth) <= MAX_SUBDIV_LEVELS,
            "subdividing past max depth"
        );

        let group = self.tri_group_create(
            Some(tri),
            depth,
            [[c0, m0, m2], [m0, c1, m1], [m2, m1, c2], [m1, m2, m0]],
        );

        let child = |sibling| tri_id(group, sibling);
        self.tri_store_neighbor(child(0), 1, child(3));
        self.tri_store_neighbor(child(1), 2, child(3));
        self.tri_store_neighbor(child(2), 0, child(3));
        self.tri_store_neighbor(child(3), 0, child(2));
        self.tri_store_neighbor(child(3), 1, child(0));
        self.tri_store_neighbor(child(3), 2, child(1));

        tri_mut(&mut self.groups, tri).children = Some(group);
        group
    }

    /// Removes the children of `tri`. The children must all be leaves and only referenced by each
    /// other and by their neighbors.
    pub fn tri_unsubdiv(&mut self, tri: SkTriId) {
        let group_id = match self.tri_at(tri).children {
            Some(group) => group,
            None => panic!("{:?} is not subdivided", tri),
        };

        for sibling in 0..4 {
            let child = tri_id(group_id, sibling);
            assert!(
                !self.tri_at(child).is_subdivided(),
                "can't unsubdivide {:?}, child {:?} is subdivided",
                tri,
                child
            );
            for edge in 0..3 {
                let owner = match tri_mut(&mut self.groups, child).neighbors[edge].take() {
                    Some(owner) => owner,
                    None => continue,
                };
                let neighbor = owner.id();
                self.tri_refcount.release(owner);

                // Siblings clear their own side of the link.
                if tri_group_id(neighbor) != group_id {
                    let neighbor_tri = tri_mut(&mut self.groups, neighbor);
                    let back = neighbor_tri.find_neighbor_index(child);
                    if let Some(back_owner) = neighbor_tri.neighbors[back].take() {
                        self.tri_refcount.release(back_owner);
                    }
                }
            }
        }

        let group = match self.groups[group_id.index()].take() {
            Some(group) => group,
            None => panic!("{:?} does not exist", group_id),
        };
        self.group_ids.remove(group_id);

        for (sibling, triangle) in group.triangles.into_iter().enumerate() {
            let child = tri_id(group_id, sibling);
            assert_eq!(
                self.tri_refcount.count(child),
                0,
                "unsubdividing {:?} while it is still referenced",
                child
            );
            for owner in triangle.vertices {
                self.vertex_ids.release(owner);
            }
        }

        tri_mut(&mut self.groups, tri).children = None;
    }

    /// Links the two children along `lhs` with the two children along `rhs`. The edges must be the
    /// same skeleton edge seen from both sides.
    pub fn tri_group_set_neighboring(
        &mut self,
        lhs: SkTriGroupEdge,
        rhs: SkTriGroupEdge,
    ) -> (EdgeChildren, EdgeChildren) {
        let l = lhs.children();
        let r = rhs.children();

        // Edges run in opposite directions, so A pairs with B.
        self.tri_store_neighbor(l.child_a, lhs.edge, r.child_b);
        self.tri_store_neighbor(l.child_b, lhs.edge, r.child_a);
        self.tri_store_neighbor(r.child_a, rhs.edge, l.child_b);
        self.tri_store_neighbor(r.child_b, rhs.edge, l.child_a);

        (l, r)
    }

    /// Makes `neighbor` the neighbor of `tri` across `edge`. The slot must be empty.
    pub(crate) fn tri_store_neighbor(&mut self, tri: SkTriId, edge: usize, neighbor: SkTriId) {
        let owner = self.tri_refcount.store(neighbor);
        let slot = &mut tri_mut(&mut self.groups, tri).neighbors[edge];
        assert!(
            slot.is_none(),
            "{:?} already has a neighbor across edge {}",
            tri,
            edge
        );
        *slot = Some(owner);
    }

    pub fn tri_refcount(&self, tri: SkTriId) -> u16 {
        self.tri_refcount.count(tri)
    }

    #[inline]
    pub fn tri_at(&self, tri: SkTriId) -> &SkeletonTriangle {
        &self.tri_group_at(tri_group_id(tri)).triangles[tri_sibling_index(tri)]
    }

    #[inline]
    pub fn tri_group_at(&self, group: SkTriGroupId) -> &SkTriGroup {
        match self.groups.get(group.index()).and_then(Option::as_ref) {
            Some(group) => group,
            None => panic!("{:?} does not exist", group),
        }
    }

    pub fn tri_exists(&self, tri: SkTriId) -> bool {
        self.group_ids.exists(tri_group_id(tri))
    }

    pub fn is_tri_subdivided(&self, tri: SkTriId) -> bool {
        self.tri_at(tri).is_subdivided()
    }

    pub fn tri_group_ids(&self) -> &IdRegistry<SkTriGroupId> {
        &self.group_ids
    }

    /// Live triangles, group by group.
    pub fn tri_iter(&self) -> impl Iterator<Item = SkTriId> + '_ {
        self.group_ids
            .iter()
            .flat_map(|group| (0..4).map(move |sibling| tri_id(group, sibling)))
    }

    /// One past the largest possible triangle index.
    pub fn tri_capacity(&self) -> usize {
        self.group_ids.capacity() * 4
    }

    pub fn vrtx_capacity(&self) -> usize {
        self.vertex_ids.capacity()
    }

    fn tri_group_create(
        &mut self,
        parent: Option<SkTriId>,
        depth: u8,
        vertices: [[SkVrtxId; 3]; 4],
    ) -> SkTriGroupId {
        let group_id = self.group_ids.create();
        let capacity = self.group_ids.capacity();
        if self.groups.len() < capacity {
            self.groups.resize_with(capacity, || None);
            self.tri_refcount.resize(capacity * 4);
        }

        let vertex_ids = &mut self.vertex_ids;
        let triangles = vertices.map(|corners| SkeletonTriangle {
            vertices: corners.map(|v| vertex_ids.store(v)),
            neighbors: [None, None, None],
            children: None,
        });
        self.groups[group_id.index()] = Some(SkTriGroup {
            triangles,
            parent,
            depth,
        });
        group_id
    }

    /// Checks neighbor links, reference counts, and the two rules that keep neighboring triangles
    /// within one level of detail of each other.
    pub fn debug_check_invariants(&self) -> Vec<SkeletonViolation> {
        let mut violations = Vec::new();
        let mut expected_refs = vec![0u16; self.tri_capacity()];

        for tri in self.tri_iter() {
            let triangle = self.tri_at(tri);
            let mut subdivided_neighbors = 0;

            for edge in 0..3 {
                match triangle.neighbor(edge) {
                    Some(neighbor) => {
                        expected_refs[neighbor.index()] += 1;
                        let linked = self.tri_exists(neighbor)
                            && self
                                .tri_at(neighbor)
                                .try_find_neighbor_index(tri)
                                .is_some();
                        if !linked {
                            violations.push(SkeletonViolation::BrokenNeighborLink { tri, edge });
                            continue;
                        }
                        if self.is_tri_subdivided(neighbor) {
                            subdivided_neighbors += 1;
                        }
                    }
                    None => {
                        if triangle.is_subdivided() {
                            violations.push(SkeletonViolation::DetailJump { tri, edge });
                        }
                        match self.tri_group_at(tri_group_id(tri)).parent {
                            Some(parent) => match self.tri_at(parent).neighbor(edge) {
                                Some(parent_neighbor) => {
                                    if self.is_tri_subdivided(parent_neighbor) {
                                        violations
                                            .push(SkeletonViolation::MissingNeighbor { tri, edge });
                                    }
                                }
                                None => {
                                    violations.push(SkeletonViolation::DetailJump { tri, edge })
                                }
                            },
                            None => violations.push(SkeletonViolation::DetailJump { tri, edge }),
                        }
                    }
                }
            }

            if !triangle.is_subdivided() && subdivided_neighbors > 1 {
                violations.push(SkeletonViolation::LeafNextToManySubdivided {
                    tri,
                    count: subdivided_neighbors,
                });
            }
        }

        for tri in self.tri_iter() {
            let expected = expected_refs[tri.index()];
            let actual = self.tri_refcount(tri);
            if expected != actual {
                violations.push(SkeletonViolation::RefCountMismatch {
                    tri,
                    expected,
                    actual,
                });
            }
        }

        violations
    }
}

fn tri_mut(groups: &mut [Option<SkTriGroup>], tri: SkTriId) -> &mut SkeletonTriangle {
    let group = tri_group_id(tri);
    match groups.get_mut(group.index()).and_then(Option::as_mut) {
        Some(g) => &mut g.triangles[tri_sibling_index(tri)],
        None => panic!("{:?} does not exist", group),
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

    /// A lone root group shaped like an already subdivided triangle, without outer neighbors.
    fn lone_group(skel: &mut SubdivTriangleSkeleton) -> SkTriGroupId {
        let [c0, c1, c2] = [(); 3].map(|_| skel.vrtx_create_root());
        let [m0, m1, m2] = skel.vrtx_create_middles([c0, c1, c2]).map(|m| m.id);
        skel.tri_group_create_root([[c0, m0, m2], [m0, c1, m1], [m2, m1, c2], [m1, m2, m0]])
    }

    #[test]
    fn subdivide_then_unsubdivide_restores_counts() {
        let mut skel = SubdivTriangleSkeleton::default();
        let group = lone_group(&mut skel);
        let tri = tri_id(group, 0);

        let vertex_count = skel.vertex_ids().size();
        let group_count = skel.tri_group_ids().size();

        let middles = skel.vrtx_create_middles(skel.tri_at(tri).vertices());
        assert!(middles.iter().all(|m| m.is_new));
        let children = skel.tri_subdiv(tri, middles.map(|m| m.id));
        assert_eq!(skel.vertex_ids().size(), vertex_count + 3);
        assert_eq!(skel.tri_group_ids().size(), group_count + 1);
        assert_eq!(skel.tri_group_at(children).depth(), 1);
        assert_eq!(skel.tri_group_at(children).parent(), Some(tri));
        assert!(skel.is_tri_subdivided(tri));

        // Center child is linked to all of its siblings.
        let center = skel.tri_at(tri_id(children, 3));
        assert_eq!(
            center.neighbors(),
            [
                Some(tri_id(children, 2)),
                Some(tri_id(children, 0)),
                Some(tri_id(children, 1))
            ]
        );
        assert_eq!(skel.tri_refcount(tri_id(children, 3)), 3);

        skel.tri_unsubdiv(tri);
        assert_eq!(skel.vertex_ids().size(), vertex_count);
        assert_eq!(skel.tri_group_ids().size(), group_count);
        assert!(!skel.is_tri_subdivided(tri));
    }

    #[test]
    fn set_neighboring_links_both_sides() {
        let mut skel = SubdivTriangleSkeleton::default();
        let group = lone_group(&mut skel);
        // Siblings 0 and 3 share the edge m0 m2, which is edge 1 of sibling 0 and edge 1 of
        // sibling 3.
        let lhs = tri_id(group, 0);
        let rhs = tri_id(group, 3);

        let lhs_middles = skel.vrtx_create_middles(skel.tri_at(lhs).vertices());
        let lhs_children = skel.tri_subdiv(lhs, lhs_middles.map(|m| m.id));
        let rhs_middles = skel.vrtx_create_middles(skel.tri_at(rhs).vertices());
        // The middle of the shared edge already exists.
        assert_eq!(rhs_middles.iter().filter(|m| !m.is_new).count(), 1);
        let rhs_children = skel.tri_subdiv(rhs, rhs_middles.map(|m| m.id));

        let (l, r) = skel.tri_group_set_neighboring(
            SkTriGroupEdge {
                group: lhs_children,
                edge: 1,
            },
            SkTriGroupEdge {
                group: rhs_children,
                edge: 1,
            },
        );
        assert_eq!(skel.tri_at(l.child_a).neighbor(1), Some(r.child_b));
        assert_eq!(skel.tri_at(l.child_b).neighbor(1), Some(r.child_a));
        assert_eq!(skel.tri_at(r.child_a).neighbor(1), Some(l.child_b));
        assert_eq!(skel.tri_at(r.child_b).neighbor(1), Some(l.child_a));

        // The vertices along the shared edge really are shared.
        assert_eq!(
            skel.tri_at(l.child_a).vertex(1),
            skel.tri_at(r.child_b).vertex(2)
        );

        skel.tri_unsubdiv(lhs);
        assert_eq!(skel.tri_at(r.child_a).neighbor(1), None);
        assert_eq!(skel.tri_at(r.child_b).neighbor(1), None);
        skel.tri_unsubdiv(rhs);
        assert_eq!(skel.vertex_ids().size(), 6);
    }

    #[test]
    fn chunk_edge_is_ordered_from_a_to_b() {
        let mut skel = SubdivTriangleSkeleton::default();
        let a = skel.vrtx_create_root();
        let b = skel.vrtx_create_root();
        let mut edge = Vec::new();
        skel.vrtx_create_chunk_edge_recurse(3, a, b, &mut edge);
        assert_eq!(edge.len(), 7);

        let mid = edge[3].id;
        assert_eq!(skel.vertex_ids().parents(mid), Some([a, b]));
        assert_eq!(skel.vertex_ids().get(a, mid), Some(edge[1].id));
        assert_eq!(skel.vertex_ids().get(edge[1].id, mid), Some(edge[2].id));
        assert_eq!(skel.vertex_ids().get(mid, b), Some(edge[5].id));
    }
}
