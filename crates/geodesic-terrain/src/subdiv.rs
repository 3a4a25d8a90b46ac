//! Decides which skeleton triangles subdivide or unsubdivide for a viewer position, one level at a
//! time, while keeping two rules:
//!
//! - **A**: a leaf neighbors at most one subdivided triangle.
//! - **B**: if a subdivided triangle neighbors a leaf, its two children along that edge are leaves.
//!
//! Together they keep the level of detail across any edge within one level.

use crate::ids::*;
use crate::skeleton::{SkTriGroupEdge, SubdivTriangleSkeleton, MAX_SUBDIV_LEVELS};
use crate::skeleton_data::SkeletonVertexData;

use geodesic_core::geometry::is_distance_near;
use geodesic_core::glam::I64Vec3;
use geodesic_core::{Id, IdSet, MaybeNewId};
use std::mem;

/// Called as triangles subdivide or unsubdivide, to compute geometry for new skeleton vertices and
/// triangles.
pub trait SubdivHooks {
    /// `group` holds the new children of `tri`. `middles` are the middles of the edges
    /// `[c0 c1, c1 c2, c2 c0]` of `corners`, and tell whether they were just created.
    fn on_subdiv(
        &mut self,
        tri: SkTriId,
        group: SkTriGroupId,
        corners: [SkVrtxId; 3],
        middles: [MaybeNewId<SkVrtxId>; 3],
        skel: &SubdivTriangleSkeleton,
        data: &mut SkeletonVertexData,
    );

    /// Runs just before the children of `tri` are removed.
    fn on_unsubdiv(
        &mut self,
        _tri: SkTriId,
        _skel: &SubdivTriangleSkeleton,
        _data: &mut SkeletonVertexData,
    ) {
    }
}

#[derive(Clone, Debug, Default)]
struct ScratchpadLevel {
    distance_test_processing: Vec<SkTriId>,
    distance_test_next: Vec<SkTriId>,
}

/// Reusable state for subdividing and unsubdividing.
#[derive(Clone, Debug)]
pub struct SkeletonSubdivScratchpad {
    /// Leaves closer than this to the viewer subdivide.
    pub distance_threshold_subdiv: [u64; MAX_SUBDIV_LEVELS],
    /// Subdivided triangles farther than this from the viewer unsubdivide.
    pub distance_threshold_unsubdiv: [u64; MAX_SUBDIV_LEVELS],

    levels: [ScratchpadLevel; MAX_SUBDIV_LEVELS],
    /// Triangles already queued for a distance test this pass.
    pub distance_test_done: IdSet<SkTriId>,
    try_unsubdiv: IdSet<SkTriId>,
    cant_unsubdiv: IdSet<SkTriId>,

    /// Leaves that appeared since the last chunk update.
    pub surface_added: IdSet<SkTriId>,
    /// Leaves that disappeared since the last chunk update.
    pub surface_removed: IdSet<SkTriId>,

    level_need_process: u8,
    /// Triangles at this depth never subdivide.
    pub level_max: u8,

    pub distance_check_count: usize,
    pub subdiv_count: usize,
    pub unsubdiv_count: usize,

    tri_buffer: Vec<SkTriId>,
}

impl Default for SkeletonSubdivScratchpad {
    fn default() -> Self {
        Self {
            distance_threshold_subdiv: [0; MAX_SUBDIV_LEVELS],
            distance_threshold_unsubdiv: [0; MAX_SUBDIV_LEVELS],
            levels: Default::default(),
            distance_test_done: IdSet::default(),
            try_unsubdiv: IdSet::default(),
            cant_unsubdiv: IdSet::default(),
            surface_added: IdSet::default(),
            surface_removed: IdSet::default(),
            level_need_process: 0,
            level_max: 7,
            distance_check_count: 0,
            subdiv_count: 0,
            unsubdiv_count: 0,
            tri_buffer: Vec::new(),
        }
    }
}

impl SkeletonSubdivScratchpad {
    pub fn new(level_max: u8) -> Self {
        Self {
            level_max,
            ..Default::default()
        }
    }

    pub fn reset_counters(&mut self) {
        self.distance_check_count = 0;
        self.subdiv_count = 0;
        self.unsubdiv_count = 0;
    }

    fn will_unsubdiv(&self, tri: SkTriId) -> bool {
        self.try_unsubdiv.contains(tri) && !self.cant_unsubdiv.contains(tri)
    }

    /// Takes the processing queue of `lvl` after swapping in the next queue.
    fn begin_processing(&mut self, lvl: usize) -> Vec<SkTriId> {
        let level = &mut self.levels[lvl];
        mem::swap(
            &mut level.distance_test_processing,
            &mut level.distance_test_next,
        );
        level.distance_test_next.clear();
        mem::take(&mut level.distance_test_processing)
    }

    fn end_processing(&mut self, lvl: usize, mut processing: Vec<SkTriId>) {
        processing.clear();
        self.levels[lvl].distance_test_processing = processing;
    }

    fn queue_distance_test(&mut self, lvl: usize, tri: SkTriId) {
        if self.distance_test_done.insert(tri) {
            self.levels[lvl].distance_test_next.push(tri);
        }
    }
}

//  █ █ █▄ █ █▀ █ █ █▄▄ █▀▄ █ █ █ █ █▀▄ █▀▀
//  █▄█ █ ▀█ ▄█ █▄█ █▄█ █▄▀ █ ▀▄▀ █ █▄▀ ██▄

/// Floods out from the boundary between subdivided triangles and leaves at `lvl`, marking every
/// subdivided triangle with only leaf children that is too far from `pos`.
pub fn unsubdivide_select_by_distance(
    lvl: u8,
    pos: I64Vec3,
    skel: &SubdivTriangleSkeleton,
    data: &SkeletonVertexData,
    sp: &mut SkeletonSubdivScratchpad,
) {
    let lvl = usize::from(lvl);
    let threshold = sp.distance_threshold_unsubdiv[lvl];

    for tri in skel.levels[lvl].has_non_subdived_neighbor.iter() {
        maybe_distance_check(tri, lvl, skel, sp);
    }

    while !sp.levels[lvl].distance_test_next.is_empty() {
        let processing = sp.begin_processing(lvl);
        for &tri in processing.iter() {
            sp.distance_check_count += 1;
            if is_distance_near(pos, data.centers[tri.index()], threshold) {
                continue;
            }
            sp.try_unsubdiv.insert(tri);
            for neighbor in skel.tri_at(tri).neighbors().iter().flatten() {
                maybe_distance_check(*neighbor, lvl, skel, sp);
            }
        }
        sp.end_processing(lvl, processing);
    }
}

fn maybe_distance_check(
    tri: SkTriId,
    lvl: usize,
    skel: &SubdivTriangleSkeleton,
    sp: &mut SkeletonSubdivScratchpad,
) {
    if sp.distance_test_done.contains(tri) {
        return;
    }
    let children = match skel.tri_at(tri).children() {
        Some(children) => children,
        None => return,
    };
    let all_leaves = (0..4).all(|sibling| !skel.is_tri_subdivided(tri_id(children, sibling)));
    if all_leaves {
        sp.queue_distance_test(lvl, tri);
    }
}

/// Drops triangles from the selection whose unsubdivision would break rule A or B.
pub fn unsubdivide_deselect_invariant_violations(
    skel: &SubdivTriangleSkeleton,
    sp: &mut SkeletonSubdivScratchpad,
) {
    let mut candidates = mem::take(&mut sp.tri_buffer);
    candidates.clear();
    candidates.extend(sp.try_unsubdiv.iter());

    for &tri in candidates.iter() {
        if !sp.cant_unsubdiv.contains(tri) {
            deselect_recurse(tri, skel, sp);
        }
    }

    sp.tri_buffer = candidates;
}

fn violates_invariants(
    tri: SkTriId,
    skel: &SubdivTriangleSkeleton,
    sp: &SkeletonSubdivScratchpad,
) -> bool {
    let mut subdivided_neighbors = 0;
    for neighbor in skel.tri_at(tri).neighbors().iter().flatten() {
        let neighbor_tri = skel.tri_at(*neighbor);
        let children = match neighbor_tri.children() {
            Some(children) if !sp.will_unsubdiv(*neighbor) => children,
            _ => continue,
        };
        subdivided_neighbors += 1;

        // B: the neighbor's children along the shared edge would face a leaf.
        let edge = SkTriGroupEdge {
            group: children,
            edge: neighbor_tri.find_neighbor_index(tri),
        }
        .children();
        if skel.is_tri_subdivided(edge.child_a) || skel.is_tri_subdivided(edge.child_b) {
            return true;
        }
    }
    // A: this would become a leaf next to more than one subdivided triangle.
    subdivided_neighbors >= 2
}

fn deselect_recurse(tri: SkTriId, skel: &SubdivTriangleSkeleton, sp: &mut SkeletonSubdivScratchpad) {
    if !violates_invariants(tri, skel, sp) {
        return;
    }
    sp.cant_unsubdiv.insert(tri);

    // Neighbors that counted on this one unsubdividing need another look.
    for neighbor in skel.tri_at(tri).neighbors().iter().flatten() {
        if sp.will_unsubdiv(*neighbor) {
            deselect_recurse(*neighbor, skel, sp);
        }
    }
}

/// Unsubdivides every selected triangle of `lvl` that wasn't deselected, then clears the selection.
pub fn unsubdivide_level(
    lvl: u8,
    skel: &mut SubdivTriangleSkeleton,
    data: &mut SkeletonVertexData,
    sp: &mut SkeletonSubdivScratchpad,
    hooks: &mut impl SubdivHooks,
) {
    let lvl = usize::from(lvl);
    let mut selected = mem::take(&mut sp.tri_buffer);
    selected.clear();
    selected.extend(sp.try_unsubdiv.iter().filter(|&t| !sp.cant_unsubdiv.contains(t)));

    for &tri in selected.iter() {
        for neighbor in skel.tri_at(tri).neighbors().iter().flatten().copied() {
            if sp.will_unsubdiv(neighbor) {
                continue;
            }
            if skel.is_tri_subdivided(neighbor) {
                skel.levels[lvl].has_non_subdived_neighbor.insert(neighbor);
                skel.levels[lvl].has_subdived_neighbor.insert(tri);
            } else {
                // The neighbor might have lost its only subdivided neighbor.
                let still_has_subdived = skel
                    .tri_at(neighbor)
                    .neighbors()
                    .iter()
                    .flatten()
                    .any(|&n| n != tri && !sp.will_unsubdiv(n) && skel.is_tri_subdivided(n));
                skel.levels[lvl]
                    .has_subdived_neighbor
                    .assign(neighbor, still_has_subdived);
            }
        }
        skel.levels[lvl].has_non_subdived_neighbor.remove(tri);

        if !sp.surface_removed.remove(tri) {
            sp.surface_added.insert(tri);
        }
        if let Some(children) = skel.tri_at(tri).children() {
            for sibling in 0..4 {
                let child = tri_id(children, sibling);
                if !sp.surface_added.remove(child) {
                    sp.surface_removed.insert(child);
                }
                if let Some(child_level) = skel.levels.get_mut(lvl + 1) {
                    child_level.has_subdived_neighbor.remove(child);
                    child_level.has_non_subdived_neighbor.remove(child);
                }
            }
        }

        hooks.on_unsubdiv(tri, skel, data);
        skel.tri_unsubdiv(tri);
        sp.unsubdiv_count += 1;
    }

    sp.tri_buffer = selected;
    sp.try_unsubdiv.clear();
    sp.cant_unsubdiv.clear();
}

//  █▀ █ █ █▄▄ █▀▄ █ █ █ █ █▀▄ █▀▀
//  ▄█ █▄█ █▄█ █▄▀ █ ▀▄▀ █ █▄▀ ██▄

/// Subdivides the leaf `tri` at `lvl`, links the children to neighboring children, and subdivides
/// whatever else rule A or B requires. Returns the new group.
pub fn subdivide(
    tri: SkTriId,
    lvl: u8,
    has_next_level: bool,
    skel: &mut SubdivTriangleSkeleton,
    data: &mut SkeletonVertexData,
    sp: &mut SkeletonSubdivScratchpad,
    hooks: &mut impl SubdivHooks,
) -> SkTriGroupId {
    let lvl_index = usize::from(lvl);
    let (corners, neighbors) = {
        let triangle = skel.tri_at(tri);
        (triangle.vertices(), triangle.neighbors())
    };

    let middles = skel.vrtx_create_middles(corners);
    let group = skel.tri_subdiv(tri, middles.map(|m| m.id));
    data.resize(skel);
    hooks.on_subdiv(tri, group, corners, middles, skel, data);
    sp.subdiv_count += 1;

    let children = [0, 1, 2, 3].map(|sibling| tri_id(group, sibling));
    if has_next_level {
        for &child in children.iter() {
            sp.queue_distance_test(lvl_index + 1, child);
        }
    }

    if !sp.surface_added.remove(tri) {
        sp.surface_removed.insert(tri);
    }
    for &child in children.iter() {
        sp.surface_added.insert(child);
    }

    skel.levels[lvl_index].has_subdived_neighbor.remove(tri);

    let mut has_non_subdived_neighbor = false;
    for (edge, neighbor) in neighbors.iter().enumerate() {
        let neighbor = match neighbor {
            Some(neighbor) => *neighbor,
            None => continue,
        };
        let neighbor_children = match skel.tri_at(neighbor).children() {
            Some(children) => children,
            None => {
                has_non_subdived_neighbor = true;
                skel.levels[lvl_index]
                    .has_subdived_neighbor
                    .insert(neighbor);
                continue;
            }
        };

        let neighbor_edge = skel.tri_at(neighbor).find_neighbor_index(tri);
        let (self_edge, neighbor_edge) = skel.tri_group_set_neighboring(
            SkTriGroupEdge { group, edge },
            SkTriGroupEdge {
                group: neighbor_children,
                edge: neighbor_edge,
            },
        );

        if has_next_level {
            // The new children are leaves; pair them with subdivided children across the edge.
            let pairs = [
                (self_edge.child_a, neighbor_edge.child_b),
                (self_edge.child_b, neighbor_edge.child_a),
            ];
            for (own_child, other_child) in pairs {
                if skel.is_tri_subdivided(other_child) {
                    let next = &mut skel.levels[lvl_index + 1];
                    next.has_subdived_neighbor.insert(own_child);
                    next.has_non_subdived_neighbor.insert(other_child);
                }
            }
        }

        let neighbor_has_leaf = skel
            .tri_at(neighbor)
            .neighbors()
            .iter()
            .flatten()
            .any(|&n| n != tri && !skel.is_tri_subdivided(n));
        skel.levels[lvl_index]
            .has_non_subdived_neighbor
            .assign(neighbor, neighbor_has_leaf);
    }
    skel.levels[lvl_index]
        .has_non_subdived_neighbor
        .assign(tri, has_non_subdived_neighbor);

    // Recursion below can subdivide anything, so neighbors are looked up again every time.
    for edge in 0..3 {
        match skel.tri_at(tri).neighbor(edge) {
            Some(neighbor) => {
                if skel.is_tri_subdivided(neighbor) {
                    continue;
                }
                let has_other_subdived = skel
                    .tri_at(neighbor)
                    .neighbors()
                    .iter()
                    .flatten()
                    .any(|&n| n != tri && skel.is_tri_subdivided(n));
                if has_other_subdived {
                    // A: the neighbor would be a leaf between two subdivided triangles.
                    subdivide(neighbor, lvl, has_next_level, skel, data, sp, hooks);
                    sp.distance_test_done.insert(neighbor);
                } else {
                    sp.queue_distance_test(lvl_index, neighbor);
                }
            }
            None => {
                // B: the parent's neighbor is a leaf, which now faces subdivided children.
                assert!(
                    tri_sibling_index(tri) != 3 && lvl != 0,
                    "{:?} has no neighbor across edge {}",
                    tri,
                    edge
                );
                let parent = match skel.tri_group_at(tri_group_id(tri)).parent() {
                    Some(parent) => parent,
                    None => unreachable!("non-root group without a parent"),
                };
                let parent_neighbor = match skel.tri_at(parent).neighbor(edge) {
                    Some(neighbor) => neighbor,
                    None => panic!("{:?} has no neighbor across edge {}", parent, edge),
                };
                subdivide(parent_neighbor, lvl - 1, true, skel, data, sp, hooks);
                sp.distance_test_done.insert(parent_neighbor);
                sp.level_need_process = sp.level_need_process.min(lvl - 1);
            }
        }
    }

    group
}

/// Runs distance tests for every triangle queued at `lvl`, subdividing leaves that are close
/// enough and queuing the children of subdivided triangles for the next level.
///
/// Forced subdivisions one level up are finished before going on, so every level before `lvl`
/// is complete when this returns.
pub fn subdivide_level_by_distance(
    pos: I64Vec3,
    lvl: u8,
    skel: &mut SubdivTriangleSkeleton,
    data: &mut SkeletonVertexData,
    sp: &mut SkeletonSubdivScratchpad,
    hooks: &mut impl SubdivHooks,
) {
    assert_eq!(lvl, sp.level_need_process, "levels must be processed in order");
    let lvl_index = usize::from(lvl);
    let has_next_level = lvl + 1 < sp.level_max;
    let threshold = sp.distance_threshold_subdiv[lvl_index];

    while !sp.levels[lvl_index].distance_test_next.is_empty() {
        let processing = sp.begin_processing(lvl_index);
        for &tri in processing.iter() {
            sp.distance_check_count += 1;
            if is_distance_near(pos, data.centers[tri.index()], threshold) {
                match skel.tri_at(tri).children() {
                    Some(children) => {
                        if has_next_level {
                            for sibling in 0..4 {
                                sp.queue_distance_test(lvl_index + 1, tri_id(children, sibling));
                            }
                        }
                    }
                    None => {
                        subdivide(tri, lvl, has_next_level, skel, data, sp, hooks);
                    }
                }
            }

            while sp.level_need_process != lvl {
                subdivide_level_by_distance(pos, sp.level_need_process, skel, data, sp, hooks);
            }
        }
        sp.end_processing(lvl_index, processing);
    }

    sp.level_need_process += 1;
}

/// One full pass: unsubdivide from the finest level up, then subdivide from the roots down.
pub fn update_subdivision(
    pos: I64Vec3,
    roots: &[SkTriId],
    skel: &mut SubdivTriangleSkeleton,
    data: &mut SkeletonVertexData,
    sp: &mut SkeletonSubdivScratchpad,
    hooks: &mut impl SubdivHooks,
) {
    for lvl in (0..sp.level_max).rev() {
        unsubdivide_select_by_distance(lvl, pos, skel, data, sp);
        unsubdivide_deselect_invariant_violations(skel, sp);
        unsubdivide_level(lvl, skel, data, sp, hooks);
    }
    sp.distance_test_done.clear();

    if sp.level_max == 0 {
        return;
    }
    for &root in roots {
        sp.queue_distance_test(0, root);
    }
    sp.level_need_process = 0;
    for lvl in 0..sp.level_max {
        subdivide_level_by_distance(pos, lvl, skel, data, sp, hooks);
    }
    sp.distance_test_done.clear();
}

/// Bookkeeping of the per-level boundary sets that disagrees with the skeleton.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LevelSetMismatch {
    pub tri: SkTriId,
    pub has_subdived_neighbor: bool,
    pub has_non_subdived_neighbor: bool,
}

/// Compares the per-level boundary sets against the actual neighbors of every triangle.
pub fn debug_check_level_sets(skel: &SubdivTriangleSkeleton) -> Vec<LevelSetMismatch> {
    let mut mismatches = Vec::new();
    for tri in skel.tri_iter() {
        let depth = usize::from(skel.tri_group_at(tri_group_id(tri)).depth());
        let level = match skel.levels.get(depth) {
            Some(level) => level,
            None => continue,
        };
        let (mut subdivided, mut leaves) = (0, 0);
        for neighbor in skel.tri_at(tri).neighbors().iter().flatten() {
            if skel.is_tri_subdivided(*neighbor) {
                subdivided += 1;
            } else {
                leaves += 1;
            }
        }

        let (expect_subdived, expect_non_subdived) = if skel.is_tri_subdivided(tri) {
            (false, leaves != 0)
        } else {
            (subdivided != 0, false)
        };
        let has_subdived_neighbor = level.has_subdived_neighbor.contains(tri);
        let has_non_subdived_neighbor = level.has_non_subdived_neighbor.contains(tri);
        if has_subdived_neighbor != expect_subdived
            || has_non_subdived_neighbor != expect_non_subdived
        {
            mismatches.push(LevelSetMismatch {
                tri,
                has_subdived_neighbor,
                has_non_subdived_neighbor,
            });
        }
    }
    mismatches
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
    use crate::icosahedron::{
        create_skeleton_icosahedron, ico_calc_sphere_tri_center, IcoSkeletonIds, IcoSphereShaper,
    };

    const RADIUS: f64 = 1000.0;
    const HEIGHT: f64 = 10.0;

    fn ico_setup(
        level_max: u8,
    ) -> (
        SubdivTriangleSkeleton,
        SkeletonVertexData,
        SkeletonSubdivScratchpad,
        IcoSkeletonIds,
        IcoSphereShaper,
    ) {
        let mut data = SkeletonVertexData::new(10);
        let (skel, ids) = create_skeleton_icosahedron(RADIUS, &mut data);
        for &group in ids.groups.iter() {
            ico_calc_sphere_tri_center(group, RADIUS + HEIGHT, HEIGHT, &skel, &mut data);
        }
        let sp = SkeletonSubdivScratchpad::new(level_max);
        let shaper = IcoSphereShaper {
            radius: RADIUS,
            height: HEIGHT,
        };
        (skel, data, sp, ids, shaper)
    }

    #[test]
    fn far_viewer_subdivides_nothing() {
        let (mut skel, mut data, mut sp, ids, mut shaper) = ico_setup(4);
        sp.distance_threshold_subdiv = [1000; MAX_SUBDIV_LEVELS];
        sp.distance_threshold_unsubdiv = [2000; MAX_SUBDIV_LEVELS];

        let far = I64Vec3::new(i64::MAX / 4, 0, 0);
        update_subdivision(far, &ids.triangles, &mut skel, &mut data, &mut sp, &mut shaper);

        assert_eq!(sp.subdiv_count, 0);
        assert_eq!(skel.tri_group_ids().size(), 5);
        assert_eq!(sp.distance_check_count, 20);
    }

    #[test]
    fn viewer_at_tri_center_subdivides_only_that_tri() {
        let (mut skel, mut data, mut sp, ids, mut shaper) = ico_setup(1);
        sp.distance_threshold_subdiv = [1; MAX_SUBDIV_LEVELS];
        sp.distance_threshold_unsubdiv = [2; MAX_SUBDIV_LEVELS];

        let target = ids.triangles[7];
        let pos = data.centers[target.index()];
        update_subdivision(pos, &ids.triangles, &mut skel, &mut data, &mut sp, &mut shaper);

        assert_eq!(sp.subdiv_count, 1);
        assert_eq!(skel.tri_group_ids().size(), 6);
        assert!(skel.is_tri_subdivided(target));
        assert!(skel.debug_check_invariants().is_empty());
        assert!(debug_check_level_sets(&skel).is_empty());

        assert!(sp.surface_removed.contains(target));
        assert_eq!(sp.surface_added.len(), 4);

        // Moving away unsubdivides it again.
        sp.surface_added.clear();
        sp.surface_removed.clear();
        let far = I64Vec3::new(i64::MAX / 4, 0, 0);
        update_subdivision(far, &ids.triangles, &mut skel, &mut data, &mut sp, &mut shaper);
        assert_eq!(sp.unsubdiv_count, 1);
        assert_eq!(skel.tri_group_ids().size(), 5);
        assert_eq!(skel.vertex_ids().size(), 12);
        assert!(sp.surface_added.contains(target));
        assert_eq!(sp.surface_removed.len(), 4);
        assert!(skel.debug_check_invariants().is_empty());
        assert!(debug_check_level_sets(&skel).is_empty());
    }

    #[test]
    fn deep_subdivision_forces_neighbors() {
        let (mut skel, mut data, mut sp, ids, mut shaper) = ico_setup(6);
        // Only a viewer on the surface gets close enough to reach the deepest level.
        for lvl in 0..MAX_SUBDIV_LEVELS {
            let edge = crate::icosahedron::ICO_MAX_EDGE_VS_LEVEL[lvl] * RADIUS * data.scale();
            sp.distance_threshold_subdiv[lvl] = (0.75 * edge) as u64;
            sp.distance_threshold_unsubdiv[lvl] = (1.5 * edge) as u64;
        }

        let pos = data.positions[ids.vertices[0].index()];
        update_subdivision(pos, &ids.triangles, &mut skel, &mut data, &mut sp, &mut shaper);

        assert!(sp.subdiv_count > 5);
        assert!(skel.debug_check_invariants().is_empty());
        // Triangles at the last level still subdivide, their children just go no further.
        let max_depth = skel
            .tri_group_ids()
            .iter()
            .map(|g| skel.tri_group_at(g).depth())
            .max();
        assert_eq!(max_depth, Some(6));
    }

    #[test]
    fn new_scratchpad_starts_empty() {
        let sp = SkeletonSubdivScratchpad::new(3);
        assert_eq!(sp.level_max, 3);
        assert_eq!(sp.level_need_process, 0);
        assert!(sp.surface_added.is_empty());
        assert!(sp.try_unsubdiv.is_empty());
        assert!(sp.tri_buffer.is_empty());
    }
}
