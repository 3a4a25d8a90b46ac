//! Seeds a skeleton with an icosahedron and computes geometry for a sphere of a given radius.

use crate::ids::*;
use crate::skeleton::SubdivTriangleSkeleton;
use crate::skeleton_data::SkeletonVertexData;
use crate::subdiv::SubdivHooks;

use geodesic_core::glam::{DVec3, I64Vec3, Vec3};
use geodesic_core::{Id, MaybeNewId};

/// Vertices of an icosahedron with radius 1.
pub const ICO_VERTEX_POSITIONS: [[f64; 3]; 12] = [
    [0.0, 0.0, 1.0],
    [0.8944271909999159, 0.0, 0.4472135954999579],
    [0.2763932022500210, -0.8506508083520400, 0.4472135954999579],
    [-0.7236067977499790, -0.5257311121191336, 0.4472135954999579],
    [-0.7236067977499790, 0.5257311121191336, 0.4472135954999579],
    [0.2763932022500210, 0.8506508083520400, 0.4472135954999579],
    [-0.8944271909999159, 0.0, -0.4472135954999579],
    [-0.2763932022500210, -0.8506508083520400, -0.4472135954999579],
    [0.7236067977499790, -0.5257311121191336, -0.4472135954999579],
    [0.7236067977499790, 0.5257311121191336, -0.4472135954999579],
    [-0.2763932022500210, 0.8506508083520400, -0.4472135954999579],
    [0.0, 0.0, -1.0],
];

/// Faces as `[top, left, right]`, four per root group.
#[rustfmt::skip]
pub const ICO_FACES: [[usize; 3]; 20] = [
    [0, 2, 1], [0, 3, 2], [0, 4, 3], [0, 5, 4],
    [0, 1, 5], [8, 1, 2], [2, 7, 8], [7, 2, 3],
    [3, 6, 7], [6, 3, 4], [4, 10, 6], [10, 4, 5],
    [5, 9, 10], [9, 5, 1], [1, 8, 9], [11, 7, 6],
    [11, 8, 7], [11, 9, 8], [11, 10, 9], [11, 6, 10],
];

/// The face across each edge of each face.
#[rustfmt::skip]
pub const ICO_NEIGHBORS: [[usize; 3]; 20] = [
    [1, 5, 4], [2, 7, 0], [3, 9, 1], [4, 11, 2],
    [0, 13, 3], [14, 0, 6], [7, 16, 5], [6, 1, 8],
    [9, 15, 7], [8, 2, 10], [11, 19, 9], [10, 3, 12],
    [13, 18, 11], [12, 4, 14], [5, 17, 13], [16, 8, 19],
    [17, 6, 15], [18, 14, 16], [19, 12, 17], [15, 10, 18],
];

/// Longest edge at each subdivision level, for radius 1.
#[rustfmt::skip]
pub const ICO_MAX_EDGE_VS_LEVEL: [f64; 24] = [
    1.05146222, 6.18033989e-1, 3.24919696e-1, 1.64647160e-1,
    8.26039665e-2, 4.13372560e-2, 2.06730441e-2, 1.03370743e-2,
    5.16860619e-3, 2.58431173e-3, 1.29215694e-3, 6.46078606e-4,
    3.23039320e-4, 1.61519662e-4, 8.07598312e-5, 4.03799157e-5,
    2.01899578e-5, 1.00949789e-5, 5.04748946e-6, 2.52374473e-6,
    1.26187236e-6, 6.30936182e-7, 3.15468091e-7, 1.57734046e-7,
];

/// How far the sphere bulges out over a flat triangle at each subdivision level, for radius 1.
#[rustfmt::skip]
pub const ICO_TOWER_OVER_HORIZON_VS_LEVEL: [f64; 24] = [
    1.75570505e-1, 3.95676520e-2, 9.65341549e-3, 2.39888395e-3,
    5.98823224e-4, 1.49649798e-4, 3.74089507e-5, 9.35201901e-6,
    2.33799109e-6, 5.84496918e-7, 1.46124176e-7, 3.65310407e-8,
    9.13275996e-9, 2.28318998e-9, 5.70797494e-10, 1.42699373e-10,
    3.56748433e-11, 8.91871083e-12, 2.22967771e-12, 5.57419427e-13,
    1.39354857e-13, 3.48387142e-14, 8.70967855e-15, 2.17741964e-15,
];

/// IDs of the seed icosahedron.
#[derive(Clone, Copy, Debug)]
pub struct IcoSkeletonIds {
    pub vertices: [SkVrtxId; 12],
    pub groups: [SkTriGroupId; 5],
    pub triangles: [SkTriId; 20],
}

/// Creates a skeleton of 20 linked root triangles, and writes positions and normals for a sphere
/// of `radius` meters. Triangle centers are left to [`ico_calc_sphere_tri_center`].
pub fn create_skeleton_icosahedron(
    radius: f64,
    data: &mut SkeletonVertexData,
) -> (SubdivTriangleSkeleton, IcoSkeletonIds) {
    let mut skel = SubdivTriangleSkeleton::default();

    let vertices = [(); 12].map(|_| skel.vrtx_create_root());

    let mut face = 0;
    let groups = [(); 5].map(|_| {
        let faces = [(); 4].map(|_| {
            let corners = ICO_FACES[face].map(|v| vertices[v]);
            face += 1;
            corners
        });
        skel.tri_group_create_root(faces)
    });

    let mut triangles = [tri_id(groups[0], 0); 20];
    for (i, tri) in triangles.iter_mut().enumerate() {
        *tri = tri_id(groups[i / 4], i % 4);
    }
    for (i, neighbors) in ICO_NEIGHBORS.iter().enumerate() {
        for (edge, &neighbor) in neighbors.iter().enumerate() {
            skel.tri_store_neighbor(triangles[i], edge, triangles[neighbor]);
        }
    }

    data.resize(&skel);
    let scale = data.scale();
    for (vrtx, pos) in vertices.iter().zip(ICO_VERTEX_POSITIONS.iter()) {
        let unit = DVec3::from_array(*pos);
        data.positions[vrtx.index()] = (unit * radius * scale).as_i64vec3();
        data.normals[vrtx.index()] = unit.as_vec3();
    }

    let ids = IcoSkeletonIds {
        vertices,
        groups,
        triangles,
    };
    (skel, ids)
}

/// Midpoint of `a` and `b` pushed out to the sphere surface, and the sphere's normal there.
///
/// Only the short offset back to the surface is computed in floating point, so precision doesn't
/// degrade with planet size.
pub fn sphere_midpoint(radius: f64, scale: f64, a: I64Vec3, b: I64Vec3) -> (I64Vec3, Vec3) {
    let mid = (a + b) / 2;
    let mid_meters = mid.as_dvec3() / scale;
    let length = mid_meters.length();
    let normal = mid_meters / length;
    let rise = (normal * (radius - length) * scale).as_i64vec3();
    (mid + rise, normal.as_vec3())
}

/// Positions and normals for the newly created middles of the edges `[c0 c1, c1 c2, c2 c0]`.
pub fn ico_calc_middles(
    radius: f64,
    corners: [SkVrtxId; 3],
    middles: [MaybeNewId<SkVrtxId>; 3],
    data: &mut SkeletonVertexData,
) {
    let scale = data.scale();
    for (i, middle) in middles.iter().enumerate() {
        if !middle.is_new {
            continue;
        }
        let a = data.positions[corners[i].index()];
        let b = data.positions[corners[(i + 1) % 3].index()];
        let (pos, normal) = sphere_midpoint(radius, scale, a, b);
        data.positions[middle.id.index()] = pos;
        data.normals[middle.id.index()] = normal;
    }
}

/// Positions and normals for the new vertices of an edge made by
/// [`SubdivTriangleSkeleton::vrtx_create_chunk_edge_recurse`].
pub fn ico_calc_chunk_edge(
    radius: f64,
    level: u8,
    a: SkVrtxId,
    b: SkVrtxId,
    edge: &[MaybeNewId<SkVrtxId>],
    data: &mut SkeletonVertexData,
) {
    if level == 0 {
        return;
    }
    debug_assert_eq!(edge.len(), (1 << level) - 1);

    let half = edge.len() / 2;
    let mid = edge[half];
    if mid.is_new {
        let (pos, normal) = sphere_midpoint(
            radius,
            data.scale(),
            data.positions[a.index()],
            data.positions[b.index()],
        );
        data.positions[mid.id.index()] = pos;
        data.normals[mid.id.index()] = normal;
    }
    ico_calc_chunk_edge(radius, level - 1, a, mid.id, &edge[..half], data);
    ico_calc_chunk_edge(radius, level - 1, mid.id, b, &edge[half + 1..], data);
}

/// Centers of the 4 triangles of `group`, raised above the corners by half of the highest the
/// terrain can get over a triangle at this depth.
pub fn ico_calc_sphere_tri_center(
    group: SkTriGroupId,
    max_radius: f64,
    height: f64,
    skel: &SubdivTriangleSkeleton,
    data: &mut SkeletonVertexData,
) {
    let tri_group = skel.tri_group_at(group);
    let depth = usize::from(tri_group.depth()).min(ICO_TOWER_OVER_HORIZON_VS_LEVEL.len() - 1);
    let terrain_max_height = height + max_radius * ICO_TOWER_OVER_HORIZON_VS_LEVEL[depth];
    let rise_scale = 0.5 * terrain_max_height * data.scale() / 3.0;

    for (sibling, tri) in tri_group.triangles().iter().enumerate() {
        let [va, vb, vc] = tri.vertices().map(Id::index);
        let pos_average =
            data.positions[va] / 3 + data.positions[vb] / 3 + data.positions[vc] / 3;
        let normal_sum = data.normals[va] + data.normals[vb] + data.normals[vc];
        let rise = (normal_sum.as_dvec3() * rise_scale).as_i64vec3();

        data.centers[tri_id(group, sibling).index()] = pos_average + rise;
    }
}

/// Subdivision hooks that keep new skeleton geometry on a sphere.
#[derive(Clone, Copy, Debug)]
pub struct IcoSphereShaper {
    /// Meters.
    pub radius: f64,
    /// Highest the terrain rises above `radius`, in meters.
    pub height: f64,
}

impl SubdivHooks for IcoSphereShaper {
    fn on_subdiv(
        &mut self,
        _tri: SkTriId,
        group: SkTriGroupId,
        corners: [SkVrtxId; 3],
        middles: [MaybeNewId<SkVrtxId>; 3],
        skel: &SubdivTriangleSkeleton,
        data: &mut SkeletonVertexData,
    ) {
        ico_calc_middles(self.radius, corners, middles, data);
        ico_calc_sphere_tri_center(group, self.radius + self.height, self.height, skel, data);
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

    use approx::assert_relative_eq;

    #[test]
    fn icosahedron_is_a_closed_linked_mesh() {
        let mut data = SkeletonVertexData::new(10);
        let (skel, ids) = create_skeleton_icosahedron(50.0, &mut data);

        assert_eq!(skel.vertex_ids().size(), 12);
        assert_eq!(skel.tri_group_ids().size(), 5);
        assert!(skel.debug_check_invariants().is_empty());
        for &tri in ids.triangles.iter() {
            assert_eq!(skel.tri_refcount(tri), 3);
        }
        for &vrtx in ids.vertices.iter() {
            // Every icosahedron vertex touches 5 faces.
            assert_eq!(skel.vertex_ids().refcount(vrtx), 5);
            let pos = data.positions[vrtx.index()].as_dvec3() / data.scale();
            assert_relative_eq!(pos.length(), 50.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn sphere_midpoint_lies_on_the_sphere() {
        let scale = 1024.0;
        let radius = 6_000_000.0;
        let a = (DVec3::X * radius * scale).as_i64vec3();
        let b = (DVec3::Y * radius * scale).as_i64vec3();
        let (mid, normal) = sphere_midpoint(radius, scale, a, b);

        assert_relative_eq!(mid.as_dvec3().length() / scale, radius, epsilon = 1e-2);
        assert_relative_eq!(normal.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(normal.x, normal.y);
        assert_relative_eq!(normal.z, 0.0);
    }

    #[test]
    fn tri_centers_rise_above_the_surface() {
        let radius = 100.0;
        let height = 5.0;
        let mut data = SkeletonVertexData::new(8);
        let (skel, ids) = create_skeleton_icosahedron(radius, &mut data);
        for &group in ids.groups.iter() {
            ico_calc_sphere_tri_center(group, radius + height, height, &skel, &mut data);
        }
        for &tri in ids.triangles.iter() {
            let center = data.centers[tri.index()].as_dvec3() / data.scale();
            // Flat face centers of a unit icosahedron sit at ~0.79, the rise puts them further out.
            assert!(center.length() > 0.79 * radius);
        }
    }
}
