use crate::skeleton::SubdivTriangleSkeleton;

use geodesic_core::geometry::int_2pow;
use geodesic_core::glam::{I64Vec3, Vec3};

/// Geometry attached to the skeleton, indexed by vertex and triangle IDs.
#[derive(Clone, Debug, Default)]
pub struct SkeletonVertexData {
    /// Fixed-point, `2^precision` units per meter.
    pub positions: Vec<I64Vec3>,
    pub normals: Vec<Vec3>,
    /// Per triangle, the point distances are measured from when deciding to subdivide.
    pub centers: Vec<I64Vec3>,
    pub precision: u32,
}

impl SkeletonVertexData {
    pub fn new(precision: u32) -> Self {
        Self {
            precision,
            ..Default::default()
        }
    }

    /// Skeleton units per meter.
    pub fn scale(&self) -> f64 {
        int_2pow(self.precision) as f64
    }

    /// Makes room for every ID the skeleton can currently hand out.
    pub fn resize(&mut self, skel: &SubdivTriangleSkeleton) {
        let vrtx_capacity = skel.vrtx_capacity();
        if self.positions.len() < vrtx_capacity {
            self.positions.resize(vrtx_capacity, I64Vec3::ZERO);
            self.normals.resize(vrtx_capacity, Vec3::ZERO);
        }
        let tri_capacity = skel.tri_capacity();
        if self.centers.len() < tri_capacity {
            self.centers.resize(tri_capacity, I64Vec3::ZERO);
        }
    }
}
