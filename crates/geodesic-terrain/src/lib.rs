//! The geodesic planet terrain model.
//!
//! # Skeleton
//!
//! The planet starts as an icosahedron of 20 triangles that are recursively split into 4 around the
//! viewer. Vertices of the [`SubdivTriangleSkeleton`](crate::SubdivTriangleSkeleton) are
//! identified by the pair of parents they were made from, so the same edge middle is found again
//! from either side. Neighboring leaves never differ by more than one level of detail.
//!
//! Skeleton positions are fixed-point `I64Vec3`s with `2^precision` units per meter, so distances
//! stay exact on planets of any size.
//!
//! # Chunks
//!
//! Every leaf triangle gets a chunk: a triangular grid of `chunk_width` segments per edge. Vertices
//! on chunk edges are shared with neighboring chunks and are backed by skeleton vertices, while the
//! interior (fill) vertices belong to one chunk only. A fan of faces along the border stitches each
//! chunk to its neighbors, including neighbors with twice the detail.
//!
//! # Mesh
//!
//! [`ChunkMeshGeometry`](crate::ChunkMeshGeometry) holds preallocated vertex and index buffers laid
//! out by [`ChunkMeshBufferInfo`](crate::ChunkMeshBufferInfo), and [`Terrain`](crate::Terrain)
//! keeps them in sync with the skeleton on every update.

mod chunk;
mod chunk_mesh;
mod chunk_utils;
mod config;
mod error;
mod icosahedron;
mod ids;
mod skeleton;
mod skeleton_data;
mod subdiv;
mod terrain;

pub use chunk::*;
pub use chunk_mesh::*;
pub use chunk_utils::*;
pub use config::*;
pub use error::*;
pub use icosahedron::*;
pub use ids::*;
pub use skeleton::*;
pub use skeleton_data::*;
pub use subdiv::*;
pub use terrain::*;

pub use geodesic_core;
