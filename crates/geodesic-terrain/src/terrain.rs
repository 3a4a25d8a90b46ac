use crate::chunk::{ChunkSkeleton, ChunkStitch};
use crate::chunk_mesh::*;
use crate::chunk_utils::ChunkMeshBufferInfo;
use crate::config::TerrainConfig;
use crate::error::TerrainError;
use crate::icosahedron::*;
use crate::ids::*;
use crate::skeleton::{SkeletonViolation, SubdivTriangleSkeleton};
use crate::skeleton_data::SkeletonVertexData;
use crate::subdiv::*;

use geodesic_core::glam::{DVec3, I64Vec3, Vec3};
use geodesic_core::Id;
use std::io;

/// What one [`Terrain::update`] did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UpdateStats {
    pub skeleton_triangles: usize,
    pub skeleton_vertices: usize,
    pub chunks: usize,
    pub shared_vertices: usize,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    pub subdivisions: usize,
    pub unsubdivisions: usize,
    pub distance_checks: usize,
}

/// A planet made of chunks that get more detailed close to the viewer.
///
/// The mesh lives in [`ChunkMeshGeometry`], whose buffers are preallocated for every chunk and
/// shared vertex the config allows. After each update, the changed chunks and shared vertices are
/// listed in [`Terrain::changes`].
pub struct Terrain {
    config: TerrainConfig,

    skel: SubdivTriangleSkeleton,
    data: SkeletonVertexData,
    ico: IcoSkeletonIds,
    shaper: IcoSphereShaper,
    subdiv: SkeletonSubdivScratchpad,

    chunks: ChunkSkeleton,
    info: ChunkMeshBufferInfo,
    geom: ChunkMeshGeometry,
    chunk_sp: ChunkScratchpad,
}

impl Terrain {
    /// Builds the seed icosahedron. Its 20 chunks are made on the first [`update`](Self::update).
    pub fn new(config: &TerrainConfig) -> Result<Self, TerrainError> {
        config.validate()?;

        let mut data = SkeletonVertexData::new(config.precision);
        let (skel, ico) = create_skeleton_icosahedron(config.radius, &mut data);
        for &group in ico.groups.iter() {
            ico_calc_sphere_tri_center(
                group,
                config.radius + config.height,
                config.height,
                &skel,
                &mut data,
            );
        }

        let mut subdiv = SkeletonSubdivScratchpad::new(config.max_subdiv_levels);
        let scale = data.scale();
        for (lvl, &max_edge) in ICO_MAX_EDGE_VS_LEVEL.iter().enumerate() {
            let subdiv_dist = 0.75 * max_edge * config.radius * scale;
            subdiv.distance_threshold_subdiv[lvl] = subdiv_dist as u64;
            subdiv.distance_threshold_unsubdiv[lvl] =
                (subdiv_dist * config.unsubdiv_threshold_scale) as u64;
        }
        subdiv.surface_added.extend(ico.triangles.iter().copied());

        let chunks = ChunkSkeleton::new(
            config.chunk_subdiv_level,
            config.max_chunks(),
            config.max_shared_vertices(),
        );
        let info = ChunkMeshBufferInfo::new(&chunks);
        let geom = ChunkMeshGeometry::new(&info, &chunks);
        let chunk_sp = ChunkScratchpad::new(&chunks);

        log::info!(
            "Created terrain: radius={}m, max_chunks={}, max_shared_vertices={}, \
             vertices={}, faces={}",
            config.radius,
            config.max_chunks(),
            config.max_shared_vertices(),
            info.vrtx_total,
            info.face_total
        );

        Ok(Self {
            config: *config,
            skel,
            data,
            ico,
            shaper: IcoSphereShaper {
                radius: config.radius,
                height: config.height,
            },
            subdiv,
            chunks,
            info,
            geom,
            chunk_sp,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn skeleton(&self) -> &SubdivTriangleSkeleton {
        &self.skel
    }

    pub fn vertex_data(&self) -> &SkeletonVertexData {
        &self.data
    }

    pub fn chunks(&self) -> &ChunkSkeleton {
        &self.chunks
    }

    pub fn buffer_info(&self) -> &ChunkMeshBufferInfo {
        &self.info
    }

    pub fn geometry(&self) -> &ChunkMeshGeometry {
        &self.geom
    }

    /// Chunks and shared vertices added or removed by the last update.
    pub fn changes(&self) -> &ChunkScratchpad {
        &self.chunk_sp
    }

    pub fn root_triangles(&self) -> &[SkTriId; 20] {
        &self.ico.triangles
    }

    /// Converts planet-centered meters to skeleton units.
    pub fn to_skel_pos(&self, meters: DVec3) -> I64Vec3 {
        (meters * self.data.scale()).round().as_i64vec3()
    }

    /// Subdivides around `viewer` and brings every chunk in line with the new skeleton.
    ///
    /// Mesh positions are written relative to `origin`, both in skeleton units. A capacity error
    /// leaves the terrain partially updated, and it should be rebuilt with a larger config.
    ///
    /// Unsubdividing only starts from subdivided triangles next to a leaf of the same level. Once
    /// all 20 root triangles are subdivided, level 0 stays subdivided no matter where the viewer
    /// goes.
    pub fn update(
        &mut self,
        viewer: I64Vec3,
        origin: I64Vec3,
        heightmap: &impl Heightmap,
    ) -> Result<UpdateStats, TerrainError> {
        let viewer = self.clamp_viewer(viewer);

        self.subdiv.reset_counters();
        update_subdivision(
            viewer,
            &self.ico.triangles,
            &mut self.skel,
            &mut self.data,
            &mut self.subdiv,
            &mut self.shaper,
        );

        self.chunk_sp.clear_changes();
        self.remove_chunks();
        self.add_chunks()?;

        let Self {
            config,
            skel,
            data,
            subdiv,
            chunks,
            info,
            geom,
            chunk_sp: sp,
            ..
        } = self;

        let mut batch = sp.take_chunk_buffer();
        batch.extend(sp.chunks_added.iter());
        for &chunk in &batch {
            if let Some(tri) = chunks.chunk_tri(chunk) {
                restitch_check(chunk, tri, chunks, skel, sp);
            }
        }

        if origin != geom.origin_skel_pos {
            translate_origin(origin, &sp.chunks_added, chunks, data, geom, info, heightmap);
        } else {
            for shared in sp.shared_added.iter() {
                update_shared_vrtx_position(shared, chunks, data, geom, info, heightmap);
            }
        }
        for &chunk in &batch {
            calc_fill_positions(
                chunk,
                config.radius,
                &sp.lut,
                chunks,
                data,
                geom,
                info,
                heightmap,
            );
        }

        // Sums are rebuilt from scratch by the faces around new shared vertices.
        for shared in sp.shared_added.iter() {
            geom.shared_normal_sum[shared.index()] = Vec3::ZERO;
            sp.shared_normals_dirty.insert(shared);
        }

        batch.clear();
        batch.extend(chunks.chunk_ids().iter());
        for &chunk in &batch {
            let tri = match chunks.chunk_tri(chunk) {
                Some(tri) => tri,
                None => continue,
            };
            let newly_added = sp.chunks_added.contains(chunk);
            update_faces(chunk, tri, newly_added, skel, geom, info, sp, chunks);
        }
        sp.return_chunk_buffer(batch);
        sp.stitch_cmds.fill(ChunkStitch::DISABLED);

        let stride = info.chunk_max_face_count as usize;
        for chunk in sp.chunks_removed.iter() {
            if !chunks.chunk_ids().exists(chunk) {
                geom.indices[chunk.index() * stride..(chunk.index() + 1) * stride].fill([0; 3]);
            }
        }

        update_dirty_shared_normals(geom, info, sp);

        let stats = UpdateStats {
            skeleton_triangles: skel.tri_group_ids().size() * 4,
            skeleton_vertices: skel.vertex_ids().size(),
            chunks: chunks.chunk_ids().size(),
            shared_vertices: chunks.shared_ids().size(),
            chunks_added: sp.chunks_added.len(),
            chunks_removed: sp.chunks_removed.len(),
            subdivisions: subdiv.subdiv_count,
            unsubdivisions: subdiv.unsubdiv_count,
            distance_checks: subdiv.distance_check_count,
        };
        subdiv.surface_added.clear();
        subdiv.surface_removed.clear();

        log::debug!("Terrain update: {:?}", stats);
        Ok(stats)
    }

    /// Keeps the viewer out of the planet, so at most the area under it is fully subdivided.
    fn clamp_viewer(&self, viewer: I64Vec3) -> I64Vec3 {
        let min_dist = (self.config.radius + self.config.height) * self.data.scale();
        let pos = viewer.as_dvec3();
        if pos.length() >= min_dist {
            return viewer;
        }
        let dir = pos.try_normalize().unwrap_or(DVec3::X);
        (dir * min_dist).round().as_i64vec3()
    }

    fn remove_chunks(&mut self) {
        let Self {
            skel,
            subdiv,
            chunks,
            info,
            geom,
            chunk_sp: sp,
            ..
        } = self;

        for tri in subdiv.surface_removed.iter() {
            let chunk = match chunks.tri_chunk(tri) {
                Some(chunk) => chunk,
                None => continue,
            };
            subtract_normal_contrib(chunk, true, geom, info, sp, chunks);
            chunks.chunk_remove(chunk, skel, &mut sp.shared_removed);
            sp.chunks_removed.insert(chunk);
        }
    }

    fn add_chunks(&mut self) -> Result<(), TerrainError> {
        let Self {
            config,
            skel,
            data,
            subdiv,
            chunks,
            chunk_sp: sp,
            ..
        } = self;
        let level = chunks.chunk_subdiv_level();

        for tri in subdiv.surface_added.iter() {
            let corners = skel.tri_at(tri).vertices();
            for (side, edge) in sp.edge_vertices.iter_mut().enumerate() {
                edge.clear();
                skel.vrtx_create_chunk_edge_recurse(
                    level,
                    corners[side],
                    corners[(side + 1) % 3],
                    edge,
                );
            }

            let [e0, e1, e2] = &sp.edge_vertices;
            let chunk = match chunks.chunk_create(
                tri,
                skel,
                &mut sp.shared_added,
                [e0.as_slice(), e1.as_slice(), e2.as_slice()],
            ) {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::warn!("Failed to create chunk for {:?}: {}", tri, e);
                    return Err(e);
                }
            };

            data.resize(skel);
            for (side, edge) in sp.edge_vertices.iter().enumerate() {
                ico_calc_chunk_edge(
                    config.radius,
                    level,
                    corners[side],
                    corners[(side + 1) % 3],
                    edge,
                    data,
                );
            }
            sp.chunks_added.insert(chunk);
        }
        Ok(())
    }

    /// Skeleton links and level sets that disagree with each other. Empty when healthy.
    pub fn debug_check_skeleton(&self) -> (Vec<SkeletonViolation>, Vec<LevelSetMismatch>) {
        (
            self.skel.debug_check_invariants(),
            debug_check_level_sets(&self.skel),
        )
    }

    pub fn debug_check_normals(&self) -> Vec<BadNormal> {
        debug_check_normals(&self.geom, &self.info, &self.chunks)
    }

    pub fn write_obj(&self, out: &mut impl io::Write) -> io::Result<()> {
        write_obj(out, &self.geom, &self.info, &self.chunks)
    }
}
