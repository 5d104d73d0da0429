//! Split of an oversized group into sub-groups
//!
//! The elements of the group are partitioned, then every sub-group is built
//! in a single traversal of the source elements: vertices and elements are
//! renumbered, the adjacency is rebuilt, the boundary records are copied and
//! the faces between two sub-groups become interface faces, recorded in the
//! communicators together with their vertices. The source group is replaced
//! only once all the sub-groups are built and validated.
use crate::{
    comm::InterfaceComm,
    group::{check_communicators, Group, ParMesh},
    mesh::{
        append_blank_xtetra, append_xpoint, append_xtetra, face_id, Adja, SolField, TetMesh,
        FACE2EDGES, TETRA2FACES,
    },
    partition::{group_count, partition, partition_imbalance, Partitioner},
    tags::TagFlags,
    Error, Result,
};
use log::{debug, info, warn};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Instant};

/// Parameters of the group split
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    /// Maximum number of elements in a group
    pub target_size: usize,
    /// Growth factor of the buffers
    pub growth_factor: f64,
    /// Initial number of vertices of a sub-group: #elements / `vert_ratio`
    pub vert_ratio: usize,
    /// Initial number of boundary records of a sub-group: #elements / `bdy_ratio`
    pub bdy_ratio: usize,
    /// Run the complete consistency checks of the sub-groups
    pub check: bool,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            target_size: 100_000,
            growth_factor: crate::buffer::DEFAULT_GROWTH,
            vert_ratio: 6,
            bdy_ratio: 3,
            check: true,
        }
    }
}

impl SplitParams {
    #[must_use]
    pub const fn with_target_size(mut self, target_size: usize) -> Self {
        self.target_size = target_size;
        self
    }

    #[must_use]
    pub const fn with_growth_factor(mut self, growth_factor: f64) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    #[must_use]
    pub const fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Read the parameters from a json string; missing values are set to
    /// their defaults
    pub fn from_json(s: &str) -> Result<Self> {
        let res: Self = serde_json::from_str(s)?;
        res.validate()?;
        Ok(res)
    }

    /// Read the parameters from a json file
    pub fn from_json_file(fname: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(fname)?;
        let res: Self = serde_json::from_reader(BufReader::new(file))?;
        res.validate()?;
        Ok(res)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::InvalidInput(String::from(
                "target_size must be positive",
            )));
        }
        if self.vert_ratio == 0 || self.bdy_ratio == 0 {
            return Err(Error::InvalidInput(String::from(
                "vert_ratio and bdy_ratio must be positive",
            )));
        }
        if !self.growth_factor.is_finite() {
            return Err(Error::InvalidInput(format!(
                "invalid growth factor {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// Sizes of a sub-group
#[derive(Clone, Debug, Default, Serialize)]
pub struct GroupInfo {
    pub n_elems: usize,
    pub n_verts: usize,
    pub n_xtetras: usize,
    pub n_node_interfaces: usize,
    pub n_face_interfaces: usize,
    pub mem_usage: usize,
}

impl GroupInfo {
    fn new(g: &Group) -> Self {
        Self {
            n_elems: g.mesh.n_elems(),
            n_verts: g.mesh.n_verts(),
            n_xtetras: g.mesh.n_xtetras(),
            n_node_interfaces: g.node_comm.len(),
            n_face_interfaces: g.face_comm.len(),
            mem_usage: g.mem_usage(),
        }
    }
}

/// Report of a group split
#[derive(Clone, Debug, Default, Serialize)]
pub struct SplitInfo {
    pub partitioner: String,
    pub n_elems: usize,
    pub n_groups: usize,
    /// Number of faces between two sub-groups
    pub n_interface_faces: usize,
    /// Number of node slots created
    pub n_new_node_slots: usize,
    /// Number of face slots created
    pub n_new_face_slots: usize,
    pub partition_quality: f64,
    pub partition_imbalance: f64,
    pub groups: Vec<GroupInfo>,
    pub time: f64,
}

impl SplitInfo {
    pub fn print_summary(&self) {
        if self.n_groups > 1 {
            println!(
                "{} elements -> {} groups ({}), partition quality = {:.3}, partition imbalance = {:.3}, {:.2e} secs",
                self.n_elems,
                self.n_groups,
                self.partitioner,
                self.partition_quality,
                self.partition_imbalance,
                self.time,
            );
            println!(
                "  {} interface faces, {} new node slots, {} new face slots",
                self.n_interface_faces, self.n_new_node_slots, self.n_new_face_slots
            );
            for (i, g) in self.groups.iter().enumerate() {
                println!(
                    "  group {i}: {} elements, {} verts, {} node / {} face interfaces",
                    g.n_elems, g.n_verts, g.n_node_interfaces, g.n_face_interfaces
                );
            }
        } else {
            println!(
                "{} elements -> no split, {:.2e} secs",
                self.n_elems, self.time
            );
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

/// Scratch data shared by the construction of all the sub-groups
struct GroupBuilder<'a> {
    src: &'a Group,
    parts: &'a [usize],
    params: &'a SplitParams,
    /// Local id of every source element in its sub-group
    elem_local: Vec<usize>,
    /// Local id of every source vertex in the sub-group being built
    vert_local: Vec<Option<usize>>,
    /// Node slot of every source vertex
    vert_slot: Vec<Option<usize>>,
    /// Face slots, keyed by the smallest of the two encoded face ids
    face_slot: FxHashMap<usize, usize>,
    next_node_slot: usize,
    next_face_slot: usize,
    n_interface_faces: usize,
}

impl<'a> GroupBuilder<'a> {
    fn new(
        src: &'a Group,
        parts: &'a [usize],
        params: &'a SplitParams,
        n_node_slots: usize,
        n_face_slots: usize,
    ) -> Self {
        let msh = &src.mesh;
        let mut vert_slot = vec![None; msh.n_verts()];
        for (i_vert, slot) in src.node_comm.iter() {
            vert_slot[i_vert] = Some(slot);
        }
        let next_node_slot = src
            .node_comm
            .max_slot()
            .map_or(n_node_slots, |s| n_node_slots.max(s + 1));
        let next_face_slot = src
            .face_comm
            .max_slot()
            .map_or(n_face_slots, |s| n_face_slots.max(s + 1));

        Self {
            src,
            parts,
            params,
            elem_local: vec![usize::MAX; msh.n_elems()],
            vert_local: vec![None; msh.n_verts()],
            vert_slot,
            face_slot: FxHashMap::default(),
            next_node_slot,
            next_face_slot,
            n_interface_faces: 0,
        }
    }

    /// Build sub-group `i_group`, that holds `n_elems` elements
    fn build(&mut self, i_group: usize, n_elems: usize) -> Result<Group> {
        let src_group = self.src;
        let src = &src_group.mesh;
        let growth = self.params.growth_factor;
        let n_verts_est = n_elems / self.params.vert_ratio;
        let n_bdy_est = n_elems / self.params.bdy_ratio;
        debug!(
            "group {i_group}: {n_elems} elements, initial sizes: {n_verts_est} vertices, {n_bdy_est} boundary records"
        );

        let mut msh = TetMesh::with_capacity(
            src.info.clone(),
            n_verts_est,
            n_elems,
            n_bdy_est,
            n_bdy_est,
            growth,
        )?;
        let mut field = src_group
            .field
            .as_ref()
            .map(|f| SolField::with_capacity(f.kind(), n_verts_est, growth))
            .transpose()?;
        let mut node_comm = InterfaceComm::with_capacity(n_bdy_est, growth)?;
        let mut face_comm = InterfaceComm::with_capacity(n_bdy_est, growth)?;

        // interface faces inherited from the source group
        for (i_face, slot) in src_group.face_comm.iter() {
            if self.parts[i_face / 4] == i_group {
                face_comm.append(i_face, slot)?;
            }
        }

        self.vert_local.fill(None);

        for i_elem in 0..src.n_elems() {
            if self.parts[i_elem] != i_group {
                continue;
            }
            let t = src.tetra(i_elem);
            let mut new_t = *t;
            new_t.xt = t.xt.map(|xt| append_xtetra(&mut msh, src, xt)).transpose()?;

            for (i, &i_vert) in t.verts.iter().enumerate() {
                new_t.verts[i] = if let Some(i_new) = self.vert_local[i_vert] {
                    i_new
                } else {
                    let mut p = *src.point(i_vert);
                    p.xp = p.xp.map(|xp| append_xpoint(&mut msh, src, xp)).transpose()?;
                    let i_new = msh.points.push(p)?;
                    msh.np += 1;
                    if let (Some(f), Some(src_f)) = (field.as_mut(), src_group.field.as_ref()) {
                        f.push(src_f.value(i_vert))?;
                    }
                    if let Some(slot) = self.vert_slot[i_vert] {
                        node_comm.append(i_new, slot)?;
                    }
                    self.vert_local[i_vert] = Some(i_new);
                    i_new
                };
            }

            let i_new = msh.tetras.push(new_t)?;
            self.elem_local[i_elem] = i_new;
            // the source adjacency codes are fixed below (same sub-group) or
            // cleared (other sub-group)
            let adja = src.adja(i_elem);
            msh.adja.push(adja)?;

            for (i_face, a) in adja.iter().enumerate() {
                let Some((j_elem, j_face)) = a.get() else {
                    continue;
                };
                if self.parts[j_elem] != i_group {
                    msh.set_adja(i_new, i_face, Adja::NONE);
                    tag_interface_face(&mut msh, i_new, i_face)?;

                    let i_face_id = face_id(i_elem, i_face);
                    let key = i_face_id.min(face_id(j_elem, j_face));
                    let slot = *self.face_slot.entry(key).or_insert_with(|| {
                        self.next_face_slot += 1;
                        self.next_face_slot - 1
                    });
                    face_comm.append(i_face_id, slot)?;
                    self.n_interface_faces += 1;

                    for i in TETRA2FACES[i_face] {
                        let i_vert = t.verts[i];
                        if self.vert_slot[i_vert].is_none() {
                            let slot = self.next_node_slot;
                            self.next_node_slot += 1;
                            self.vert_slot[i_vert] = Some(slot);
                            node_comm.append(new_t.verts[i], slot)?;
                        }
                    }
                } else if j_elem < i_elem {
                    let j_new = self.elem_local[j_elem];
                    msh.set_adja(i_new, i_face, Adja::new(j_new, j_face));
                    msh.set_adja(j_new, j_face, Adja::new(i_new, i_face));
                }
            }
        }

        node_comm.finalize();
        face_comm.finalize();

        if msh.n_verts() > n_verts_est {
            debug!(
                "group {i_group}: {} vertices, {n_verts_est} expected",
                msh.n_verts()
            );
        }
        msh.link_free_slots();
        if let Some(f) = field.as_mut() {
            f.match_slots(msh.n_verts(), msh.n_vert_slots())?;
        }

        let n = msh.sync_parallel_edges();
        debug!("group {i_group}: parallel edge tags reported to {n} boundary records");

        Ok(Group {
            mesh: msh,
            field,
            node_comm,
            face_comm,
        })
    }
}

/// Make face `i_face` of element `i_elem` an interface face: tag it, together
/// with its edges and vertices, as a parallel boundary
fn tag_interface_face(msh: &mut TetMesh, i_elem: usize, i_face: usize) -> Result<()> {
    let xt = if let Some(xt) = msh.tetras[i_elem].xt {
        xt
    } else {
        let xt = append_blank_xtetra(msh)?;
        msh.tetras[i_elem].xt = Some(xt);
        xt
    };

    let pxt = &mut msh.xtetras[xt];
    pxt.face_refs[i_face] = 0;
    pxt.face_tags[i_face] |= TagFlags::PARALLEL_INTERFACE;
    for i_edge in FACE2EDGES[i_face] {
        pxt.edge_tags[i_edge] |= TagFlags::PARALLEL_INTERFACE;
    }
    for i in TETRA2FACES[i_face] {
        let i_vert = msh.tetras[i_elem].verts[i];
        msh.points[i_vert].tag |= TagFlags::PARALLEL_INTERFACE;
    }
    Ok(())
}

/// Check the freshly built sub-groups of a source group of `n_elems` elements
fn validate(groups: &[Group], n_elems: usize, full: bool) -> Result<()> {
    let n: usize = groups.iter().map(|g| g.mesh.n_elems()).sum();
    if n != n_elems {
        return Err(Error::Validation(format!(
            "{n} elements in the sub-groups, {n_elems} expected"
        )));
    }

    groups.par_iter().enumerate().try_for_each(|(i_group, g)| {
        let check = || -> Result<()> {
            g.node_comm.check(g.mesh.n_verts())?;
            g.face_comm.check(4 * n_elems)?;
            if let Some(f) = &g.field {
                if f.n_verts() != g.mesh.n_verts() {
                    return Err(Error::Validation(format!(
                        "field defined on {} vertices, {} expected",
                        f.n_verts(),
                        g.mesh.n_verts()
                    )));
                }
            }
            if full {
                g.mesh.check()?;
            }
            Ok(())
        };
        check().map_err(|e| Error::Validation(format!("group {i_group}: {e}")))
    })?;

    if full {
        check_communicators(groups)?;
    }
    Ok(())
}

impl ParMesh {
    /// Split the (single) group into sub-groups of at most
    /// `params().target_size` elements, using `partitioner` to assign the
    /// elements to the sub-groups.
    ///
    /// On success the group is replaced by the sub-groups; on failure it is
    /// left untouched.
    pub fn split_groups(&mut self, partitioner: &impl Partitioner) -> Result<SplitInfo> {
        let now = Instant::now();

        if self.groups.len() != 1 {
            return Err(Error::InvalidInput(format!(
                "a single group can be split, got {}",
                self.groups.len()
            )));
        }
        self.params.validate()?;

        let src = &self.groups[0];
        let n_elems = src.mesh.n_elems();
        let n_groups = group_count(n_elems, self.params.target_size)?;
        if n_groups == 1 {
            info!("{n_elems} elements: a single group is enough");
            return Ok(SplitInfo {
                partitioner: String::from(partitioner.name()),
                n_elems,
                n_groups,
                groups: vec![GroupInfo::new(src)],
                time: now.elapsed().as_secs_f64(),
                ..SplitInfo::default()
            });
        }
        info!("{n_elems} elements: split into {n_groups} groups");

        let footprint = src.mem_usage();
        if 2 * footprint > self.mem.available() {
            return Err(Error::InsufficientMemory {
                required: 2 * footprint,
                available: self.mem.available(),
            });
        }

        let parts = partition(partitioner, &src.mesh, n_groups)?;

        let mut counts = vec![0_usize; n_groups];
        for &i in &parts {
            counts[i] += 1;
        }
        if let Some(i) = counts.iter().position(|&n| n == 0) {
            warn!("group {i} is empty");
        }

        let mut builder = GroupBuilder::new(
            src,
            &parts,
            &self.params,
            self.n_node_slots,
            self.n_face_slots,
        );
        let groups = counts
            .iter()
            .enumerate()
            .map(|(i_group, &n)| builder.build(i_group, n))
            .collect::<Result<Vec<_>>>()?;

        validate(&groups, n_elems, self.params.check)?;

        let n_internal = (0..n_elems)
            .flat_map(|i| src.mesh.adja(i))
            .filter(|a| !a.is_none())
            .count();
        let n_interface_faces = builder.n_interface_faces / 2;
        let mut info = SplitInfo {
            partitioner: String::from(partitioner.name()),
            n_elems,
            n_groups,
            n_interface_faces,
            n_new_node_slots: builder.next_node_slot - self.n_node_slots,
            n_new_face_slots: builder.next_face_slot - self.n_face_slots,
            partition_quality: if n_internal > 0 {
                builder.n_interface_faces as f64 / n_internal as f64
            } else {
                0.0
            },
            partition_imbalance: partition_imbalance(&parts, n_groups),
            groups: groups.iter().map(GroupInfo::new).collect(),
            time: 0.0,
        };
        let (next_node_slot, next_face_slot) = (builder.next_node_slot, builder.next_face_slot);

        let old_mem = footprint;
        let new_mem: usize = groups.iter().map(Group::mem_usage).sum();
        self.groups = groups;
        self.n_node_slots = next_node_slot;
        self.n_face_slots = next_face_slot;
        self.mem.cur = self.mem.cur.saturating_sub(old_mem) + new_mem;

        info.time = now.elapsed().as_secs_f64();
        info!(
            "split done: {} groups, {n_interface_faces} interface faces, {:.2e} secs",
            info.n_groups, info.time
        );
        Ok(info)
    }
}
