//! Groups (local mesh partitions with their interface communicators) and the
//! collection of groups owned by a process
use crate::{
    comm::InterfaceComm,
    mesh::{SolField, TetMesh},
    split::SplitParams,
    Error, Result,
};
use log::debug;
use rustc_hash::FxHashMap;

/// A local mesh partition: a mesh, an optional field defined at its vertices
/// and the tables mapping its interface vertices and faces to interface slots
#[derive(Clone, Debug)]
pub struct Group {
    pub(crate) mesh: TetMesh,
    pub(crate) field: Option<SolField>,
    pub(crate) node_comm: InterfaceComm,
    pub(crate) face_comm: InterfaceComm,
}

impl Group {
    /// Create a group without interfaces
    pub fn new(mesh: TetMesh, field: Option<SolField>) -> Result<Self> {
        if let Some(f) = &field {
            if f.n_verts() != mesh.n_verts() {
                return Err(Error::InvalidInput(format!(
                    "field defined on {} vertices, mesh has {}",
                    f.n_verts(),
                    mesh.n_verts()
                )));
            }
        }
        Ok(Self {
            mesh,
            field,
            node_comm: InterfaceComm::default(),
            face_comm: InterfaceComm::default(),
        })
    }

    /// Set the interface tables: `node_comm` maps vertex ids to node slots and
    /// `face_comm` maps encoded face ids (`4 * elem + face`) to face slots
    pub fn with_comms(mut self, node_comm: InterfaceComm, face_comm: InterfaceComm) -> Result<Self> {
        node_comm.check(self.mesh.n_verts())?;
        face_comm.check(4 * self.mesh.n_elems())?;
        self.node_comm = node_comm;
        self.face_comm = face_comm;
        Ok(self)
    }

    #[must_use]
    pub const fn mesh(&self) -> &TetMesh {
        &self.mesh
    }

    #[must_use]
    pub const fn field(&self) -> Option<&SolField> {
        self.field.as_ref()
    }

    #[must_use]
    pub const fn node_comm(&self) -> &InterfaceComm {
        &self.node_comm
    }

    #[must_use]
    pub const fn face_comm(&self) -> &InterfaceComm {
        &self.face_comm
    }

    /// Size in bytes of the allocated memory
    #[must_use]
    pub fn mem_usage(&self) -> usize {
        self.mesh.mem_usage()
            + self.field.as_ref().map_or(0, SolField::mem_usage)
            + self.node_comm.mem_usage()
            + self.face_comm.mem_usage()
    }
}

/// Memory accounting of a process, in bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryBudget {
    /// Memory currently used
    pub cur: usize,
    /// Ceiling
    pub max: usize,
}

impl MemoryBudget {
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self { cur: 0, max }
    }

    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    #[must_use]
    pub const fn available(&self) -> usize {
        self.max.saturating_sub(self.cur)
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Groups owned by a process
#[derive(Debug)]
pub struct ParMesh {
    pub(crate) groups: Vec<Group>,
    /// Number of node interface slots already used
    pub(crate) n_node_slots: usize,
    /// Number of face interface slots already used
    pub(crate) n_face_slots: usize,
    pub(crate) mem: MemoryBudget,
    pub(crate) params: SplitParams,
}

impl ParMesh {
    /// Create a `ParMesh` holding a single group; the slot counters start
    /// after the largest slots used by its communicators
    #[must_use]
    pub fn new(group: Group, params: SplitParams) -> Self {
        let n_node_slots = group.node_comm.max_slot().map_or(0, |s| s + 1);
        let n_face_slots = group.face_comm.max_slot().map_or(0, |s| s + 1);
        let mem = MemoryBudget {
            cur: group.mem_usage(),
            max: usize::MAX,
        };
        debug!(
            "new ParMesh: {} elements, {} bytes",
            group.mesh.n_elems(),
            mem.cur
        );
        Self {
            groups: vec![group],
            n_node_slots,
            n_face_slots,
            mem,
            params,
        }
    }

    /// Set the memory ceiling
    #[must_use]
    pub const fn with_memory_limit(mut self, max: usize) -> Self {
        self.mem.max = max;
        self
    }

    /// Set the sizes of the interface slot namespaces, when they are known to
    /// be larger than the slots used locally
    #[must_use]
    pub fn with_slot_counts(mut self, n_node_slots: usize, n_face_slots: usize) -> Self {
        self.n_node_slots = self.n_node_slots.max(n_node_slots);
        self.n_face_slots = self.n_face_slots.max(n_face_slots);
        self
    }

    #[must_use]
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn group(&self, i: usize) -> &Group {
        &self.groups[i]
    }

    pub fn groups(&self) -> impl ExactSizeIterator<Item = &Group> + '_ {
        self.groups.iter()
    }

    #[must_use]
    pub const fn n_node_slots(&self) -> usize {
        self.n_node_slots
    }

    #[must_use]
    pub const fn n_face_slots(&self) -> usize {
        self.n_face_slots
    }

    #[must_use]
    pub const fn memory(&self) -> MemoryBudget {
        self.mem
    }

    #[must_use]
    pub const fn params(&self) -> &SplitParams {
        &self.params
    }

    /// Check the consistency of the node communicators between the groups:
    /// all the vertices sharing a slot must be at the same location
    pub fn check_communicators(&self) -> Result<()> {
        check_communicators(&self.groups)
    }
}

/// Check that the vertices sharing a node slot have the same coordinates in
/// all the groups
pub(crate) fn check_communicators(groups: &[Group]) -> Result<()> {
    let mut coords = FxHashMap::default();
    for (i_group, g) in groups.iter().enumerate() {
        g.node_comm.check(g.mesh.n_verts())?;
        for (i_vert, slot) in g.node_comm.iter() {
            let p = g.mesh.vert(i_vert);
            let (j_group, q) = *coords.entry(slot).or_insert((i_group, p));
            if (p - q).norm() > 1e-12 * (1.0 + q.norm()) {
                return Err(Error::Validation(format!(
                    "node slot {slot}: vertex {p:?} in group {i_group} differs from {q:?} in group {j_group}"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Group, MemoryBudget, ParMesh};
    use crate::{
        comm::InterfaceComm,
        mesh::{test_meshes::box_mesh, FieldKind, SolField},
        split::SplitParams,
        Error, Result,
    };

    #[test]
    fn test_group() -> Result<()> {
        let msh = box_mesh(1.0, 3, 1.0, 3, 1.0, 3)?;
        let field = SolField::new(FieldKind::Scalar, &[0.0; 27])?;
        let g = Group::new(msh.clone(), Some(field))?;
        assert!(g.mem_usage() > msh.mem_usage());

        let field = SolField::new(FieldKind::Scalar, &[0.0; 26])?;
        assert!(matches!(
            Group::new(msh.clone(), Some(field)),
            Err(Error::InvalidInput(_))
        ));

        let node_comm = InterfaceComm::from_pairs(&[(0, 4), (27, 5)])?;
        let res = Group::new(msh, None)?.with_comms(node_comm, InterfaceComm::default());
        assert!(matches!(res, Err(Error::Validation(_))));
        Ok(())
    }

    #[test]
    fn test_parmesh() -> Result<()> {
        let msh = box_mesh(1.0, 3, 1.0, 3, 1.0, 3)?;
        let node_comm = InterfaceComm::from_pairs(&[(0, 4), (2, 11)])?;
        let face_comm = InterfaceComm::from_pairs(&[(1, 3)])?;
        let g = Group::new(msh, None)?.with_comms(node_comm, face_comm)?;
        let mem = g.mem_usage();

        let pmsh = ParMesh::new(g, SplitParams::default()).with_memory_limit(10 * mem);
        assert_eq!(pmsh.n_groups(), 1);
        assert_eq!(pmsh.n_node_slots(), 12);
        assert_eq!(pmsh.n_face_slots(), 4);
        assert_eq!(
            pmsh.memory(),
            MemoryBudget {
                cur: mem,
                max: 10 * mem
            }
        );
        assert_eq!(pmsh.memory().available(), 9 * mem);
        pmsh.check_communicators()?;

        let pmsh = pmsh.with_slot_counts(100, 0);
        assert_eq!(pmsh.n_node_slots(), 100);
        assert_eq!(pmsh.n_face_slots(), 4);
        Ok(())
    }
}
