//! Tetrahedral meshes stored as arrays of records linked by indices
mod boundary;
mod field;
pub mod test_meshes;

pub use boundary::{append_blank_xtetra, append_xpoint, append_xtetra};
pub use field::{FieldKind, SolField};

use crate::{buffer::DynArray, graph::CSRGraph, tags::TagFlags, Error, Result, Tag, Vert3d};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;

/// Local vertices of the faces of a tetrahedron (face `i` is opposite to vertex `i`)
pub const TETRA2FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// Local vertices of the edges of a tetrahedron
pub const TETRA2EDGES: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// Local edges of the faces of a tetrahedron
pub const FACE2EDGES: [[usize; 3]; 4] = [[5, 4, 3], [5, 1, 2], [4, 2, 0], [3, 0, 1]];

/// Mesh vertex
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub coords: Vert3d,
    pub reference: Tag,
    pub tag: TagFlags,
    /// Boundary vertex record, if any
    pub xp: Option<usize>,
    /// Next free slot (free slots only)
    pub(crate) next_free: Option<usize>,
}

impl Point {
    #[must_use]
    pub const fn new(coords: Vert3d) -> Self {
        Self {
            coords,
            reference: 0,
            tag: TagFlags::NONE,
            xp: None,
            next_free: None,
        }
    }

    fn free(next_free: Option<usize>) -> Self {
        Self {
            coords: Vert3d::zeros(),
            reference: 0,
            tag: TagFlags::NULL,
            xp: None,
            next_free,
        }
    }

    /// Check that the point is not a free slot
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.tag.contains(TagFlags::NULL)
    }
}

/// Tetrahedron
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tetra {
    pub verts: [usize; 4],
    pub reference: Tag,
    pub tag: TagFlags,
    /// Boundary element record, if any
    pub xt: Option<usize>,
}

impl Tetra {
    #[must_use]
    pub const fn new(verts: [usize; 4], reference: Tag) -> Self {
        Self {
            verts,
            reference,
            tag: TagFlags::NONE,
            xt: None,
        }
    }
}

/// Boundary data attached to a tetrahedron: references and tags of its faces and edges
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XTetra {
    pub face_refs: [Tag; 4],
    pub face_tags: [TagFlags; 4],
    pub edge_refs: [Tag; 6],
    pub edge_tags: [TagFlags; 6],
}

/// Boundary data attached to a vertex
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XPoint {
    /// Surface normal
    pub n1: Vert3d,
    /// Second normal (ridges)
    pub n2: Vert3d,
}

impl Default for XPoint {
    fn default() -> Self {
        Self {
            n1: Vert3d::zeros(),
            n2: Vert3d::zeros(),
        }
    }
}

/// Adjacency code of a tetrahedron face: `4 * (neighbor + 1) + neighbor_face`, 0 if
/// there is no neighbor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Adja(usize);

impl Adja {
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn new(i_elem: usize, i_face: usize) -> Self {
        Self(4 * (i_elem + 1) + i_face)
    }

    /// Neighbor element and its local face
    #[must_use]
    pub const fn get(self) -> Option<(usize, usize)> {
        if self.0 == 0 {
            None
        } else {
            Some((self.0 / 4 - 1, self.0 % 4))
        }
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

}

/// Encoded face id: `4 * elem + face`
#[must_use]
pub const fn face_id(i_elem: usize, i_face: usize) -> usize {
    4 * i_elem + i_face
}

/// Remeshing options, copied verbatim to every sub-group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemeshOptions {
    pub hmin: Option<f64>,
    pub hmax: Option<f64>,
    pub hausd: f64,
    pub hgrad: Option<f64>,
    /// Ridge detection angle (degrees), `None` disables the detection
    pub angle: Option<f64>,
    pub no_insert: bool,
    pub no_swap: bool,
    pub no_move: bool,
    pub verbosity: i32,
}

impl Default for RemeshOptions {
    fn default() -> Self {
        Self {
            hmin: None,
            hmax: None,
            hausd: 0.01,
            hgrad: Some(1.3),
            angle: Some(45.0),
            no_insert: false,
            no_swap: false,
            no_move: false,
            verbosity: 1,
        }
    }
}

/// Global mesh metadata: file name hints and remeshing options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshInfo {
    pub mesh_in: String,
    pub mesh_out: String,
    pub sol_in: String,
    pub sol_out: String,
    pub options: RemeshOptions,
}

/// Tetrahedral mesh
///
/// Vertices are stored in `points[..n_verts()]`; the remaining allocated slots
/// are free and linked together so that new vertices can be created without
/// reallocation. Elements, adjacencies and boundary records are stored in
/// separate arrays and linked through indices.
#[derive(Clone, Debug)]
pub struct TetMesh {
    pub info: MeshInfo,
    pub(crate) points: DynArray<Point>,
    pub(crate) np: usize,
    pub(crate) np_nil: Option<usize>,
    pub(crate) tetras: DynArray<Tetra>,
    pub(crate) adja: DynArray<[Adja; 4]>,
    pub(crate) xtetras: DynArray<XTetra>,
    pub(crate) xpoints: DynArray<XPoint>,
}

impl TetMesh {
    /// Create an empty mesh with the given initial capacities
    pub fn with_capacity(
        info: MeshInfo,
        n_verts: usize,
        n_elems: usize,
        n_xtetras: usize,
        n_xpoints: usize,
        growth: f64,
    ) -> Result<Self> {
        Ok(Self {
            info,
            points: DynArray::with_capacity("points", n_verts)?.with_growth(growth),
            np: 0,
            np_nil: None,
            tetras: DynArray::with_capacity("tetras", n_elems)?.with_growth(growth),
            adja: DynArray::with_capacity("adjacency", n_elems)?.with_growth(growth),
            xtetras: DynArray::with_capacity("boundary tetras", n_xtetras)?.with_growth(growth),
            xpoints: DynArray::with_capacity("boundary points", n_xpoints)?.with_growth(growth),
        })
    }

    /// Create a mesh from its vertices and elements and compute the adjacency
    pub fn new(verts: &[Vert3d], elems: &[[usize; 4]], etags: &[Tag]) -> Result<Self> {
        if elems.len() != etags.len() {
            return Err(Error::InvalidInput(format!(
                "{} elements but {} element tags",
                elems.len(),
                etags.len()
            )));
        }
        if let Some(e) = elems.iter().find(|e| e.iter().any(|&i| i >= verts.len())) {
            return Err(Error::InvalidInput(format!(
                "element {e:?} references a vertex out of range ({} vertices)",
                verts.len()
            )));
        }

        let mut res = Self::with_capacity(
            MeshInfo::default(),
            verts.len(),
            elems.len(),
            0,
            0,
            crate::buffer::DEFAULT_GROWTH,
        )?;
        for &p in verts {
            res.points.push(Point::new(p))?;
        }
        res.np = verts.len();
        for (&e, &t) in elems.iter().zip(etags) {
            res.tetras.push(Tetra::new(e, t))?;
        }
        res.compute_adjacency()?;
        Ok(res)
    }

    /// Number of vertices
    #[must_use]
    pub const fn n_verts(&self) -> usize {
        self.np
    }

    /// Number of allocated vertex slots (used and free)
    #[must_use]
    pub fn n_vert_slots(&self) -> usize {
        self.points.len()
    }

    /// Number of elements
    #[must_use]
    pub fn n_elems(&self) -> usize {
        self.tetras.len()
    }

    /// Number of boundary element records
    #[must_use]
    pub fn n_xtetras(&self) -> usize {
        self.xtetras.len()
    }

    /// Number of boundary vertex records
    #[must_use]
    pub fn n_xpoints(&self) -> usize {
        self.xpoints.len()
    }

    #[must_use]
    pub fn point(&self, i: usize) -> &Point {
        &self.points[i]
    }

    /// Iterator over the vertices (free slots below `n_verts()` included)
    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point> + '_ {
        self.points[..self.np].iter()
    }

    #[must_use]
    pub fn vert(&self, i: usize) -> Vert3d {
        self.points[i].coords
    }

    #[must_use]
    pub fn tetra(&self, i: usize) -> &Tetra {
        &self.tetras[i]
    }

    pub fn tetra_mut(&mut self, i: usize) -> &mut Tetra {
        &mut self.tetras[i]
    }

    pub fn tetras(&self) -> impl ExactSizeIterator<Item = &Tetra> + '_ {
        self.tetras.iter()
    }

    #[must_use]
    pub fn elem(&self, i: usize) -> [usize; 4] {
        self.tetras[i].verts
    }

    #[must_use]
    pub fn adja(&self, i: usize) -> [Adja; 4] {
        self.adja[i]
    }

    pub fn set_adja(&mut self, i_elem: usize, i_face: usize, a: Adja) {
        self.adja[i_elem][i_face] = a;
    }

    #[must_use]
    pub fn xtetra(&self, i: usize) -> &XTetra {
        &self.xtetras[i]
    }

    pub fn xtetra_mut(&mut self, i: usize) -> &mut XTetra {
        &mut self.xtetras[i]
    }

    #[must_use]
    pub fn xpoint(&self, i: usize) -> &XPoint {
        &self.xpoints[i]
    }

    /// Boundary record of an element, if any
    #[must_use]
    pub fn elem_xtetra(&self, i_elem: usize) -> Option<&XTetra> {
        self.tetras[i_elem].xt.map(|xt| &self.xtetras[xt])
    }

    /// Vertices of a face of an element
    #[must_use]
    pub fn face(&self, i_elem: usize, i_face: usize) -> [usize; 3] {
        let e = &self.tetras[i_elem].verts;
        TETRA2FACES[i_face].map(|i| e[i])
    }

    /// Vertices of an edge of an element
    #[must_use]
    pub fn edge(&self, i_elem: usize, i_edge: usize) -> [usize; 2] {
        let e = &self.tetras[i_elem].verts;
        TETRA2EDGES[i_edge].map(|i| e[i])
    }

    /// Element centers
    pub fn elem_centers(&self) -> impl ExactSizeIterator<Item = Vert3d> + Clone + '_ {
        self.tetras.iter().map(|t| {
            t.verts
                .iter()
                .fold(Vert3d::zeros(), |a, &i| a + self.points[i].coords)
                / 4.0
        })
    }

    /// Compute the element-to-element adjacency through faces
    pub fn compute_adjacency(&mut self) -> Result<()> {
        let n_elems = self.n_elems();
        self.adja.truncate(0);
        self.adja.resize(n_elems, [Adja::NONE; 4])?;

        let mut faces = FxHashMap::<[usize; 3], (usize, usize)>::default();
        let mut paired = FxHashSet::<[usize; 3]>::default();
        for i_elem in 0..n_elems {
            for i_face in 0..4 {
                let mut f = self.face(i_elem, i_face);
                f.sort_unstable();
                match faces.entry(f) {
                    Entry::Vacant(e) => {
                        if paired.contains(&f) {
                            return Err(Error::InvalidInput(format!(
                                "non manifold face {f:?}"
                            )));
                        }
                        e.insert((i_elem, i_face));
                    }
                    Entry::Occupied(e) => {
                        let (j_elem, j_face) = e.remove();
                        self.adja[i_elem][i_face] = Adja::new(j_elem, j_face);
                        self.adja[j_elem][j_face] = Adja::new(i_elem, i_face);
                        paired.insert(f);
                    }
                }
            }
        }
        debug!(
            "adjacency: {} internal faces, {} boundary faces",
            paired.len(),
            faces.len()
        );
        Ok(())
    }

    /// Element-to-element graph; fails if an adjacency code refers to an
    /// element that does not exist
    pub fn elem_graph(&self) -> Result<CSRGraph> {
        let n_elems = self.n_elems();
        let mut edgs = Vec::with_capacity(2 * n_elems);
        for (i_elem, a) in self.adja.iter().enumerate() {
            for (i_face, j_elem) in a
                .iter()
                .enumerate()
                .filter_map(|(i_face, a)| a.get().map(|(j_elem, _)| (i_face, j_elem)))
            {
                if j_elem >= n_elems {
                    return Err(Error::InvalidInput(format!(
                        "face {i_face} of element {i_elem}: neighbor {j_elem} out of range ({n_elems} elements)"
                    )));
                }
                if j_elem > i_elem {
                    edgs.push([i_elem, j_elem]);
                }
            }
        }
        Ok(CSRGraph::from_edges(n_elems, &edgs))
    }

    /// Tag the faces without neighbor as boundary faces: a boundary record is
    /// created for every element and vertex on the boundary. Return the number
    /// of boundary faces.
    pub fn tag_boundary(&mut self, face_ref: Tag) -> Result<usize> {
        let mut n = 0;
        for i_elem in 0..self.n_elems() {
            for i_face in 0..4 {
                if !self.adja[i_elem][i_face].is_none() {
                    continue;
                }
                n += 1;
                let xt = match self.tetras[i_elem].xt {
                    Some(xt) => xt,
                    None => {
                        let xt = append_blank_xtetra(self)?;
                        self.tetras[i_elem].xt = Some(xt);
                        xt
                    }
                };
                let pxt = &mut self.xtetras[xt];
                pxt.face_refs[i_face] = face_ref;
                pxt.face_tags[i_face] |= TagFlags::BOUNDARY;
                for i_edge in FACE2EDGES[i_face] {
                    pxt.edge_tags[i_edge] |= TagFlags::BOUNDARY;
                }

                let f = self.face(i_elem, i_face);
                let [p0, p1, p2] = f.map(|i| self.points[i].coords);
                let n1 = (p1 - p0).cross(&(p2 - p0)).normalize();
                for i_vert in f {
                    self.points[i_vert].tag |= TagFlags::BOUNDARY;
                    if self.points[i_vert].xp.is_none() {
                        let xp = self.xpoints.push(XPoint {
                            n1,
                            ..XPoint::default()
                        })?;
                        self.points[i_vert].xp = Some(xp);
                    }
                }
            }
        }
        Ok(n)
    }

    /// Mark the allocated vertex slots after `n_verts()` as free and link them
    pub fn link_free_slots(&mut self) {
        self.points.truncate(self.np);
        let n_slots = self.points.capacity();
        self.points.fill_capacity(|i| {
            Point::free(if i + 1 < n_slots { Some(i + 1) } else { None })
        });
        self.np_nil = if self.np < n_slots { Some(self.np) } else { None };
    }

    /// Create a new vertex, using a free slot if available
    pub fn new_point(&mut self, coords: Vert3d) -> Result<usize> {
        let ip = if let Some(ip) = self.np_nil {
            self.np_nil = self.points[ip].next_free;
            self.points[ip] = Point::new(coords);
            ip
        } else {
            self.points.push(Point::new(coords))?
        };
        if ip >= self.np {
            self.np = ip + 1;
        }
        Ok(ip)
    }

    /// Delete a vertex, its slot is added to the free list
    pub fn del_point(&mut self, ip: usize) -> Result<()> {
        if ip >= self.np || !self.points[ip].is_valid() {
            return Err(Error::InvalidInput(format!("vertex {ip} is not in use")));
        }
        self.points[ip] = Point::free(self.np_nil);
        self.np_nil = Some(ip);
        while self.np > 0 && !self.points[self.np - 1].is_valid() {
            self.np -= 1;
        }
        Ok(())
    }

    /// Size in bytes of the allocated memory
    #[must_use]
    pub fn mem_usage(&self) -> usize {
        self.points.mem_usage()
            + self.tetras.mem_usage()
            + self.adja.mem_usage()
            + self.xtetras.mem_usage()
            + self.xpoints.mem_usage()
    }

    /// Check the mesh consistency: vertex indices, adjacency reciprocity and
    /// boundary record bindings
    pub fn check(&self) -> Result<()> {
        let n_elems = self.n_elems();
        if self.adja.len() != n_elems {
            return Err(Error::Validation(format!(
                "{} adjacency entries for {n_elems} elements",
                self.adja.len()
            )));
        }

        let mut xt_owner = vec![usize::MAX; self.n_xtetras()];
        for (i_elem, t) in self.tetras.iter().enumerate() {
            if let Some(&i) = t
                .verts
                .iter()
                .find(|&&i| i >= self.np || !self.points[i].is_valid())
            {
                return Err(Error::Validation(format!(
                    "element {i_elem} references an invalid vertex {i}"
                )));
            }
            if let Some(xt) = t.xt {
                if xt >= self.n_xtetras() {
                    return Err(Error::Validation(format!(
                        "element {i_elem} references a boundary record out of range {xt}"
                    )));
                }
                if xt_owner[xt] != usize::MAX {
                    return Err(Error::Validation(format!(
                        "boundary record {xt} bound to elements {} and {i_elem}",
                        xt_owner[xt]
                    )));
                }
                xt_owner[xt] = i_elem;
            }
            for (i_face, a) in self.adja[i_elem].iter().enumerate() {
                let Some((j_elem, j_face)) = a.get() else {
                    continue;
                };
                if j_elem >= n_elems {
                    return Err(Error::Validation(format!(
                        "element {i_elem}, face {i_face}: neighbor {j_elem} out of range"
                    )));
                }
                if self.adja[j_elem][j_face] != Adja::new(i_elem, i_face) {
                    return Err(Error::Validation(format!(
                        "element {i_elem}, face {i_face}: adjacency with ({j_elem}, {j_face}) is not reciprocal"
                    )));
                }
                let mut f0 = self.face(i_elem, i_face);
                f0.sort_unstable();
                let mut f1 = self.face(j_elem, j_face);
                f1.sort_unstable();
                if f0 != f1 {
                    return Err(Error::Validation(format!(
                        "element {i_elem}, face {i_face}: face {f0:?} differs from neighbor face {f1:?}"
                    )));
                }
            }
        }

        let mut xp_owner = vec![usize::MAX; self.n_xpoints()];
        for (i_vert, p) in self.points().enumerate() {
            if !p.is_valid() {
                continue;
            }
            if let Some(xp) = p.xp {
                if xp >= self.n_xpoints() || xp_owner[xp] != usize::MAX {
                    return Err(Error::Validation(format!(
                        "vertex {i_vert}: invalid boundary record {xp}"
                    )));
                }
                xp_owner[xp] = i_vert;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{test_meshes::box_mesh, Adja, TetMesh, FACE2EDGES, TETRA2EDGES, TETRA2FACES};
    use crate::{tags::TagFlags, Error, Result, Vert3d};

    #[test]
    fn test_local_numbering() {
        for (i_face, f) in TETRA2FACES.iter().enumerate() {
            assert!(!f.contains(&i_face));
            for i_edge in FACE2EDGES[i_face] {
                let e = TETRA2EDGES[i_edge];
                assert!(f.contains(&e[0]) && f.contains(&e[1]));
            }
        }
    }

    #[test]
    fn test_adja_code() {
        assert_eq!(Adja::NONE.get(), None);
        let a = Adja::new(0, 3);
        assert_eq!(a.get(), Some((0, 3)));
        assert_eq!(Adja::new(12, 1).get(), Some((12, 1)));
    }

    #[test]
    fn test_box_adjacency() -> Result<()> {
        let msh = box_mesh(1.0, 3, 1.0, 3, 1.0, 3)?;
        assert_eq!(msh.n_verts(), 27);
        assert_eq!(msh.n_elems(), 48);
        msh.check()?;

        let n_bdy = msh
            .adja
            .iter()
            .flatten()
            .filter(|a| a.is_none())
            .count();
        // 6 sides, 4 quads per side, 2 triangles per quad
        assert_eq!(n_bdy, 48);

        let g = msh.elem_graph()?;
        assert_eq!(g.n(), 48);
        assert_eq!(g.n_edges(), 4 * 48 - 48);
        assert!(g.rows().all(|r| !r.is_empty()));
        Ok(())
    }

    #[test]
    fn test_elem_graph_invalid() -> Result<()> {
        let mut msh = box_mesh(1.0, 3, 1.0, 3, 1.0, 3)?;
        msh.set_adja(5, 2, Adja::new(48, 0));
        assert!(matches!(msh.elem_graph(), Err(Error::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_tag_boundary() -> Result<()> {
        let mut msh = box_mesh(1.0, 3, 1.0, 3, 1.0, 3)?;
        let n = msh.tag_boundary(2)?;
        assert_eq!(n, 48);
        // all the vertices but the center one
        assert_eq!(msh.n_xpoints(), 26);
        assert!(!msh.point(13).tag.contains(TagFlags::BOUNDARY));
        for t in msh.tetras() {
            if let Some(xt) = t.xt {
                let pxt = msh.xtetra(xt);
                assert!(pxt.face_tags.iter().any(|t| t.contains(TagFlags::BOUNDARY)));
            }
        }
        for p in msh.points() {
            if let Some(xp) = p.xp {
                crate::assert_delta!(msh.xpoint(xp).n1.norm(), 1.0, 1e-12);
            }
        }
        msh.check()
    }

    #[test]
    fn test_non_manifold() {
        let verts = [
            Vert3d::new(0., 0., 0.),
            Vert3d::new(1., 0., 0.),
            Vert3d::new(0., 1., 0.),
            Vert3d::new(0., 0., 1.),
            Vert3d::new(0., 0., -1.),
            Vert3d::new(1., 1., 1.),
        ];
        let elems = [[0, 1, 2, 3], [0, 2, 1, 4], [0, 1, 2, 5]];
        let res = TetMesh::new(&verts, &elems, &[1, 1, 1]);
        assert!(matches!(res, Err(Error::InvalidInput(_))));

        let res = TetMesh::new(&verts, &[[0, 1, 2, 6]], &[1]);
        assert!(matches!(res, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_free_slots() -> Result<()> {
        let mut msh = box_mesh(1.0, 2, 1.0, 2, 1.0, 2)?;
        msh.points.reserve_exact(4)?;
        msh.link_free_slots();
        assert_eq!(msh.n_verts(), 8);
        assert!(msh.n_vert_slots() >= 12);
        assert!(!msh.point(8).is_valid());

        let ip = msh.new_point(Vert3d::new(0.5, 0.5, 0.5))?;
        assert_eq!(ip, 8);
        assert_eq!(msh.n_verts(), 9);

        msh.del_point(ip)?;
        assert_eq!(msh.n_verts(), 8);
        assert!(msh.del_point(ip).is_err());
        let ip = msh.new_point(Vert3d::new(0.5, 0.5, 0.5))?;
        assert_eq!(ip, 8);

        // exhaust the free slots, then grow
        let n = msh.n_vert_slots();
        for _ in msh.n_verts()..n + 2 {
            msh.new_point(Vert3d::zeros())?;
        }
        assert_eq!(msh.n_verts(), n + 2);
        msh.check()
    }

    #[test]
    fn test_broken_adjacency() -> Result<()> {
        let mut msh = box_mesh(1.0, 2, 1.0, 2, 1.0, 2)?;
        let (i_face, a) = msh
            .adja(0)
            .iter()
            .copied()
            .enumerate()
            .find(|(_, a)| !a.is_none())
            .unwrap();
        let (j_elem, j_face) = a.get().unwrap();
        msh.set_adja(j_elem, j_face, Adja::NONE);
        assert!(matches!(msh.check(), Err(Error::Validation(_))));
        msh.set_adja(j_elem, j_face, Adja::new(0, i_face));
        msh.check()
    }
}
