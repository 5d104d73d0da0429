use super::{TetMesh, XTetra, TETRA2EDGES};
use crate::{tags::TagFlags, Result};
use rustc_hash::FxHashMap;

/// Copy the boundary element record `xt` of `src` at the end of the records of
/// `dst` and return its index in `dst`
pub fn append_xtetra(dst: &mut TetMesh, src: &TetMesh, xt: usize) -> Result<usize> {
    dst.xtetras.push(src.xtetras[xt])
}

/// Append an empty boundary element record to `dst` and return its index
pub fn append_blank_xtetra(dst: &mut TetMesh) -> Result<usize> {
    dst.xtetras.push(XTetra::default())
}

/// Copy the boundary vertex record `xp` of `src` at the end of the records of
/// `dst` and return its index in `dst`
pub fn append_xpoint(dst: &mut TetMesh, src: &TetMesh, xp: usize) -> Result<usize> {
    dst.xpoints.push(src.xpoints[xp])
}

impl TetMesh {
    /// Report the `PARALLEL_BOUNDARY` edge tags (and the associated references)
    /// to all the boundary records sharing the edge.
    ///
    /// An edge may be tagged from a single element of its shell when the
    /// interface faces are created, the other records of the shell must get the
    /// tag as well. Return the number of updated records.
    pub fn sync_parallel_edges(&mut self) -> usize {
        let mut shells = FxHashMap::<[usize; 2], Vec<(usize, usize)>>::default();
        for t in &*self.tetras {
            let Some(xt) = t.xt else {
                continue;
            };
            for (i_edge, e) in TETRA2EDGES.iter().enumerate() {
                let mut edg = [t.verts[e[0]], t.verts[e[1]]];
                edg.sort_unstable();
                shells.entry(edg).or_default().push((xt, i_edge));
            }
        }

        let mut n_updated = 0;
        for shell in shells.values() {
            let Some(&(xt, i_edge)) = shell.iter().find(|&&(xt, i_edge)| {
                self.xtetras[xt].edge_tags[i_edge].contains(TagFlags::PARALLEL_BOUNDARY)
            }) else {
                continue;
            };
            let tag = self.xtetras[xt].edge_tags[i_edge];
            let edge_ref = self.xtetras[xt].edge_refs[i_edge];
            for &(other_xt, other_edge) in shell {
                let pxt = &mut self.xtetras[other_xt];
                if !pxt.edge_tags[other_edge].contains(TagFlags::PARALLEL_BOUNDARY) {
                    pxt.edge_tags[other_edge] |= tag;
                    pxt.edge_refs[other_edge] = edge_ref;
                    n_updated += 1;
                }
            }
        }
        n_updated
    }
}

#[cfg(test)]
mod tests {
    use super::{append_blank_xtetra, append_xpoint, append_xtetra};
    use crate::{
        mesh::{test_meshes::box_mesh, TetMesh, XPoint, FACE2EDGES},
        tags::TagFlags,
        Result, Vert3d,
    };

    #[test]
    fn test_append() -> Result<()> {
        let mut src = box_mesh(1.0, 2, 1.0, 2, 1.0, 2)?;
        src.tag_boundary(3)?;
        let mut dst = TetMesh::with_capacity(src.info.clone(), 0, 0, 0, 0, 2.0)?;

        for i in 0..5 {
            let xt = src.tetra(i).xt.unwrap();
            assert_eq!(append_xtetra(&mut dst, &src, xt)?, i);
            assert_eq!(dst.xtetra(i), src.xtetra(xt));
        }
        assert_eq!(dst.n_xtetras(), 5);
        assert_eq!(append_blank_xtetra(&mut dst)?, 5);
        assert!(dst.xtetra(5).face_tags.iter().all(|t| t.is_empty()));

        src.xpoints.push(XPoint {
            n1: Vert3d::new(1.0, 0.0, 0.0),
            n2: Vert3d::new(0.0, 1.0, 0.0),
        })?;
        let xp = src.n_xpoints() - 1;
        assert_eq!(append_xpoint(&mut dst, &src, xp)?, 0);
        assert_eq!(dst.xpoint(0), src.xpoint(xp));
        Ok(())
    }

    #[test]
    fn test_sync_parallel_edges() -> Result<()> {
        let mut msh = box_mesh(1.0, 2, 1.0, 2, 1.0, 2)?;
        // all the 6 elements share the main diagonal
        for i_elem in 0..msh.n_elems() {
            let xt = append_blank_xtetra(&mut msh)?;
            msh.tetra_mut(i_elem).xt = Some(xt);
        }

        let i_face = (0..4)
            .find(|&i| msh.adja(0)[i].is_none())
            .unwrap();
        let pxt = msh.xtetra_mut(0);
        for i_edge in FACE2EDGES[i_face] {
            pxt.edge_tags[i_edge] |= TagFlags::PARALLEL_INTERFACE;
            pxt.edge_refs[i_edge] = 7;
        }

        let n = msh.sync_parallel_edges();
        assert!(n > 0);

        for (i_elem, t) in msh.tetras().enumerate() {
            let pxt = msh.xtetra(t.xt.unwrap());
            for i_edge in 0..6 {
                let mut e = msh.edge(i_elem, i_edge);
                e.sort_unstable();
                let on_face = FACE2EDGES[i_face].iter().any(|&j| {
                    let mut f = msh.edge(0, j);
                    f.sort_unstable();
                    f == e
                });
                assert_eq!(
                    pxt.edge_tags[i_edge].contains(TagFlags::PARALLEL_INTERFACE),
                    on_face
                );
                if on_face {
                    assert_eq!(pxt.edge_refs[i_edge], 7);
                }
            }
        }

        assert_eq!(msh.sync_parallel_edges(), 0);
        Ok(())
    }
}
