//! Simple meshes used in the tests and demos
use super::TetMesh;
use crate::{Error, Result, Vert3d};

/// Build a structured mesh of the box `[0, lx] x [0, ly] x [0, lz]` with
/// `nx x ny x nz` vertices; each hexahedron is split into 6 tetrahedra sharing
/// its main diagonal. Vertex `(i, j, k)` has index `i + j * nx + k * nx * ny`.
/// At least 2 vertices are required in every direction.
pub fn box_mesh(lx: f64, nx: usize, ly: f64, ny: usize, lz: f64, nz: usize) -> Result<TetMesh> {
    if nx < 2 || ny < 2 || nz < 2 {
        return Err(Error::InvalidInput(format!(
            "box mesh needs at least 2 vertices per direction, got {nx} x {ny} x {nz}"
        )));
    }
    let dx = lx / (nx - 1) as f64;
    let dy = ly / (ny - 1) as f64;
    let dz = lz / (nz - 1) as f64;

    let idx = |i: usize, j: usize, k: usize| i + j * nx + k * nx * ny;

    let mut verts = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                verts.push(Vert3d::new(
                    i as f64 * dx,
                    j as f64 * dy,
                    k as f64 * dz,
                ));
            }
        }
    }

    // paths from (0, 0, 0) to (1, 1, 1) along the edges of the unit cube
    let axes = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut elems = Vec::with_capacity(6 * (nx - 1) * (ny - 1) * (nz - 1));
    for k in 0..nz - 1 {
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                for path in &axes {
                    let mut ijk = [i, j, k];
                    let mut e = [0; 4];
                    e[0] = idx(ijk[0], ijk[1], ijk[2]);
                    for (l, &axis) in path.iter().enumerate() {
                        ijk[axis] += 1;
                        e[l + 1] = idx(ijk[0], ijk[1], ijk[2]);
                    }
                    if signed_volume(&verts, &e) < 0.0 {
                        e.swap(2, 3);
                    }
                    elems.push(e);
                }
            }
        }
    }

    let etags = vec![1; elems.len()];
    TetMesh::new(&verts, &elems, &etags)
}

fn signed_volume(verts: &[Vert3d], e: &[usize; 4]) -> f64 {
    let p0 = verts[e[0]];
    (verts[e[1]] - p0)
        .cross(&(verts[e[2]] - p0))
        .dot(&(verts[e[3]] - p0))
}

/// Build disconnected strips of tetrahedra: strip `i` holds `lengths[i]`
/// elements, two consecutive elements of a strip share a face and elements of
/// different strips share nothing. Elements are numbered strip after strip.
///
/// The vertices lie on the moment curve `(t, t^2, t^3)`, so that any 4 of them
/// form a valid tetrahedron.
pub fn tet_strips(lengths: &[usize]) -> Result<TetMesh> {
    let mut verts = Vec::new();
    let mut elems = Vec::new();
    for &n in lengths {
        let first = verts.len();
        for i in 0..n + 3 {
            let t = 1.0 + 0.1 * (first + i) as f64;
            verts.push(Vert3d::new(t, t * t, t * t * t));
        }
        for i in 0..n {
            let b = first + i;
            elems.push([b, b + 1, b + 2, b + 3]);
        }
    }

    let etags = vec![1; elems.len()];
    TetMesh::new(&verts, &elems, &etags)
}

#[cfg(test)]
mod tests {
    use super::{box_mesh, tet_strips};
    use crate::{Error, Result};

    #[test]
    fn test_box() -> Result<()> {
        let msh = box_mesh(2.0, 3, 1.0, 2, 1.0, 4)?;
        assert_eq!(msh.n_verts(), 24);
        assert_eq!(msh.n_elems(), 2 * 3 * 6);
        let vol = (0..msh.n_elems())
            .map(|i| {
                let e = msh.elem(i);
                let p0 = msh.vert(e[0]);
                (msh.vert(e[1]) - p0)
                    .cross(&(msh.vert(e[2]) - p0))
                    .dot(&(msh.vert(e[3]) - p0))
                    / 6.0
            })
            .inspect(|&v| assert!(v > 0.0))
            .sum::<f64>();
        crate::assert_delta!(vol, 2.0, 1e-12);
        msh.check()
    }

    #[test]
    fn test_box_too_small() {
        assert!(matches!(
            box_mesh(1.0, 1, 1.0, 3, 1.0, 3),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            box_mesh(1.0, 3, 1.0, 3, 1.0, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_strips() -> Result<()> {
        let msh = tet_strips(&[10, 2])?;
        assert_eq!(msh.n_elems(), 12);
        assert_eq!(msh.n_verts(), 13 + 5);
        let g = msh.elem_graph()?;
        assert!(g.rows().take(10).flatten().all(|&j| j < 10));
        assert!(g.rows().skip(10).flatten().all(|&j| j >= 10));
        assert_eq!(msh.adja(4)[0].get(), Some((5, 3)));
        assert_eq!(msh.adja(9)[0], super::super::Adja::NONE);
        msh.check()
    }
}
