//! Element partitioners, used as black boxes by the group splitter
use crate::{graph::CSRGraph, mesh::TetMesh, Error, Result, Vert3d};
use lindel::Lineariseable;
use log::debug;

/// Number of groups needed so that no group holds more than `target_size`
/// elements (at least 1)
pub fn group_count(n_elems: usize, target_size: usize) -> Result<usize> {
    if target_size == 0 {
        return Err(Error::InvalidInput(String::from(
            "the target group size must be positive",
        )));
    }
    Ok(n_elems.div_ceil(target_size).max(1))
}

/// Element partitioner
pub trait Partitioner: Send + Sync {
    /// Name used in the logs
    fn name(&self) -> &'static str;

    /// Compute the partition of the elements of `msh` into `n_parts`; `graph`
    /// is the element-to-element graph of `msh`
    fn compute(&self, msh: &TetMesh, graph: &CSRGraph, n_parts: usize) -> Result<Vec<usize>>;
}

/// Compute the partition of the elements of `msh` into `n_parts` and check
/// that it is a valid assignment
pub fn partition(
    partitioner: &impl Partitioner,
    msh: &TetMesh,
    n_parts: usize,
) -> Result<Vec<usize>> {
    if n_parts == 0 {
        return Err(Error::InvalidInput(String::from(
            "cannot partition into 0 parts",
        )));
    }
    let graph = msh.elem_graph()?;
    debug!(
        "partition {} elements into {n_parts} parts using {}",
        msh.n_elems(),
        partitioner.name()
    );
    let parts = partitioner.compute(msh, &graph, n_parts)?;

    if parts.len() != msh.n_elems() {
        return Err(Error::Partition(format!(
            "{}: {} values for {} elements",
            partitioner.name(),
            parts.len(),
            msh.n_elems()
        )));
    }
    if let Some((i, &p)) = parts.iter().enumerate().find(|&(_, &p)| p >= n_parts) {
        return Err(Error::Partition(format!(
            "{}: element {i} assigned to part {p} (only {n_parts} parts)",
            partitioner.name()
        )));
    }
    Ok(parts)
}

/// Ratio of the number of faces between elements on different partitions to
/// the total number of internal faces
#[must_use]
pub fn partition_quality(graph: &CSRGraph, parts: &[usize]) -> f64 {
    let mut count = 0;
    let mut split = 0;
    for (i, row) in graph.rows().enumerate() {
        for &j in row {
            if j != i {
                count += 1;
                if parts[i] != parts[j] {
                    split += 1;
                }
            }
        }
    }
    if count == 0 {
        return 0.0;
    }
    f64::from(split) / f64::from(count)
}

/// Imbalance between the partitions, defined as
/// (max(part_sizes) - min(part_sizes)) / mean(part_sizes)
#[must_use]
pub fn partition_imbalance(parts: &[usize], n_parts: usize) -> f64 {
    let mut sizes = vec![0_usize; n_parts];
    for &i in parts {
        sizes[i] += 1;
    }
    let min = sizes.iter().copied().min().unwrap_or(0);
    let max = sizes.iter().copied().max().unwrap_or(0);
    if parts.is_empty() {
        return 0.0;
    }
    let avg = parts.len() as f64 / n_parts as f64;
    (max - min) as f64 / avg
}

/// Get the bounding box
fn bounding_box(verts: impl Iterator<Item = Vert3d>) -> Option<(Vert3d, Vert3d)> {
    verts.fold(None, |bb, p| match bb {
        None => Some((p, p)),
        Some((mini, maxi)) => Some((mini.inf(&p), maxi.sup(&p))),
    })
}

/// Sort the vertices along a Hilbert curve
#[must_use]
pub fn hilbert_indices(verts: impl ExactSizeIterator<Item = Vert3d> + Clone) -> Vec<usize> {
    let n = verts.len();
    let Some((mini, maxi)) = bounding_box(verts.clone()) else {
        return Vec::new();
    };
    let ext = (maxi - mini).map(|x| if x > 0.0 { x } else { 1.0 });

    let order = 16;
    let scale = usize::pow(2, order) as f64 - 1.0;
    let hilbert = |x: Vert3d| {
        let mut tmp = [0_u16; 3];
        for j in 0..3 {
            tmp[j] = (scale * (x[j] - mini[j]) / ext[j]).round() as u16;
        }
        tmp.hilbert_index() as usize
    };

    let hilbert_ids = verts.map(hilbert).collect::<Vec<_>>();

    let mut indices = Vec::with_capacity(n);
    indices.extend(0..n);
    indices.sort_by_key(|&i| hilbert_ids[i]);
    indices
}

/// Cut an ordering of the elements into `n_parts` chunks of (almost) equal sizes
fn cut_ordering(ids: &[usize], n_parts: usize) -> Vec<usize> {
    let n = ids.len();
    let mut res = vec![0; n];
    for (rank, &i) in ids.iter().enumerate() {
        res[i] = rank * n_parts / n;
    }
    res
}

/// Simple geometric partitioner based on the Hilbert indices of the element centers
#[derive(Clone, Copy, Debug, Default)]
pub struct HilbertPartitioner;

impl Partitioner for HilbertPartitioner {
    fn name(&self) -> &'static str {
        "hilbert"
    }

    fn compute(&self, msh: &TetMesh, _graph: &CSRGraph, n_parts: usize) -> Result<Vec<usize>> {
        let ids = hilbert_indices(msh.elem_centers());
        Ok(cut_ordering(&ids, n_parts))
    }
}

/// Simple partitioner based on the RCM ordering of the element-to-element
/// connectivity
#[derive(Clone, Copy, Debug, Default)]
pub struct RcmPartitioner;

impl Partitioner for RcmPartitioner {
    fn name(&self) -> &'static str {
        "rcm"
    }

    fn compute(&self, _msh: &TetMesh, graph: &CSRGraph, n_parts: usize) -> Result<Vec<usize>> {
        let ids = graph.reverse_cuthill_mckee();
        Ok(cut_ordering(&ids, n_parts))
    }
}

/// Partition given explicitely, e.g. computed beforehand by an external tool
#[derive(Clone, Debug)]
pub struct ExplicitPartitioner {
    parts: Vec<usize>,
}

impl ExplicitPartitioner {
    #[must_use]
    pub const fn new(parts: Vec<usize>) -> Self {
        Self { parts }
    }
}

impl Partitioner for ExplicitPartitioner {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn compute(&self, _msh: &TetMesh, _graph: &CSRGraph, _n_parts: usize) -> Result<Vec<usize>> {
        Ok(self.parts.clone())
    }
}

#[cfg(feature = "metis")]
/// Metis partitioning method
#[derive(Clone, Copy, Debug)]
pub enum MetisMethod {
    /// Recursive algorithm in Metis
    Recursive,
    /// KWay algorithm in Metis
    KWay,
}

/// Metis partitioner
#[cfg(feature = "metis")]
#[derive(Clone, Copy, Debug)]
pub struct MetisPartitioner {
    pub method: MetisMethod,
}

#[cfg(feature = "metis")]
impl Partitioner for MetisPartitioner {
    fn name(&self) -> &'static str {
        match self.method {
            MetisMethod::Recursive => "metis (recursive)",
            MetisMethod::KWay => "metis (kway)",
        }
    }

    fn compute(&self, _msh: &TetMesh, graph: &CSRGraph, n_parts: usize) -> Result<Vec<usize>> {
        let to_idx = |x: usize| {
            metis::Idx::try_from(x).map_err(|e| Error::Partition(format!("{e:?}")))
        };

        let mut xadj = Vec::<metis::Idx>::with_capacity(graph.n() + 1);
        let mut adjncy = Vec::<metis::Idx>::with_capacity(graph.n_edges());

        xadj.push(0);
        for row in graph.rows() {
            for &j in row {
                adjncy.push(to_idx(j)?);
            }
            xadj.push(to_idx(adjncy.len())?);
        }

        let metis_graph = metis::Graph::new(1, to_idx(n_parts)?, &mut xadj, &mut adjncy);

        let mut partition = vec![0; graph.n()];
        match self.method {
            MetisMethod::Recursive => metis_graph.part_recursive(&mut partition),
            MetisMethod::KWay => metis_graph.part_kway(&mut partition),
        }
        .map_err(|e| Error::Partition(format!("{e:?}")))?;

        partition
            .iter()
            .map(|&x| usize::try_from(x).map_err(|e| Error::Partition(format!("{e:?}"))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        group_count, hilbert_indices, partition, partition_imbalance, partition_quality,
        ExplicitPartitioner, HilbertPartitioner, RcmPartitioner,
    };
    use crate::{mesh::test_meshes::box_mesh, Error, Result, Vert3d};

    #[test]
    fn test_group_count() -> Result<()> {
        assert_eq!(group_count(12, 5)?, 3);
        assert_eq!(group_count(10, 5)?, 2);
        assert_eq!(group_count(12, 12)?, 1);
        assert_eq!(group_count(12, 100)?, 1);
        assert_eq!(group_count(0, 100)?, 1);
        assert!(matches!(group_count(12, 0), Err(Error::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_hilbert_indices() {
        let verts = [
            Vert3d::new(1.0, 1.0, 0.0),
            Vert3d::new(0.0, 0.0, 0.0),
            Vert3d::new(1.0, 0.0, 0.0),
            Vert3d::new(0.0, 1.0, 0.0),
        ];
        let ids = hilbert_indices(verts.iter().copied());
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], 1);
        // consecutive vertices along the curve are neighbors on the grid
        for w in ids.windows(2) {
            crate::assert_delta!((verts[w[0]] - verts[w[1]]).norm(), 1.0, 1e-12);
        }
        assert!(hilbert_indices(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_hilbert() -> Result<()> {
        let msh = box_mesh(1.0, 6, 1.0, 6, 1.0, 6)?;
        let parts = partition(&HilbertPartitioner, &msh, 4)?;
        let graph = msh.elem_graph()?;

        assert!(partition_quality(&graph, &parts) < 0.25);
        assert!(partition_imbalance(&parts, 4) < 0.01);
        Ok(())
    }

    #[test]
    fn test_rcm() -> Result<()> {
        let msh = box_mesh(4.0, 17, 1.0, 3, 1.0, 3)?;
        let parts = partition(&RcmPartitioner, &msh, 4)?;
        let graph = msh.elem_graph()?;

        assert!(partition_quality(&graph, &parts) < 0.3);
        assert!(partition_imbalance(&parts, 4) < 0.02);
        Ok(())
    }

    #[test]
    fn test_explicit() -> Result<()> {
        let msh = box_mesh(1.0, 2, 1.0, 2, 1.0, 2)?;
        let parts = partition(&ExplicitPartitioner::new(vec![0, 0, 1, 1, 2, 2]), &msh, 3)?;
        assert_eq!(parts, [0, 0, 1, 1, 2, 2]);

        let res = partition(&ExplicitPartitioner::new(vec![0, 0, 1, 1, 2, 3]), &msh, 3);
        assert!(matches!(res, Err(Error::Partition(_))));

        let res = partition(&ExplicitPartitioner::new(vec![0, 0, 1]), &msh, 3);
        assert!(matches!(res, Err(Error::Partition(_))));

        let res = partition(&ExplicitPartitioner::new(vec![0; 6]), &msh, 0);
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        Ok(())
    }

    #[cfg(feature = "metis")]
    #[test]
    fn test_metis() -> Result<()> {
        use super::{MetisMethod, MetisPartitioner};

        let msh = box_mesh(1.0, 6, 1.0, 6, 1.0, 6)?;
        let graph = msh.elem_graph()?;
        for method in [MetisMethod::Recursive, MetisMethod::KWay] {
            let parts = partition(&MetisPartitioner { method }, &msh, 4)?;
            assert!(partition_quality(&graph, &parts) < 0.1);
            assert!(partition_imbalance(&parts, 4) < 0.05);
        }
        Ok(())
    }
}
