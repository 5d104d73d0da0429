//! Element-to-element graphs in CSR format, as consumed by the partitioners

/// Compute the indices that would sort `data`
fn argsort(data: &[usize]) -> Vec<usize> {
    let mut indices = (0..data.len()).collect::<Vec<_>>();
    indices.sort_by_key(|&i| &data[i]);
    indices
}

/// CSR representation of a graph
#[derive(Debug, Default, Clone)]
pub struct CSRGraph {
    ptr: Vec<usize>,
    indices: Vec<usize>,
}

impl CSRGraph {
    /// Create a graph from its (undirected) edges
    #[must_use]
    pub fn from_edges(n: usize, edgs: &[[usize; 2]]) -> Self {
        let mut ptr = vec![0; n + 1];
        for e in edgs {
            ptr[e[0] + 1] += 1;
            ptr[e[1] + 1] += 1;
        }
        for i in 0..n {
            ptr[i + 1] += ptr[i];
        }
        let mut next = ptr.clone();
        let mut indices = vec![0; ptr[n]];
        for &[i0, i1] in edgs {
            indices[next[i0]] = i1;
            next[i0] += 1;
            indices[next[i1]] = i0;
            next[i1] += 1;
        }
        let mut res = Self { ptr, indices };
        res.sort();
        res
    }

    /// Sort the indices for every vertex in the graph
    fn sort(&mut self) {
        for i in 0..self.n() {
            let start = self.ptr[i];
            let end = self.ptr[i + 1];
            self.indices[start..end].sort_unstable();
        }
    }

    /// Number of vertices
    #[must_use]
    pub fn n(&self) -> usize {
        self.ptr.len().max(1) - 1
    }

    /// Number of edges (each undirected edge is counted twice)
    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.indices.len()
    }

    /// Get the neighbors of the `i`th vertex
    #[must_use]
    pub fn row(&self, i: usize) -> &[usize] {
        let start = self.ptr[i];
        let end = self.ptr[i + 1];
        &self.indices[start..end]
    }

    /// Sequential iterator over the rows
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[usize]> {
        (0..self.n()).map(|i| self.row(i))
    }

    fn node_degrees(&self) -> Vec<usize> {
        let mut res = Vec::with_capacity(self.n());
        for (i_row, row) in self.rows().enumerate() {
            let mut n = row.len();
            if row.contains(&i_row) {
                n += 1;
            }
            res.push(n);
        }
        res
    }

    /// Compute the Reverse Cuthill McKee ordering
    #[must_use]
    pub fn reverse_cuthill_mckee(&self) -> Vec<usize> {
        // strongly inspired from scipy
        let mut order = vec![0; self.n()];
        let degree = self.node_degrees();
        let inds = argsort(&degree);
        let mut flg = vec![true; self.n()];
        let rev_inds = argsort(&inds);
        let mut tmp_degrees = vec![0; degree.iter().copied().max().unwrap_or(0) + 1];
        let mut n = 0;

        for idx in 0..self.n() {
            if flg[idx] {
                let seed = inds[idx];
                order[n] = seed;
                n += 1;
                flg[rev_inds[seed]] = false;
                let mut level_start = n - 1;
                let mut level_end = n;

                while level_start < level_end {
                    for level in level_start..level_end {
                        let i = order[level];
                        let n_old = n;

                        for &j in self.row(i) {
                            if flg[rev_inds[j]] {
                                flg[rev_inds[j]] = false;
                                order[n] = j;
                                n += 1;
                            }
                        }

                        let mut level_len = 0;
                        for k in n_old..n {
                            tmp_degrees[level_len] = degree[order[k]];
                            level_len += 1;
                        }

                        for k in 1..level_len {
                            let tmp = tmp_degrees[k];
                            let tmp2 = order[n_old + k];
                            let mut l = k;
                            while l > 0 && tmp < tmp_degrees[l - 1] {
                                tmp_degrees[l] = tmp_degrees[l - 1];
                                order[n_old + l] = order[n_old + l - 1];
                                l -= 1;
                            }
                            tmp_degrees[l] = tmp;
                            order[n_old + l] = tmp2;
                        }
                    }

                    level_start = level_end;
                    level_end = n;
                }
            }

            if n == self.n() {
                break;
            }
        }

        // return reversed order for RCM ordering
        order.iter().rev().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CSRGraph;

    #[test]
    fn test_csr_edges() {
        let g = [[0, 1], [1, 2], [2, 0], [3, 4]];
        let g = CSRGraph::from_edges(6, &g);
        assert_eq!(g.n(), 6);
        assert_eq!(g.n_edges(), 8);
        assert_eq!(*g.row(0), [1, 2]);
        assert_eq!(*g.row(1), [0, 2]);
        assert_eq!(*g.row(2), [0, 1]);
        assert_eq!(*g.row(3), [4]);
        assert_eq!(*g.row(4), [3]);
        assert!(g.row(5).is_empty());
        assert_eq!(g.rows().map(<[usize]>::len).sum::<usize>(), 8);
    }

    #[test]
    fn test_rcm() {
        let g = CSRGraph::from_edges(4, &[[0, 1], [1, 2], [2, 3]]);
        assert_eq!(g.reverse_cuthill_mckee(), [3, 2, 1, 0]);

        let g = CSRGraph::from_edges(5, &[[0, 1], [0, 2], [0, 3], [3, 4]]);
        assert_eq!(g.node_degrees(), [3, 1, 1, 2, 1]);
        // computed using the scipy code and forcing stable sort
        assert_eq!(g.reverse_cuthill_mckee(), [4, 3, 2, 0, 1]);
    }

    #[test]
    fn test_rcm_disconnected() {
        let g = CSRGraph::from_edges(5, &[[0, 1], [2, 3], [3, 4]]);
        assert_eq!(g.reverse_cuthill_mckee(), [4, 3, 2, 1, 0]);
    }
}
