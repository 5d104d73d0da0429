//! Interface communicators: tables mapping the local vertices / faces of a
//! group to the interface slots shared with the other groups and processes
use crate::{buffer::DynArray, Error, Result};

/// Ordered table of `(local index, interface slot)` pairs
///
/// The same local index must not appear twice; this is not checked by
/// `append` (callers keep track of what they already appended).
#[derive(Clone, Debug)]
pub struct InterfaceComm {
    items: DynArray<(usize, usize)>,
}

impl Default for InterfaceComm {
    fn default() -> Self {
        Self {
            items: DynArray::new("communicator"),
        }
    }
}

impl InterfaceComm {
    /// Create an empty table with an initial capacity
    pub fn with_capacity(capacity: usize, growth: f64) -> Result<Self> {
        Ok(Self {
            items: DynArray::with_capacity("communicator", capacity)?.with_growth(growth),
        })
    }

    /// Create a table from its pairs
    pub fn from_pairs(pairs: &[(usize, usize)]) -> Result<Self> {
        Ok(Self {
            items: DynArray::from_slice("communicator", pairs)?,
        })
    }

    /// Append a `(local index, slot)` pair, growing the table if needed
    pub fn append(&mut self, local: usize, slot: usize) -> Result<()> {
        self.items.push((local, slot))?;
        Ok(())
    }

    /// Shrink the capacity to the number of entries
    pub fn finalize(&mut self) {
        self.items.shrink();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Sequential iterator over the `(local index, slot)` pairs
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, usize)> + '_ {
        self.items.iter().copied()
    }

    pub fn slots(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.items.iter().map(|&(_, s)| s)
    }

    /// Largest slot in the table
    #[must_use]
    pub fn max_slot(&self) -> Option<usize> {
        self.slots().max()
    }

    /// Check that the local indices are below `n` and appear only once, and
    /// that a slot is used by a single local entity
    pub fn check(&self, n: usize) -> Result<()> {
        let mut seen = vec![false; n];
        let mut slots = rustc_hash::FxHashSet::default();
        for (local, slot) in self.iter() {
            if local >= n {
                return Err(Error::Validation(format!(
                    "communicator index {local} out of range ({n} entities)"
                )));
            }
            if seen[local] {
                return Err(Error::Validation(format!(
                    "local index {local} appears twice in the communicator"
                )));
            }
            seen[local] = true;
            if !slots.insert(slot) {
                return Err(Error::Validation(format!(
                    "slot {slot} appears twice in the communicator"
                )));
            }
        }
        Ok(())
    }

    /// Size in bytes of the allocated memory
    #[must_use]
    pub fn mem_usage(&self) -> usize {
        self.items.mem_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::InterfaceComm;
    use crate::{Error, Result};

    #[test]
    fn test_append_finalize() -> Result<()> {
        let mut comm = InterfaceComm::with_capacity(0, 2.0)?;
        assert!(comm.is_empty());
        for i in 0..9 {
            comm.append(2 * i, 100 + i)?;
        }
        assert_eq!(comm.len(), 9);
        assert!(comm.capacity() >= 9);
        comm.finalize();
        assert_eq!(comm.capacity(), 9);

        assert_eq!(comm.iter().nth(3), Some((6, 103)));
        assert_eq!(comm.slots().nth(3), Some(103));
        assert_eq!(comm.max_slot(), Some(108));
        comm.check(17)
    }

    #[test]
    fn test_check() -> Result<()> {
        let comm = InterfaceComm::from_pairs(&[(0, 3), (4, 5)])?;
        comm.check(5)?;
        assert!(matches!(comm.check(4), Err(Error::Validation(_))));

        let comm = InterfaceComm::from_pairs(&[(0, 3), (0, 5)])?;
        assert!(matches!(comm.check(5), Err(Error::Validation(_))));

        let comm = InterfaceComm::from_pairs(&[(0, 3), (1, 3)])?;
        assert!(matches!(comm.check(5), Err(Error::Validation(_))));
        Ok(())
    }
}
