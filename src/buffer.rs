//! Growable buffers with a geometric growth policy and fallible allocation
use crate::{Error, Result};
use log::debug;
use std::ops::{Deref, DerefMut};

/// Default growth factor
pub const DEFAULT_GROWTH: f64 = 2.0;

/// A `Vec` whose capacity grows geometrically and whose allocations never
/// abort: running out of memory is reported as `Error::Allocation`.
///
/// The logical size is `len()`, the allocated size is `capacity()`.
#[derive(Debug, Clone)]
pub struct DynArray<T> {
    data: Vec<T>,
    growth: f64,
    what: &'static str,
}

impl<T> DynArray<T> {
    /// Create an empty buffer, `what` is used in the error messages
    #[must_use]
    pub const fn new(what: &'static str) -> Self {
        Self {
            data: Vec::new(),
            growth: DEFAULT_GROWTH,
            what,
        }
    }

    /// Create an empty buffer with an initial capacity
    pub fn with_capacity(what: &'static str, capacity: usize) -> Result<Self> {
        let mut res = Self::new(what);
        res.reserve_exact(capacity)?;
        Ok(res)
    }

    /// Set the growth factor (values <= 1 still grow by one item)
    #[must_use]
    pub fn with_growth(mut self, growth: f64) -> Self {
        self.growth = growth;
        self
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Make sure that at least `additional` items can be pushed without reallocation
    pub fn reserve_exact(&mut self, additional: usize) -> Result<()> {
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| Error::Allocation {
                what: self.what,
                requested: self.data.len() + additional,
            })
    }

    /// Capacity after one growth step
    fn next_capacity(&self) -> usize {
        let cap = self.data.capacity();
        let scaled = (cap as f64 * self.growth) as usize;
        scaled.max(cap + 1)
    }

    fn grow(&mut self) -> Result<()> {
        let new_cap = self.next_capacity();
        debug!(
            "grow {}: {} -> {} items",
            self.what,
            self.data.capacity(),
            new_cap
        );
        self.reserve_exact(new_cap - self.data.len())
    }

    /// Append an item, growing the buffer if needed, and return its index
    pub fn push(&mut self, v: T) -> Result<usize> {
        if self.data.len() + 1 > self.data.capacity() {
            self.grow()?;
        }
        self.data.push(v);
        Ok(self.data.len() - 1)
    }

    /// Fill the remaining capacity using `f(index)`, without reallocating
    pub fn fill_capacity(&mut self, mut f: impl FnMut(usize) -> T) {
        let n = self.data.len();
        let cap = self.data.capacity();
        self.data.extend((n..cap).map(&mut f));
    }

    /// Shrink the capacity to the logical size
    pub fn shrink(&mut self) {
        self.data.shrink_to_fit();
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Size in bytes of the allocated memory
    #[must_use]
    pub fn mem_usage(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<T>()
    }
}

impl<T: Clone> DynArray<T> {
    /// Create a buffer holding a copy of `data`
    pub fn from_slice(what: &'static str, data: &[T]) -> Result<Self> {
        let mut res = Self::with_capacity(what, data.len())?;
        res.data.extend_from_slice(data);
        Ok(res)
    }

    /// Resize to `len`, filling with `v`
    pub fn resize(&mut self, len: usize, v: T) -> Result<()> {
        if len > self.data.len() {
            self.reserve_exact(len - self.data.len())?;
        }
        self.data.resize(len, v);
        Ok(())
    }

    /// Append a slice, growing the buffer if needed
    pub fn extend_from_slice(&mut self, other: &[T]) -> Result<()> {
        while self.data.len() + other.len() > self.data.capacity() {
            self.grow()?;
        }
        self.data.extend_from_slice(other);
        Ok(())
    }
}

impl<T> Deref for DynArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for DynArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::DynArray;
    use crate::{Error, Result};

    #[test]
    fn test_grow_from_zero() -> Result<()> {
        let mut a = DynArray::new("test");
        assert_eq!(a.capacity(), 0);
        for i in 0..10 {
            assert_eq!(a.push(i)?, i);
        }
        assert_eq!(a.len(), 10);
        assert!(a.capacity() >= 10);
        assert_eq!(a[7], 7);
        Ok(())
    }

    #[test]
    fn test_growth_factor() -> Result<()> {
        let mut a = DynArray::with_capacity("test", 4)?.with_growth(3.0);
        for i in 0..5 {
            a.push(i)?;
        }
        assert!(a.capacity() >= 12);

        // no growth at all still makes progress
        let mut b = DynArray::new("test").with_growth(0.5);
        for i in 0..3 {
            b.push(i)?;
        }
        assert_eq!(&b[..], &[0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_shrink() -> Result<()> {
        let mut a = DynArray::with_capacity("test", 100)?;
        a.push(1.0)?;
        a.push(2.0)?;
        a.shrink();
        assert_eq!(a.len(), 2);
        assert!(a.capacity() < 100);
        assert_eq!(*a, [1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_fill_capacity() -> Result<()> {
        let mut a = DynArray::with_capacity("test", 5)?;
        a.push(0)?;
        a.fill_capacity(|i| 10 * i);
        assert_eq!(a.len(), a.capacity());
        assert_eq!(a[1], 10);
        Ok(())
    }

    #[test]
    fn test_allocation_failure() {
        let res = DynArray::<u64>::with_capacity("huge", usize::MAX / 2);
        assert!(matches!(res, Err(Error::Allocation { what: "huge", .. })));
    }
}
