use crate::{buffer::DynArray, Error, Result};
use serde::{Deserialize, Serialize};

/// Kind of the values stored at the mesh vertices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar,
    /// Symmetric 3x3 tensor, 6 values
    Tensor,
}

impl FieldKind {
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Tensor => 6,
        }
    }
}

/// Field defined at the mesh vertices, indexed in lockstep with the vertex ids
#[derive(Clone, Debug)]
pub struct SolField {
    kind: FieldKind,
    values: DynArray<f64>,
    n_verts: usize,
}

impl SolField {
    /// Create a field from the values at the vertices, stored contiguously
    pub fn new(kind: FieldKind, values: &[f64]) -> Result<Self> {
        if values.len() % kind.size() != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values for a {kind:?} field",
                values.len()
            )));
        }
        Ok(Self {
            kind,
            values: DynArray::from_slice("field", values)?,
            n_verts: values.len() / kind.size(),
        })
    }

    /// Create an empty field with room for `n_verts` vertices
    pub fn with_capacity(kind: FieldKind, n_verts: usize, growth: f64) -> Result<Self> {
        Ok(Self {
            kind,
            values: DynArray::with_capacity("field", n_verts * kind.size())?.with_growth(growth),
            n_verts: 0,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.kind.size()
    }

    /// Number of vertices with a value
    #[must_use]
    pub const fn n_verts(&self) -> usize {
        self.n_verts
    }

    /// Value at vertex `i`
    #[must_use]
    pub fn value(&self, i: usize) -> &[f64] {
        let m = self.size();
        &self.values[m * i..m * (i + 1)]
    }

    /// Append the value of the next vertex
    pub fn push(&mut self, v: &[f64]) -> Result<usize> {
        debug_assert_eq!(v.len(), self.size());
        self.values.truncate(self.n_verts * self.size());
        self.values.extend_from_slice(v)?;
        self.n_verts += 1;
        Ok(self.n_verts - 1)
    }

    /// Make the storage match the vertex slots of the mesh: `n_verts` used
    /// vertices among `n_slots` allocated ones
    pub fn match_slots(&mut self, n_verts: usize, n_slots: usize) -> Result<()> {
        self.values.resize(n_slots * self.size(), 0.0)?;
        self.n_verts = n_verts;
        Ok(())
    }

    /// Size in bytes of the allocated memory
    #[must_use]
    pub fn mem_usage(&self) -> usize {
        self.values.mem_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldKind, SolField};
    use crate::{Error, Result};

    #[test]
    fn test_scalar() -> Result<()> {
        let mut f = SolField::with_capacity(FieldKind::Scalar, 0, 2.0)?;
        for i in 0..5 {
            f.push(&[f64::from(i)])?;
        }
        assert_eq!(f.n_verts(), 5);
        assert_eq!(f.value(3), &[3.0]);

        f.match_slots(5, 8)?;
        assert_eq!(f.value(7), &[0.0]);
        assert_eq!(f.n_verts(), 5);
        assert_eq!(f.push(&[1.5])?, 5);
        assert_eq!(f.value(5), &[1.5]);
        assert_eq!(f.value(4), &[4.0]);
        Ok(())
    }

    #[test]
    fn test_tensor() -> Result<()> {
        let vals = (0..12).map(f64::from).collect::<Vec<_>>();
        let f = SolField::new(FieldKind::Tensor, &vals)?;
        assert_eq!(f.n_verts(), 2);
        assert_eq!(f.value(1), &vals[6..]);

        let res = SolField::new(FieldKind::Tensor, &vals[..7]);
        assert!(matches!(res, Err(Error::InvalidInput(_))));
        Ok(())
    }
}
