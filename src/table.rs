//! Precomputed BPV tables.
//!
//! Each group owns a table of `N` entries `(y_i, Y_i = y_i * G)`, where
//! `y_i` is the PRF of the group key at counter `i`, reduced modulo the group order.
//! The scalars stay with the signer, the points go to the server.
//!
//! Tables are never modified after they're generated.
use elliptic_curve::{zeroize::Zeroize, Field, Group};

use crate::compat::{self, CSCurve, CurveError};
use crate::crypto::Prf;
use crate::keys::GroupKey;

/// One randomizer, along with its public image.
#[derive(Clone, Copy, Debug)]
pub struct PrecomputedEntry<C: CSCurve> {
    pub scalar: C::Scalar,
    pub point: C::AffinePoint,
}

/// Derive the scalar at a given index of a group's table.
///
/// This is what the tables are filled with, and what signing without tables recomputes.
pub(crate) fn entry_scalar<C: CSCurve>(prf: &Prf, index: usize) -> C::Scalar {
    compat::reduce_scalar::<C>(&prf.expand(index as u64))
}

/// Derive the entry at a given index of a group's table.
pub fn entry<C: CSCurve>(prf: &Prf, index: usize) -> Result<PrecomputedEntry<C>, CurveError> {
    let scalar = entry_scalar::<C>(prf, index);
    if bool::from(scalar.is_zero()) {
        return Err(CurveError::ZeroScalar);
    }
    let point = C::ProjectivePoint::generator() * scalar;
    if bool::from(point.is_identity()) {
        return Err(CurveError::IdentityPoint);
    }
    Ok(PrecomputedEntry {
        scalar,
        point: point.into(),
    })
}

/// The scalars of one group's table, held by the signer.
///
/// The scalars are wiped from memory when the table is dropped.
#[derive(Clone)]
pub struct SecretTable<C: CSCurve> {
    scalars: Vec<C::Scalar>,
}

impl<C: CSCurve> SecretTable<C> {
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&C::Scalar> {
        self.scalars.get(index)
    }

    /// Selection always produces indices below the table size.
    pub(crate) fn scalar(&self, index: usize) -> &C::Scalar {
        &self.scalars[index]
    }
}

impl<C: CSCurve> Drop for SecretTable<C> {
    fn drop(&mut self) {
        self.scalars.zeroize();
    }
}

/// The points of one group's table, held by the server.
#[derive(Clone, Debug)]
pub struct PublicTable<C: CSCurve> {
    points: Vec<C::AffinePoint>,
}

impl<C: CSCurve> PublicTable<C> {
    pub(crate) fn from_points(points: Vec<C::AffinePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&C::AffinePoint> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &C::AffinePoint> + '_ {
        self.points.iter()
    }
}

/// Generate both halves of one group's table.
///
/// If any entry is degenerate, nothing is returned.
pub fn generate<C: CSCurve>(
    key: &GroupKey,
    table_size: usize,
) -> Result<(SecretTable<C>, PublicTable<C>), CurveError> {
    let prf = Prf::new(key.as_bytes());
    let mut scalars = Vec::with_capacity(table_size);
    let mut points = Vec::with_capacity(table_size);
    for i in 0..table_size {
        let PrecomputedEntry { scalar, point } = entry::<C>(&prf, i)?;
        scalars.push(scalar);
        points.push(point);
    }
    Ok((SecretTable { scalars }, PublicTable { points }))
}

/// Generate only the public half of one group's table.
///
/// This is what a server needs when the signer keeps no tables.
pub fn generate_public<C: CSCurve>(
    key: &GroupKey,
    table_size: usize,
) -> Result<PublicTable<C>, CurveError> {
    let prf = Prf::new(key.as_bytes());
    let points = (0..table_size)
        .map(|i| entry::<C>(&prf, i).map(|e| e.point))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PublicTable { points })
}
