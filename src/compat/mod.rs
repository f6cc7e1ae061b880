use elliptic_curve::{
    group::Curve as _,
    ops::Reduce,
    sec1::{EncodedPoint, FromEncodedPoint, ModulusSize, ToEncodedPoint},
    CurveArithmetic, FieldBytes, FieldBytesSize, Group, PrimeCurve, PrimeField,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::constants::{POINT_LEN, SCALAR_LEN};

#[cfg(any(feature = "k256", test))]
mod k256_impl;
#[cfg(any(feature = "p256", test))]
mod p256_impl;

/// The byte encoding of an affine point, as it travels on the wire.
pub type PointBytes = [u8; POINT_LEN];

/// The byte encoding of a scalar.
pub type ScalarBytes = [u8; SCALAR_LEN];

/// An error raised by an operation on curve points or scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CurveError {
    /// The bytes do not describe a point on the curve.
    #[error("point is not on the curve")]
    InvalidPoint,
    /// A point at infinity appeared where a proper point was required.
    #[error("unexpected point at infinity")]
    IdentityPoint,
    /// The bytes do not describe a scalar reduced modulo the group order.
    #[error("scalar is not reduced modulo the group order")]
    InvalidScalar,
    /// A scalar was zero where a nonzero scalar was required.
    #[error("unexpected zero scalar")]
    ZeroScalar,
}

/// Represents a curve suitable for use in esem.
///
/// This is the trait that any curve usable in this library must implement.
/// This library does provide a few feature-gated implementations for curves
/// itself, beyond that you'll need to implement this trait yourself.
///
/// The bulk of the trait are the bounds requiring a curve according
/// to RustCrypto's traits. Beyond that, we need a fixed 64 byte encoding
/// of affine points for the wire, and a way to serialize points with serde.
///
/// Curves must have 32 byte scalars.
pub trait CSCurve: PrimeCurve + CurveArithmetic {
    const NAME: &'static [u8];

    /// Encode a point as `x || y`.
    ///
    /// The point at infinity encodes as all zeros.
    fn encode_point(point: &Self::AffinePoint) -> PointBytes;

    /// Decode a point produced by [CSCurve::encode_point].
    fn decode_point(bytes: &PointBytes) -> Result<Self::AffinePoint, CurveError>;

    /// Serialize a point with serde.
    fn serialize_point<S: Serializer>(
        point: &Self::AffinePoint,
        serializer: S,
    ) -> Result<S::Ok, S::Error>;

    /// Deserialize a point with serde.
    fn deserialize_point<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self::AffinePoint, D::Error>;
}

/// The SEC1 encoding shared by the RustCrypto curves, minus the tag byte.
pub(crate) fn encode_sec1<C>(point: &C::AffinePoint) -> PointBytes
where
    C: CurveArithmetic,
    C::AffinePoint: ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let encoded = point.to_encoded_point(false);
    let mut out = [0u8; POINT_LEN];
    // The identity encodes as a lone zero byte.
    if let Some(coordinates) = encoded.as_bytes().get(1..) {
        if coordinates.len() == POINT_LEN {
            out.copy_from_slice(coordinates);
        }
    }
    out
}

pub(crate) fn decode_sec1<C>(bytes: &PointBytes) -> Result<C::AffinePoint, CurveError>
where
    C: CurveArithmetic,
    C::AffinePoint: FromEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    if bytes.iter().all(|b| *b == 0) {
        return Ok(C::ProjectivePoint::identity().to_affine());
    }
    let mut tagged = Vec::with_capacity(POINT_LEN + 1);
    tagged.push(0x04);
    tagged.extend_from_slice(bytes);
    let encoded = EncodedPoint::<C>::from_bytes(&tagged).map_err(|_| CurveError::InvalidPoint)?;
    Option::from(C::AffinePoint::from_encoded_point(&encoded)).ok_or(CurveError::InvalidPoint)
}

fn field_bytes<C: CSCurve>(bytes: &ScalarBytes) -> FieldBytes<C> {
    let mut repr = FieldBytes::<C>::default();
    let len = repr.len().min(bytes.len());
    repr[..len].copy_from_slice(&bytes[..len]);
    repr
}

/// Interpret bytes as a big endian integer, and reduce it modulo the group order.
pub(crate) fn reduce_scalar<C: CSCurve>(bytes: &ScalarBytes) -> C::Scalar {
    <C::Scalar as Reduce<<C as elliptic_curve::Curve>::Uint>>::reduce_bytes(&field_bytes::<C>(
        bytes,
    ))
}

/// Encode a scalar as big endian bytes.
pub(crate) fn encode_scalar<C: CSCurve>(scalar: &C::Scalar) -> ScalarBytes {
    let repr = scalar.to_repr();
    let mut out = [0u8; SCALAR_LEN];
    let len = repr.len().min(SCALAR_LEN);
    out[..len].copy_from_slice(&repr[..len]);
    out
}

/// Decode a scalar, refusing anything not already reduced.
pub(crate) fn decode_scalar<C: CSCurve>(bytes: &ScalarBytes) -> Result<C::Scalar, CurveError> {
    Option::from(C::Scalar::from_repr(field_bytes::<C>(bytes))).ok_or(CurveError::InvalidScalar)
}

#[derive(Clone, Copy)]
pub(crate) struct SerializablePoint<C: CSCurve>(C::AffinePoint);

impl<C: CSCurve> SerializablePoint<C> {
    pub fn from_affine(point: &C::AffinePoint) -> Self {
        Self(*point)
    }

    pub fn to_affine(self) -> C::AffinePoint {
        self.0
    }
}

impl<C: CSCurve> Serialize for SerializablePoint<C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        C::serialize_point(&self.0, serializer)
    }
}

impl<'de, C: CSCurve> Deserialize<'de> for SerializablePoint<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let affine = C::deserialize_point(deserializer)?;
        Ok(Self(affine))
    }
}
