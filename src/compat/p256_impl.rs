use super::*;

use p256::NistP256;

impl CSCurve for NistP256 {
    const NAME: &'static [u8] = b"NistP256";

    fn encode_point(point: &Self::AffinePoint) -> PointBytes {
        encode_sec1::<Self>(point)
    }

    fn decode_point(bytes: &PointBytes) -> Result<Self::AffinePoint, CurveError> {
        decode_sec1::<Self>(bytes)
    }

    fn serialize_point<S: Serializer>(
        point: &Self::AffinePoint,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        point.serialize(serializer)
    }

    fn deserialize_point<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self::AffinePoint, D::Error> {
        Self::AffinePoint::deserialize(deserializer)
    }
}
