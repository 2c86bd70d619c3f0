//! Wire encodings for persisted state.
//!
//! Field elements are base-10 decimal strings (the representation the SNARK
//! frontend itself emits), curve points are `{x, y}` decimal pairs, proof
//! bytes are hex. Binary key material never goes through these encoders;
//! Groth16 keys use the backend's canonical serialisation in their own
//! files.

use ark_bls12_377::G1Affine;
use ark_bw6_761::Fr;
use ark_ff::{PrimeField, Zero};

use crate::error::CryptoError;

/// Render a field element as a decimal string.
pub fn field_to_string(x: &Fr) -> String {
    x.into_bigint().to_string()
}

/// Parse a decimal string into a field element.
pub fn parse_field(s: &str) -> Result<Fr, CryptoError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::InvalidFieldElement(s.to_string()));
    }
    let ten = Fr::from(10u64);
    let mut acc = Fr::zero();
    for b in s.bytes() {
        acc = acc * ten + Fr::from(u64::from(b - b'0'));
    }
    Ok(acc)
}

/// Interpret a field element as a small unsigned integer.
///
/// The auction matching policy does integer arithmetic on decrypted values;
/// anything above 128 bits is not a quantity this market trades in.
pub fn field_to_u128(x: &Fr) -> Result<u128, CryptoError> {
    let limbs = x.into_bigint().0;
    if limbs[2..].iter().any(|l| *l != 0) {
        return Err(CryptoError::ValueOutOfRange);
    }
    Ok(u128::from(limbs[0]) | (u128::from(limbs[1]) << 64))
}

fn point_from_coords(x: Fr, y: Fr) -> Result<G1Affine, CryptoError> {
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CryptoError::PointNotOnCurve);
    }
    Ok(point)
}

/// Serde adapter: a single field element as a decimal string.
pub mod field {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &Fr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&field_to_string(x))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(d)?;
        parse_field(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter: a vector of field elements.
pub mod field_vec {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(xs: &[Fr], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(xs.iter().map(field_to_string))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Fr>, D::Error> {
        let strings = Vec::<String>::deserialize(d)?;
        strings
            .iter()
            .map(|s| parse_field(s).map_err(de::Error::custom))
            .collect()
    }
}

/// Serde adapter: a fixed-size array of field elements.
pub mod field_array {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        xs: &[Fr; N],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.collect_seq(xs.iter().map(field_to_string))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<[Fr; N], D::Error> {
        let strings = Vec::<String>::deserialize(d)?;
        if strings.len() != N {
            return Err(de::Error::invalid_length(strings.len(), &"field array"));
        }
        let mut out = [Fr::zero(); N];
        for (slot, s) in out.iter_mut().zip(&strings) {
            *slot = parse_field(s).map_err(de::Error::custom)?;
        }
        Ok(out)
    }
}

/// Serde adapter: a vector of fixed-size field arrays (batched ciphertexts).
pub mod field_array_vec {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        rows: &[[Fr; N]],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.collect_seq(
            rows.iter()
                .map(|row| row.iter().map(field_to_string).collect::<Vec<_>>()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<Vec<[Fr; N]>, D::Error> {
        let rows = Vec::<Vec<String>>::deserialize(d)?;
        rows.into_iter()
            .map(|row| {
                if row.len() != N {
                    return Err(de::Error::invalid_length(row.len(), &"ciphertext row"));
                }
                let mut out = [Fr::zero(); N];
                for (slot, s) in out.iter_mut().zip(&row) {
                    *slot = parse_field(s).map_err(de::Error::custom)?;
                }
                Ok(out)
            })
            .collect()
    }
}

/// Serde adapter: an inner-curve point as `{x, y}` decimal strings.
pub mod point {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct PointRepr {
        x: String,
        y: String,
    }

    pub fn serialize<S: Serializer>(p: &G1Affine, s: S) -> Result<S::Ok, S::Error> {
        PointRepr {
            x: field_to_string(&p.x),
            y: field_to_string(&p.y),
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<G1Affine, D::Error> {
        let repr = PointRepr::deserialize(d)?;
        let x = parse_field(&repr.x).map_err(de::Error::custom)?;
        let y = parse_field(&repr.y).map_err(de::Error::custom)?;
        point_from_coords(x, y).map_err(de::Error::custom)
    }
}

/// Serde adapter: a vector of inner-curve points.
pub mod point_vec {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct PointRepr {
        x: String,
        y: String,
    }

    pub fn serialize<S: Serializer>(ps: &[G1Affine], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(ps.iter().map(|p| PointRepr {
            x: field_to_string(&p.x),
            y: field_to_string(&p.y),
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<G1Affine>, D::Error> {
        let reprs = Vec::<PointRepr>::deserialize(d)?;
        reprs
            .into_iter()
            .map(|repr| {
                let x = parse_field(&repr.x).map_err(de::Error::custom)?;
                let y = parse_field(&repr.y).map_err(de::Error::custom)?;
                point_from_coords(x, y).map_err(de::Error::custom)
            })
            .collect()
    }
}

/// Serde adapter: an optional inner-curve point.
pub mod point_opt {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct PointRepr {
        x: String,
        y: String,
    }

    pub fn serialize<S: Serializer>(p: &Option<G1Affine>, s: S) -> Result<S::Ok, S::Error> {
        p.map(|p| PointRepr {
            x: field_to_string(&p.x),
            y: field_to_string(&p.y),
        })
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<G1Affine>, D::Error> {
        let repr = Option::<PointRepr>::deserialize(d)?;
        repr.map(|repr| {
            let x = parse_field(&repr.x).map_err(de::Error::custom)?;
            let y = parse_field(&repr.y).map_err(de::Error::custom)?;
            point_from_coords(x, y).map_err(de::Error::custom)
        })
        .transpose()
    }
}

/// Serde adapter: a DH scalar as a decimal string.
pub mod scalar {
    use super::*;
    use ark_bls12_377::Fr as DhScalar;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &DhScalar, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&x.into_bigint().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DhScalar, D::Error> {
        let s = String::deserialize(d)?;
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(de::Error::custom("invalid scalar"));
        }
        let ten = DhScalar::from(10u64);
        let mut acc = DhScalar::zero();
        for b in s.bytes() {
            acc = acc * ten + DhScalar::from(u64::from(b - b'0'));
        }
        Ok(acc)
    }
}

/// Serde adapter: opaque proof bytes as a hex string.
pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}
