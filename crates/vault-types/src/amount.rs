//! String encoding for `u128` token amounts.
//!
//! Token amounts carry 18 decimals of precision and routinely exceed the
//! 2^53 range that `JavaScript` numbers represent exactly. Every amount is
//! therefore serialized as a base-10 string. Deserialization accepts either
//! a string or a JSON integer that fits in `u64`; floats are rejected.
//!
//! Use with `#[serde(with = "crate::amount")]` on `u128` fields, or
//! `#[serde(with = "crate::amount::map")]` on `BTreeMap<K, u128>` fields.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Serialize a `u128` amount as a decimal string.
pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Deserialize a `u128` amount from a decimal string or an integer.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = u128;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer amount or its decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
        Ok(u128::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
        u128::try_from(v).map_err(|_| E::custom(format!("amount must be non-negative, got {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
        v.parse::<u128>()
            .map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
    }
}

/// Map helpers for `BTreeMap<K, u128>` with string-encoded values.
pub mod map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    struct Wire(#[serde(with = "crate::amount")] u128);

    /// Serialize a map whose values are amounts.
    pub fn serialize<K, S>(map: &BTreeMap<K, u128>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k, v.to_string())))
    }

    /// Deserialize a map whose values are amounts.
    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, u128>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, Wire>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, w)| (k, w.0)).collect())
    }
}
