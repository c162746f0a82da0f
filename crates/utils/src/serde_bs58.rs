//! Base58 string representation of [`Pubkey`] for serde.
//!
//! ```ignore
//! #[serde(with = "utils::serde_bs58")]
//! pub address: Pubkey,
//! ```

use solana_pubkey::Pubkey;

pub fn serialize<S>(t: &Pubkey, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&bs58::encode(t.as_ref()).into_string())
}

struct Visitor;

impl<'de> serde::de::Visitor<'de> for Visitor {
    type Value = Pubkey;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("base58")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        crate::parse_pubkey(v).map_err(|_| serde::de::Error::custom("invalid base58"))
    }
}

pub fn deserialize<'de, D>(d: D) -> Result<Pubkey, D::Error>
where
    D: serde::Deserializer<'de>,
{
    d.deserialize_str(Visitor)
}

pub mod vec {
    use serde::{Deserialize, Serialize, ser::SerializeSeq};
    use solana_pubkey::Pubkey;

    #[derive(Serialize, Deserialize)]
    struct Bs58(#[serde(with = "super")] Pubkey);

    pub fn serialize<S>(keys: &[Pubkey], s: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = s.serialize_seq(Some(keys.len()))?;
        for key in keys {
            seq.serialize_element(&Bs58(*key))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Vec<Pubkey>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keys = Vec::<Bs58>::deserialize(d)?;
        Ok(keys.into_iter().map(|k| k.0).collect())
    }
}
