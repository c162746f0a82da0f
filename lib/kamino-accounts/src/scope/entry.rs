//! Decoded Scope mapping slots.
//!
//! Every slot of an `OracleMappings` account decodes to exactly one
//! [`ScopeEntry`]. Decoding is total: an unknown type code becomes
//! [`ScopeEntry::NotYetSupported`] carrying the raw slot.

use super::oracle_type::OracleType;
use crate::NO_INDEX;
use base64::prelude::*;
use serde_json::{Map, Value, json};
use solana_pubkey::Pubkey;

pub const GENERIC_LEN: usize = 20;

/// Nested references deeper than this render as a bare index.
const MAX_RENDER_DEPTH: usize = 4;

/// One mapping slot, as laid out across the parallel arrays of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSlot {
    pub price_account: Pubkey,
    pub price_type: u8,
    pub twap_source: u16,
    pub twap_enabled: u8,
    pub ref_price: u16,
    pub generic: [u8; GENERIC_LEN],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmaType {
    Ema1h,
    Ema8h,
    Ema24h,
}

impl EmaType {
    const ALL: [EmaType; 3] = [EmaType::Ema1h, EmaType::Ema8h, EmaType::Ema24h];

    fn bit(self) -> u8 {
        match self {
            EmaType::Ema1h => 1,
            EmaType::Ema8h => 1 << 1,
            EmaType::Ema24h => 1 << 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EmaType::Ema1h => "Ema1h",
            EmaType::Ema8h => "Ema8h",
            EmaType::Ema24h => "Ema24h",
        }
    }
}

/// Set of EMA periods enabled on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmaTypes(u8);

impl EmaTypes {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub fn contains(self, ty: EmaType) -> bool {
        self.0 & ty.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = EmaType> {
        EmaType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatusBehavior {
    AllUpdates,
    Open,
    OpenAndPrePost,
    Other(u8),
}

impl MarketStatusBehavior {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::AllUpdates,
            1 => Self::Open,
            2 => Self::OpenAndPrePost,
            other => Self::Other(other),
        }
    }

    fn name(self) -> String {
        match self {
            Self::AllUpdates => "AllUpdates".to_owned(),
            Self::Open => "Open".to_owned(),
            Self::OpenAndPrePost => "OpenAndPrePost".to_owned(),
            Self::Other(v) => format!("Other({v})"),
        }
    }
}

/// A slot referencing an external oracle account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleEntry {
    pub index: u16,
    pub oracle_type: OracleType,
    pub oracle: Pubkey,
    pub ema_types: EmaTypes,
    /// Only set for types that support a reference price.
    pub ref_price: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEntry {
    Unused {
        index: u16,
    },
    Deprecated {
        index: u16,
    },
    Oracle(OracleEntry),
    Chainlink {
        entry: OracleEntry,
        confidence_factor: u32,
    },
    ChainlinkStatus {
        entry: OracleEntry,
        market_status: MarketStatusBehavior,
    },
    PythLazer {
        entry: OracleEntry,
        feed_id: u32,
        exponent: u8,
        confidence_factor: u32,
    },
    FixedPrice {
        index: u16,
        value: u64,
        exp: u64,
    },
    DiscountToMaturity {
        index: u16,
        discount_per_year_bps: u16,
        maturity_timestamp: i64,
    },
    ScopeTwap {
        index: u16,
        oracle_type: OracleType,
        source: u16,
    },
    CappedFloored {
        index: u16,
        source: u16,
        cap: Option<u16>,
        floor: Option<u16>,
    },
    MostRecentOf {
        index: u16,
        oracle_type: OracleType,
        sources: Vec<u16>,
        max_divergence_bps: u16,
        sources_max_age_s: u64,
        /// Only for [`OracleType::CappedMostRecentOf`].
        cap: Option<u16>,
        ref_price: Option<u16>,
    },
    NotYetSupported {
        index: u16,
        code: u8,
        price_account: Pubkey,
        twap_source: Option<u16>,
        ema_types: EmaTypes,
        ref_price: Option<u16>,
        generic: [u8; GENERIC_LEN],
    },
}

fn opt_index(value: u16) -> Option<u16> {
    (value != NO_INDEX).then_some(value)
}

fn le_u16(g: &[u8; GENERIC_LEN], at: usize) -> u16 {
    u16::from_le_bytes([g[at], g[at + 1]])
}

fn le_u32(g: &[u8; GENERIC_LEN], at: usize) -> u32 {
    u32::from_le_bytes([g[at], g[at + 1], g[at + 2], g[at + 3]])
}

fn le_u64(g: &[u8; GENERIC_LEN], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&g[at..at + 8]);
    u64::from_le_bytes(b)
}

impl ScopeEntry {
    pub fn decode(index: u16, raw: &RawSlot) -> Self {
        let Some(oracle_type) = OracleType::from_u8(raw.price_type) else {
            return ScopeEntry::NotYetSupported {
                index,
                code: raw.price_type,
                price_account: raw.price_account,
                twap_source: opt_index(raw.twap_source),
                ema_types: EmaTypes::from_bits(raw.twap_enabled),
                ref_price: opt_index(raw.ref_price),
                generic: raw.generic,
            };
        };
        let g = &raw.generic;
        let oracle = |ref_price: Option<u16>| OracleEntry {
            index,
            oracle_type,
            oracle: raw.price_account,
            ema_types: EmaTypes::from_bits(raw.twap_enabled),
            ref_price,
        };
        use OracleType::*;
        match oracle_type {
            Unused => ScopeEntry::Unused { index },
            DeprecatedPlaceholder1 | DeprecatedPlaceholder2 | DeprecatedPlaceholder3
            | DeprecatedPlaceholder4 | DeprecatedPlaceholder5 | DeprecatedPlaceholder6
            | DeprecatedPlaceholder7 => ScopeEntry::Deprecated { index },
            AdrenaLp | ChainlinkExchangeRate | ChainlinkNAV | FlashtradeLp | JitoRestaking
            | JupiterLpFetch | KToken | MeteoraDlmmAtoB | MeteoraDlmmBtoA | MsolStake
            | OrcaWhirlpoolAtoB | OrcaWhirlpoolBtoA | PythPullEMA | RaydiumAmmV3AtoB
            | RaydiumAmmV3BtoA | RedStone | SplStake | SwitchboardOnDemand => {
                ScopeEntry::Oracle(oracle(None))
            }
            PythPull | Securitize => ScopeEntry::Oracle(oracle(opt_index(raw.ref_price))),
            Chainlink => ScopeEntry::Chainlink {
                entry: oracle(opt_index(raw.ref_price)),
                confidence_factor: le_u32(g, 0),
            },
            ChainlinkRWA | ChainlinkX => ScopeEntry::ChainlinkStatus {
                entry: oracle(None),
                market_status: MarketStatusBehavior::from_u8(g[0]),
            },
            PythLazer => ScopeEntry::PythLazer {
                entry: oracle(opt_index(raw.ref_price)),
                feed_id: le_u32(g, 0),
                exponent: g[4],
                confidence_factor: le_u32(g, 5),
            },
            FixedPrice => ScopeEntry::FixedPrice {
                index,
                value: le_u64(g, 0),
                exp: le_u64(g, 8),
            },
            DiscountToMaturity => ScopeEntry::DiscountToMaturity {
                index,
                discount_per_year_bps: le_u16(g, 0),
                maturity_timestamp: le_u64(g, 2) as i64,
            },
            ScopeTwap1h | ScopeTwap8h | ScopeTwap24h => ScopeEntry::ScopeTwap {
                index,
                oracle_type,
                source: raw.twap_source,
            },
            CappedFloored => ScopeEntry::CappedFloored {
                index,
                source: le_u16(g, 0),
                cap: opt_index(le_u16(g, 2)),
                floor: opt_index(le_u16(g, 4)),
            },
            MostRecentOf | CappedMostRecentOf => ScopeEntry::MostRecentOf {
                index,
                oracle_type,
                sources: (0..4)
                    .map(|i| le_u16(g, i * 2))
                    .take_while(|i| *i != NO_INDEX)
                    .collect(),
                max_divergence_bps: le_u16(g, 8),
                sources_max_age_s: le_u64(g, 10),
                cap: if oracle_type == CappedMostRecentOf {
                    opt_index(le_u16(g, 18))
                } else {
                    None
                },
                ref_price: if oracle_type == MostRecentOf {
                    opt_index(raw.ref_price)
                } else {
                    None
                },
            },
        }
    }

    pub fn index(&self) -> u16 {
        match self {
            ScopeEntry::Unused { index }
            | ScopeEntry::Deprecated { index }
            | ScopeEntry::FixedPrice { index, .. }
            | ScopeEntry::DiscountToMaturity { index, .. }
            | ScopeEntry::ScopeTwap { index, .. }
            | ScopeEntry::CappedFloored { index, .. }
            | ScopeEntry::MostRecentOf { index, .. }
            | ScopeEntry::NotYetSupported { index, .. } => *index,
            ScopeEntry::Oracle(entry)
            | ScopeEntry::Chainlink { entry, .. }
            | ScopeEntry::ChainlinkStatus { entry, .. }
            | ScopeEntry::PythLazer { entry, .. } => entry.index,
        }
    }

    /// The external oracle this slot reads, if it reads one directly.
    pub fn oracle(&self) -> Option<&OracleEntry> {
        match self {
            ScopeEntry::Oracle(entry)
            | ScopeEntry::Chainlink { entry, .. }
            | ScopeEntry::ChainlinkStatus { entry, .. }
            | ScopeEntry::PythLazer { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            ScopeEntry::Unused { .. } => "Unused".to_owned(),
            ScopeEntry::Deprecated { .. } => "Deprecated".to_owned(),
            ScopeEntry::Oracle(entry)
            | ScopeEntry::Chainlink { entry, .. }
            | ScopeEntry::ChainlinkStatus { entry, .. }
            | ScopeEntry::PythLazer { entry, .. } => entry.oracle_type.name().to_owned(),
            ScopeEntry::FixedPrice { .. } => OracleType::FixedPrice.name().to_owned(),
            ScopeEntry::DiscountToMaturity { .. } => {
                OracleType::DiscountToMaturity.name().to_owned()
            }
            ScopeEntry::CappedFloored { .. } => OracleType::CappedFloored.name().to_owned(),
            ScopeEntry::ScopeTwap { oracle_type, .. }
            | ScopeEntry::MostRecentOf { oracle_type, .. } => oracle_type.name().to_owned(),
            ScopeEntry::NotYetSupported { code, .. } => format!("NotYetSupported({code})"),
        }
    }

    /// JSON view of the slot; slot references are expanded through `table`.
    pub fn to_json(&self, table: &[ScopeEntry]) -> Value {
        self.render(table, 0)
    }

    fn render(&self, table: &[ScopeEntry], depth: usize) -> Value {
        let nested = |index: Option<u16>| -> Value {
            match index {
                None => Value::Null,
                Some(i) if depth + 1 >= MAX_RENDER_DEPTH => json!({ "index": i }),
                Some(i) => match table.get(usize::from(i)) {
                    Some(entry) => entry.render(table, depth + 1),
                    None => json!({ "index": i }),
                },
            }
        };

        let mut out = Map::new();
        out.insert("type".to_owned(), Value::String(self.type_name()));
        out.insert("index".to_owned(), json!(self.index()));
        match self {
            ScopeEntry::Unused { .. } | ScopeEntry::Deprecated { .. } => {}
            ScopeEntry::Oracle(entry)
            | ScopeEntry::Chainlink { entry, .. }
            | ScopeEntry::ChainlinkStatus { entry, .. }
            | ScopeEntry::PythLazer { entry, .. } => {
                out.insert("oracle".to_owned(), json!(entry.oracle.to_string()));
                if !entry.ema_types.is_empty() {
                    let names: Vec<&str> = entry.ema_types.iter().map(EmaType::name).collect();
                    out.insert("emaTypes".to_owned(), json!(names));
                }
                if entry.oracle_type.supports_ref_price() {
                    out.insert("refPrice".to_owned(), nested(entry.ref_price));
                }
                match self {
                    ScopeEntry::Chainlink {
                        confidence_factor, ..
                    } => {
                        out.insert("confidenceFactor".to_owned(), json!(confidence_factor));
                    }
                    ScopeEntry::ChainlinkStatus { market_status, .. } => {
                        out.insert(
                            "marketStatusBehavior".to_owned(),
                            json!(market_status.name()),
                        );
                    }
                    ScopeEntry::PythLazer {
                        feed_id,
                        exponent,
                        confidence_factor,
                        ..
                    } => {
                        out.insert("feedId".to_owned(), json!(feed_id));
                        out.insert("exponent".to_owned(), json!(exponent));
                        out.insert("confidenceFactor".to_owned(), json!(confidence_factor));
                    }
                    _ => {}
                }
            }
            ScopeEntry::FixedPrice { value, exp, .. } => {
                out.insert("value".to_owned(), json!(value));
                out.insert("exp".to_owned(), json!(exp));
                out.insert("decimal".to_owned(), json!(fixed_decimal(*value, *exp)));
            }
            ScopeEntry::DiscountToMaturity {
                discount_per_year_bps,
                maturity_timestamp,
                ..
            } => {
                out.insert("discountPerYearBps".to_owned(), json!(discount_per_year_bps));
                out.insert("maturityTimestamp".to_owned(), json!(maturity_timestamp));
            }
            ScopeEntry::ScopeTwap { source, .. } => {
                out.insert("source".to_owned(), nested(Some(*source)));
            }
            ScopeEntry::CappedFloored {
                source, cap, floor, ..
            } => {
                out.insert("source".to_owned(), nested(Some(*source)));
                out.insert("cap".to_owned(), nested(*cap));
                out.insert("floor".to_owned(), nested(*floor));
            }
            ScopeEntry::MostRecentOf {
                oracle_type,
                sources,
                max_divergence_bps,
                sources_max_age_s,
                cap,
                ref_price,
                ..
            } => {
                let sources: Vec<Value> = sources.iter().map(|s| nested(Some(*s))).collect();
                out.insert("sources".to_owned(), Value::Array(sources));
                out.insert("maxDivergenceBps".to_owned(), json!(max_divergence_bps));
                out.insert("sourcesMaxAgeS".to_owned(), json!(sources_max_age_s));
                if *oracle_type == OracleType::CappedMostRecentOf {
                    out.insert("cap".to_owned(), nested(*cap));
                } else {
                    out.insert("refPrice".to_owned(), nested(*ref_price));
                }
            }
            ScopeEntry::NotYetSupported {
                price_account,
                twap_source,
                ema_types,
                ref_price,
                generic,
                ..
            } => {
                out.insert("oracle".to_owned(), json!(price_account.to_string()));
                out.insert("twapSource".to_owned(), nested(*twap_source));
                if !ema_types.is_empty() {
                    let names: Vec<&str> = ema_types.iter().map(EmaType::name).collect();
                    out.insert("emaTypes".to_owned(), json!(names));
                }
                out.insert("refPrice".to_owned(), nested(*ref_price));
                out.insert("generic".to_owned(), json!(BASE64_STANDARD.encode(generic)));
            }
        }
        Value::Object(out)
    }
}

impl OracleType {
    pub fn supports_ref_price(self) -> bool {
        matches!(
            self,
            OracleType::PythPull
                | OracleType::Securitize
                | OracleType::Chainlink
                | OracleType::PythLazer
        )
    }
}

/// `value * 10^-exp` as a plain decimal string, keeping the scale.
fn fixed_decimal(value: u64, exp: u64) -> String {
    let digits = value.to_string();
    let Ok(exp) = usize::try_from(exp) else {
        return digits;
    };
    if exp == 0 {
        return digits;
    }
    if digits.len() > exp {
        let (int, frac) = digits.split_at(digits.len() - exp);
        format!("{int}.{frac}")
    } else {
        format!("0.{}{digits}", "0".repeat(exp - digits.len()))
    }
}
