use std::fmt;

macro_rules! oracle_types {
    ($($name:ident = $value:literal,)*) => {
        /// Scope `OracleType`, stored as one byte per mapping slot.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum OracleType {
            $($name = $value,)*
        }

        impl OracleType {
            pub const ALL: &'static [OracleType] = &[$(OracleType::$name,)*];

            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(OracleType::$name),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OracleType::$name => stringify!($name),)*
                }
            }
        }
    };
}

oracle_types! {
    Unused = 0,
    DeprecatedPlaceholder1 = 1,
    DeprecatedPlaceholder2 = 2,
    DeprecatedPlaceholder3 = 3,
    DeprecatedPlaceholder4 = 4,
    SplStake = 5,
    KToken = 6,
    DeprecatedPlaceholder5 = 7,
    MsolStake = 8,
    DeprecatedPlaceholder6 = 9,
    DeprecatedPlaceholder7 = 10,
    JupiterLpFetch = 11,
    ScopeTwap1h = 12,
    OrcaWhirlpoolAtoB = 13,
    OrcaWhirlpoolBtoA = 14,
    RaydiumAmmV3AtoB = 15,
    RaydiumAmmV3BtoA = 16,
    MeteoraDlmmAtoB = 18,
    MeteoraDlmmBtoA = 19,
    PythPull = 21,
    PythPullEMA = 22,
    FixedPrice = 23,
    SwitchboardOnDemand = 24,
    JitoRestaking = 25,
    Chainlink = 26,
    DiscountToMaturity = 27,
    MostRecentOf = 28,
    PythLazer = 29,
    RedStone = 30,
    AdrenaLp = 31,
    Securitize = 32,
    CappedFloored = 33,
    ChainlinkRWA = 34,
    ChainlinkNAV = 35,
    FlashtradeLp = 36,
    ChainlinkX = 37,
    ChainlinkExchangeRate = 38,
    CappedMostRecentOf = 39,
    ScopeTwap8h = 40,
    ScopeTwap24h = 41,
}

impl OracleType {
    pub fn is_deprecated(self) -> bool {
        matches!(
            self,
            OracleType::DeprecatedPlaceholder1
                | OracleType::DeprecatedPlaceholder2
                | OracleType::DeprecatedPlaceholder3
                | OracleType::DeprecatedPlaceholder4
                | OracleType::DeprecatedPlaceholder5
                | OracleType::DeprecatedPlaceholder6
                | OracleType::DeprecatedPlaceholder7
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
