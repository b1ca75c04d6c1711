//! User-facing decimal amounts and the SPL tokens they move.
//!
//! Both USDC and USDT have 6 decimals on-chain; user-facing amounts are
//! `rust_decimal::Decimal` values converted to raw integer base units by
//! `raw = round(amount * 10^6)`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places every supported SPL token uses.
pub const TOKEN_DECIMALS: u32 = 6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Usdc,
    Usdt,
}

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
        }
    }

    /// The token's mint address on the configured cluster. Real deployments
    /// read this from `system_settings`; these are the canonical mainnet
    /// mint addresses used as defaults.
    pub fn default_mint(&self) -> &'static str {
        match self {
            Self::Usdc => "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            Self::Usdt => "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Token {
    type Err = InvalidTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USDC" => Ok(Self::Usdc),
            "USDT" => Ok(Self::Usdt),
            other => Err(InvalidTokenError(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("'{0}' is not a supported token; must be USDC or USDT")]
pub struct InvalidTokenError(String);

/// Converts a user-facing decimal amount (e.g. `25.00`) to raw base units
/// (e.g. `25_000_000`) using half-up rounding at [`TOKEN_DECIMALS`] places.
///
/// Returns `None` if the rounded amount does not fit in a `u64` (negative,
/// or larger than `u64::MAX` base units).
pub fn to_raw_amount(amount: Decimal) -> Option<u64> {
    let scaled = amount
        .round_dp_with_strategy(TOKEN_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::from(10u64.pow(TOKEN_DECIMALS));
    scaled.round().to_u64()
}

/// Converts raw base units back to a user-facing decimal amount.
pub fn from_raw_amount(raw: u64) -> Decimal {
    Decimal::from(raw) / Decimal::from(10u64.pow(TOKEN_DECIMALS))
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn converts_whole_and_fractional_amounts() {
        assert_eq!(to_raw_amount(dec!(25.00)), Some(25_000_000));
        assert_eq!(to_raw_amount(dec!(0.01)), Some(10_000));
        assert_eq!(to_raw_amount(dec!(10000)), Some(10_000_000_000));
    }

    #[test]
    fn rounds_half_away_from_zero_past_six_decimals() {
        assert_eq!(to_raw_amount(dec!(1.0000005)), Some(1_000_001));
    }

    #[test]
    fn rejects_negative_amounts() {
        assert_eq!(to_raw_amount(dec!(-1.00)), None);
    }

    #[test]
    fn raw_round_trip() {
        let raw = 25_000_000u64;
        assert_eq!(to_raw_amount(from_raw_amount(raw)), Some(raw));
    }

    #[test]
    fn token_display_and_parse_round_trip() {
        for token in [Token::Usdc, Token::Usdt] {
            let s = token.to_string();
            assert_eq!(s.parse::<Token>().unwrap(), token);
        }
        assert!("DOGE".parse::<Token>().is_err());
    }
}
