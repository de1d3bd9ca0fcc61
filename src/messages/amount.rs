use std::str::FromStr;

use super::MessageError;
use crate::cell::MAX_COINS;

/// Number of decimal places of both the native currency and the token.
pub const DECIMALS: u32 = 9;
pub const ONE: u128 = 10u128.pow(DECIMALS);

/// Amount in base units, displayed and parsed with [`DECIMALS`] decimal places.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Tokens(pub u128);

impl std::fmt::Display for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let int = self.0 / ONE;
        let mut frac = self.0 % ONE;

        int.fmt(f)?;
        if frac > 0 {
            let mut width = DECIMALS as usize;
            while frac % 10 == 0 {
                frac /= 10;
                width -= 1;
            }
            f.write_fmt(format_args!(".{frac:0width$}"))?;
        }
        Ok(())
    }
}

impl FromStr for Tokens {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s).map(Self)
    }
}

/// Parses a decimal amount (`"10"`, `"0.05"`) into base units.
pub fn parse_amount(s: &str) -> Result<u128, MessageError> {
    let invalid = |reason: &str| MessageError::InvalidAmount(format!("`{s}`: {reason}"));

    let s = s.trim();
    if s.starts_with('-') {
        return Err(invalid("amount is negative"));
    }

    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    if int.is_empty() && frac.is_empty() {
        return Err(invalid("empty amount"));
    }
    if frac.len() > DECIMALS as usize {
        return Err(invalid("too many decimal places"));
    }
    if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a number"));
    }

    let parse = |digits: &str| -> Result<u128, MessageError> {
        match digits {
            "" => Ok(0),
            digits => digits.parse().map_err(|_| invalid("amount is too large")),
        }
    };

    let frac_scale = 10u128.pow(DECIMALS - frac.len() as u32);
    let value = parse(int)?
        .checked_mul(ONE)
        .and_then(|int| int.checked_add(parse(frac).ok()? * frac_scale))
        .filter(|&value| value <= MAX_COINS)
        .ok_or_else(|| invalid("amount is too large"))?;

    Ok(value)
}
