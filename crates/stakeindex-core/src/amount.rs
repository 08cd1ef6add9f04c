//! Arbitrary-precision token amounts.
//!
//! Staking token amounts carry 18 decimals and routinely exceed the 64-bit
//! range, so every amount is held as a [`BigUint`]. On the wire and in storage
//! an amount is always a base-10 string; JSON integers are accepted on input
//! for convenience but never produced.

use crate::error::{Error, Result};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// An unsigned token amount or rate of unbounded size.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract `rhs`, returning `None` if the result would be negative.
    pub fn checked_sub(&self, rhs: &Amount) -> Option<Amount> {
        if self.0 < rhs.0 {
            None
        } else {
            Some(Self(&self.0 - &rhs.0))
        }
    }

    /// Integer division by a small divisor, `None` when dividing by zero.
    pub fn checked_div_u64(&self, divisor: u64) -> Option<Amount> {
        if divisor == 0 {
            None
        } else {
            Some(Self(&self.0 / BigUint::from(divisor)))
        }
    }

    /// Base-10 rendering used for storage.
    pub fn to_decimal_string(&self) -> String {
        self.0.to_str_radix(10)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Amount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = Error;

    /// Parses a base-10 string, or a `0x`-prefixed hex string as emitted by
    /// raw log decoders.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parsed = if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if hex.is_empty() {
                None
            } else {
                BigUint::parse_bytes(hex.as_bytes(), 16)
            }
        } else if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            BigUint::parse_bytes(trimmed.as_bytes(), 10)
        } else {
            None
        };

        parsed.map(Self).ok_or_else(|| Error::InvalidAmount {
            value: s.to_string(),
            reason: "not an unsigned base-10 or 0x-hex integer",
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<&Amount> for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| &acc + a)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a base-10 / 0x-hex integer string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Amount, E> {
        u64::try_from(v)
            .map(Amount::from)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Amount, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}
