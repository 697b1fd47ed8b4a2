// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2024 A1 XYZ, INC.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Fixed-point arithmetic for interest accounting.
//!
//! `Number` is an unsigned 192-bit value with 15 decimal places of
//! precision. That leaves ~38 integer digits of headroom, enough to hold
//! any `u64` token amount multiplied through a compound growth factor
//! without losing the fractional tail.
//!
//! Overflow behavior: the plain operators panic on overflow (fatal, never
//! wrapping), while the `checked_*` methods report it to the caller. Money
//! math must never clamp silently.

use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use uint::construct_uint;

construct_uint! {
    pub struct U192(3);
}

/// The number of decimal places a [Number] carries.
pub const PRECISION: i32 = 15;

/// The decimal exponent for values expressed in basis points.
pub const BPS_EXPONENT: i32 = -4;

const ONE_RAW: u64 = 1_000_000_000_000_000;

static_assertions::const_assert_eq!(ONE_RAW, 10u64.pow(PRECISION as u32));

/// Error type for conversions out of the fixed-point representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("value does not fit in the target integer type")]
    Overflow,
}

/// A large fixed-point number with 15 decimal places of precision
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Default)]
#[repr(transparent)]
pub struct Number(U192);

static_assertions::const_assert_eq!(24, std::mem::size_of::<Number>());

unsafe impl bytemuck::Zeroable for Number {}
unsafe impl bytemuck::Pod for Number {}

impl Number {
    pub const ZERO: Self = Self(U192([0, 0, 0]));
    pub const ONE: Self = Self(U192([ONE_RAW, 0, 0]));

    /// Convert this number to fit in a u64
    ///
    /// The precision of the number in the u64 is based on the
    /// exponent provided. Fractional digits beyond the requested
    /// exponent are truncated.
    pub fn as_u64(&self, exponent: impl Into<i32>) -> u64 {
        let extra_precision = PRECISION + exponent.into();
        let prec_value = Self::ten_pow(extra_precision.unsigned_abs());

        let target_value = if extra_precision < 0 {
            self.0 * prec_value
        } else {
            self.0 / prec_value
        };

        if target_value > U192::from(u64::MAX) {
            panic!("cannot convert to u64 due to overflow");
        }

        target_value.as_u64()
    }

    /// Convert this number to fit in a u64, rounding the final digit
    /// to nearest with ties rounding up.
    ///
    /// This is the conversion used wherever an accrued balance becomes an
    /// integer token amount. Truncation would systematically under-accrue
    /// over many periods.
    pub fn as_u64_rounded(&self, exponent: impl Into<i32>) -> u64 {
        let extra_precision = PRECISION + exponent.into();
        let prec_value = Self::ten_pow(extra_precision.unsigned_abs());

        let target_value = if extra_precision < 0 {
            self.0 * prec_value
        } else {
            (self.0 + (prec_value / 2)) / prec_value
        };

        if target_value > U192::from(u64::MAX) {
            panic!("cannot convert to u64 due to overflow");
        }

        target_value.as_u64()
    }

    /// Convert this number to fit in a u64, rounding any fractional
    /// remainder up.
    pub fn as_u64_ceil(&self, exponent: impl Into<i32>) -> u64 {
        let extra_precision = PRECISION + exponent.into();
        let prec_value = Self::ten_pow(extra_precision.unsigned_abs());

        let target_value = if extra_precision < 0 {
            self.0 * prec_value
        } else {
            (self.0 + (prec_value - U192::from(1))) / prec_value
        };

        if target_value > U192::from(u64::MAX) {
            panic!("cannot convert to u64 due to overflow");
        }

        target_value.as_u64()
    }

    /// Fallible variant of [Number::as_u64_rounded], for callers that
    /// surface overflow as a typed error instead of a panic.
    pub fn try_as_u64_rounded(&self, exponent: impl Into<i32>) -> Result<u64, NumberError> {
        let extra_precision = PRECISION + exponent.into();
        let prec_value = Self::ten_pow(extra_precision.unsigned_abs());

        let target_value = if extra_precision < 0 {
            self.0.checked_mul(prec_value).ok_or(NumberError::Overflow)?
        } else {
            self.0
                .checked_add(prec_value / 2)
                .ok_or(NumberError::Overflow)?
                / prec_value
        };

        if target_value > U192::from(u64::MAX) {
            return Err(NumberError::Overflow);
        }

        Ok(target_value.as_u64())
    }

    /// Convert another integer into a `Number`, scaled by the decimal
    /// exponent. `from_decimal(5, -2)` reads as `0.05`.
    pub fn from_decimal(value: impl Into<U192>, exponent: impl Into<i32>) -> Self {
        let extra_precision = PRECISION + exponent.into();
        let prec_value = Self::ten_pow(extra_precision.unsigned_abs());

        if extra_precision < 0 {
            Self(value.into() / prec_value)
        } else {
            Self(value.into() * prec_value)
        }
    }

    /// Convert a value in basis points into a `Number`
    pub fn from_bps(basis_points: u16) -> Self {
        Self::from_decimal(basis_points as u64, BPS_EXPONENT)
    }

    /// The fraction `numerator / denominator` as a `Number`
    pub fn from_ratio(numerator: u64, denominator: u64) -> Self {
        Self::from_decimal(numerator, 0) / Self::from_decimal(denominator, 0)
    }

    pub fn saturating_add(&self, n: Number) -> Number {
        Number(self.0.saturating_add(n.0))
    }

    pub fn saturating_sub(&self, n: Number) -> Number {
        Number(self.0.saturating_sub(n.0))
    }

    /// Checked fixed-point addition
    pub fn checked_add(&self, n: Number) -> Option<Number> {
        self.0.checked_add(n.0).map(Number)
    }

    /// Checked fixed-point multiplication
    pub fn checked_mul(&self, n: Number) -> Option<Number> {
        self.0.checked_mul(n.0).map(|v| Number(v / Self::one()))
    }

    /// Raise this number to an integer power by repeated squaring.
    ///
    /// Each multiply bounds its intermediate product inside the 192-bit
    /// representation; `None` indicates the result (or an intermediate)
    /// left the representable range.
    pub fn checked_pow(&self, exponent: u32) -> Option<Number> {
        let mut result = Self::ONE;
        let mut base = *self;
        let mut remaining = exponent;

        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.checked_mul(base)?;
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.checked_mul(base)?;
            }
        }

        Some(result)
    }

    fn ten_pow(exponent: u32) -> U192 {
        U192::from(10u8).pow(U192::from(exponent))
    }

    fn one() -> U192 {
        U192::from(ONE_RAW)
    }
}

impl num_traits::Zero for Number {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl num_traits::One for Number {
    fn one() -> Self {
        Self::ONE
    }
}

impl borsh::BorshSerialize for Number {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut bytes = [0u8; 24];
        self.0.to_little_endian(&mut bytes);
        writer.write_all(&bytes)
    }
}

impl borsh::BorshDeserialize for Number {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut bytes = [0u8; 24];
        reader.read_exact(&mut bytes)?;
        Ok(Self(U192::from_little_endian(&bytes)))
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Number {
        Number::from_decimal(n, 0)
    }
}

impl From<u128> for Number {
    fn from(n: u128) -> Number {
        Number::from_decimal(n, 0)
    }
}

impl Add for Number {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.add(rhs.0))
    }
}

impl AddAssign for Number {
    fn add_assign(&mut self, rhs: Self) {
        self.0.add_assign(rhs.0)
    }
}

impl Sub for Number {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.sub(rhs.0))
    }
}

impl SubAssign for Number {
    fn sub_assign(&mut self, rhs: Self) {
        self.0.sub_assign(rhs.0)
    }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0.mul(rhs.0).div(Self::one()))
    }
}

impl MulAssign for Number {
    fn mul_assign(&mut self, rhs: Self) {
        self.0.mul_assign(rhs.0);
        self.0.div_assign(Self::one());
    }
}

impl Div for Number {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0.mul(Self::one()).div(rhs.0))
    }
}

impl DivAssign for Number {
    fn div_assign(&mut self, rhs: Self) {
        self.0.mul_assign(Self::one());
        self.0.div_assign(rhs.0)
    }
}

macro_rules! impl_scalar_ops {
    ($($t:ty),*) => {
        $(
            impl Mul<$t> for Number {
                type Output = Self;

                fn mul(self, rhs: $t) -> Self::Output {
                    Self(self.0.mul(U192::from(rhs)))
                }
            }

            impl Div<$t> for Number {
                type Output = Self;

                fn div(self, rhs: $t) -> Self::Output {
                    Self(self.0.div(U192::from(rhs)))
                }
            }
        )*
    };
}

impl_scalar_ops!(u16, u32, u64);

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = self.0 / Self::one();
        let fraction = self.0 % Self::one();

        let mut fraction_str = format!("{:0>15}", fraction.as_u128());
        while fraction_str.ends_with('0') && fraction_str.len() > 1 {
            fraction_str.pop();
        }

        write!(f, "{}.{}", integer, fraction_str)
    }
}

#[cfg(test)]
mod tests {
    use rand_chacha::rand_core::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn zero_equals_zero() {
        assert_eq!(Number::ZERO, Number::from_decimal(0u64, 0));
        assert_eq!(Number::ZERO, Number::from(0u64));
    }

    #[test]
    fn one_equals_one() {
        assert_eq!(Number::ONE, Number::from_decimal(1u64, 0));
        assert_eq!(Number::ONE, Number::from(1u64));
    }

    #[test]
    fn one_plus_one_equals_two() {
        assert_eq!(
            Number::from_decimal(2u64, 0),
            Number::ONE + Number::ONE
        );
    }

    #[test]
    fn ten_div_100_equals_point_1() {
        assert_eq!(
            Number::from_decimal(1u64, -1),
            Number::from_decimal(1u64, 1) / Number::from_decimal(100u64, 0)
        );
    }

    #[test]
    fn multiply_by_u64() {
        assert_eq!(
            Number::from_decimal(3u64, 1),
            Number::from_decimal(1u64, 1) * 3u64
        );
    }

    #[test]
    fn test_from_bps() {
        assert_eq!(Number::from_decimal(25u64, -4), Number::from_bps(25));
        assert_eq!(Number::ONE, Number::from_bps(10_000));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(Number::from_decimal(5u64, -1), Number::from_ratio(1, 2));
    }

    #[test]
    fn as_u64_truncates() {
        // 1.9 floors to 1
        assert_eq!(1, Number::from_decimal(19u64, -1).as_u64(0));
    }

    #[test]
    fn as_u64_rounded_ties_round_up() {
        assert_eq!(2, Number::from_decimal(15u64, -1).as_u64_rounded(0));
        assert_eq!(3, Number::from_decimal(25u64, -1).as_u64_rounded(0));
        assert_eq!(1, Number::from_decimal(14u64, -1).as_u64_rounded(0));
        assert_eq!(0, Number::from_decimal(4u64, -1).as_u64_rounded(0));
    }

    #[test]
    fn as_u64_ceil_rounds_up() {
        assert_eq!(2, Number::from_decimal(11u64, -1).as_u64_ceil(0));
        assert_eq!(1, Number::from_decimal(1u64, 0).as_u64_ceil(0));
    }

    #[test]
    fn try_as_u64_rounded_overflow() {
        let big = Number::from(u64::MAX) * Number::from(u64::MAX);
        assert_eq!(Err(NumberError::Overflow), big.try_as_u64_rounded(0));
        assert_eq!(Ok(5), Number::from(5u64).try_as_u64_rounded(0));
    }

    #[test]
    fn pow_zero_is_one() {
        let x = Number::from_decimal(105u64, -2);
        assert_eq!(Some(Number::ONE), x.checked_pow(0));
    }

    #[test]
    fn pow_small_exact() {
        // 1.1^2 == 1.21 exactly in 15 decimal places
        let x = Number::from_decimal(11u64, -1);
        assert_eq!(
            Some(Number::from_decimal(121u64, -2)),
            x.checked_pow(2)
        );
    }

    #[test]
    fn pow_overflow_is_reported() {
        let x = Number::from(u64::MAX);
        assert_eq!(None, x.checked_pow(4));
    }

    #[test]
    fn pow_tracks_iterated_multiply() {
        // The squaring ladder is not bit-identical to sequential
        // multiplication: each strategy truncates at different points.
        // Check they stay within a hair of each other for realistic
        // per-period rates.
        let tolerance = Number::from_decimal(1u64, -9);
        let mut rng = ChaCha20Rng::seed_from_u64(0x4c454e44);

        for _ in 0..200 {
            let rate_bps = (rng.next_u64() % 500) as u16; // up to 5% per period
            let periods = (rng.next_u64() % 60) as u32;

            let base = Number::ONE + Number::from_bps(rate_bps);

            let ladder = base.checked_pow(periods).unwrap();
            let mut sequential = Number::ONE;
            for _ in 0..periods {
                sequential = sequential * base;
            }

            let diff = if ladder > sequential {
                ladder - sequential
            } else {
                sequential - ladder
            };
            assert!(
                diff < tolerance,
                "pow diverged: ladder {} sequential {}",
                ladder,
                sequential
            );
        }
    }

    #[test]
    fn display() {
        assert_eq!("0.0", Number::ZERO.to_string());
        assert_eq!("1.0", Number::ONE.to_string());
        assert_eq!("0.05", Number::from_decimal(5u64, -2).to_string());
        assert_eq!("1045.0", Number::from_decimal(1045u64, 0).to_string());
        assert_eq!("5.5", Number::from_decimal(55u64, -1).to_string());
    }

    #[test]
    fn borsh_round_trip() {
        use borsh::BorshSerialize;

        let value = Number::from_decimal(987_654_321u64, -4);
        let bytes = value.try_to_vec().unwrap();
        assert_eq!(24, bytes.len());
        let read: Number = borsh::BorshDeserialize::try_from_slice(&bytes).unwrap();
        assert_eq!(value, read);
    }
}
