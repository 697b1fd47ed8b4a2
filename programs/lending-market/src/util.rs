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

use anchor_lang::prelude::*;
use anchor_lang::solana_program::clock::UnixTimestamp;
use anchor_lang::solana_program::program_option::COption;
use anchor_spl::token_interface::TokenAccount;
use arbor_program_common::Number;

use crate::ErrorCode;

pub const SECONDS_PER_HOUR: UnixTimestamp = 3600;
pub const SECONDS_PER_DAY: UnixTimestamp = SECONDS_PER_HOUR * 24;
pub const SECONDS_PER_WEEK: UnixTimestamp = SECONDS_PER_DAY * 7;
pub const SECONDS_PER_YEAR: UnixTimestamp = 31_536_000;

static_assertions::const_assert_eq!(SECONDS_PER_HOUR, 60 * 60);
static_assertions::const_assert_eq!(SECONDS_PER_DAY, 60 * 60 * 24);
static_assertions::const_assert_eq!(SECONDS_PER_WEEK, 60 * 60 * 24 * 7);
static_assertions::const_assert_eq!(SECONDS_PER_YEAR, 60 * 60 * 24 * 365);

/// The interest accrual formula applied to a loan's tracked balance.
///
/// The compound form is the authoritative production algorithm: the growth
/// factor `(1 + rate/factor)^periods` is evaluated once by repeated squaring
/// and the result is rounded to an integer a single time at the end.
/// Iterating the rate period-by-period instead rounds at every step and is
/// not bit-identical at high period counts; it appears only in tests as a
/// cross-check.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "no-entrypoint", test),
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum InterestFormula {
    Simple,
    #[default]
    Compound,
}

impl TryFrom<u8> for InterestFormula {
    type Error = anchor_lang::error::Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(InterestFormula::Simple),
            1 => Ok(InterestFormula::Compound),
            _ => Err(error!(ErrorCode::FormulaNotImplemented)),
        }
    }
}

/// The index of the period containing the given timestamp.
///
/// Periods are aligned to the unix epoch, so every timestamp on the network
/// maps to the same period index regardless of which loan is asking.
pub fn period_index(timestamp: UnixTimestamp, period_duration: i64) -> u64 {
    debug_assert!(period_duration > 0);
    debug_assert!(timestamp >= 0);

    (timestamp / period_duration) as u64
}

/// The number of whole periods between two timestamps (zero when `to`
/// precedes `from`).
pub fn periods_in_range(from: UnixTimestamp, to: UnixTimestamp, period_duration: i64) -> u64 {
    period_index(to.max(from), period_duration).saturating_sub(period_index(from, period_duration))
}

/// Computes the balance outstanding on `original_balance` after accruing
/// interest at the per-period `rate` (scaled by `rate_factor`) over
/// `periods` periods.
///
/// Zero periods is the identity: a loan queried at its own checkpoint must
/// show the checkpointed balance exactly. The final conversion back to an
/// integer amount rounds to nearest with ties up. Any value leaving the
/// fixed-point range is a hard `MathOverflow`.
pub fn outstanding_balance(
    original_balance: u64,
    periods: u64,
    rate: u64,
    rate_factor: u64,
    formula: InterestFormula,
) -> Result<u64> {
    if periods == 0 || original_balance == 0 {
        return Ok(original_balance);
    }
    require!(rate_factor > 0, ErrorCode::InvalidConfig);

    let periods = u32::try_from(periods).map_err(|_| error!(ErrorCode::MathOverflow))?;
    let rate = Number::from_ratio(rate, rate_factor);
    let balance = Number::from(original_balance);

    let grown = match formula {
        InterestFormula::Simple => {
            let interest = balance
                .checked_mul(rate)
                .and_then(|interest| interest.checked_mul(Number::from(periods as u64)))
                .ok_or(error!(ErrorCode::MathOverflow))?;
            balance
                .checked_add(interest)
                .ok_or(error!(ErrorCode::MathOverflow))?
        }
        InterestFormula::Compound => {
            let growth = (Number::ONE + rate)
                .checked_pow(periods)
                .ok_or(error!(ErrorCode::MathOverflow))?;
            balance
                .checked_mul(growth)
                .ok_or(error!(ErrorCode::MathOverflow))?
        }
    };

    grown
        .try_as_u64_rounded(0)
        .map_err(|_| error!(ErrorCode::MathOverflow))
}

/// Batch instructions take parallel arrays; a length skew is a caller bug
/// and must fail before any entry is processed.
pub fn validate_parallel_arrays(left: usize, right: usize) -> Result<()> {
    require!(left == right, ErrorCode::ArrayLengthMismatch);
    Ok(())
}

/// Check that `account` has delegated at least `amount` to `delegate`.
///
/// Reclaiming funds from a treasury or a borrower account is only possible
/// under a standing approval; without one the reversal must fail, not be
/// skipped.
pub fn validate_delegated_allowance(
    account: &TokenAccount,
    delegate: Pubkey,
    amount: u64,
) -> Result<()> {
    match account.delegate {
        COption::Some(approved) if approved == delegate => {
            require!(
                account.delegated_amount >= amount,
                ErrorCode::InsufficientAllowance
            );
        }
        _ => return err!(ErrorCode::InsufficientAllowance),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE_FACTOR: u64 = 1_000_000_000;

    #[test]
    fn zero_periods_is_identity() {
        for formula in [InterestFormula::Simple, InterestFormula::Compound] {
            assert_eq!(
                1_000_000,
                outstanding_balance(1_000_000, 0, 25_000_000, RATE_FACTOR, formula).unwrap()
            );
        }
    }

    #[test]
    fn zero_balance_stays_zero() {
        assert_eq!(
            0,
            outstanding_balance(0, 365, 25_000_000, RATE_FACTOR, InterestFormula::Compound)
                .unwrap()
        );
    }

    #[test]
    fn simple_interest_is_linear() {
        // 10% per period over 3 periods: 100 + 100 * 0.1 * 3
        let rate = RATE_FACTOR / 10;
        assert_eq!(
            130,
            outstanding_balance(100, 3, rate, RATE_FACTOR, InterestFormula::Simple).unwrap()
        );
    }

    #[test]
    fn compound_interest_squares() {
        // 10% per period over 2 periods: 1000 * 1.21
        let rate = RATE_FACTOR / 10;
        assert_eq!(
            1210,
            outstanding_balance(1000, 2, rate, RATE_FACTOR, InterestFormula::Compound).unwrap()
        );
    }

    #[test]
    fn rounding_is_nearest_ties_up() {
        // 50% on a single unit is exactly 1.5, which must round to 2
        let rate = RATE_FACTOR / 2;
        assert_eq!(
            2,
            outstanding_balance(1, 1, rate, RATE_FACTOR, InterestFormula::Simple).unwrap()
        );
    }

    #[test]
    fn compound_is_monotonic_in_periods() {
        let rate = 27_000_000; // 2.7% per period
        let mut last = 0;
        for periods in 0..=120 {
            let balance =
                outstanding_balance(5_000_000, periods, rate, RATE_FACTOR, InterestFormula::Compound)
                    .unwrap();
            assert!(balance >= last, "balance shrank at period {}", periods);
            last = balance;
        }
    }

    #[test]
    fn compound_overflow_is_fatal() {
        // 100% per period on the largest balance blows through the
        // representable range long before 600 periods
        assert!(outstanding_balance(
            u64::MAX,
            600,
            RATE_FACTOR,
            RATE_FACTOR,
            InterestFormula::Compound
        )
        .is_err());
    }

    #[test]
    fn zero_rate_factor_is_rejected() {
        assert!(
            outstanding_balance(100, 1, 1, 0, InterestFormula::Compound).is_err()
        );
    }

    #[test]
    fn unknown_formula_selector_is_rejected() {
        assert!(InterestFormula::try_from(0).is_ok());
        assert!(InterestFormula::try_from(1).is_ok());
        assert!(InterestFormula::try_from(2).is_err());
        assert!(InterestFormula::try_from(255).is_err());
    }

    #[test]
    fn closed_form_tracks_per_period_iteration() {
        // The reference strategy: apply the rate once per period, rounding
        // to an integer amount each time. Close to the closed form for
        // small period counts, but not identical in general.
        let rate = 40_000_000; // 4% per period
        let principal = 1_000_000u64;

        let mut iterated = principal;
        for periods in 1..=24u64 {
            let interest = (iterated as u128 * rate as u128 + RATE_FACTOR as u128 / 2)
                / RATE_FACTOR as u128;
            iterated += interest as u64;

            let closed = outstanding_balance(
                principal,
                periods,
                rate,
                RATE_FACTOR,
                InterestFormula::Compound,
            )
            .unwrap();

            let diff = closed.abs_diff(iterated);
            assert!(
                diff <= periods,
                "strategies drifted apart at period {}: {} vs {}",
                periods,
                closed,
                iterated
            );
        }
    }

    #[test]
    fn period_index_is_epoch_aligned() {
        assert_eq!(0, period_index(0, SECONDS_PER_DAY));
        assert_eq!(0, period_index(SECONDS_PER_DAY - 1, SECONDS_PER_DAY));
        assert_eq!(1, period_index(SECONDS_PER_DAY, SECONDS_PER_DAY));
        assert_eq!(365, period_index(SECONDS_PER_YEAR, SECONDS_PER_DAY));
    }

    #[test]
    fn periods_in_range_saturates() {
        assert_eq!(3, periods_in_range(0, 3 * SECONDS_PER_DAY, SECONDS_PER_DAY));
        assert_eq!(0, periods_in_range(3 * SECONDS_PER_DAY, 0, SECONDS_PER_DAY));
    }

    #[test]
    fn parallel_array_validation() {
        assert!(validate_parallel_arrays(3, 3).is_ok());
        assert!(validate_parallel_arrays(3, 2).is_err());
    }
}
