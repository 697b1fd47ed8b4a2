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
use arbor_program_common::Number;

#[cfg(any(test, feature = "no-entrypoint"))]
use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};

use crate::util::{outstanding_balance, period_index, InterestFormula};
use crate::ErrorCode;

/// Account holding the administrative scope for a set of lending pools:
/// the authority role, the pause switch and the loan identifier sequence.
#[account]
#[derive(Default, Debug)]
pub struct Market {
    pub version: u8,

    /// The administrator: the only identity allowed to configure pools and
    /// borrowers, service loans, and move pool funds
    pub authority: Pubkey,

    /// Space for binary settings
    pub flags: u64,

    /// The next loan identifier; loan ids are assigned monotonically and
    /// never reused
    pub loan_count: u64,
}

impl Market {
    pub fn flags(&self) -> MarketFlags {
        MarketFlags::from_bits_truncate(self.flags)
    }

    /// Every loan lifecycle operation checks this before touching state.
    pub fn assert_not_paused(&self) -> Result<()> {
        if self.flags().contains(MarketFlags::PAUSED) {
            msg!("the market is currently paused");
            return err!(ErrorCode::OperationsPaused);
        }

        Ok(())
    }
}

bitflags::bitflags! {
    pub struct MarketFlags: u64 {
        /// All loan lifecycle operations are halted
        const PAUSED = 1 << 0;
    }
}

/// How a pool handles addon amounts collected at loan origination.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "no-entrypoint", test),
    derive(Serialize, Deserialize)
)]
pub enum AddonMode {
    /// Addon amounts rest inside the pool's own `addons` balance until the
    /// owner withdraws them
    #[default]
    Retention,

    /// Addon amounts move to an external treasury on every take, and are
    /// reclaimed from it on revocation
    Transfer,
}

impl TryFrom<u8> for AddonMode {
    type Error = anchor_lang::error::Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(AddonMode::Retention),
            1 => Ok(AddonMode::Transfer),
            _ => Err(error!(ErrorCode::InvalidConfig)),
        }
    }
}

/// Configuration for a lending pool
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "no-entrypoint", test),
    derive(Serialize, Deserialize)
)]
pub struct PoolConfig {
    /// Seconds in one loan period, the discretization unit for interest
    pub period_duration: i64,

    /// The scaling factor for stored interest rates: a stored rate `r`
    /// means a fractional per-period rate of `r / interest_rate_factor`
    pub interest_rate_factor: u64,

    /// How many periods after origination a loan may still be revoked
    pub cooldown_periods: u32,

    /// Addon handling; switchable only Retention -> Transfer
    pub addon_mode: AddonMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            period_duration: crate::util::SECONDS_PER_DAY,
            interest_rate_factor: 1_000_000_000,
            cooldown_periods: 0,
            addon_mode: AddonMode::Retention,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        require!(self.period_duration > 0, ErrorCode::InvalidConfig);
        require!(self.interest_rate_factor > 0, ErrorCode::InvalidConfig);

        Ok(())
    }
}

/// Tokens that must move to settle a revocation, computed by the pool
/// alongside its balance adjustments.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RevocationSettlement {
    /// Amount the borrower still owes back to the vault
    pub shortfall: u64,

    /// Amount the vault refunds to the borrower (over-repaid loans)
    pub refund: u64,
}

/// Account containing the funding-side ledger of one capital source: the
/// balance available for lending and the addon fees it retains.
#[account]
#[derive(Default, Debug)]
pub struct Pool {
    pub version: u8,

    /// The bump seed used to create the pool address
    pub pool_bump: [u8; 1],

    /// The market this pool belongs to
    pub market: Pubkey,

    /// The token the pool lends
    pub token_mint: Pubkey,

    /// The token account with custody of the pool's funds
    pub vault: Pubkey,

    /// The external addon destination; only consulted in Transfer mode
    pub treasury: Pubkey,

    /// The configuration of the pool
    pub config: PoolConfig,

    /// Funds available to be lent
    pub borrowable: u64,

    /// Addon fees collected and retained (Retention mode only)
    pub addons: u64,
}

impl Pool {
    /// Get the seeds needed to sign for the vault
    pub fn signer_seeds(&self) -> [&[u8]; 3] {
        [
            self.market.as_ref(),
            self.token_mint.as_ref(),
            self.pool_bump.as_ref(),
        ]
    }

    /// Record funds added to the pool
    pub fn deposit(&mut self, amount: u64) -> Result<()> {
        self.borrowable = self
            .borrowable
            .checked_add(amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        Ok(())
    }

    /// Record an owner withdrawal covering both balances.
    ///
    /// All-or-nothing: both balances are checked before either is touched,
    /// so a failure leaves the pool exactly as it was. Returns the total
    /// token amount leaving the vault.
    pub fn withdraw(&mut self, borrowable_amount: u64, addon_amount: u64) -> Result<u64> {
        if borrowable_amount > self.borrowable || addon_amount > self.addons {
            msg!(
                "withdrawal of ({}, {}) exceeds balances ({}, {})",
                borrowable_amount,
                addon_amount,
                self.borrowable,
                self.addons
            );
            return err!(ErrorCode::InsufficientBalance);
        }

        self.borrowable -= borrowable_amount;
        self.addons -= addon_amount;

        borrowable_amount
            .checked_add(addon_amount)
            .ok_or(error!(ErrorCode::MathOverflow))
    }

    /// Record a loan leaving the pool: the borrowable balance drops by the
    /// full principal plus addon, and in Retention mode the addon share is
    /// parked in the addons balance.
    pub fn on_loan_taken(&mut self, borrow_amount: u64, addon_amount: u64) -> Result<()> {
        let total = borrow_amount
            .checked_add(addon_amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        let borrowable = self
            .borrowable
            .checked_sub(total)
            .ok_or(error!(ErrorCode::InsufficientBalance))?;
        let addons = match self.config.addon_mode {
            AddonMode::Retention => self
                .addons
                .checked_add(addon_amount)
                .ok_or(error!(ErrorCode::MathOverflow))?,
            AddonMode::Transfer => self.addons,
        };

        self.borrowable = borrowable;
        self.addons = addons;

        Ok(())
    }

    /// Record a repayment arriving in the vault
    pub fn on_loan_repaid(&mut self, amount: u64) -> Result<()> {
        self.borrowable = self
            .borrowable
            .checked_add(amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        Ok(())
    }

    /// Reverse a loan's effect on the pool as if it never existed.
    ///
    /// The signed correction is `borrow_amount - repaid_amount`: positive
    /// when the borrower still owes the difference back, negative when the
    /// loan was over-repaid and the pool owes a refund. The addon reversal
    /// depends on the addon mode. The two branches are exhaustive; getting
    /// a sign wrong here silently drains or inflates the pool.
    pub fn on_loan_revoked(
        &mut self,
        borrow_amount: u64,
        repaid_amount: u64,
        addon_amount: u64,
    ) -> Result<RevocationSettlement> {
        let mut borrowable = if repaid_amount < borrow_amount {
            self.borrowable
                .checked_add(borrow_amount - repaid_amount)
                .ok_or(error!(ErrorCode::MathOverflow))?
        } else {
            self.borrowable
                .checked_sub(repaid_amount - borrow_amount)
                .ok_or(error!(ErrorCode::InsufficientBalance))?
        };

        let addons = match self.config.addon_mode {
            AddonMode::Retention => self
                .addons
                .checked_sub(addon_amount)
                .ok_or(error!(ErrorCode::InsufficientBalance))?,
            AddonMode::Transfer => self.addons,
        };
        borrowable = borrowable
            .checked_add(addon_amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        self.borrowable = borrowable;
        self.addons = addons;

        Ok(RevocationSettlement {
            shortfall: borrow_amount.saturating_sub(repaid_amount),
            refund: repaid_amount.saturating_sub(borrow_amount),
        })
    }

    /// Apply a new configuration, holding the addon mode to its one-way
    /// rule: funds already sent to an external treasury cannot be stranded
    /// by flipping back to Retention.
    pub fn apply_config(&mut self, config: PoolConfig) -> Result<()> {
        config.validate()?;

        if self.config.addon_mode == AddonMode::Transfer
            && config.addon_mode == AddonMode::Retention
        {
            return err!(ErrorCode::AddonModeImmutable);
        }

        self.config = config;

        Ok(())
    }
}

#[cfg(any(test, feature = "no-entrypoint"))]
impl Serialize for Pool {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Pool", 7)?;
        s.serialize_field("version", &self.version)?;
        s.serialize_field("market", &self.market.to_string())?;
        s.serialize_field("tokenMint", &self.token_mint.to_string())?;
        s.serialize_field("vault", &self.vault.to_string())?;
        s.serialize_field("treasury", &self.treasury.to_string())?;
        s.serialize_field("borrowable", &self.borrowable)?;
        s.serialize_field("addons", &self.addons)?;
        // config is omitted here; off-chain consumers read it directly
        s.end()
    }
}

/// How a borrower's credit limit changes after each loan taken.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "no-entrypoint", test),
    derive(Serialize, Deserialize)
)]
pub enum BorrowPolicy {
    /// The limit is unchanged
    #[default]
    Keep,

    /// The limit drops to zero; the borrower must be reconfigured before
    /// borrowing again
    Reset,

    /// The limit drops by the amount taken, floored at zero
    Decrease,

    /// The limit drops by the amount taken and is restored when the loan
    /// settles (a revolving limit)
    DecreaseIncrease,
}

impl TryFrom<u8> for BorrowPolicy {
    type Error = anchor_lang::error::Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(BorrowPolicy::Keep),
            1 => Ok(BorrowPolicy::Reset),
            2 => Ok(BorrowPolicy::Decrease),
            3 => Ok(BorrowPolicy::DecreaseIncrease),
            _ => Err(error!(ErrorCode::InvalidConfig)),
        }
    }
}

/// Account holding one borrower's lending terms on one pool.
#[account]
#[derive(Default, Debug)]
pub struct BorrowerConfig {
    /// The bump seed used to create this account's address
    pub bump: [u8; 1],

    /// The pool these terms apply to
    pub pool: Pubkey,

    /// The borrower these terms apply to
    pub borrower: Pubkey,

    pub min_borrow_amount: u64,
    pub max_borrow_amount: u64,

    pub min_duration_periods: u32,
    pub max_duration_periods: u32,

    /// Per-period rate applied up to the loan's due period
    pub interest_rate_primary: u64,

    /// Per-period rate applied beyond the due period (overdue accrual)
    pub interest_rate_secondary: u64,

    /// Addon fee charged at origination, as a rate on the borrow amount
    pub addon_rate: u64,

    pub interest_formula: InterestFormula,
    pub borrow_policy: BorrowPolicy,

    /// The configuration is unusable past this timestamp
    pub expiration: UnixTimestamp,
}

impl BorrowerConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.min_borrow_amount <= self.max_borrow_amount,
            ErrorCode::InvalidConfig
        );
        require!(
            self.min_duration_periods <= self.max_duration_periods,
            ErrorCode::InvalidConfig
        );

        Ok(())
    }

    /// An expired configuration fails every validation, independent of the
    /// amount and duration checks.
    pub fn validate_expiration(&self, timestamp: UnixTimestamp) -> Result<()> {
        require!(self.expiration >= timestamp, ErrorCode::ConfigurationExpired);

        Ok(())
    }

    pub fn validate_amount(&self, amount: u64) -> Result<()> {
        if amount == 0 || amount < self.min_borrow_amount || amount > self.max_borrow_amount {
            msg!(
                "amount {} outside [{}, {}]",
                amount,
                self.min_borrow_amount,
                self.max_borrow_amount
            );
            return err!(ErrorCode::InvalidAmount);
        }

        Ok(())
    }

    pub fn validate_duration(&self, duration_periods: u32) -> Result<()> {
        if duration_periods < self.min_duration_periods
            || duration_periods > self.max_duration_periods
        {
            return err!(ErrorCode::DurationOutOfRange);
        }

        Ok(())
    }

    pub fn validate_terms(
        &self,
        amount: u64,
        duration_periods: u32,
        timestamp: UnixTimestamp,
    ) -> Result<()> {
        self.validate_expiration(timestamp)?;
        self.validate_amount(amount)?;
        self.validate_duration(duration_periods)?;

        Ok(())
    }

    /// The addon fee for a loan of `borrow_amount`, rounded to nearest.
    pub fn addon_amount(&self, borrow_amount: u64, rate_factor: u64) -> Result<u64> {
        if self.addon_rate == 0 {
            return Ok(0);
        }

        Number::from(borrow_amount)
            .checked_mul(Number::from_ratio(self.addon_rate, rate_factor))
            .ok_or(error!(ErrorCode::MathOverflow))?
            .try_as_u64_rounded(0)
            .map_err(|_| error!(ErrorCode::MathOverflow))
    }

    /// Apply the borrow policy after a loan is taken
    pub fn on_loan_taken(&mut self, borrow_amount: u64) {
        match self.borrow_policy {
            BorrowPolicy::Keep => {}
            BorrowPolicy::Reset => self.max_borrow_amount = 0,
            BorrowPolicy::Decrease | BorrowPolicy::DecreaseIncrease => {
                self.max_borrow_amount = self.max_borrow_amount.saturating_sub(borrow_amount);
            }
        }
    }

    /// Apply the borrow policy after a loan fully settles (full repayment
    /// or revocation); only the revolving policy reacts.
    pub fn on_loan_settled(&mut self, borrow_amount: u64) {
        if self.borrow_policy == BorrowPolicy::DecreaseIncrease {
            self.max_borrow_amount = self.max_borrow_amount.saturating_add(borrow_amount);
        }
    }
}

/// Lifecycle state of a loan.
///
/// Nonexistent -> Active -> {Repaid, Frozen, Defaulted, Recovered};
/// Frozen -> Active or -> Repaid. Recovered is reached only through
/// revocation inside the cooldown window.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "no-entrypoint", test),
    derive(Serialize, Deserialize)
)]
pub enum LoanStatus {
    #[default]
    Active,
    Frozen,
    Repaid,
    Defaulted,
    Recovered,
}

/// A point-in-time view of a loan's accrual state.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoanPreview {
    /// The period index of the timestamp the preview was computed for
    pub period_index: u64,

    /// The checkpointed balance
    pub tracked_balance: u64,

    /// The balance outstanding at the preview timestamp
    pub outstanding_balance: u64,
}

/// Aggregate preview over the members of one installment loan.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstallmentPreview {
    pub first_installment_id: u64,
    pub installment_count: u16,
    pub period_index: u64,
    pub total_tracked_balance: u64,
    pub total_outstanding_balance: u64,
}

/// Account containing one loan's terms and accrual state. Created at
/// origination and retained forever as audit state.
#[account]
#[derive(Default, Debug)]
pub struct Loan {
    /// The monotonically assigned loan identifier
    pub id: u64,

    pub market: Pubkey,

    /// The capital source this loan was taken against
    pub pool: Pubkey,

    pub borrower: Pubkey,

    /// The bump seed used to create the loan address
    pub bump: [u8; 1],

    pub status: LoanStatus,

    pub interest_formula: InterestFormula,

    /// The scheduled life of the loan, in periods; immutable
    pub duration_periods: u32,

    /// Principal lent to the borrower, excluding the addon; immutable
    pub borrow_amount: u64,

    /// The addon fee charged at origination; immutable
    pub addon_amount: u64,

    pub interest_rate_primary: u64,
    pub interest_rate_secondary: u64,

    pub start_timestamp: UnixTimestamp,

    /// The timestamp the tracked balance was checkpointed at
    pub tracked_timestamp: UnixTimestamp,

    /// Non-zero while interest accrual is frozen at that timestamp
    pub freeze_timestamp: UnixTimestamp,

    /// The checkpointed accrued balance. Outstanding balance is always
    /// recomputed from this checkpoint, never drifted incrementally.
    pub tracked_balance: u64,

    /// Cumulative amount repaid over the loan's life
    pub repaid_amount: u64,

    /// First member id of the installment group this loan belongs to
    pub first_installment_id: u64,

    /// Number of members in the installment group; zero for a standalone
    /// loan
    pub installment_count: u16,
}

impl Loan {
    /// Whether the loan is in a state that still accepts repayment
    pub fn is_open(&self) -> bool {
        matches!(self.status, LoanStatus::Active | LoanStatus::Frozen)
    }

    /// The period index after which the secondary (overdue) rate applies
    pub fn due_period(&self, config: &PoolConfig) -> u64 {
        period_index(self.start_timestamp, config.period_duration) + self.duration_periods as u64
    }

    /// The balance outstanding at `timestamp`, recomputed from the tracked
    /// checkpoint.
    ///
    /// A frozen loan accrues nothing past its freeze timestamp. Periods up
    /// to the due period accrue at the primary rate, later ones at the
    /// secondary rate.
    pub fn outstanding_at(&self, config: &PoolConfig, timestamp: UnixTimestamp) -> Result<u64> {
        let as_of = if self.freeze_timestamp != 0 {
            timestamp.min(self.freeze_timestamp)
        } else {
            timestamp
        };
        let as_of = as_of.max(self.tracked_timestamp);

        let tracked_period = period_index(self.tracked_timestamp, config.period_duration);
        let current_period = period_index(as_of, config.period_duration);
        let due_period = self.due_period(config);

        if current_period <= due_period {
            return outstanding_balance(
                self.tracked_balance,
                current_period - tracked_period,
                self.interest_rate_primary,
                config.interest_rate_factor,
                self.interest_formula,
            );
        }

        let primary_periods = due_period.saturating_sub(tracked_period);
        let overdue_periods = current_period - due_period.max(tracked_period);

        let balance_at_due = outstanding_balance(
            self.tracked_balance,
            primary_periods,
            self.interest_rate_primary,
            config.interest_rate_factor,
            self.interest_formula,
        )?;
        outstanding_balance(
            balance_at_due,
            overdue_periods,
            self.interest_rate_secondary,
            config.interest_rate_factor,
            self.interest_formula,
        )
    }

    /// A point-in-time view of the loan's accrual state
    pub fn preview(&self, config: &PoolConfig, timestamp: UnixTimestamp) -> Result<LoanPreview> {
        Ok(LoanPreview {
            period_index: period_index(timestamp, config.period_duration),
            tracked_balance: self.tracked_balance,
            outstanding_balance: self.outstanding_at(config, timestamp)?,
        })
    }

    /// Apply a payment against the outstanding balance.
    ///
    /// `u64::MAX` means full settlement; any other amount above the
    /// outstanding balance is rejected rather than refunded. Returns the
    /// amount actually applied.
    pub fn repay(
        &mut self,
        config: &PoolConfig,
        amount: u64,
        timestamp: UnixTimestamp,
    ) -> Result<u64> {
        if !self.is_open() {
            return err!(ErrorCode::LoanNotActive);
        }

        let outstanding = self.outstanding_at(config, timestamp)?;
        let amount = if amount == u64::MAX {
            outstanding
        } else {
            amount
        };

        require!(amount > 0, ErrorCode::InvalidAmount);
        require!(
            amount <= outstanding,
            ErrorCode::RepaymentExceedsOutstanding
        );

        let repaid_amount = self
            .repaid_amount
            .checked_add(amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        self.tracked_balance = outstanding - amount;
        self.tracked_timestamp = if self.freeze_timestamp != 0 {
            self.freeze_timestamp
        } else {
            timestamp
        };
        self.repaid_amount = repaid_amount;

        if self.tracked_balance == 0 {
            self.status = LoanStatus::Repaid;
        }

        Ok(amount)
    }

    /// Halt interest accrual at `timestamp`
    pub fn freeze(&mut self, timestamp: UnixTimestamp) -> Result<()> {
        match self.status {
            LoanStatus::Active => {}
            LoanStatus::Frozen => return err!(ErrorCode::LoanAlreadyFrozen),
            _ => return err!(ErrorCode::LoanNotActive),
        }

        self.freeze_timestamp = timestamp;
        self.status = LoanStatus::Frozen;

        Ok(())
    }

    /// Resume interest accrual, excising the frozen interval from the
    /// period calculation.
    ///
    /// The tracked balance is recomputed up to the freeze timestamp, then
    /// the checkpoint and the loan's start shift forward by the whole
    /// periods spent frozen, so the frozen interval contributes zero
    /// periods and the due period keeps its alignment.
    pub fn unfreeze(&mut self, config: &PoolConfig, timestamp: UnixTimestamp) -> Result<()> {
        if self.status != LoanStatus::Frozen {
            return err!(ErrorCode::LoanNotFrozen);
        }

        let frozen_periods = crate::util::periods_in_range(
            self.freeze_timestamp,
            timestamp,
            config.period_duration,
        );
        let shift = (frozen_periods as i64)
            .checked_mul(config.period_duration)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        self.tracked_balance = self.outstanding_at(config, self.freeze_timestamp)?;
        self.tracked_timestamp = self.freeze_timestamp + shift;
        self.start_timestamp += shift;
        self.freeze_timestamp = 0;
        self.status = LoanStatus::Active;

        Ok(())
    }

    /// Check that the loan may still be revoked at `timestamp`
    pub fn assert_revocable(&self, config: &PoolConfig, timestamp: UnixTimestamp) -> Result<()> {
        match self.status {
            LoanStatus::Active | LoanStatus::Frozen | LoanStatus::Repaid => {}
            _ => return err!(ErrorCode::LoanNotActive),
        }

        let start_period = period_index(self.start_timestamp, config.period_duration);
        let current_period = period_index(timestamp, config.period_duration);

        if current_period >= start_period + config.cooldown_periods as u64 {
            return err!(ErrorCode::CooldownExpired);
        }

        Ok(())
    }

    /// Void the loan as if it never existed; the pool settlement is
    /// computed separately by [Pool::on_loan_revoked].
    pub fn revoke(&mut self, timestamp: UnixTimestamp) {
        self.status = LoanStatus::Recovered;
        self.tracked_balance = 0;
        self.tracked_timestamp = timestamp;
        self.freeze_timestamp = 0;
    }

    /// Administrative default mark on an active loan
    pub fn mark_defaulted(&mut self) -> Result<()> {
        if self.status != LoanStatus::Active {
            return err!(ErrorCode::LoanNotActive);
        }

        self.status = LoanStatus::Defaulted;

        Ok(())
    }
}

/// Aggregate the members of one installment group into a single preview.
///
/// `loans` must be the complete group in id order, starting at the anchor
/// member; any gap, reordering or foreign record fails the whole preview.
pub fn installment_preview(
    loans: &[Loan],
    config: &PoolConfig,
    timestamp: UnixTimestamp,
) -> Result<InstallmentPreview> {
    let first = loans.first().ok_or(error!(ErrorCode::InvalidInstallmentMember))?;
    require!(
        first.installment_count as usize == loans.len() && first.id == first.first_installment_id,
        ErrorCode::InvalidInstallmentMember
    );

    let mut total_tracked: u64 = 0;
    let mut total_outstanding: u64 = 0;

    for (offset, loan) in loans.iter().enumerate() {
        require!(
            loan.first_installment_id == first.first_installment_id
                && loan.id == first.id + offset as u64
                && loan.installment_count == first.installment_count,
            ErrorCode::InvalidInstallmentMember
        );

        total_tracked = total_tracked
            .checked_add(loan.tracked_balance)
            .ok_or(error!(ErrorCode::MathOverflow))?;
        total_outstanding = total_outstanding
            .checked_add(loan.outstanding_at(config, timestamp)?)
            .ok_or(error!(ErrorCode::MathOverflow))?;
    }

    Ok(InstallmentPreview {
        first_installment_id: first.first_installment_id,
        installment_count: first.installment_count,
        period_index: period_index(timestamp, config.period_duration),
        total_tracked_balance: total_tracked,
        total_outstanding_balance: total_outstanding,
    })
}

#[cfg(test)]
mod tests {
    use serde_test::{assert_ser_tokens, Token};

    use super::*;
    use crate::util::SECONDS_PER_DAY;

    const RATE_FACTOR: u64 = 1_000_000_000;
    const DAY: i64 = SECONDS_PER_DAY;

    fn test_config() -> PoolConfig {
        PoolConfig {
            period_duration: DAY,
            interest_rate_factor: RATE_FACTOR,
            cooldown_periods: 3,
            addon_mode: AddonMode::Retention,
        }
    }

    fn test_pool(borrowable: u64) -> Pool {
        Pool {
            config: test_config(),
            borrowable,
            ..Pool::default()
        }
    }

    fn test_borrower_config() -> BorrowerConfig {
        BorrowerConfig {
            min_borrow_amount: 10,
            max_borrow_amount: 10_000,
            min_duration_periods: 1,
            max_duration_periods: 365,
            interest_rate_primary: 10_000_000,   // 1% per period
            interest_rate_secondary: 30_000_000, // 3% per period
            addon_rate: 100_000_000,             // 10% of principal
            interest_formula: InterestFormula::Compound,
            borrow_policy: BorrowPolicy::Keep,
            expiration: i64::MAX,
            ..BorrowerConfig::default()
        }
    }

    fn test_loan(borrow_amount: u64, addon_amount: u64, duration_periods: u32) -> Loan {
        Loan {
            id: 0,
            status: LoanStatus::Active,
            interest_formula: InterestFormula::Compound,
            duration_periods,
            borrow_amount,
            addon_amount,
            interest_rate_primary: 10_000_000,
            interest_rate_secondary: 30_000_000,
            start_timestamp: 0,
            tracked_timestamp: 0,
            tracked_balance: borrow_amount + addon_amount,
            ..Loan::default()
        }
    }

    // ------------------------------------------------------------------
    // Pool accounting
    // ------------------------------------------------------------------

    #[test]
    fn take_debits_principal_plus_addon() {
        let mut pool = test_pool(1_000);

        pool.on_loan_taken(100, 10).unwrap();
        assert_eq!(890, pool.borrowable);
        assert_eq!(10, pool.addons);

        pool.on_loan_repaid(30).unwrap();
        assert_eq!(920, pool.borrowable);
    }

    #[test]
    fn take_exceeding_borrowable_fails() {
        let mut pool = test_pool(100);

        assert!(pool.on_loan_taken(95, 10).is_err());
        assert_eq!(100, pool.borrowable);
        assert_eq!(0, pool.addons);
    }

    #[test]
    fn transfer_mode_keeps_addons_out_of_pool() {
        let mut pool = test_pool(1_000);
        pool.config.addon_mode = AddonMode::Transfer;

        pool.on_loan_taken(100, 10).unwrap();
        assert_eq!(890, pool.borrowable);
        assert_eq!(0, pool.addons);
    }

    #[test]
    fn revocation_reverses_pool_effects_exactly() {
        // borrow 100, addon 10, repaid 30 in retention mode: borrowable
        // gains 100 - 30 + 10 = 80, addons give back the 10
        let mut pool = test_pool(1_000);
        pool.on_loan_taken(100, 10).unwrap();
        pool.on_loan_repaid(30).unwrap();
        assert_eq!(920, pool.borrowable);
        assert_eq!(10, pool.addons);

        let settlement = pool.on_loan_revoked(100, 30, 10).unwrap();

        assert_eq!(1_000, pool.borrowable);
        assert_eq!(0, pool.addons);
        assert_eq!(
            RevocationSettlement {
                shortfall: 70,
                refund: 0
            },
            settlement
        );
    }

    #[test]
    fn revocation_of_over_repaid_loan_refunds() {
        let mut pool = test_pool(1_000);
        pool.on_loan_taken(100, 10).unwrap();
        // repaid principal plus accrued interest
        pool.on_loan_repaid(130).unwrap();

        let settlement = pool.on_loan_revoked(100, 130, 10).unwrap();

        // net across the whole lifecycle is zero
        assert_eq!(1_000, pool.borrowable);
        assert_eq!(0, pool.addons);
        assert_eq!(
            RevocationSettlement {
                shortfall: 0,
                refund: 30
            },
            settlement
        );
    }

    #[test]
    fn revocation_at_exact_repayment_boundary() {
        let mut pool = test_pool(1_000);
        pool.on_loan_taken(100, 10).unwrap();
        pool.on_loan_repaid(100).unwrap();

        let settlement = pool.on_loan_revoked(100, 100, 10).unwrap();

        // only the addon moves
        assert_eq!(1_000, pool.borrowable);
        assert_eq!(0, pool.addons);
        assert_eq!(RevocationSettlement::default(), settlement);
    }

    #[test]
    fn revocation_in_transfer_mode_books_reclaimed_addon() {
        let mut pool = test_pool(1_000);
        pool.config.addon_mode = AddonMode::Transfer;
        pool.on_loan_taken(100, 10).unwrap();

        pool.on_loan_revoked(100, 0, 10).unwrap();

        assert_eq!(1_000, pool.borrowable);
        assert_eq!(0, pool.addons);
    }

    #[test]
    fn withdraw_is_atomic_over_both_balances() {
        let mut pool = test_pool(500);
        pool.addons = 50;

        // addon side exceeds its balance, so neither moves
        assert!(pool.withdraw(100, 60).is_err());
        assert_eq!(500, pool.borrowable);
        assert_eq!(50, pool.addons);

        // borrowable side exceeds its balance, so neither moves
        assert!(pool.withdraw(600, 10).is_err());
        assert_eq!(500, pool.borrowable);
        assert_eq!(50, pool.addons);

        assert_eq!(150, pool.withdraw(100, 50).unwrap());
        assert_eq!(400, pool.borrowable);
        assert_eq!(0, pool.addons);
    }

    #[test]
    fn addon_mode_switch_is_one_way() {
        let mut pool = test_pool(0);

        let mut transfer = pool.config;
        transfer.addon_mode = AddonMode::Transfer;
        pool.apply_config(transfer).unwrap();

        let mut back = pool.config;
        back.addon_mode = AddonMode::Retention;
        assert!(pool.apply_config(back).is_err());
        assert_eq!(AddonMode::Transfer, pool.config.addon_mode);
    }

    #[test]
    fn pool_serialization() {
        let pool = Pool::default();
        assert_ser_tokens(
            &pool,
            &[
                Token::Struct {
                    name: "Pool",
                    len: 7,
                },
                Token::Str("version"),
                Token::U8(0),
                Token::Str("market"),
                Token::Str("11111111111111111111111111111111"),
                Token::Str("tokenMint"),
                Token::Str("11111111111111111111111111111111"),
                Token::Str("vault"),
                Token::Str("11111111111111111111111111111111"),
                Token::Str("treasury"),
                Token::Str("11111111111111111111111111111111"),
                Token::Str("borrowable"),
                Token::U64(0),
                Token::Str("addons"),
                Token::U64(0),
                Token::StructEnd,
            ],
        );
    }

    // ------------------------------------------------------------------
    // Credit policy
    // ------------------------------------------------------------------

    #[test]
    fn expired_config_fails_before_everything_else() {
        let mut config = test_borrower_config();
        config.expiration = 1_000;

        // amount and duration are both valid, the expiry still wins
        assert!(config.validate_terms(100, 30, 1_001).is_err());
        assert!(config.validate_terms(100, 30, 1_000).is_ok());
    }

    #[test]
    fn amount_bounds() {
        let config = test_borrower_config();

        assert!(config.validate_amount(0).is_err());
        assert!(config.validate_amount(9).is_err());
        assert!(config.validate_amount(10).is_ok());
        assert!(config.validate_amount(10_000).is_ok());
        assert!(config.validate_amount(10_001).is_err());
    }

    #[test]
    fn duration_bounds() {
        let config = test_borrower_config();

        assert!(config.validate_duration(0).is_err());
        assert!(config.validate_duration(1).is_ok());
        assert!(config.validate_duration(365).is_ok());
        assert!(config.validate_duration(366).is_err());
    }

    #[test]
    fn addon_amount_is_rounded_to_nearest() {
        let mut config = test_borrower_config();

        assert_eq!(10, config.addon_amount(100, RATE_FACTOR).unwrap());

        // 10% of 15 is 1.5, ties round up
        assert_eq!(2, config.addon_amount(15, RATE_FACTOR).unwrap());

        config.addon_rate = 0;
        assert_eq!(0, config.addon_amount(100, RATE_FACTOR).unwrap());
    }

    #[test]
    fn borrow_policy_keep_and_reset() {
        let mut config = test_borrower_config();
        config.borrow_policy = BorrowPolicy::Keep;
        config.on_loan_taken(100);
        assert_eq!(10_000, config.max_borrow_amount);

        config.borrow_policy = BorrowPolicy::Reset;
        config.on_loan_taken(100);
        assert_eq!(0, config.max_borrow_amount);
    }

    #[test]
    fn borrow_policy_decrease_floors_at_zero() {
        let mut config = test_borrower_config();
        config.borrow_policy = BorrowPolicy::Decrease;

        config.on_loan_taken(100);
        assert_eq!(9_900, config.max_borrow_amount);

        // settlement does not restore a plain Decrease policy
        config.on_loan_settled(100);
        assert_eq!(9_900, config.max_borrow_amount);

        config.on_loan_taken(50_000);
        assert_eq!(0, config.max_borrow_amount);
    }

    #[test]
    fn borrow_policy_decrease_increase_revolves() {
        let mut config = test_borrower_config();
        config.borrow_policy = BorrowPolicy::DecreaseIncrease;

        config.on_loan_taken(100);
        assert_eq!(9_900, config.max_borrow_amount);

        config.on_loan_settled(100);
        assert_eq!(10_000, config.max_borrow_amount);
    }

    #[test]
    fn unknown_policy_discriminants_are_rejected() {
        assert!(BorrowPolicy::try_from(3).is_ok());
        assert!(BorrowPolicy::try_from(4).is_err());
        assert!(AddonMode::try_from(2).is_err());
    }

    // ------------------------------------------------------------------
    // Loan lifecycle
    // ------------------------------------------------------------------

    #[test]
    fn addon_accrues_interest_from_origination() {
        let config = test_config();
        let loan = test_loan(1_000, 100, 30);

        assert_eq!(1_100, loan.tracked_balance);
        // one period of 1% on principal plus addon
        assert_eq!(1_111, loan.outstanding_at(&config, DAY).unwrap());
    }

    #[test]
    fn outstanding_at_checkpoint_is_exact() {
        let config = test_config();
        let loan = test_loan(1_000, 0, 30);

        assert_eq!(1_000, loan.outstanding_at(&config, 0).unwrap());
        // sub-period queries stay in period zero
        assert_eq!(1_000, loan.outstanding_at(&config, DAY - 1).unwrap());
    }

    #[test]
    fn secondary_rate_applies_past_due_period() {
        let config = test_config();
        let loan = test_loan(1_000_000, 0, 5);

        let at_due = loan.outstanding_at(&config, 5 * DAY).unwrap();
        let expected_at_due = outstanding_balance(
            1_000_000,
            5,
            loan.interest_rate_primary,
            RATE_FACTOR,
            InterestFormula::Compound,
        )
        .unwrap();
        assert_eq!(expected_at_due, at_due);

        let overdue = loan.outstanding_at(&config, 8 * DAY).unwrap();
        let expected_overdue = outstanding_balance(
            expected_at_due,
            3,
            loan.interest_rate_secondary,
            RATE_FACTOR,
            InterestFormula::Compound,
        )
        .unwrap();
        assert_eq!(expected_overdue, overdue);
        assert!(overdue > at_due);
    }

    #[test]
    fn repay_partial_then_full() {
        let config = test_config();
        let mut loan = test_loan(1_000, 0, 30);

        // two periods of 1%: 1020 (1000 * 1.0201 rounds to 1020)
        let outstanding = loan.outstanding_at(&config, 2 * DAY).unwrap();
        assert_eq!(1_020, outstanding);

        assert_eq!(300, loan.repay(&config, 300, 2 * DAY).unwrap());
        assert_eq!(720, loan.tracked_balance);
        assert_eq!(2 * DAY, loan.tracked_timestamp);
        assert_eq!(300, loan.repaid_amount);
        assert_eq!(LoanStatus::Active, loan.status);

        // full settlement sentinel
        assert_eq!(720, loan.repay(&config, u64::MAX, 2 * DAY).unwrap());
        assert_eq!(0, loan.tracked_balance);
        assert_eq!(LoanStatus::Repaid, loan.status);
        assert_eq!(1_020, loan.repaid_amount);

        // a settled loan accepts no further payment
        assert!(loan.repay(&config, 1, 3 * DAY).is_err());
    }

    #[test]
    fn repay_rejects_zero_and_excess() {
        let config = test_config();
        let mut loan = test_loan(1_000, 0, 30);

        assert!(loan.repay(&config, 0, 0).is_err());
        assert!(loan.repay(&config, 1_001, 0).is_err());
        assert_eq!(1_000, loan.tracked_balance);
        assert_eq!(0, loan.repaid_amount);
    }

    #[test]
    fn freeze_stops_accrual() {
        let config = test_config();
        let mut loan = test_loan(1_000_000, 0, 30);

        let at_freeze = loan.outstanding_at(&config, 2 * DAY).unwrap();
        loan.freeze(2 * DAY).unwrap();

        assert_eq!(LoanStatus::Frozen, loan.status);
        assert_eq!(
            at_freeze,
            loan.outstanding_at(&config, 50 * DAY).unwrap()
        );

        // double freeze is rejected
        assert!(loan.freeze(3 * DAY).is_err());
    }

    #[test]
    fn freeze_unfreeze_round_trip_excises_frozen_time() {
        let config = test_config();

        let mut frozen = test_loan(1_000_000, 0, 30);
        frozen.freeze(2 * DAY).unwrap();
        frozen.unfreeze(&config, 9 * DAY).unwrap();

        assert_eq!(LoanStatus::Active, frozen.status);
        assert_eq!(0, frozen.freeze_timestamp);
        assert_eq!(7 * DAY, frozen.start_timestamp);
        assert_eq!(9 * DAY, frozen.tracked_timestamp);

        // the frozen week contributes nothing: the loan at day 12 matches
        // an untouched loan at day 5
        let untouched = test_loan(1_000_000, 0, 30);
        assert_eq!(
            untouched.outstanding_at(&config, 5 * DAY).unwrap(),
            frozen.outstanding_at(&config, 12 * DAY).unwrap()
        );

        // and the due period shifted with the start, so the secondary rate
        // kicks in a week later than it would have
        assert_eq!(37, frozen.due_period(&config));
    }

    #[test]
    fn zero_length_freeze_is_a_noop() {
        let config = test_config();

        let mut loan = test_loan(1_000_000, 0, 30);
        loan.freeze(2 * DAY).unwrap();
        loan.unfreeze(&config, 2 * DAY).unwrap();

        let untouched = test_loan(1_000_000, 0, 30);
        assert_eq!(
            untouched.outstanding_at(&config, 12 * DAY).unwrap(),
            loan.outstanding_at(&config, 12 * DAY).unwrap()
        );
        assert_eq!(0, loan.start_timestamp);
    }

    #[test]
    fn repay_while_frozen_uses_freeze_time_balance() {
        let config = test_config();
        let mut loan = test_loan(1_000, 0, 30);

        let at_freeze = loan.outstanding_at(&config, 2 * DAY).unwrap();
        loan.freeze(2 * DAY).unwrap();

        // much later, the payoff is still the freeze-time balance
        assert_eq!(
            at_freeze,
            loan.repay(&config, u64::MAX, 40 * DAY).unwrap()
        );
        assert_eq!(LoanStatus::Repaid, loan.status);
    }

    #[test]
    fn unfreeze_requires_frozen() {
        let config = test_config();
        let mut loan = test_loan(1_000, 0, 30);

        assert!(loan.unfreeze(&config, DAY).is_err());
    }

    #[test]
    fn revocation_window_is_bounded_by_cooldown() {
        let config = test_config(); // cooldown of 3 periods
        let loan = test_loan(1_000, 0, 30);

        assert!(loan.assert_revocable(&config, 0).is_ok());
        assert!(loan.assert_revocable(&config, 3 * DAY - 1).is_ok());
        assert!(loan.assert_revocable(&config, 3 * DAY).is_err());
    }

    #[test]
    fn repaid_loan_is_still_revocable_inside_cooldown() {
        let config = test_config();
        let mut loan = test_loan(1_000, 0, 30);

        loan.repay(&config, u64::MAX, DAY).unwrap();
        assert!(loan.assert_revocable(&config, 2 * DAY).is_ok());

        loan.revoke(2 * DAY);
        assert_eq!(LoanStatus::Recovered, loan.status);
        assert_eq!(0, loan.tracked_balance);

        // terminal; no further revocation or repayment
        assert!(loan.assert_revocable(&config, 2 * DAY).is_err());
    }

    #[test]
    fn defaulted_loan_keeps_accruing_but_rejects_repayment() {
        let config = test_config();
        let mut loan = test_loan(1_000_000, 0, 30);

        loan.mark_defaulted().unwrap();
        assert_eq!(LoanStatus::Defaulted, loan.status);

        assert!(loan.outstanding_at(&config, 2 * DAY).unwrap() > 1_000_000);
        assert!(loan.repay(&config, 100, 2 * DAY).is_err());
        assert!(loan.mark_defaulted().is_err());
    }

    // ------------------------------------------------------------------
    // Installment aggregation
    // ------------------------------------------------------------------

    fn installment_group() -> Vec<Loan> {
        (0..3u64)
            .map(|offset| {
                let mut loan = test_loan(1_000, 0, 30 * (offset as u32 + 1));
                loan.id = 7 + offset;
                loan.first_installment_id = 7;
                loan.installment_count = 3;
                loan
            })
            .collect()
    }

    #[test]
    fn installment_preview_aggregates_members() {
        let config = test_config();
        let loans = installment_group();

        let preview = installment_preview(&loans, &config, 2 * DAY).unwrap();

        assert_eq!(7, preview.first_installment_id);
        assert_eq!(3, preview.installment_count);
        assert_eq!(2, preview.period_index);
        assert_eq!(3_000, preview.total_tracked_balance);

        let expected: u64 = loans
            .iter()
            .map(|loan| loan.outstanding_at(&config, 2 * DAY).unwrap())
            .sum();
        assert_eq!(expected, preview.total_outstanding_balance);
    }

    #[test]
    fn installment_preview_rejects_broken_groups() {
        let config = test_config();

        assert!(installment_preview(&[], &config, 0).is_err());

        // wrong member count
        let loans = installment_group();
        assert!(installment_preview(&loans[..2], &config, 0).is_err());

        // gap in the id sequence
        let mut loans = installment_group();
        loans[2].id = 42;
        assert!(installment_preview(&loans, &config, 0).is_err());

        // member of a different group
        let mut loans = installment_group();
        loans[1].first_installment_id = 8;
        assert!(installment_preview(&loans, &config, 0).is_err());

        // standalone loan is not a group
        let standalone = vec![test_loan(1_000, 0, 30)];
        assert!(installment_preview(&standalone, &config, 0).is_err());
    }

    // ------------------------------------------------------------------
    // Market flags
    // ------------------------------------------------------------------

    #[test]
    fn paused_market_blocks_operations() {
        let mut market = Market::default();
        assert!(market.assert_not_paused().is_ok());

        market.flags = MarketFlags::PAUSED.bits();
        assert!(market.assert_not_paused().is_err());
    }
}
