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

// Allow this until fixed upstream
#![allow(clippy::result_large_err)]

use anchor_lang::prelude::*;

mod instructions;
pub mod events;
pub mod state;
pub mod util;
use instructions::*;

pub use instructions::{BorrowerConfigParams, PoolConfigParams};
pub use state::{
    installment_preview, AddonMode, BorrowPolicy, BorrowerConfig, InstallmentPreview, Loan,
    LoanPreview, LoanStatus, Market, MarketFlags, Pool, PoolConfig,
};
pub use util::InterestFormula;

declare_id!("EDHv5TDirgZPLPXa65pR5ZWHx6sQxG5ccYdBW9BvaMHu");

/// The most members an installment loan may be split into
pub const MAX_INSTALLMENT_COUNT: usize = 12;

/// The initial market version at launch
pub const MARKET_VERSION_0: u8 = 0;

/// The initial pool version at launch
pub const POOL_VERSION_0: u8 = 0;

/// A helper to get the current market version
pub const fn current_market_version() -> u8 {
    MARKET_VERSION_0
}

pub mod seeds {
    use super::constant;

    #[constant]
    pub const LOAN: &[u8] = b"loan";

    #[constant]
    pub const BORROWER_CONFIG: &[u8] = b"borrower-config";

    #[constant]
    pub const VAULT: &[u8] = b"vault";
}

#[program]
mod lending_market {

    use super::*;

    /// Create a new lending market, establishing its authority
    pub fn create_market(ctx: Context<CreateMarket>) -> Result<()> {
        instructions::create_market_handler(ctx)
    }

    /// Update market flags (e.g. the pause switch), optionally handing the
    /// authority to a new address
    pub fn configure_market(
        ctx: Context<ConfigureMarket>,
        flags: u64,
        new_authority: Option<Pubkey>,
    ) -> Result<()> {
        instructions::configure_market_handler(ctx, flags, new_authority)
    }

    /// Create a new pool to lend a token from
    ///
    /// # Parameters
    ///
    /// * `config` - The pool's period, rate scaling, cooldown and addon
    ///   mode settings.
    /// * `treasury` - The external addon destination, consulted only under
    ///   the Transfer addon mode.
    ///
    /// # [Accounts](lending_market::accounts::CreatePool)
    ///
    /// |     |     |     |
    /// | --- | --- | --- |
    /// | **Name** | **Type** | **Description** |
    /// | `market` | `read_only` | The market the pool is created in. |
    /// | `authority` | `Signer` | The market authority. |
    /// | `payer` | `Signer` | The payer of rent for new accounts. |
    /// | `pool` | `writable` | The pool to be created. |
    /// | `vault` | `writable` | The token account holding the pool's funds. |
    /// | `token_mint` | `read_only` | The mint for the token being lent. |
    /// | `token_program` | `read_only` | The [spl token program](https://spl.solana.com/token). |
    /// | `system_program` | `read_only` | The [system native program](https://docs.solana.com/developing/runtime-facilities/programs#system-program). |
    ///
    /// # Events
    ///
    /// |     |     |
    /// | --- | --- |
    /// | **Event Name** | **Description** |
    /// | [`events::PoolCreated`] | The pool created. |
    ///
    pub fn create_pool(
        ctx: Context<CreatePool>,
        config: PoolConfigParams,
        treasury: Pubkey,
    ) -> Result<()> {
        instructions::create_pool_handler(ctx, config, treasury)
    }

    /// Update an existing pool's configuration or treasury.
    ///
    /// The addon mode only moves Retention -> Transfer; the reverse would
    /// strand funds already sent to the treasury.
    pub fn configure_pool(
        ctx: Context<ConfigurePool>,
        config: Option<PoolConfigParams>,
        treasury: Option<Pubkey>,
    ) -> Result<()> {
        instructions::configure_pool_handler(ctx, config, treasury)
    }

    /// Create or update the lending terms for one borrower on a pool
    pub fn configure_borrower(
        ctx: Context<ConfigureBorrower>,
        params: BorrowerConfigParams,
    ) -> Result<()> {
        instructions::configure_borrower_handler(ctx, params)
    }

    /// Fund the pool's borrowable balance from the authority's tokens
    pub fn deposit(ctx: Context<Deposit>, amount: u64) -> Result<()> {
        instructions::deposit_handler(ctx, amount)
    }

    /// Withdraw from the pool's borrowable and addon balances.
    ///
    /// All-or-nothing over the two balances: if either requested amount
    /// exceeds its balance, nothing moves.
    pub fn withdraw(
        ctx: Context<Withdraw>,
        borrowable_amount: u64,
        addon_amount: u64,
    ) -> Result<()> {
        instructions::withdraw_handler(ctx, borrowable_amount, addon_amount)
    }

    /// Originate a loan against the pool
    ///
    /// # Parameters
    ///
    /// * `amount` - The principal to borrow, validated against the
    ///   borrower's configured bounds.
    /// * `duration_periods` - The scheduled life of the loan.
    ///
    /// # [Accounts](lending_market::accounts::TakeLoan)
    ///
    /// |     |     |     |
    /// | --- | --- | --- |
    /// | **Name** | **Type** | **Description** |
    /// | `market` | `writable` | The market, for the loan id sequence. |
    /// | `pool` | `writable` | The pool to borrow from. |
    /// | `borrower_config` | `writable` | The borrower's lending terms. |
    /// | `loan` | `writable` | The loan record to be created. |
    /// | `borrower` | `Signer` | The borrower taking the loan. |
    /// | `payer` | `Signer` | The payer of rent for the loan record. |
    /// | `vault` | `writable` | The pool's token vault. |
    /// | `destination` | `writable` | The borrower's token account. |
    /// | `treasury` | `writable` | The addon destination (Transfer mode). |
    ///
    /// # Events
    ///
    /// |     |     |
    /// | --- | --- |
    /// | **Event Name** | **Description** |
    /// | [`events::LoanTaken`] | Marks the origination. |
    ///
    pub fn take_loan(ctx: Context<TakeLoan>, amount: u64, duration_periods: u32) -> Result<()> {
        instructions::take_loan_handler(ctx, amount, duration_periods)
    }

    /// Originate an installment loan: a group of sub-loans sharing one
    /// origination, validated against the borrower's limits as a whole
    pub fn take_installment_loan<'info>(
        ctx: Context<'_, '_, 'info, 'info, TakeInstallmentLoan<'info>>,
        borrow_amounts: Vec<u64>,
        durations: Vec<u32>,
    ) -> Result<()> {
        instructions::take_installment_loan_handler(ctx, borrow_amounts, durations)
    }

    /// Repay a loan from the payer's tokens.
    ///
    /// `u64::MAX` repays the full outstanding balance; any other amount
    /// above it is rejected.
    pub fn repay_loan(ctx: Context<RepayLoan>, amount: u64) -> Result<()> {
        instructions::repay_loan_handler(ctx, amount)
    }

    /// Batch repayment pulled from borrower token accounts under their
    /// pre-approved delegation, strictly in array order
    pub fn auto_repay<'info>(
        ctx: Context<'_, '_, 'info, 'info, AutoRepay<'info>>,
        loan_ids: Vec<u64>,
        amounts: Vec<u64>,
    ) -> Result<()> {
        instructions::auto_repay_handler(ctx, loan_ids, amounts)
    }

    /// Halt interest accrual on a loan
    pub fn freeze_loan(ctx: Context<FreezeLoan>) -> Result<()> {
        instructions::freeze_loan_handler(ctx)
    }

    /// Resume interest accrual, excising the frozen time
    pub fn unfreeze_loan(ctx: Context<UnfreezeLoan>) -> Result<()> {
        instructions::unfreeze_loan_handler(ctx)
    }

    /// Reverse a loan inside its cooldown window as if it never existed
    pub fn revoke_loan(ctx: Context<RevokeLoan>) -> Result<()> {
        instructions::revoke_loan_handler(ctx)
    }

    /// Administrative default mark on an active loan
    pub fn mark_loan_defaulted(ctx: Context<MarkLoanDefaulted>) -> Result<()> {
        instructions::mark_loan_defaulted_handler(ctx)
    }
}

#[error_code]
pub enum ErrorCode {
    /// 140100 - All loan lifecycle operations are halted
    #[msg("Loan operations are currently paused")]
    OperationsPaused = 140_100,

    /// 140101 - An invalid amount has been supplied
    #[msg("An invalid amount has been supplied")]
    InvalidAmount,

    /// 140102 - The requested duration is outside the configured bounds
    #[msg("The loan duration is out of range")]
    DurationOutOfRange,

    /// 140103 - The borrower configuration has expired
    #[msg("The borrower configuration has expired")]
    ConfigurationExpired,

    /// 140104 - An invalid configuration value was supplied
    #[msg("An invalid configuration value was supplied")]
    InvalidConfig,

    /// 140105 - A balance does not cover the requested movement
    #[msg("The pool does not have a sufficient balance for the operation")]
    InsufficientBalance,

    /// 140106 - A delegated allowance does not cover the reclaimed amount
    #[msg("The delegated token allowance does not cover the transfer")]
    InsufficientAllowance,

    /// 140107 - Batch arrays have mismatched lengths
    #[msg("Batch input arrays have mismatched lengths")]
    ArrayLengthMismatch,

    /// 140108 - The interest formula selector is not implemented
    #[msg("The requested interest formula is not implemented")]
    FormulaNotImplemented,

    /// 140109 - Fixed-point math left the representable range
    #[msg("A math operation over or underflowed")]
    MathOverflow,

    /// 140110 - The loan is not in a state accepting this operation
    #[msg("The loan is not active")]
    LoanNotActive,

    /// 140111 - Freezing an already-frozen loan
    #[msg("The loan is already frozen")]
    LoanAlreadyFrozen,

    /// 140112 - Unfreezing a loan that is not frozen
    #[msg("The loan is not frozen")]
    LoanNotFrozen,

    /// 140113 - The revocation cooldown window has closed
    #[msg("The revocation cooldown window has expired")]
    CooldownExpired,

    /// 140114 - Attempt repayment of more than the outstanding balance
    #[msg("Repayment exceeds the outstanding balance")]
    RepaymentExceedsOutstanding,

    /// 140115 - The addon mode only switches Retention -> Transfer
    #[msg("The addon mode cannot be switched back to retention")]
    AddonModeImmutable,

    /// 140116 - An installment loan needs at least two members
    #[msg("The installment loan has too few or too many members")]
    InstallmentCountOutOfRange,

    /// 140117 - A supplied account is not the expected loan record
    #[msg("A supplied account is not a valid loan record for this batch")]
    InvalidLoanAccount,

    /// 140118 - A loan record does not belong to the referenced group
    #[msg("A loan record does not belong to the installment group")]
    InvalidInstallmentMember,

    /// 140119 - The caller lacks the role for this operation
    #[msg("The caller is not authorized for this operation")]
    UnauthorizedCaller,

    /// 140120 - The treasury account does not match the pool configuration
    #[msg("The treasury account does not match the pool configuration")]
    InvalidTreasury,
}
