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

use std::ops::Deref;

use anchor_lang::prelude::*;
use anchor_lang::system_program::{create_account, CreateAccount};
use anchor_lang::Discriminator;
use anchor_spl::token_interface::{self, Mint, TokenAccount, TokenInterface, TransferChecked};

use crate::state::{AddonMode, BorrowerConfig, Loan, LoanStatus, Market, Pool};
use crate::util::validate_parallel_arrays;
use crate::{events, seeds, ErrorCode, MAX_INSTALLMENT_COUNT};

#[derive(Accounts)]
pub struct TakeInstallmentLoan<'info> {
    /// The market, which assigns the loan identifiers
    #[account(mut)]
    pub market: Account<'info, Market>,

    /// The pool to borrow from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The borrower's lending terms; the whole installment total is
    /// validated and consumed against them
    #[account(
        mut,
        seeds = [
            seeds::BORROWER_CONFIG,
            pool.key().as_ref(),
            borrower.key().as_ref()
        ],
        bump = borrower_config.bump[0],
    )]
    pub borrower_config: Account<'info, BorrowerConfig>,

    /// The borrower taking the installment loan
    pub borrower: Signer<'info>,

    /// The payer of rent for the loan records
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    /// The borrower's token account receiving the total principal
    #[account(
        mut,
        token::mint = token_mint,
        token::authority = borrower,
    )]
    pub destination: InterfaceAccount<'info, TokenAccount>,

    /// The addon destination; required under the Transfer addon mode
    #[account(mut)]
    pub treasury: Option<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

impl<'info> TakeInstallmentLoan<'info> {
    fn transfer_principal_context(&self) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: self.vault.to_account_info(),
                to: self.destination.to_account_info(),
                authority: self.pool.to_account_info(),
                mint: self.token_mint.to_account_info(),
            },
        )
    }

    fn transfer_addon_context(
        &self,
        treasury: &InterfaceAccount<'info, TokenAccount>,
    ) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: self.vault.to_account_info(),
                to: treasury.to_account_info(),
                authority: self.pool.to_account_info(),
                mint: self.token_mint.to_account_info(),
            },
        )
    }
}

/// Create the sub-loan records of an installment loan, one per
/// `remaining_accounts` entry, sharing one origination. The records are
/// created manually because the member count is dynamic.
pub fn take_installment_loan_handler<'info>(
    ctx: Context<'_, '_, 'info, 'info, TakeInstallmentLoan<'info>>,
    borrow_amounts: Vec<u64>,
    durations: Vec<u32>,
) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    validate_parallel_arrays(borrow_amounts.len(), durations.len())?;
    validate_parallel_arrays(borrow_amounts.len(), ctx.remaining_accounts.len())?;

    let count = borrow_amounts.len();
    require!(
        (2..=MAX_INSTALLMENT_COUNT).contains(&count),
        ErrorCode::InstallmentCountOutOfRange
    );

    let clock = Clock::get()?;
    let now = clock.unix_timestamp;
    let config = ctx.accounts.pool.config;

    // The group is validated as one loan: expiry first, the total against
    // the amount bounds, every member duration against the duration bounds
    let borrower_config = &ctx.accounts.borrower_config;
    borrower_config.validate_expiration(now)?;

    let mut total_borrow: u64 = 0;
    for &amount in &borrow_amounts {
        require!(amount > 0, ErrorCode::InvalidAmount);
        total_borrow = total_borrow
            .checked_add(amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;
    }
    borrower_config.validate_amount(total_borrow)?;
    for &duration in &durations {
        borrower_config.validate_duration(duration)?;
    }

    let market_key = ctx.accounts.market.key();
    let pool_key = ctx.accounts.pool.key();
    let borrower_key = ctx.accounts.borrower.key();
    let first_installment_id = ctx.accounts.market.loan_count;
    let space = 8 + std::mem::size_of::<Loan>();
    let lamports = Rent::get()?.minimum_balance(space);

    let mut total_addon: u64 = 0;

    for (index, loan_info) in ctx.remaining_accounts.iter().enumerate() {
        let loan_id = first_installment_id + index as u64;
        let id_bytes = loan_id.to_le_bytes();

        let (expected, bump) = Pubkey::find_program_address(
            &[seeds::LOAN, market_key.as_ref(), &id_bytes],
            &crate::ID,
        );
        require_keys_eq!(loan_info.key(), expected, ErrorCode::InvalidLoanAccount);

        let borrow_amount = borrow_amounts[index];
        let addon_amount =
            borrower_config.addon_amount(borrow_amount, config.interest_rate_factor)?;
        total_addon = total_addon
            .checked_add(addon_amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;
        let tracked_balance = borrow_amount
            .checked_add(addon_amount)
            .ok_or(error!(ErrorCode::MathOverflow))?;

        let bump_bytes = [bump];
        let signer_seeds: &[&[u8]] = &[
            seeds::LOAN,
            market_key.as_ref(),
            &id_bytes,
            &bump_bytes,
        ];
        let signer = [signer_seeds];
        let init_ctx = CpiContext::new(
            ctx.accounts.system_program.to_account_info(),
            CreateAccount {
                from: ctx.accounts.payer.to_account_info(),
                to: loan_info.clone(),
            },
        )
        .with_signer(&signer);
        create_account(init_ctx, lamports, space as u64, &crate::ID)?;

        let loan = Loan {
            id: loan_id,
            market: market_key,
            pool: pool_key,
            borrower: borrower_key,
            bump: [bump],
            status: LoanStatus::Active,
            interest_formula: borrower_config.interest_formula,
            duration_periods: durations[index],
            borrow_amount,
            addon_amount,
            interest_rate_primary: borrower_config.interest_rate_primary,
            interest_rate_secondary: borrower_config.interest_rate_secondary,
            start_timestamp: now,
            tracked_timestamp: now,
            freeze_timestamp: 0,
            tracked_balance,
            repaid_amount: 0,
            first_installment_id,
            installment_count: count as u16,
        };

        let mut data = loan_info.try_borrow_mut_data()?;
        data[..8].copy_from_slice(&Loan::discriminator());
        loan.serialize(&mut &mut data[8..])?;
    }

    ctx.accounts.market.loan_count = first_installment_id
        .checked_add(count as u64)
        .ok_or(error!(ErrorCode::MathOverflow))?;
    ctx.accounts.pool.on_loan_taken(total_borrow, total_addon)?;
    ctx.accounts.borrower_config.on_loan_taken(total_borrow);

    // State is committed; only now do tokens move
    let pool = &ctx.accounts.pool;
    let signer = [&pool.signer_seeds()[..]];
    let decimals = ctx.accounts.token_mint.decimals;

    token_interface::transfer_checked(
        ctx.accounts.transfer_principal_context().with_signer(&signer),
        total_borrow,
        decimals,
    )?;

    if pool.config.addon_mode == AddonMode::Transfer && total_addon > 0 {
        let treasury = ctx
            .accounts
            .treasury
            .as_ref()
            .ok_or(error!(ErrorCode::InvalidTreasury))?;
        require_keys_eq!(treasury.key(), pool.treasury, ErrorCode::InvalidTreasury);

        token_interface::transfer_checked(
            ctx.accounts.transfer_addon_context(treasury).with_signer(&signer),
            total_addon,
            decimals,
        )?;
    }

    emit!(events::InstallmentLoanTaken {
        pool: pool_key,
        borrower: borrower_key,
        first_installment_id,
        installment_count: count as u16,
        total_borrow_amount: total_borrow,
        total_addon_amount: total_addon,
        summary: pool.deref().into(),
    });

    Ok(())
}
