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
use anchor_spl::token_interface::{self, Mint, TokenAccount, TokenInterface, TransferChecked};

use crate::state::{AddonMode, BorrowerConfig, Loan, LoanStatus, Market, Pool};
use crate::{events, seeds, ErrorCode};

#[derive(Accounts)]
pub struct TakeLoan<'info> {
    /// The market, which assigns the loan identifier
    #[account(mut)]
    pub market: Account<'info, Market>,

    /// The pool to borrow from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The borrower's lending terms, consumed and adjusted by the borrow
    /// policy
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

    /// The loan record to be created
    #[account(
        init,
        payer = payer,
        space = 8 + std::mem::size_of::<Loan>(),
        seeds = [
            seeds::LOAN,
            market.key().as_ref(),
            &market.loan_count.to_le_bytes()
        ],
        bump,
    )]
    pub loan: Account<'info, Loan>,

    /// The borrower taking the loan
    pub borrower: Signer<'info>,

    /// The payer of rent for the loan record
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    /// The borrower's token account receiving the principal
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

impl<'info> TakeLoan<'info> {
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

pub fn take_loan_handler(
    ctx: Context<TakeLoan>,
    amount: u64,
    duration_periods: u32,
) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp;
    let config = ctx.accounts.pool.config;

    let borrower_config = &mut ctx.accounts.borrower_config;
    borrower_config.validate_terms(amount, duration_periods, now)?;
    let addon_amount = borrower_config.addon_amount(amount, config.interest_rate_factor)?;

    // The addon accrues interest with the principal from origination
    let tracked_balance = amount
        .checked_add(addon_amount)
        .ok_or(error!(ErrorCode::MathOverflow))?;

    let loan_id = ctx.accounts.market.loan_count;
    ctx.accounts.loan.set_inner(Loan {
        id: loan_id,
        market: ctx.accounts.market.key(),
        pool: ctx.accounts.pool.key(),
        borrower: ctx.accounts.borrower.key(),
        bump: [ctx.bumps.loan],
        status: LoanStatus::Active,
        interest_formula: borrower_config.interest_formula,
        duration_periods,
        borrow_amount: amount,
        addon_amount,
        interest_rate_primary: borrower_config.interest_rate_primary,
        interest_rate_secondary: borrower_config.interest_rate_secondary,
        start_timestamp: now,
        tracked_timestamp: now,
        freeze_timestamp: 0,
        tracked_balance,
        repaid_amount: 0,
        first_installment_id: 0,
        installment_count: 0,
    });

    ctx.accounts.market.loan_count = loan_id
        .checked_add(1)
        .ok_or(error!(ErrorCode::MathOverflow))?;
    ctx.accounts.pool.on_loan_taken(amount, addon_amount)?;
    borrower_config.on_loan_taken(amount);

    // State is committed; only now do tokens move
    let pool = &ctx.accounts.pool;
    let signer = [&pool.signer_seeds()[..]];
    let decimals = ctx.accounts.token_mint.decimals;

    token_interface::transfer_checked(
        ctx.accounts.transfer_principal_context().with_signer(&signer),
        amount,
        decimals,
    )?;

    if pool.config.addon_mode == AddonMode::Transfer && addon_amount > 0 {
        let treasury = ctx
            .accounts
            .treasury
            .as_ref()
            .ok_or(error!(ErrorCode::InvalidTreasury))?;
        require_keys_eq!(treasury.key(), pool.treasury, ErrorCode::InvalidTreasury);

        token_interface::transfer_checked(
            ctx.accounts.transfer_addon_context(treasury).with_signer(&signer),
            addon_amount,
            decimals,
        )?;
    }

    emit!(events::LoanTaken {
        loan: ctx.accounts.loan.key(),
        loan_id,
        pool: pool.key(),
        borrower: ctx.accounts.borrower.key(),
        borrow_amount: amount,
        addon_amount,
        duration_periods,
        summary: pool.deref().into(),
    });

    Ok(())
}
