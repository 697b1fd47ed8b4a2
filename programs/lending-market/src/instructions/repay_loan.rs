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

use crate::state::{BorrowerConfig, Loan, LoanStatus, Market, Pool};
use crate::{events, seeds};

#[derive(Accounts)]
pub struct RepayLoan<'info> {
    pub market: Account<'info, Market>,

    /// The pool the loan was taken from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The loan being repaid
    #[account(mut, has_one = pool)]
    pub loan: Account<'info, Loan>,

    /// The borrower's lending terms; the revolving borrow policy reacts to
    /// full settlement
    #[account(
        mut,
        seeds = [
            seeds::BORROWER_CONFIG,
            pool.key().as_ref(),
            loan.borrower.as_ref()
        ],
        bump = borrower_config.bump[0],
    )]
    pub borrower_config: Account<'info, BorrowerConfig>,

    /// The payer; any token holder may repay a loan
    pub payer: Signer<'info>,

    /// The token account repaying the debt
    #[account(
        mut,
        token::mint = token_mint,
        token::authority = payer,
    )]
    pub source: InterfaceAccount<'info, TokenAccount>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> RepayLoan<'info> {
    fn transfer_repayment_context(&self) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: self.source.to_account_info(),
                to: self.vault.to_account_info(),
                authority: self.payer.to_account_info(),
                mint: self.token_mint.to_account_info(),
            },
        )
    }
}

pub fn repay_loan_handler(ctx: Context<RepayLoan>, amount: u64) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    let clock = Clock::get()?;
    let config = ctx.accounts.pool.config;

    let loan = &mut ctx.accounts.loan;
    let repaid = loan.repay(&config, amount, clock.unix_timestamp)?;
    let fully_repaid = loan.status == LoanStatus::Repaid;

    ctx.accounts.pool.on_loan_repaid(repaid)?;
    if fully_repaid {
        let borrow_amount = ctx.accounts.loan.borrow_amount;
        ctx.accounts.borrower_config.on_loan_settled(borrow_amount);
    }

    // State is committed; only now do tokens move
    token_interface::transfer_checked(
        ctx.accounts.transfer_repayment_context(),
        repaid,
        ctx.accounts.token_mint.decimals,
    )?;

    let pool = &ctx.accounts.pool;
    emit!(events::LoanRepaid {
        loan: ctx.accounts.loan.key(),
        loan_id: ctx.accounts.loan.id,
        payer: ctx.accounts.payer.key(),
        repaid_amount: repaid,
        outstanding_balance: ctx.accounts.loan.tracked_balance,
        fully_repaid,
        summary: pool.deref().into(),
    });

    Ok(())
}
