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
use crate::util::validate_delegated_allowance;
use crate::{events, seeds, ErrorCode};

#[derive(Accounts)]
pub struct RevokeLoan<'info> {
    pub market: Account<'info, Market>,

    /// The pool the loan was taken from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The loan to revoke
    #[account(mut, has_one = pool)]
    pub loan: Account<'info, Loan>,

    /// The borrower's lending terms; the revolving borrow policy reacts to
    /// revocation
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

    /// The borrower or the market authority
    pub caller: Signer<'info>,

    /// The borrower's token account; the unrepaid principal is pulled back
    /// from it, or the over-repaid excess refunded into it
    #[account(
        mut,
        token::mint = token_mint,
        token::authority = loan.borrower,
    )]
    pub borrower_token_account: InterfaceAccount<'info, TokenAccount>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    /// The addon treasury; required under the Transfer addon mode, and it
    /// must have pre-approved the pool to reclaim the addon
    #[account(mut)]
    pub treasury: Option<InterfaceAccount<'info, TokenAccount>>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> RevokeLoan<'info> {
    fn pull_shortfall_context(
        &self,
        authority: AccountInfo<'info>,
    ) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: self.borrower_token_account.to_account_info(),
                to: self.vault.to_account_info(),
                authority,
                mint: self.token_mint.to_account_info(),
            },
        )
    }

    fn refund_context(&self) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: self.vault.to_account_info(),
                to: self.borrower_token_account.to_account_info(),
                authority: self.pool.to_account_info(),
                mint: self.token_mint.to_account_info(),
            },
        )
    }

    fn reclaim_addon_context(
        &self,
        treasury: &InterfaceAccount<'info, TokenAccount>,
    ) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
        CpiContext::new(
            self.token_program.to_account_info(),
            TransferChecked {
                from: treasury.to_account_info(),
                to: self.vault.to_account_info(),
                authority: self.pool.to_account_info(),
                mint: self.token_mint.to_account_info(),
            },
        )
    }
}

pub fn revoke_loan_handler(ctx: Context<RevokeLoan>) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    let caller = ctx.accounts.caller.key();
    let borrower = ctx.accounts.loan.borrower;
    require!(
        caller == borrower || caller == ctx.accounts.market.authority,
        ErrorCode::UnauthorizedCaller
    );

    let clock = Clock::get()?;
    let now = clock.unix_timestamp;
    let config = ctx.accounts.pool.config;

    ctx.accounts.loan.assert_revocable(&config, now)?;

    let borrow_amount = ctx.accounts.loan.borrow_amount;
    let repaid_amount = ctx.accounts.loan.repaid_amount;
    let addon_amount = ctx.accounts.loan.addon_amount;
    let was_settled = ctx.accounts.loan.status == LoanStatus::Repaid;

    let settlement =
        ctx.accounts
            .pool
            .on_loan_revoked(borrow_amount, repaid_amount, addon_amount)?;
    if !was_settled {
        // the repay path already restored a settled loan's limit
        ctx.accounts.borrower_config.on_loan_settled(borrow_amount);
    }
    ctx.accounts.loan.revoke(now);

    // State is committed; only now do tokens move
    let pool = &ctx.accounts.pool;
    let pool_key = pool.key();
    let signer = [&pool.signer_seeds()[..]];
    let decimals = ctx.accounts.token_mint.decimals;

    if pool.config.addon_mode == AddonMode::Transfer && addon_amount > 0 {
        let treasury = ctx
            .accounts
            .treasury
            .as_ref()
            .ok_or(error!(ErrorCode::InvalidTreasury))?;
        require_keys_eq!(treasury.key(), pool.treasury, ErrorCode::InvalidTreasury);
        validate_delegated_allowance(treasury, pool_key, addon_amount)?;

        token_interface::transfer_checked(
            ctx.accounts.reclaim_addon_context(treasury).with_signer(&signer),
            addon_amount,
            decimals,
        )?;
    }

    if settlement.shortfall > 0 {
        if caller == borrower {
            // the borrower is present and signs for their own account
            token_interface::transfer_checked(
                ctx.accounts
                    .pull_shortfall_context(ctx.accounts.caller.to_account_info()),
                settlement.shortfall,
                decimals,
            )?;
        } else {
            // administrative revocation relies on the borrower's standing
            // approval of the pool as delegate
            validate_delegated_allowance(
                &ctx.accounts.borrower_token_account,
                pool_key,
                settlement.shortfall,
            )?;
            token_interface::transfer_checked(
                ctx.accounts
                    .pull_shortfall_context(ctx.accounts.pool.to_account_info())
                    .with_signer(&signer),
                settlement.shortfall,
                decimals,
            )?;
        }
    } else if settlement.refund > 0 {
        token_interface::transfer_checked(
            ctx.accounts.refund_context().with_signer(&signer),
            settlement.refund,
            decimals,
        )?;
    }

    emit!(events::LoanRevoked {
        loan: ctx.accounts.loan.key(),
        loan_id: ctx.accounts.loan.id,
        shortfall: settlement.shortfall,
        refund: settlement.refund,
        addon_reversed: addon_amount,
        summary: ctx.accounts.pool.deref().into(),
    });

    Ok(())
}
