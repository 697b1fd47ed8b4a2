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

use crate::state::{Market, Pool};
use crate::{events, ErrorCode};

#[derive(Accounts)]
pub struct Withdraw<'info> {
    /// The market authority, which must sign
    pub authority: Signer<'info>,

    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    /// The pool to withdraw from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    /// The destination of the withdrawn tokens
    #[account(mut, token::mint = token_mint)]
    pub destination: InterfaceAccount<'info, TokenAccount>,

    pub token_program: Interface<'info, TokenInterface>,
}

impl<'info> Withdraw<'info> {
    fn transfer_context(&self) -> CpiContext<'_, '_, '_, 'info, TransferChecked<'info>> {
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
}

pub fn withdraw_handler(
    ctx: Context<Withdraw>,
    borrowable_amount: u64,
    addon_amount: u64,
) -> Result<()> {
    require!(
        borrowable_amount > 0 || addon_amount > 0,
        ErrorCode::InvalidAmount
    );

    let pool = &mut ctx.accounts.pool;
    let total = pool.withdraw(borrowable_amount, addon_amount)?;

    let pool = &ctx.accounts.pool;
    let signer = [&pool.signer_seeds()[..]];

    token_interface::transfer_checked(
        ctx.accounts.transfer_context().with_signer(&signer),
        total,
        ctx.accounts.token_mint.decimals,
    )?;

    emit!(events::PoolWithdraw {
        pool: pool.key(),
        destination: ctx.accounts.destination.key(),
        borrowable_amount,
        addon_amount,
        summary: pool.deref().into(),
    });

    Ok(())
}
