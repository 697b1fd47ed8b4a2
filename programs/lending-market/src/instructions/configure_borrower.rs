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

use crate::state::{BorrowPolicy, BorrowerConfig, Market, Pool};
use crate::util::InterestFormula;
use crate::{events, seeds};

/// Wire form of a borrower's lending terms. The formula and policy arrive
/// as raw selectors; an unknown formula fails with `FormulaNotImplemented`
/// rather than falling back to a default.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug)]
pub struct BorrowerConfigParams {
    pub min_borrow_amount: u64,
    pub max_borrow_amount: u64,
    pub min_duration_periods: u32,
    pub max_duration_periods: u32,
    pub interest_rate_primary: u64,
    pub interest_rate_secondary: u64,
    pub addon_rate: u64,
    pub interest_formula: u8,
    pub borrow_policy: u8,
    pub expiration: UnixTimestamp,
}

#[derive(Accounts)]
pub struct ConfigureBorrower<'info> {
    /// The market authority, which must sign
    pub authority: Signer<'info>,

    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    /// The pool the terms apply to
    #[account(has_one = market)]
    pub pool: Account<'info, Pool>,

    /// The borrower being configured
    /// CHECK: any address may be configured as a borrower
    pub borrower: UncheckedAccount<'info>,

    /// The payer of rent when the configuration is first created
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The borrower's lending terms, created on first configuration
    #[account(
        init_if_needed,
        payer = payer,
        space = 8 + std::mem::size_of::<BorrowerConfig>(),
        seeds = [
            seeds::BORROWER_CONFIG,
            pool.key().as_ref(),
            borrower.key().as_ref()
        ],
        bump,
    )]
    pub borrower_config: Account<'info, BorrowerConfig>,

    pub system_program: Program<'info, System>,
}

pub fn configure_borrower_handler(
    ctx: Context<ConfigureBorrower>,
    params: BorrowerConfigParams,
) -> Result<()> {
    let interest_formula = InterestFormula::try_from(params.interest_formula)?;
    let borrow_policy = BorrowPolicy::try_from(params.borrow_policy)?;

    let config = &mut ctx.accounts.borrower_config;
    config.bump = [ctx.bumps.borrower_config];
    config.pool = ctx.accounts.pool.key();
    config.borrower = ctx.accounts.borrower.key();
    config.min_borrow_amount = params.min_borrow_amount;
    config.max_borrow_amount = params.max_borrow_amount;
    config.min_duration_periods = params.min_duration_periods;
    config.max_duration_periods = params.max_duration_periods;
    config.interest_rate_primary = params.interest_rate_primary;
    config.interest_rate_secondary = params.interest_rate_secondary;
    config.addon_rate = params.addon_rate;
    config.interest_formula = interest_formula;
    config.borrow_policy = borrow_policy;
    config.expiration = params.expiration;

    config.validate()?;

    emit!(events::BorrowerConfigured {
        pool: config.pool,
        borrower: config.borrower,
        min_borrow_amount: config.min_borrow_amount,
        max_borrow_amount: config.max_borrow_amount,
        expiration: config.expiration,
    });

    Ok(())
}
