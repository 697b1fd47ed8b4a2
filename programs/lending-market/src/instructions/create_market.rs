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

use crate::{current_market_version, events, state::Market};

#[derive(Accounts)]
pub struct CreateMarket<'info> {
    /// The authority of the new market
    pub authority: Signer<'info>,

    /// The payer of rent for the market account
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The market to be created
    #[account(
        init,
        payer = payer,
        space = 8 + std::mem::size_of::<Market>(),
    )]
    pub market: Account<'info, Market>,

    pub system_program: Program<'info, System>,
}

pub fn create_market_handler(ctx: Context<CreateMarket>) -> Result<()> {
    let market = &mut ctx.accounts.market;

    market.version = current_market_version();
    market.authority = ctx.accounts.authority.key();
    market.flags = 0;
    market.loan_count = 0;

    emit!(events::MarketCreated {
        market: market.key(),
        authority: market.authority,
        version: market.version,
    });

    Ok(())
}
