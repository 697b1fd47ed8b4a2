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

use crate::state::{Market, MarketFlags};
use crate::{events, ErrorCode};

#[derive(Accounts)]
pub struct ConfigureMarket<'info> {
    /// The current market authority, which must sign
    pub authority: Signer<'info>,

    /// The market to be configured
    #[account(mut, has_one = authority)]
    pub market: Account<'info, Market>,
}

pub fn configure_market_handler(
    ctx: Context<ConfigureMarket>,
    flags: u64,
    new_authority: Option<Pubkey>,
) -> Result<()> {
    let market = &mut ctx.accounts.market;

    require!(
        MarketFlags::from_bits(flags).is_some(),
        ErrorCode::InvalidConfig
    );

    market.flags = flags;
    if let Some(new_authority) = new_authority {
        market.authority = new_authority;
    }

    emit!(events::MarketConfigured {
        market: market.key(),
        flags: market.flags,
        authority: market.authority,
    });

    Ok(())
}
