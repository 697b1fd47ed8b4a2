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

use crate::instructions::PoolConfigParams;
use crate::state::{Market, Pool};
use crate::events;

#[derive(Accounts)]
pub struct ConfigurePool<'info> {
    /// The authority to modify the pool, which must sign
    pub authority: Signer<'info>,

    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    /// The pool to be configured
    #[account(mut, has_one = market)]
    pub pool: Account<'info, Pool>,
}

pub fn configure_pool_handler(
    ctx: Context<ConfigurePool>,
    config: Option<PoolConfigParams>,
    treasury: Option<Pubkey>,
) -> Result<()> {
    let pool = &mut ctx.accounts.pool;

    if let Some(config) = config {
        pool.apply_config(config.resolve()?)?;
    }
    if let Some(treasury) = treasury {
        pool.treasury = treasury;
    }

    emit!(events::PoolConfigured {
        pool: pool.key(),
        config: pool.config,
        treasury: pool.treasury,
    });

    Ok(())
}
