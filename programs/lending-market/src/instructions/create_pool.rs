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
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};

use crate::state::{AddonMode, Market, Pool, PoolConfig};
use crate::{events, seeds, POOL_VERSION_0};

/// Wire form of [PoolConfig]; the addon mode arrives as a raw selector and
/// is validated before it becomes typed state.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug)]
pub struct PoolConfigParams {
    pub period_duration: i64,
    pub interest_rate_factor: u64,
    pub cooldown_periods: u32,
    pub addon_mode: u8,
}

impl PoolConfigParams {
    pub fn resolve(&self) -> Result<PoolConfig> {
        let config = PoolConfig {
            period_duration: self.period_duration,
            interest_rate_factor: self.interest_rate_factor,
            cooldown_periods: self.cooldown_periods,
            addon_mode: AddonMode::try_from(self.addon_mode)?,
        };
        config.validate()?;

        Ok(config)
    }
}

#[derive(Accounts)]
pub struct CreatePool<'info> {
    /// The authority to create pools, which must sign
    pub authority: Signer<'info>,

    /// The market that the pool is being registered in
    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    /// The payer of rent for new accounts
    #[account(mut)]
    pub payer: Signer<'info>,

    /// The pool to be created
    #[account(
        init,
        payer = payer,
        space = 8 + std::mem::size_of::<Pool>(),
        seeds = [
            market.key().as_ref(),
            token_mint.key().as_ref()
        ],
        bump,
    )]
    pub pool: Account<'info, Pool>,

    /// The token account holding the pool's funds
    #[account(
        init,
        payer = payer,
        seeds = [
            pool.key().as_ref(),
            seeds::VAULT
        ],
        bump,
        token::mint = token_mint,
        token::authority = pool,
        token::token_program = token_program,
    )]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    /// The mint for the token being lent by the pool
    pub token_mint: InterfaceAccount<'info, Mint>,

    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

pub fn create_pool_handler(
    ctx: Context<CreatePool>,
    config: PoolConfigParams,
    treasury: Pubkey,
) -> Result<()> {
    let config = config.resolve()?;

    let pool = &mut ctx.accounts.pool;
    pool.version = POOL_VERSION_0;
    pool.pool_bump = [ctx.bumps.pool];
    pool.market = ctx.accounts.market.key();
    pool.token_mint = ctx.accounts.token_mint.key();
    pool.vault = ctx.accounts.vault.key();
    pool.treasury = treasury;
    pool.config = config;
    pool.borrowable = 0;
    pool.addons = 0;

    emit!(events::PoolCreated {
        pool: pool.key(),
        market: pool.market,
        vault: pool.vault,
        token_mint: pool.token_mint,
        treasury: pool.treasury,
        authority: ctx.accounts.authority.key(),
        payer: ctx.accounts.payer.key(),
        version: pool.version,
    });

    Ok(())
}
