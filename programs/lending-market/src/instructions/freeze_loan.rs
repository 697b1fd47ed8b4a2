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

use crate::state::{Loan, Market, Pool};
use crate::events;

#[derive(Accounts)]
pub struct FreezeLoan<'info> {
    /// The market authority, which must sign
    pub authority: Signer<'info>,

    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    #[account(has_one = market)]
    pub pool: Account<'info, Pool>,

    /// The loan to freeze
    #[account(mut, has_one = pool)]
    pub loan: Account<'info, Loan>,
}

pub fn freeze_loan_handler(ctx: Context<FreezeLoan>) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    let clock = Clock::get()?;
    let loan = &mut ctx.accounts.loan;
    loan.freeze(clock.unix_timestamp)?;

    emit!(events::LoanFrozen {
        loan: loan.key(),
        loan_id: loan.id,
        freeze_timestamp: loan.freeze_timestamp,
    });

    Ok(())
}
