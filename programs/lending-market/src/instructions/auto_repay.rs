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
use anchor_lang::AccountsExit;
use anchor_spl::token_interface::{self, Mint, TokenAccount, TokenInterface, TransferChecked};

use crate::state::{BorrowerConfig, Loan, LoanStatus, Market, Pool};
use crate::util::{validate_delegated_allowance, validate_parallel_arrays};
use crate::{events, seeds, ErrorCode};

/// Accounts per batch entry passed through `remaining_accounts`, strictly
/// in this order for each loan id: the loan record, the borrower's config,
/// and the borrower's token account.
const ACCOUNTS_PER_ENTRY: usize = 3;

#[derive(Accounts)]
pub struct AutoRepay<'info> {
    /// The market authority, which services loans in bulk
    pub authority: Signer<'info>,

    #[account(has_one = authority)]
    pub market: Account<'info, Market>,

    /// The pool the serviced loans were taken from
    #[account(mut, has_one = market, has_one = vault, has_one = token_mint)]
    pub pool: Account<'info, Pool>,

    /// The vault for the pool, where tokens are held
    #[account(mut)]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub token_mint: InterfaceAccount<'info, Mint>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn auto_repay_handler<'info>(
    ctx: Context<'_, '_, 'info, 'info, AutoRepay<'info>>,
    loan_ids: Vec<u64>,
    amounts: Vec<u64>,
) -> Result<()> {
    ctx.accounts.market.assert_not_paused()?;

    validate_parallel_arrays(loan_ids.len(), amounts.len())?;
    validate_parallel_arrays(
        loan_ids.len() * ACCOUNTS_PER_ENTRY,
        ctx.remaining_accounts.len(),
    )?;
    require!(!loan_ids.is_empty(), ErrorCode::InvalidAmount);

    let clock = Clock::get()?;
    let now = clock.unix_timestamp;

    let market_key = ctx.accounts.market.key();
    let pool_key = ctx.accounts.pool.key();
    let config = ctx.accounts.pool.config;
    let decimals = ctx.accounts.token_mint.decimals;

    // Copied out so the vault signer seeds outlive per-entry pool borrows
    let pool_market = ctx.accounts.pool.market;
    let pool_mint = ctx.accounts.pool.token_mint;
    let pool_bump = ctx.accounts.pool.pool_bump;
    let signer_seeds: &[&[u8]] = &[pool_market.as_ref(), pool_mint.as_ref(), &pool_bump];
    let signer = &[signer_seeds];

    // Entries are processed strictly in array order; later entries may
    // depend on balance changes made by earlier ones. Any failure aborts
    // the whole transaction, so the batch is atomic.
    for (index, (&loan_id, &amount)) in loan_ids.iter().zip(amounts.iter()).enumerate() {
        let loan_info = &ctx.remaining_accounts[index * ACCOUNTS_PER_ENTRY];
        let config_info = &ctx.remaining_accounts[index * ACCOUNTS_PER_ENTRY + 1];
        let source_info = &ctx.remaining_accounts[index * ACCOUNTS_PER_ENTRY + 2];

        let id_bytes = loan_id.to_le_bytes();
        let (expected_loan, _) = Pubkey::find_program_address(
            &[seeds::LOAN, market_key.as_ref(), &id_bytes],
            &crate::ID,
        );
        require_keys_eq!(loan_info.key(), expected_loan, ErrorCode::InvalidLoanAccount);

        let mut loan: Account<'info, Loan> = Account::try_from(loan_info)?;
        require_keys_eq!(loan.pool, pool_key, ErrorCode::InvalidLoanAccount);

        let (expected_config, _) = Pubkey::find_program_address(
            &[
                seeds::BORROWER_CONFIG,
                pool_key.as_ref(),
                loan.borrower.as_ref(),
            ],
            &crate::ID,
        );
        require_keys_eq!(
            config_info.key(),
            expected_config,
            ErrorCode::InvalidLoanAccount
        );
        let mut borrower_config: Account<'info, BorrowerConfig> =
            Account::try_from(config_info)?;

        let source: InterfaceAccount<'info, TokenAccount> =
            InterfaceAccount::try_from(source_info)?;
        require_keys_eq!(source.owner, loan.borrower, ErrorCode::InvalidLoanAccount);

        let repaid = loan.repay(&config, amount, now)?;
        arbor_program_common::debug_msg!("auto repay of {} applied to loan {}", repaid, loan_id);
        ctx.accounts.pool.on_loan_repaid(repaid)?;
        if loan.status == LoanStatus::Repaid {
            borrower_config.on_loan_settled(loan.borrow_amount);
        }

        // Repayment is pulled under the borrower's standing approval of
        // the pool as delegate
        validate_delegated_allowance(&source, pool_key, repaid)?;

        let transfer = CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            TransferChecked {
                from: source_info.clone(),
                to: ctx.accounts.vault.to_account_info(),
                authority: ctx.accounts.pool.to_account_info(),
                mint: ctx.accounts.token_mint.to_account_info(),
            },
        )
        .with_signer(signer);
        token_interface::transfer_checked(transfer, repaid, decimals)?;

        emit!(events::LoanRepaid {
            loan: loan.key(),
            loan_id,
            payer: loan.borrower,
            repaid_amount: repaid,
            outstanding_balance: loan.tracked_balance,
            fully_repaid: loan.status == LoanStatus::Repaid,
            summary: events::PoolSummary::from(&*ctx.accounts.pool),
        });

        // Manually loaded accounts must be written back explicitly
        loan.exit(&crate::ID)?;
        borrower_config.exit(&crate::ID)?;
    }

    Ok(())
}
