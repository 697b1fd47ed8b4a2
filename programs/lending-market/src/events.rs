use anchor_lang::prelude::*;

use crate::state::{Pool, PoolConfig};

#[event]
pub struct MarketCreated {
    pub market: Pubkey,
    pub authority: Pubkey,
    pub version: u8,
}

#[event]
pub struct MarketConfigured {
    pub market: Pubkey,
    pub flags: u64,
    pub authority: Pubkey,
}

#[event]
pub struct PoolCreated {
    pub pool: Pubkey,
    pub market: Pubkey,
    pub vault: Pubkey,
    pub token_mint: Pubkey,
    pub treasury: Pubkey,
    pub authority: Pubkey,
    pub payer: Pubkey,
    pub version: u8,
}

#[event]
pub struct PoolConfigured {
    pub pool: Pubkey,
    pub config: PoolConfig,
    pub treasury: Pubkey,
}

#[event]
pub struct BorrowerConfigured {
    pub pool: Pubkey,
    pub borrower: Pubkey,
    pub min_borrow_amount: u64,
    pub max_borrow_amount: u64,
    pub expiration: i64,
}

#[event]
#[derive(Debug)]
pub struct PoolDeposit {
    pub pool: Pubkey,
    pub source: Pubkey,
    pub amount: u64,
    pub summary: PoolSummary,
}

#[event]
pub struct PoolWithdraw {
    pub pool: Pubkey,
    pub destination: Pubkey,
    pub borrowable_amount: u64,
    pub addon_amount: u64,
    pub summary: PoolSummary,
}

#[event]
pub struct LoanTaken {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub pool: Pubkey,
    pub borrower: Pubkey,
    pub borrow_amount: u64,
    pub addon_amount: u64,
    pub duration_periods: u32,
    pub summary: PoolSummary,
}

#[event]
pub struct InstallmentLoanTaken {
    pub pool: Pubkey,
    pub borrower: Pubkey,
    pub first_installment_id: u64,
    pub installment_count: u16,
    pub total_borrow_amount: u64,
    pub total_addon_amount: u64,
    pub summary: PoolSummary,
}

#[event]
#[derive(Debug)]
pub struct LoanRepaid {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub payer: Pubkey,
    pub repaid_amount: u64,
    pub outstanding_balance: u64,
    pub fully_repaid: bool,
    pub summary: PoolSummary,
}

#[event]
pub struct LoanFrozen {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub freeze_timestamp: i64,
}

#[event]
pub struct LoanUnfrozen {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub tracked_timestamp: i64,
}

#[event]
pub struct LoanRevoked {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub shortfall: u64,
    pub refund: u64,
    pub addon_reversed: u64,
    pub summary: PoolSummary,
}

#[event]
pub struct LoanDefaulted {
    pub loan: Pubkey,
    pub loan_id: u64,
    pub timestamp: i64,
}

/// Common fields from [Pool] for event logging.
#[derive(AnchorDeserialize, AnchorSerialize, Debug)]
pub struct PoolSummary {
    pub borrowable: u64,
    pub addons: u64,
}

impl From<&Pool> for PoolSummary {
    fn from(pool: &Pool) -> Self {
        Self {
            borrowable: pool.borrowable,
            addons: pool.addons,
        }
    }
}
