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

mod auto_repay;
mod configure_borrower;
mod configure_market;
mod configure_pool;
mod create_market;
mod create_pool;
mod deposit;
mod freeze_loan;
mod mark_loan_defaulted;
mod repay_loan;
mod revoke_loan;
mod take_installment_loan;
mod take_loan;
mod unfreeze_loan;
mod withdraw;

pub use auto_repay::*;
pub use configure_borrower::*;
pub use configure_market::*;
pub use configure_pool::*;
pub use create_market::*;
pub use create_pool::*;
pub use deposit::*;
pub use freeze_loan::*;
pub use mark_loan_defaulted::*;
pub use repay_loan::*;
pub use revoke_loan::*;
pub use take_installment_loan::*;
pub use take_loan::*;
pub use unfreeze_loan::*;
pub use withdraw::*;
