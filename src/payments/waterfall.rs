use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::LoanId;

/// arrears bucket, listed in waterfall order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrearsBucket {
    Penalty = 1,
    Interest = 2,
    Principal = 3,
}

impl ArrearsBucket {
    /// penalty -> interest -> principal
    pub const WATERFALL: [ArrearsBucket; 3] = [
        ArrearsBucket::Penalty,
        ArrearsBucket::Interest,
        ArrearsBucket::Principal,
    ];
}

/// unpaid shortfall owed on a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrears {
    pub loan_id: LoanId,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub penalty_amount: Money,
    pub days_overdue: u32,
}

/// how a payment was spread across the arrears buckets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrearsApplication {
    pub to_penalty: Money,
    pub to_interest: Money,
    pub to_principal: Money,
    /// left over after every bucket is drained; the caller decides what to do with it
    pub unapplied: Money,
}

impl ArrearsApplication {
    pub fn total_applied(&self) -> Money {
        self.to_penalty + self.to_interest + self.to_principal
    }
}

impl Arrears {
    pub fn new(loan_id: LoanId) -> Self {
        Self {
            loan_id,
            principal_amount: Money::ZERO,
            interest_amount: Money::ZERO,
            penalty_amount: Money::ZERO,
            days_overdue: 0,
        }
    }

    pub fn principal(&self) -> Money {
        self.principal_amount
    }

    pub fn interest(&self) -> Money {
        self.interest_amount
    }

    pub fn penalty(&self) -> Money {
        self.penalty_amount
    }

    /// penalty + interest + principal
    pub fn total(&self) -> Money {
        self.penalty_amount + self.interest_amount + self.principal_amount
    }

    /// interest + principal, without penalties
    pub fn total_excluding_penalty(&self) -> Money {
        self.interest_amount + self.principal_amount
    }

    pub fn is_cleared(&self) -> bool {
        self.penalty_amount.is_zero() && self.interest_amount.is_zero() && self.principal_amount.is_zero()
    }

    pub fn add_principal(&mut self, amount: Money) -> Result<()> {
        Self::check_non_negative(amount)?;
        self.principal_amount += amount;
        Ok(())
    }

    pub fn add_interest(&mut self, amount: Money) -> Result<()> {
        Self::check_non_negative(amount)?;
        self.interest_amount += amount;
        Ok(())
    }

    pub fn add_penalty(&mut self, amount: Money) -> Result<()> {
        Self::check_non_negative(amount)?;
        self.penalty_amount += amount;
        Ok(())
    }

    /// drain buckets strictly in waterfall order
    pub fn apply_payment(&mut self, amount: Money) -> Result<ArrearsApplication> {
        if amount.is_negative() {
            return Err(LoanError::invalid_input(format!(
                "arrears payment cannot be negative: {}",
                amount
            )));
        }

        let mut remaining = amount;
        let mut application = ArrearsApplication::default();

        for bucket in ArrearsBucket::WATERFALL {
            if remaining.is_zero() {
                break;
            }

            let (balance, applied) = match bucket {
                ArrearsBucket::Penalty => (&mut self.penalty_amount, &mut application.to_penalty),
                ArrearsBucket::Interest => (&mut self.interest_amount, &mut application.to_interest),
                ArrearsBucket::Principal => (&mut self.principal_amount, &mut application.to_principal),
            };

            let payment = remaining.min(*balance);
            *balance -= payment;
            *applied = payment;
            remaining -= payment;
        }

        if self.is_cleared() {
            self.days_overdue = 0;
        }

        application.unapplied = remaining;
        Ok(application)
    }

    fn check_non_negative(amount: Money) -> Result<()> {
        if amount.is_negative() {
            return Err(LoanError::invalid_input(format!(
                "arrears amount cannot be negative: {}",
                amount
            )));
        }
        Ok(())
    }
}
