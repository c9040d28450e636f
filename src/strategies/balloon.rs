use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::loan::{Loan, ScheduleRow};
use crate::payments::level_payment;

use super::{level_rows, AmortizationStrategy, ScheduleSegment};

/// level payments that leave a lump sum due with the last installment
///
/// The regular payment is the standard level payment of `balance - balloon`. Interest is
/// still charged on the whole running balance, so the last row retires more than the
/// balloon itself: everything left, reported with the balloon on `balloon_amount`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalloonPaymentStrategy;

/// regular payment leaving `balloon` outstanding after `periods` months
pub fn balloon_payment(balance: Money, balloon: Money, annual_rate: Rate, periods: u32) -> Result<Money> {
    if balloon.is_negative() || balloon > balance {
        return Err(LoanError::invalid_configuration(format!(
            "balloon {} must be between zero and balance {}",
            balloon, balance
        )));
    }
    level_payment(balance - balloon, annual_rate, periods)
}

fn balloon_of(loan: &Loan) -> Result<Money> {
    loan.balloon_amount
        .ok_or_else(|| LoanError::invalid_configuration("loan has no balloon amount"))
}

impl AmortizationStrategy for BalloonPaymentStrategy {
    fn name(&self) -> &'static str {
        "balloon_payment"
    }

    fn supports(&self, loan: &Loan) -> bool {
        loan.balloon_amount.is_some()
    }

    fn calculate_payment(&self, loan: &Loan) -> Result<Money> {
        let balloon = balloon_of(loan)?;
        if !balloon.is_positive() || balloon >= loan.principal {
            return Err(LoanError::invalid_configuration(format!(
                "balloon {} must be positive and below principal {}",
                balloon, loan.principal
            )));
        }
        balloon_payment(loan.principal, balloon, loan.annual_rate, loan.months)
    }

    fn build_rows(&self, loan: &Loan, segment: &ScheduleSegment) -> Result<Vec<ScheduleRow>> {
        if !loan.rate_periods.is_empty() {
            return Err(LoanError::invalid_configuration(
                "balloon loans cannot carry rate periods",
            ));
        }

        // prepayments can shrink the balance below the original balloon
        let balloon = balloon_of(loan)?.min(segment.opening_balance);
        let periods = segment.amortizing_periods;
        let payment = balloon_payment(segment.opening_balance, balloon, loan.annual_rate, periods)?;

        let mut rows = level_rows(
            segment.opening_balance,
            loan.annual_rate,
            None,
            payment,
            periods,
            segment.amortizing_first_number(),
            segment.amortizing_first_date(),
        );
        if let Some(last) = rows.last_mut() {
            last.balloon_amount = Some(balloon);
        }

        Ok(rows)
    }
}
