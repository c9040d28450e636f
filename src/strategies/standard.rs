use crate::decimal::Money;
use crate::errors::Result;
use crate::loan::{Loan, ScheduleRow};
use crate::payments::level_payment;

use super::{level_rows, AmortizationStrategy, ScheduleSegment};

/// fixed rate, level payment, fully amortizing
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStrategy;

impl AmortizationStrategy for StandardStrategy {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn supports(&self, loan: &Loan) -> bool {
        loan.balloon_amount.is_none() && loan.rate_periods.is_empty()
    }

    fn calculate_payment(&self, loan: &Loan) -> Result<Money> {
        level_payment(loan.principal, loan.annual_rate, loan.months)
    }

    fn build_rows(&self, loan: &Loan, segment: &ScheduleSegment) -> Result<Vec<ScheduleRow>> {
        let periods = segment.amortizing_periods;
        let payment = level_payment(segment.opening_balance, loan.annual_rate, periods)?;

        Ok(level_rows(
            segment.opening_balance,
            loan.annual_rate,
            None,
            payment,
            periods,
            segment.amortizing_first_number(),
            segment.amortizing_first_date(),
        ))
    }
}
