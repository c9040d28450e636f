use crate::decimal::Money;
use crate::errors::Result;
use crate::loan::{Loan, ScheduleRow};
use crate::payments::{add_months, level_payment};

use super::{next_row, AmortizationStrategy, ScheduleSegment};

/// piecewise-constant rates with re-amortization at each period boundary
///
/// Each row takes the rate of the period covering its payment date. Dates outside every
/// period fall back to the loan's base rate. Whenever the applicable period changes, the
/// payment is recomputed as a level payment of the running balance over the periods left.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableRateStrategy;

impl AmortizationStrategy for VariableRateStrategy {
    fn name(&self) -> &'static str {
        "variable_rate"
    }

    fn supports(&self, loan: &Loan) -> bool {
        loan.balloon_amount.is_none() && !loan.rate_periods.is_empty()
    }

    fn calculate_payment(&self, loan: &Loan) -> Result<Money> {
        let (rate, _) = loan.applicable_rate(add_months(loan.start_date, 1));
        level_payment(loan.principal, rate, loan.months)
    }

    fn build_rows(&self, loan: &Loan, segment: &ScheduleSegment) -> Result<Vec<ScheduleRow>> {
        let periods = segment.amortizing_periods;
        let first_date = segment.amortizing_first_date();
        let first_number = segment.amortizing_first_number();

        let mut rows = Vec::with_capacity(periods as usize);
        let mut balance = segment.opening_balance;
        let mut current = None;
        let mut payment = Money::ZERO;

        for i in 0..periods {
            let date = add_months(first_date, i);
            let applicable = loan.applicable_rate(date);

            if current != Some(applicable) {
                payment = level_payment(balance, applicable.0, periods - i)?;
                current = Some(applicable);
            }

            let (rate, period_id) = applicable;
            rows.push(next_row(
                &mut balance,
                rate,
                period_id,
                payment,
                i + 1 == periods,
                first_number + i,
                date,
            ));
        }

        Ok(rows)
    }
}
