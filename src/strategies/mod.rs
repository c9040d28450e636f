pub mod balloon;
pub mod standard;
pub mod variable_rate;

use chrono::NaiveDate;
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::loan::{Loan, ScheduleRow};
use crate::payments::{add_months, period_interest};
use crate::types::RatePeriodId;

pub use balloon::BalloonPaymentStrategy;
pub use standard::StandardStrategy;
pub use variable_rate::VariableRateStrategy;

/// the stretch of schedule a strategy is asked to produce
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSegment {
    pub opening_balance: Money,
    pub first_payment_number: u32,
    pub first_payment_date: NaiveDate,
    /// leading periods with nothing due
    pub deferred_periods: u32,
    /// periods over which the opening balance is retired
    pub amortizing_periods: u32,
}

impl ScheduleSegment {
    /// whole term from origination: principal over `months`
    pub fn full_term(loan: &Loan) -> Self {
        Self {
            opening_balance: loan.principal,
            first_payment_number: 1,
            first_payment_date: add_months(loan.start_date, 1),
            deferred_periods: 0,
            amortizing_periods: loan.months,
        }
    }

    /// unpaid remainder: current balance over the months not yet serviced
    pub fn remaining(loan: &Loan) -> Self {
        Self {
            opening_balance: loan.current_balance,
            first_payment_number: loan.payments_made + 1,
            first_payment_date: loan.next_payment_date(),
            deferred_periods: 0,
            amortizing_periods: loan.remaining_months(),
        }
    }

    /// move `periods` from the amortizing part into a leading deferral window
    pub fn with_deferral(mut self, periods: u32) -> Self {
        let deferred = periods.min(self.amortizing_periods);
        self.deferred_periods += deferred;
        self.amortizing_periods -= deferred;
        self
    }

    pub fn starting_on(mut self, date: NaiveDate) -> Self {
        self.first_payment_date = date;
        self
    }

    pub fn total_periods(&self) -> u32 {
        self.deferred_periods + self.amortizing_periods
    }

    pub fn amortizing_first_number(&self) -> u32 {
        self.first_payment_number + self.deferred_periods
    }

    pub fn amortizing_first_date(&self) -> NaiveDate {
        add_months(self.first_payment_date, self.deferred_periods)
    }
}

/// polymorphic schedule generator
pub trait AmortizationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, loan: &Loan) -> bool;

    /// regular payment for the loan's original terms
    fn calculate_payment(&self, loan: &Loan) -> Result<Money>;

    /// amortizing rows for a segment, excluding its deferral window
    fn build_rows(&self, loan: &Loan, segment: &ScheduleSegment) -> Result<Vec<ScheduleRow>>;

    /// full schedule of exactly `months` rows
    fn calculate_schedule(&self, loan: &Loan) -> Result<Vec<ScheduleRow>> {
        self.build_segment(loan, &ScheduleSegment::full_term(loan))
    }

    /// deferral rows followed by the amortizing rows
    fn build_segment(&self, loan: &Loan, segment: &ScheduleSegment) -> Result<Vec<ScheduleRow>> {
        if segment.amortizing_periods == 0 && segment.opening_balance.is_positive() {
            return Err(LoanError::CalculationError {
                message: format!(
                    "no periods left to retire a balance of {}",
                    segment.opening_balance
                ),
            });
        }

        let mut rows = Vec::with_capacity(segment.total_periods() as usize);
        for i in 0..segment.deferred_periods {
            let date = add_months(segment.first_payment_date, i);
            let (rate, period_id) = loan.applicable_rate(date);
            rows.push(ScheduleRow::deferral(
                segment.first_payment_number + i,
                date,
                segment.opening_balance,
                rate,
                period_id,
            ));
        }

        rows.extend(self.build_rows(loan, segment)?);
        Ok(rows)
    }
}

/// walk a level payment forward; the last row takes whatever balance is left
pub(crate) fn level_rows(
    opening_balance: Money,
    rate: Rate,
    rate_period_id: Option<RatePeriodId>,
    payment: Money,
    periods: u32,
    first_payment_number: u32,
    first_payment_date: NaiveDate,
) -> Vec<ScheduleRow> {
    let mut rows = Vec::with_capacity(periods as usize);
    let mut balance = opening_balance;

    for i in 0..periods {
        let row = next_row(
            &mut balance,
            rate,
            rate_period_id,
            payment,
            i + 1 == periods,
            first_payment_number + i,
            add_months(first_payment_date, i),
        );
        rows.push(row);
    }

    rows
}

/// one amortizing row; advances `balance`
pub(crate) fn next_row(
    balance: &mut Money,
    rate: Rate,
    rate_period_id: Option<RatePeriodId>,
    payment: Money,
    is_last: bool,
    payment_number: u32,
    payment_date: NaiveDate,
) -> ScheduleRow {
    let interest = period_interest(*balance, rate);
    let principal = if is_last {
        *balance
    } else {
        (payment - interest).max(Money::ZERO).min(*balance)
    };
    *balance -= principal;

    ScheduleRow {
        payment_number,
        payment_date,
        payment_amount: principal + interest,
        principal_portion: principal,
        interest_portion: interest,
        balance: *balance,
        rate,
        rate_period_id,
        balloon_amount: None,
        deferred: false,
    }
}

/// picks the first strategy that supports a loan
pub struct StrategySelector {
    strategies: Vec<Box<dyn AmortizationStrategy>>,
}

impl StrategySelector {
    pub fn new(strategies: Vec<Box<dyn AmortizationStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn select(&self, loan: &Loan) -> Result<&dyn AmortizationStrategy> {
        let strategy = self
            .strategies
            .iter()
            .find(|s| s.supports(loan))
            .ok_or(LoanError::NoApplicableStrategy)?;

        debug!(loan_id = %loan.id, strategy = strategy.name(), "selected amortization strategy");
        Ok(strategy.as_ref())
    }
}

impl Default for StrategySelector {
    /// balloon, then variable rate, then standard
    fn default() -> Self {
        Self::new(vec![
            Box::new(BalloonPaymentStrategy),
            Box::new(VariableRateStrategy),
            Box::new(StandardStrategy),
        ])
    }
}
