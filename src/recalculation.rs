use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::Money;
use crate::errors::Result;
use crate::loan::Loan;
use crate::payments::{add_months, level_payment, period_interest, term_for_payment};
use crate::strategies::{ScheduleSegment, StrategySelector};
use crate::types::{EventType, LoanId};

/// snapshot of the remaining obligation after a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationSummary {
    pub loan_id: LoanId,
    pub monthly_payment: Money,
    pub remaining_payments: u32,
    pub payoff_date: NaiveDate,
    pub total_interest: Money,
}

/// rebuilds the unpaid part of a schedule and answers payoff questions
#[derive(Default)]
pub struct ScheduleRecalculationService {
    selector: StrategySelector,
}

impl ScheduleRecalculationService {
    pub fn new(selector: StrategySelector) -> Self {
        Self { selector }
    }

    /// events that reshape the schedule through this service
    pub fn should_recalculate(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::ExtraPayment | EventType::SkipPayment | EventType::RateChange => true,
            EventType::GracePeriod
            | EventType::PaymentHoliday
            | EventType::InterestAccrual
            | EventType::PartialPayment
            | EventType::ArrearsPayment => false,
        }
    }

    /// keep the paid rows, then `deferred_periods` deferral rows starting on
    /// `first_payment_date`, then the strategy's rows for the unpaid balance
    ///
    /// `loan.months` must already include any extension; the result has exactly that many
    /// rows. A zero balance closes the schedule at the paid rows.
    pub fn regenerate_remaining(
        &self,
        loan: &Loan,
        deferred_periods: u32,
        first_payment_date: NaiveDate,
    ) -> Result<Loan> {
        let mut next = loan.clone();
        let mut schedule = loan.paid_rows().to_vec();

        if !loan.current_balance.is_positive() {
            next.months = loan.payments_made;
            next.schedule = schedule;
            debug!(loan_id = %loan.id, payments_made = loan.payments_made, "schedule closed at zero balance");
            return Ok(next);
        }

        let segment = ScheduleSegment::remaining(loan)
            .starting_on(first_payment_date)
            .with_deferral(deferred_periods);
        let strategy = self.selector.select(loan)?;
        schedule.extend(strategy.build_segment(loan, &segment)?);

        debug!(
            loan_id = %loan.id,
            strategy = strategy.name(),
            from_payment = segment.first_payment_number,
            deferred = segment.deferred_periods,
            amortizing = segment.amortizing_periods,
            "regenerated remaining schedule"
        );

        next.schedule = schedule;
        Ok(next)
    }

    /// regenerate the unpaid rows, keeping any deferral window already scheduled
    pub fn recalculate(&self, loan: &Loan) -> Result<Loan> {
        self.regenerate_remaining(loan, loan.pending_deferrals(), loan.next_payment_date())
    }

    /// level payment of the current balance over the months left
    pub fn calculate_monthly_payment(&self, loan: &Loan) -> Result<Money> {
        level_payment(loan.current_balance, loan.annual_rate, loan.remaining_months())
    }

    /// level payments needed at the current regular payment
    pub fn calculate_remaining_payments(&self, loan: &Loan) -> u32 {
        match loan.regular_payment() {
            Some(payment) => term_for_payment(
                loan.current_balance,
                loan.annual_rate,
                payment,
                loan.remaining_months(),
            ),
            None => loan.remaining_months(),
        }
    }

    /// date the balance is retired when `extra_monthly` is added to every payment
    pub fn calculate_early_payoff_date(&self, loan: &Loan, extra_monthly: Money) -> Result<NaiveDate> {
        let projection = self.simulate(loan, extra_monthly)?;
        Ok(match projection.payoff_period {
            Some(period) => add_months(loan.next_payment_date(), period),
            None => loan.maturity_date(),
        })
    }

    /// interest still to be paid on the regenerated remaining schedule
    pub fn calculate_total_interest(&self, loan: &Loan) -> Result<Money> {
        let regenerated = self.recalculate(loan)?;
        Ok(regenerated.schedule[regenerated.paid_rows().len()..]
            .iter()
            .map(|row| row.interest_portion)
            .sum())
    }

    /// interest avoided by paying `extra_monthly` on top of each payment
    pub fn calculate_interest_savings(&self, loan: &Loan, extra_monthly: Money) -> Result<Money> {
        let baseline = self.simulate(loan, Money::ZERO)?;
        let accelerated = self.simulate(loan, extra_monthly)?;
        Ok((baseline.total_interest - accelerated.total_interest).max(Money::ZERO))
    }

    pub fn summarize(&self, loan: &Loan) -> Result<RecalculationSummary> {
        Ok(RecalculationSummary {
            loan_id: loan.id,
            monthly_payment: self.calculate_monthly_payment(loan)?,
            remaining_payments: self.calculate_remaining_payments(loan),
            payoff_date: self.calculate_early_payoff_date(loan, Money::ZERO)?,
            total_interest: self.calculate_total_interest(loan)?,
        })
    }

    /// month-by-month projection bounded by the remaining term
    fn simulate(&self, loan: &Loan, extra_monthly: Money) -> Result<Projection> {
        let payment = self.calculate_monthly_payment(loan)? + extra_monthly;
        let mut balance = loan.current_balance;
        let mut total_interest = Money::ZERO;

        for period in 0..loan.remaining_months() {
            if !balance.is_positive() {
                break;
            }
            let interest = period_interest(balance, loan.annual_rate);
            let principal = (payment - interest).min(balance);
            if !principal.is_positive() {
                break;
            }

            total_interest += interest;
            balance -= principal;
            if !balance.is_positive() {
                return Ok(Projection {
                    total_interest,
                    payoff_period: Some(period),
                });
            }
        }

        Ok(Projection {
            total_interest,
            payoff_period: None,
        })
    }
}

struct Projection {
    total_interest: Money,
    /// zero-based offset from the next payment date
    payoff_period: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_loan() -> Loan {
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        Loan::builder()
            .principal(Money::from_major(10_000))
            .annual_rate(Rate::from_percentage(5))
            .months(60)
            .start_date(date(2024, 1, 1))
            .build(&time)
            .unwrap()
    }

    #[test]
    fn test_should_recalculate() {
        let service = ScheduleRecalculationService::default();
        assert!(service.should_recalculate(EventType::ExtraPayment));
        assert!(service.should_recalculate(EventType::SkipPayment));
        assert!(service.should_recalculate(EventType::RateChange));
        assert!(!service.should_recalculate(EventType::GracePeriod));
        assert!(!service.should_recalculate(EventType::PaymentHoliday));
        assert!(!service.should_recalculate(EventType::InterestAccrual));
    }

    #[test]
    fn test_fresh_loan_queries() {
        let service = ScheduleRecalculationService::default();
        let loan = create_test_loan();

        assert_eq!(
            service.calculate_monthly_payment(&loan).unwrap(),
            Money::from_str_exact("188.71").unwrap()
        );
        assert_eq!(service.calculate_remaining_payments(&loan), 60);

        let scheduled: Money = loan.schedule.iter().map(|r| r.interest_portion).sum();
        assert_eq!(service.calculate_total_interest(&loan).unwrap(), scheduled);
    }

    #[test]
    fn test_early_payoff_with_extra() {
        let service = ScheduleRecalculationService::default();
        let loan = create_test_loan();

        let baseline = service.calculate_early_payoff_date(&loan, Money::ZERO).unwrap();
        let accelerated = service
            .calculate_early_payoff_date(&loan, Money::from_major(100))
            .unwrap();

        assert!(baseline <= loan.maturity_date());
        assert!(accelerated < baseline);

        let savings = service
            .calculate_interest_savings(&loan, Money::from_major(100))
            .unwrap();
        assert!(savings.is_positive());
        assert_eq!(
            service.calculate_interest_savings(&loan, Money::ZERO).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn test_regenerate_keeps_paid_rows() {
        let service = ScheduleRecalculationService::default();
        let mut loan = create_test_loan();
        loan.payments_made = 12;
        loan.current_balance = loan.schedule[11].balance - Money::from_major(1_000);

        let regenerated = service.recalculate(&loan).unwrap();
        assert_eq!(regenerated.schedule.len(), 60);
        assert_eq!(regenerated.schedule[..12], loan.schedule[..12]);
        assert_eq!(regenerated.schedule[12].payment_number, 13);
        assert_eq!(regenerated.schedule[12].payment_date, date(2025, 2, 1));
        assert!(regenerated.schedule[12].payment_amount < loan.schedule[12].payment_amount);
        assert_eq!(regenerated.schedule.last().unwrap().balance, Money::ZERO);
    }

    #[test]
    fn test_regenerate_with_deferral() {
        let service = ScheduleRecalculationService::default();
        let mut loan = create_test_loan();
        loan.months = 62;

        let regenerated = service
            .regenerate_remaining(&loan, 2, loan.next_payment_date())
            .unwrap();
        assert_eq!(regenerated.schedule.len(), 62);
        assert!(regenerated.schedule[0].deferred);
        assert!(regenerated.schedule[1].deferred);
        assert!(!regenerated.schedule[2].deferred);
        assert_eq!(regenerated.schedule[2].payment_date, date(2024, 4, 1));
    }

    #[test]
    fn test_zero_balance_closes_schedule() {
        let service = ScheduleRecalculationService::default();
        let mut loan = create_test_loan();
        loan.payments_made = 3;
        loan.current_balance = Money::ZERO;

        let closed = service.recalculate(&loan).unwrap();
        assert_eq!(closed.months, 3);
        assert_eq!(closed.schedule.len(), 3);
    }

    #[test]
    fn test_summary() {
        let service = ScheduleRecalculationService::default();
        let loan = create_test_loan();

        let summary = service.summarize(&loan).unwrap();
        assert_eq!(summary.loan_id, loan.id);
        assert_eq!(summary.remaining_payments, 60);
        assert!(summary.total_interest.is_positive());
    }
}
