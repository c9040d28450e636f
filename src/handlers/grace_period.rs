use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GraceConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::payments::add_months;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::EventType;

use super::EventHandler;

/// outcome of a grace period, in the shape downstream reporting expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GracePeriodResult {
    pub event_type: EventType,
    pub grace_months: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// total term once the grace months are added
    pub months_after_grace: u32,
    /// simple interest over the grace window; reported, not capitalized
    pub accrued_interest: Money,
}

/// payment-free months inserted ahead of the unpaid schedule
pub struct GracePeriodHandler {
    priority: i32,
    config: GraceConfig,
    recalculation: ScheduleRecalculationService,
}

impl GracePeriodHandler {
    pub fn new(priority: i32, config: GraceConfig) -> Self {
        Self {
            priority,
            config,
            recalculation: ScheduleRecalculationService::default(),
        }
    }

    /// insert `months` deferral rows at the next payment date and push the unpaid rows back
    ///
    /// The pushed rows are rebuilt by the loan's strategy, so they carry the rate in force
    /// on their new dates. Any window already pending stays in front of the new one.
    pub fn apply_grace_period(
        &self,
        loan: &Loan,
        months: u32,
        start_date: NaiveDate,
        time_provider: &SafeTimeProvider,
    ) -> Result<(Loan, GracePeriodResult)> {
        if months == 0 || months > self.config.max_months {
            return Err(LoanError::invalid_input(format!(
                "grace period must be between 1 and {} months, got {}",
                self.config.max_months, months
            )));
        }

        let accrued_interest = loan
            .current_balance
            .simple_monthly_interest(loan.annual_rate, months)
            .round_cents();

        let mut extended = loan.clone();
        extended.months = loan.months + months;
        let mut next = self.recalculation.regenerate_remaining(
            &extended,
            loan.pending_deferrals() + months,
            loan.next_payment_date(),
        )?;
        next.touch(time_provider);

        let result = GracePeriodResult {
            event_type: EventType::GracePeriod,
            grace_months: months,
            start_date,
            end_date: add_months(start_date, months),
            months_after_grace: next.months,
            accrued_interest,
        };

        Ok((next, result))
    }
}

impl EventHandler for GracePeriodHandler {
    fn name(&self) -> &'static str {
        "grace_period"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::GracePeriod
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handle(
        &self,
        loan: &Loan,
        event: &LoanEvent,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let months = event.month_count()?;
        let (next, result) = self.apply_grace_period(loan, months, event.event_date, time_provider)?;

        info!(
            loan_id = %loan.id,
            grace_months = months,
            accrued_interest = %result.accrued_interest,
            "grace period applied"
        );
        events.emit(Event::GracePeriodApplied {
            loan_id: loan.id,
            grace_months: months,
            accrued_interest: result.accrued_interest,
            new_term: next.months,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (SafeTimeProvider, Loan) {
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let loan = Loan::builder()
            .principal(Money::from_major(12_000))
            .annual_rate(Rate::from_percentage(6))
            .months(24)
            .start_date(date(2024, 1, 1))
            .build(&time)
            .unwrap();
        (time, loan)
    }

    #[test]
    fn test_grace_extends_term_without_changing_amounts() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());

        let (next, result) = handler
            .apply_grace_period(&loan, 3, date(2024, 2, 1), &time)
            .unwrap();

        assert_eq!(next.months, 27);
        assert_eq!(next.schedule.len(), 27);
        assert_eq!(next.current_balance, loan.current_balance);
        assert!(next.schedule[..3].iter().all(|row| row.deferred));

        // the old first installment now lands three months later
        let moved = &next.schedule[3];
        assert_eq!(moved.payment_number, 4);
        assert_eq!(moved.payment_date, date(2024, 5, 1));
        assert_eq!(moved.payment_amount, loan.schedule[0].payment_amount);
        assert_eq!(moved.balance, loan.schedule[0].balance);

        assert_eq!(result.grace_months, 3);
        assert_eq!(result.end_date, date(2024, 5, 1));
        assert_eq!(result.months_after_grace, 27);
        assert_eq!(result.accrued_interest, Money::from_major(180));
    }

    #[test]
    fn test_zero_months_rejected() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());
        assert!(matches!(
            handler.apply_grace_period(&loan, 0, date(2024, 2, 1), &time),
            Err(LoanError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_grace_beyond_limit_rejected() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());

        for months in [13, u32::MAX] {
            assert!(matches!(
                handler.apply_grace_period(&loan, months, date(2024, 2, 1), &time),
                Err(LoanError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_shifted_rows_take_rate_of_new_date() {
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let loan = Loan::builder()
            .principal(Money::from_major(20_000))
            .annual_rate(Rate::from_percentage(3))
            .months(36)
            .start_date(date(2024, 1, 1))
            .rate_period(Rate::from_percentage(3), date(2024, 1, 1), Some(date(2025, 1, 1)))
            .rate_period(Rate::from_percentage(7), date(2025, 1, 1), None)
            .build(&time)
            .unwrap();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());

        let (next, _) = handler
            .apply_grace_period(&loan, 3, date(2024, 2, 1), &time)
            .unwrap();

        assert_eq!(next.schedule.len(), 39);
        for row in &next.schedule {
            assert_eq!((row.rate, row.rate_period_id), next.applicable_rate(row.payment_date));
        }
        assert_eq!(next.schedule.last().unwrap().balance, Money::ZERO);
    }

    #[test]
    fn test_second_grace_keeps_pending_window() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());

        let (first, _) = handler.apply_grace_period(&loan, 2, date(2024, 2, 1), &time).unwrap();
        let (second, _) = handler.apply_grace_period(&first, 1, date(2024, 2, 1), &time).unwrap();

        assert_eq!(second.months, 27);
        assert_eq!(second.pending_deferrals(), 3);
        assert_eq!(second.schedule[3].payment_amount, loan.schedule[0].payment_amount);
    }

    #[test]
    fn test_result_serialization() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());
        let (_, result) = handler
            .apply_grace_period(&loan, 2, date(2024, 2, 1), &time)
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["event_type"], "grace_period");
        assert_eq!(json["grace_months"], 2);
        assert_eq!(json["months_after_grace"], 26);
        assert_eq!(json["end_date"], "2024-04-01");
    }

    #[test]
    fn test_handle_reads_months_from_amount() {
        let (time, loan) = setup();
        let handler = GracePeriodHandler::new(10, GraceConfig::default());
        let mut events = EventStore::new();

        let event = LoanEvent::new(EventType::GracePeriod, rust_decimal_macros::dec!(2), date(2024, 2, 1));
        let next = handler.handle(&loan, &event, &time, &mut events).unwrap();

        assert_eq!(next.months, 26);
        assert_eq!(events.len(), 1);
    }
}
