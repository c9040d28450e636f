use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::SkipPaymentConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::EventType;

use super::EventHandler;

/// skip the next installments for a capitalized fee and a longer term
pub struct SkipPaymentHandler {
    priority: i32,
    config: SkipPaymentConfig,
    recalculation: ScheduleRecalculationService,
}

impl SkipPaymentHandler {
    pub fn new(priority: i32, config: SkipPaymentConfig) -> Self {
        Self {
            priority,
            config,
            recalculation: ScheduleRecalculationService::default(),
        }
    }

    /// penalty_rate x (balance / months) x count, rounded to cents
    pub fn calculate_penalty(&self, loan: &Loan, count: u32) -> Money {
        let regular = loan.current_balance / Decimal::from(loan.months);
        (regular * self.config.penalty_rate * Decimal::from(count)).round_cents()
    }
}

impl EventHandler for SkipPaymentHandler {
    fn name(&self) -> &'static str {
        "skip_payment"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::SkipPayment
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
        let count = event.month_count()?;
        if count == 0 || count > self.config.max_skips {
            return Err(LoanError::invalid_input(format!(
                "can skip between 1 and {} payments, got {}",
                self.config.max_skips, count
            )));
        }
        if loan.is_paid_off() {
            return Err(LoanError::sequencing("loan is paid off; nothing to skip"));
        }

        let penalty = self.calculate_penalty(loan, count);

        let mut extended = loan.clone();
        extended.current_balance += penalty;
        extended.months = loan.months + count;

        // a window already pending stays in front of the skipped months
        let mut next = self.recalculation.regenerate_remaining(
            &extended,
            loan.pending_deferrals() + count,
            loan.next_payment_date(),
        )?;
        next.touch(time_provider);

        info!(loan_id = %loan.id, count, penalty = %penalty, months = next.months, "payments skipped");
        events.emit(Event::PaymentsSkipped {
            loan_id: loan.id,
            count,
            penalty,
            new_balance: next.current_balance,
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
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (SafeTimeProvider, Loan, SkipPaymentHandler) {
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let loan = Loan::builder()
            .principal(Money::from_major(10_000))
            .annual_rate(Rate::from_percentage(5))
            .months(60)
            .start_date(date(2024, 1, 1))
            .build(&time)
            .unwrap();
        (time, loan, SkipPaymentHandler::new(20, SkipPaymentConfig::default()))
    }

    #[test]
    fn test_single_skip() {
        let (time, loan, handler) = setup();
        let mut events = EventStore::new();

        let next = handler
            .handle(&loan, &LoanEvent::skip_payment(1, date(2024, 2, 1)), &time, &mut events)
            .unwrap();

        // 0.02 x 10000/60 = 3.33
        assert_eq!(next.current_balance, Money::from_str_exact("10003.33").unwrap());
        assert_eq!(next.months, 61);
        assert_eq!(next.schedule.len(), 61);
        assert!(next.schedule[0].deferred);
        assert_eq!(next.schedule[1].payment_date, date(2024, 3, 1));
        assert_eq!(next.schedule.last().unwrap().balance, Money::ZERO);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_skip_after_grace_keeps_both_windows() {
        let (time, loan, handler) = setup();
        let grace = crate::handlers::GracePeriodHandler::new(10, crate::config::GraceConfig::default());
        let mut events = EventStore::new();

        let (graced, _) = grace.apply_grace_period(&loan, 2, date(2024, 1, 15), &time).unwrap();
        let next = handler
            .handle(&graced, &LoanEvent::skip_payment(1, date(2024, 1, 20)), &time, &mut events)
            .unwrap();

        assert_eq!(next.months, 63);
        assert_eq!(next.pending_deferrals(), 3);
        assert_eq!(next.schedule.len(), 63);
        assert_eq!(next.schedule[3].payment_date, date(2024, 5, 1));
        assert_eq!(next.schedule.last().unwrap().balance, Money::ZERO);
    }

    #[test]
    fn test_count_from_amount() {
        let (time, loan, handler) = setup();
        let mut events = EventStore::new();

        let event = LoanEvent::new(EventType::SkipPayment, dec!(3), date(2024, 2, 1));
        let next = handler.handle(&loan, &event, &time, &mut events).unwrap();
        assert_eq!(next.months, 63);
        assert_eq!(next.pending_deferrals(), 3);
        assert_eq!(next.current_balance, Money::from_major(10_010));
    }

    #[test]
    fn test_count_limits() {
        let (time, loan, handler) = setup();
        let mut events = EventStore::new();

        for count in [0, 13] {
            let result = handler.handle(&loan, &LoanEvent::skip_payment(count, date(2024, 2, 1)), &time, &mut events);
            assert!(matches!(result, Err(LoanError::InvalidInput { .. })));
        }
        assert!(handler
            .handle(&loan, &LoanEvent::skip_payment(12, date(2024, 2, 1)), &time, &mut events)
            .is_ok());

        let fractional = LoanEvent::new(EventType::SkipPayment, dec!(1.5), date(2024, 2, 1));
        assert!(handler.handle(&loan, &fractional, &time, &mut events).is_err());
    }

    #[test]
    fn test_configured_penalty_rate() {
        let (time, loan, _) = setup();
        let handler = SkipPaymentHandler::new(
            20,
            SkipPaymentConfig {
                max_skips: 2,
                penalty_rate: Decimal::ZERO,
            },
        );
        let mut events = EventStore::new();

        let next = handler
            .handle(&loan, &LoanEvent::skip_payment(2, date(2024, 2, 1)), &time, &mut events)
            .unwrap();
        assert_eq!(next.current_balance, loan.current_balance);
        assert!(handler
            .handle(&loan, &LoanEvent::skip_payment(3, date(2024, 2, 1)), &time, &mut events)
            .is_err());
    }
}
