use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::payments::term_for_payment;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::{EventType, ExtraPaymentStrategy};

use super::EventHandler;

/// principal prepayment; shortens the term or lowers the payment
pub struct ExtraPaymentHandler {
    priority: i32,
    recalculation: ScheduleRecalculationService,
}

impl ExtraPaymentHandler {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            recalculation: ScheduleRecalculationService::default(),
        }
    }

    /// keep the current payment and drop the months it no longer needs
    ///
    /// A balloon is settled with the last row, not by the regular payments, so only the
    /// balance above it decides the term.
    fn reduce_term(&self, loan: &Loan, reduced: &mut Loan) -> Result<()> {
        let deferred = loan.pending_deferrals();
        let amortizing = loan.remaining_months().saturating_sub(deferred);

        let balloon = loan.balloon_amount.unwrap_or(Money::ZERO).min(reduced.current_balance);
        let amortizable = reduced.current_balance - balloon;
        if !amortizable.is_positive() {
            return Ok(());
        }

        let (payment, rate) = match loan.next_unpaid_row() {
            Some(row) => (row.payment_amount, row.rate),
            None => (self.recalculation.calculate_monthly_payment(loan)?, loan.annual_rate),
        };

        let new_remaining = term_for_payment(amortizable, rate, payment, amortizing).max(1);
        reduced.months = loan.payments_made + deferred + new_remaining;
        Ok(())
    }
}

impl EventHandler for ExtraPaymentHandler {
    fn name(&self) -> &'static str {
        "extra_payment"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::ExtraPayment
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
        let amount = event.money();
        if !amount.is_positive() || amount > loan.current_balance {
            return Err(LoanError::invalid_input(format!(
                "extra payment must be positive and at most the balance {}, got {}",
                loan.current_balance, amount
            )));
        }

        let strategy = event.strategy.unwrap_or_default();
        let mut reduced = loan.clone();
        reduced.current_balance -= amount;

        if reduced.current_balance.is_positive() && strategy == ExtraPaymentStrategy::ReduceTerm {
            self.reduce_term(loan, &mut reduced)?;
        }

        // a zero balance closes the schedule at the paid rows
        let mut next = self.recalculation.recalculate(&reduced)?;
        next.touch(time_provider);

        info!(
            loan_id = %loan.id,
            amount = %amount,
            strategy = ?strategy,
            balance = %next.current_balance,
            months = next.months,
            "extra payment applied"
        );
        events.emit(Event::ExtraPaymentApplied {
            loan_id: loan.id,
            amount,
            strategy,
            new_balance: next.current_balance,
            new_term: next.months,
            timestamp: time_provider.now(),
        });
        if next.is_paid_off() {
            events.emit(Event::LoanPaidOff {
                loan_id: loan.id,
                payments_made: next.payments_made,
                timestamp: time_provider.now(),
            });
        }

        Ok(next)
    }
}
