use hourglass_rs::SafeTimeProvider;
use tracing::{info, warn};

use crate::config::ArrearsConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::{Loan, ScheduleRow};
use crate::payments::period_interest;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::EventType;

use super::EventHandler;

/// an installment paid short; the gap moves into arrears
pub struct PartialPaymentHandler {
    priority: i32,
    config: ArrearsConfig,
    tolerance: Money,
    recalculation: ScheduleRecalculationService,
}

impl PartialPaymentHandler {
    pub fn new(priority: i32, config: ArrearsConfig) -> Self {
        Self {
            priority,
            config,
            tolerance: Money::TOLERANCE,
            recalculation: ScheduleRecalculationService::default(),
        }
    }

    /// shortfalls up to `tolerance` are rounding residue, not arrears
    pub fn with_tolerance(mut self, tolerance: Money) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// earliest unpaid installment; an overdue one is settled before anything upcoming
    fn installment_due(loan: &Loan) -> Option<ScheduleRow> {
        loan.next_unpaid_row().cloned()
    }
}

impl EventHandler for PartialPaymentHandler {
    fn name(&self) -> &'static str {
        "partial_payment"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::PartialPayment
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
        if amount.is_negative() {
            return Err(LoanError::invalid_input(format!(
                "partial payment cannot be negative: {}",
                amount
            )));
        }

        let scheduled;
        let source = if loan.schedule.is_empty() {
            scheduled = self.recalculation.recalculate(loan)?;
            &scheduled
        } else {
            loan
        };

        let due = Self::installment_due(source)
            .ok_or_else(|| LoanError::sequencing("no unpaid installment to apply a partial payment to"))?;
        let regular = due.payment_amount;
        if amount > regular {
            return Err(LoanError::sequencing(format!(
                "payment {} exceeds the regular payment {}; use extra_payment",
                amount, regular
            )));
        }

        let mut next = source.clone();

        // interest first, the rest to principal
        let interest_due = period_interest(loan.current_balance, due.rate);
        let to_interest = amount.min(interest_due);
        let to_principal = (amount - to_interest).min(loan.current_balance);
        next.current_balance -= to_principal;

        let shortfall = regular - amount;
        let mut late_fee = Money::ZERO;
        if shortfall > self.tolerance {
            let days_overdue = (event.event_date - due.payment_date).num_days().max(0) as u32;
            let arrears = next.arrears_mut();
            arrears.add_principal(shortfall)?;
            if self.config.late_fee.is_positive() {
                arrears.add_penalty(self.config.late_fee)?;
                late_fee = self.config.late_fee;
            }
            arrears.days_overdue = days_overdue;

            warn!(
                loan_id = %loan.id,
                payment_number = due.payment_number,
                shortfall = %shortfall,
                days_overdue,
                "installment paid short"
            );
        }

        next.payments_made = due.payment_number;
        if next.remaining_months() == 0 && next.current_balance.is_positive() {
            // short final installment; carry the residue one more month
            next.months += 1;
        }

        let mut next = self.recalculation.recalculate(&next)?;
        next.touch(time_provider);

        info!(
            loan_id = %loan.id,
            payment_number = due.payment_number,
            amount = %amount,
            "partial payment applied"
        );
        events.emit(Event::PartialPaymentReceived {
            loan_id: loan.id,
            payment_number: due.payment_number,
            amount,
            applied_to_interest: to_interest,
            applied_to_principal: to_principal,
            shortfall,
            late_fee,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }
}
