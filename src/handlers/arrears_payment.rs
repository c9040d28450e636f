use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::EventType;

use super::EventHandler;

/// pay down arrears: penalty, then interest, then principal
pub struct ArrearsPaymentHandler {
    priority: i32,
    recalculation: ScheduleRecalculationService,
}

impl ArrearsPaymentHandler {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            recalculation: ScheduleRecalculationService::default(),
        }
    }
}

impl EventHandler for ArrearsPaymentHandler {
    fn name(&self) -> &'static str {
        "arrears_payment"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::ArrearsPayment
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
        if !amount.is_positive() {
            return Err(LoanError::invalid_input(format!(
                "arrears payment must be positive, got {}",
                amount
            )));
        }

        let outstanding = match &loan.arrears {
            Some(arrears) if !arrears.is_cleared() => arrears.total(),
            _ => return Err(LoanError::sequencing("loan has no arrears to pay")),
        };
        if amount > outstanding {
            return Err(LoanError::sequencing(format!(
                "payment {} exceeds arrears of {}; send the surplus as extra_payment",
                amount, outstanding
            )));
        }

        let mut paid = loan.clone();
        let application = paid.arrears_mut().apply_payment(amount)?;
        paid.current_balance = (paid.current_balance - application.to_principal).max(Money::ZERO);
        let remaining_arrears = paid.arrears_total();

        let mut next = self.recalculation.recalculate(&paid)?;
        next.touch(time_provider);

        info!(
            loan_id = %loan.id,
            to_penalty = %application.to_penalty,
            to_interest = %application.to_interest,
            to_principal = %application.to_principal,
            remaining = %remaining_arrears,
            "arrears payment applied"
        );
        events.emit(Event::ArrearsPaymentApplied {
            loan_id: loan.id,
            application,
            remaining_arrears,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }
}
