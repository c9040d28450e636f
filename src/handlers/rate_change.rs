use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::EventType;

use super::EventHandler;

/// reprice a fixed-rate loan and re-amortize what is left
pub struct RateChangeHandler {
    priority: i32,
    recalculation: ScheduleRecalculationService,
}

impl RateChangeHandler {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            recalculation: ScheduleRecalculationService::default(),
        }
    }
}

impl EventHandler for RateChangeHandler {
    fn name(&self) -> &'static str {
        "rate_change"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::RateChange
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
        let new_rate = event
            .new_rate
            .ok_or_else(|| LoanError::invalid_input("rate change requires new_rate"))?;
        if !new_rate.is_valid_annual() {
            return Err(LoanError::invalid_input(format!(
                "rate {} outside [0, 1]",
                new_rate.as_decimal()
            )));
        }
        if !loan.rate_periods.is_empty() {
            return Err(LoanError::invalid_configuration(
                "loan rates are set by its rate periods",
            ));
        }

        let mut repriced = loan.clone();
        repriced.annual_rate = new_rate;

        let mut next = self.recalculation.recalculate(&repriced)?;
        next.touch(time_provider);

        info!(loan_id = %loan.id, old_rate = %loan.annual_rate, new_rate = %new_rate, "interest rate changed");
        events.emit(Event::InterestRateChanged {
            loan_id: loan.id,
            old_rate: loan.annual_rate,
            new_rate,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }
}
