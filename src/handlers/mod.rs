pub mod arrears_payment;
pub mod extra_payment;
pub mod grace_period;
pub mod partial_payment;
pub mod payment_holiday;
pub mod rate_change;
pub mod skip_payment;

use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::config::EngineConfig;
use crate::errors::{LoanError, Result};
use crate::events::{EventStore, LoanEvent};
use crate::loan::Loan;

pub use arrears_payment::ArrearsPaymentHandler;
pub use extra_payment::ExtraPaymentHandler;
pub use grace_period::{GracePeriodHandler, GracePeriodResult};
pub use partial_payment::PartialPaymentHandler;
pub use payment_holiday::{PaymentHoliday, PaymentHolidayHandler};
pub use rate_change::RateChangeHandler;
pub use skip_payment::SkipPaymentHandler;

/// one kind of life-cycle event
///
/// `handle` is pure: it validates first, works on a clone and returns the new loan.
/// The input loan is never modified, so an error leaves the caller's state untouched.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, event: &LoanEvent) -> bool;

    /// lower runs earlier when events share a date
    fn priority(&self) -> i32;

    fn handle(
        &self,
        loan: &Loan,
        event: &LoanEvent,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan>;
}

/// handlers ordered by ascending priority
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// every built-in handler, prioritized by `config.priorities`
    pub fn new(config: &EngineConfig) -> Self {
        let priorities = &config.priorities;
        let mut registry = Self::empty();
        registry.register(Box::new(GracePeriodHandler::new(priorities.grace_period, config.grace)));
        registry.register(Box::new(SkipPaymentHandler::new(priorities.skip_payment, config.skip)));
        registry.register(Box::new(
            PartialPaymentHandler::new(priorities.partial_payment, config.arrears)
                .with_tolerance(config.tolerance),
        ));
        registry.register(Box::new(ExtraPaymentHandler::new(priorities.extra_payment)));
        registry.register(Box::new(PaymentHolidayHandler::new(
            priorities.payment_holiday,
            config.holiday,
        )));
        registry.register(Box::new(RateChangeHandler::new(priorities.rate_change)));
        registry.register(Box::new(ArrearsPaymentHandler::new(priorities.arrears_payment)));
        registry
    }

    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// add a handler, keeping the list sorted; equal priorities keep insertion order
    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        let position = self
            .handlers
            .iter()
            .position(|h| h.priority() > handler.priority())
            .unwrap_or(self.handlers.len());
        self.handlers.insert(position, handler);
    }

    /// handler names in dispatch order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn handler_for(&self, event: &LoanEvent) -> Option<&dyn EventHandler> {
        self.handlers
            .iter()
            .find(|h| h.supports(event))
            .map(|h| h.as_ref())
    }

    /// route one event to the first handler that supports it
    pub fn dispatch(
        &self,
        loan: &Loan,
        event: &LoanEvent,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let handler = self.handler_for(event).ok_or(LoanError::UnsupportedEvent {
            event_type: event.event_type,
        })?;

        let updated = handler.handle(loan, event, time_provider, events)?;
        info!(
            loan_id = %loan.id,
            event_type = %event.event_type,
            handler = handler.name(),
            balance = %updated.current_balance,
            months = updated.months,
            "applied loan event"
        );
        Ok(updated)
    }

    /// apply events ordered by date, then handler priority; stops at the first error
    pub fn apply_all(
        &self,
        loan: &Loan,
        loan_events: &[LoanEvent],
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let mut ordered: Vec<&LoanEvent> = loan_events.iter().collect();
        ordered.sort_by_key(|event| {
            let priority = self.handler_for(event).map_or(i32::MAX, |h| h.priority());
            (event.event_date, priority)
        });

        let mut current = loan.clone();
        for event in ordered {
            current = self.dispatch(&current, event, time_provider, events)?;
        }
        Ok(current)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
