use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::payments::ArrearsApplication;
use crate::types::{EventType, ExtraPaymentStrategy, HolidayId, HolidayMode, LoanId};

/// a life-cycle event submitted against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanEvent {
    pub event_type: EventType,
    pub amount: Decimal,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub new_rate: Option<Rate>,
    #[serde(default)]
    pub months_to_skip: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub strategy: Option<ExtraPaymentStrategy>,
    #[serde(default)]
    pub holiday_mode: Option<HolidayMode>,
}

impl LoanEvent {
    pub fn new(event_type: EventType, amount: Decimal, event_date: NaiveDate) -> Self {
        Self {
            event_type,
            amount,
            event_date,
            new_rate: None,
            months_to_skip: None,
            notes: None,
            strategy: None,
            holiday_mode: None,
        }
    }

    pub fn grace_period(months: u32, event_date: NaiveDate) -> Self {
        Self::new(EventType::GracePeriod, Decimal::ZERO, event_date).with_months(months)
    }

    pub fn skip_payment(count: u32, event_date: NaiveDate) -> Self {
        Self::new(EventType::SkipPayment, Decimal::ZERO, event_date).with_months(count)
    }

    pub fn partial_payment(amount: Money, event_date: NaiveDate) -> Self {
        Self::new(EventType::PartialPayment, amount.as_decimal(), event_date)
    }

    pub fn extra_payment(amount: Money, event_date: NaiveDate) -> Self {
        Self::new(EventType::ExtraPayment, amount.as_decimal(), event_date)
    }

    pub fn payment_holiday(months: u32, mode: HolidayMode, event_date: NaiveDate) -> Self {
        Self::new(EventType::PaymentHoliday, Decimal::ZERO, event_date)
            .with_months(months)
            .with_holiday_mode(mode)
    }

    pub fn rate_change(new_rate: Rate, event_date: NaiveDate) -> Self {
        Self::new(EventType::RateChange, Decimal::ZERO, event_date).with_new_rate(new_rate)
    }

    pub fn arrears_payment(amount: Money, event_date: NaiveDate) -> Self {
        Self::new(EventType::ArrearsPayment, amount.as_decimal(), event_date)
    }

    pub fn with_months(mut self, months: u32) -> Self {
        self.months_to_skip = Some(months);
        self
    }

    pub fn with_new_rate(mut self, rate: Rate) -> Self {
        self.new_rate = Some(rate);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_strategy(mut self, strategy: ExtraPaymentStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_holiday_mode(mut self, mode: HolidayMode) -> Self {
        self.holiday_mode = Some(mode);
        self
    }

    pub fn money(&self) -> Money {
        Money::from_decimal(self.amount)
    }

    /// month count from `months_to_skip`, falling back to an integral `amount`
    pub fn month_count(&self) -> Result<u32> {
        if let Some(months) = self.months_to_skip {
            return Ok(months);
        }
        if self.amount.is_sign_negative() || !self.amount.fract().is_zero() {
            return Err(LoanError::invalid_input(format!(
                "{} needs a whole number of months, got {}",
                self.event_type, self.amount
            )));
        }
        self.amount
            .to_u32()
            .ok_or_else(|| LoanError::invalid_input(format!("month count {} out of range", self.amount)))
    }
}

/// audit events emitted while loans change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    GracePeriodApplied {
        loan_id: LoanId,
        grace_months: u32,
        accrued_interest: Money,
        new_term: u32,
        timestamp: DateTime<Utc>,
    },
    PaymentsSkipped {
        loan_id: LoanId,
        count: u32,
        penalty: Money,
        new_balance: Money,
        new_term: u32,
        timestamp: DateTime<Utc>,
    },
    PartialPaymentReceived {
        loan_id: LoanId,
        payment_number: u32,
        amount: Money,
        applied_to_interest: Money,
        applied_to_principal: Money,
        shortfall: Money,
        late_fee: Money,
        timestamp: DateTime<Utc>,
    },
    ExtraPaymentApplied {
        loan_id: LoanId,
        amount: Money,
        strategy: ExtraPaymentStrategy,
        new_balance: Money,
        new_term: u32,
        timestamp: DateTime<Utc>,
    },
    LoanPaidOff {
        loan_id: LoanId,
        payments_made: u32,
        timestamp: DateTime<Utc>,
    },
    PaymentHolidayRequested {
        loan_id: LoanId,
        holiday_id: HolidayId,
        months: u32,
        mode: HolidayMode,
        quoted_interest: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentHolidayRejected {
        loan_id: LoanId,
        months: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PaymentHolidayApproved {
        loan_id: LoanId,
        holiday_id: HolidayId,
        approved_by: String,
        timestamp: DateTime<Utc>,
    },
    PaymentHolidayActivated {
        loan_id: LoanId,
        holiday_id: HolidayId,
        mode: HolidayMode,
        interest: Money,
        new_balance: Money,
        new_term: u32,
        timestamp: DateTime<Utc>,
    },
    InterestRateChanged {
        loan_id: LoanId,
        old_rate: Rate,
        new_rate: Rate,
        timestamp: DateTime<Utc>,
    },
    ArrearsPaymentApplied {
        loan_id: LoanId,
        application: ArrearsApplication,
        remaining_arrears: Money,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::GracePeriodApplied { loan_id, .. }
            | Event::PaymentsSkipped { loan_id, .. }
            | Event::PartialPaymentReceived { loan_id, .. }
            | Event::ExtraPaymentApplied { loan_id, .. }
            | Event::LoanPaidOff { loan_id, .. }
            | Event::PaymentHolidayRequested { loan_id, .. }
            | Event::PaymentHolidayRejected { loan_id, .. }
            | Event::PaymentHolidayApproved { loan_id, .. }
            | Event::PaymentHolidayActivated { loan_id, .. }
            | Event::InterestRateChanged { loan_id, .. }
            | Event::ArrearsPaymentApplied { loan_id, .. } => *loan_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// json array for the audit trail
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.events).map_err(|e| LoanError::CalculationError {
            message: format!("event serialization failed: {}", e),
        })
    }
}
