use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a rate period
pub type RatePeriodId = Uuid;

/// unique identifier for a payment holiday
pub type HolidayId = Uuid;

/// kinds of life-cycle events a loan can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    GracePeriod,
    #[serde(alias = "skip_payments")]
    SkipPayment,
    PartialPayment,
    ExtraPayment,
    PaymentHoliday,
    RateChange,
    ArrearsPayment,
    /// interest posting with no schedule effect
    InterestAccrual,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::GracePeriod,
        EventType::SkipPayment,
        EventType::PartialPayment,
        EventType::ExtraPayment,
        EventType::PaymentHoliday,
        EventType::RateChange,
        EventType::ArrearsPayment,
        EventType::InterestAccrual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::GracePeriod => "grace_period",
            EventType::SkipPayment => "skip_payment",
            EventType::PartialPayment => "partial_payment",
            EventType::ExtraPayment => "extra_payment",
            EventType::PaymentHoliday => "payment_holiday",
            EventType::RateChange => "rate_change",
            EventType::ArrearsPayment => "arrears_payment",
            EventType::InterestAccrual => "interest_accrual",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip_payments" => Ok(EventType::SkipPayment),
            other => EventType::ALL
                .iter()
                .copied()
                .find(|t| t.as_str() == other)
                .ok_or_else(|| format!("unknown event type: {}", other)),
        }
    }
}

/// how an extra payment reshapes the remaining schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPaymentStrategy {
    /// keep the payment, shorten the term
    #[default]
    ReduceTerm,
    /// keep the term, lower the payment
    ReducePayment,
}

/// how interest is treated during a payment holiday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayMode {
    /// interest is added to the balance, term unchanged
    #[default]
    Accrual,
    /// interest is capitalized and the term is extended
    Deferral,
}

/// payment holiday approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayStatus {
    Pending,
    Approved,
    Active,
}
