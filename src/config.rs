use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub priorities: HandlerPriorities,
    #[serde(default)]
    pub grace: GraceConfig,
    pub skip: SkipPaymentConfig,
    pub holiday: HolidayConfig,
    pub arrears: ArrearsConfig,
    pub tolerance: Money,
}

/// dispatch priority per handler; lower runs earlier.
///
/// Two conflicting orderings exist in practice. Both are provided as presets and
/// neither is authoritative; integrators choose or override explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerPriorities {
    pub grace_period: i32,
    pub skip_payment: i32,
    pub partial_payment: i32,
    pub extra_payment: i32,
    pub payment_holiday: i32,
    pub rate_change: i32,
    pub arrears_payment: i32,
}

/// grace period limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceConfig {
    pub max_months: u32,
}

/// skip payment limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipPaymentConfig {
    pub max_skips: u32,
    /// fraction of the regular payment charged per skipped period
    pub penalty_rate: Decimal,
}

/// payment holiday limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayConfig {
    pub min_months: u32,
    pub max_months: u32,
}

/// arrears charges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrearsConfig {
    /// penalty added per shortfall; zero disables it
    pub late_fee: Money,
}

impl HandlerPriorities {
    /// grace=10, skip=20, extra=30 ordering
    pub fn handler_constants() -> Self {
        Self {
            grace_period: 10,
            skip_payment: 20,
            extra_payment: 30,
            partial_payment: 40,
            payment_holiday: 50,
            rate_change: 60,
            arrears_payment: 100,
        }
    }

    /// skip=10, partial=60, extra=70, arrears=100 ordering
    pub fn pipeline_constants() -> Self {
        Self {
            grace_period: 5,
            skip_payment: 10,
            rate_change: 20,
            partial_payment: 60,
            extra_payment: 70,
            payment_holiday: 80,
            arrears_payment: 100,
        }
    }
}

impl Default for HandlerPriorities {
    fn default() -> Self {
        Self::handler_constants()
    }
}

impl Default for GraceConfig {
    fn default() -> Self {
        Self { max_months: 12 }
    }
}

impl Default for SkipPaymentConfig {
    fn default() -> Self {
        Self {
            max_skips: 12,
            penalty_rate: dec!(0.02),
        }
    }
}

impl Default for HolidayConfig {
    fn default() -> Self {
        Self {
            min_months: 1,
            max_months: 12,
        }
    }
}

impl Default for ArrearsConfig {
    fn default() -> Self {
        Self {
            late_fee: Money::ZERO,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            priorities: HandlerPriorities::default(),
            grace: GraceConfig::default(),
            skip: SkipPaymentConfig::default(),
            holiday: HolidayConfig::default(),
            arrears: ArrearsConfig::default(),
            tolerance: Money::TOLERANCE,
        }
    }
}

impl EngineConfig {
    /// default limits with the pipeline priority ordering
    pub fn pipeline() -> Self {
        Self {
            priorities: HandlerPriorities::pipeline_constants(),
            ..Self::default()
        }
    }

    /// parse and validate a json configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| LoanError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoanError::invalid_configuration(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.grace.max_months == 0 {
            return Err(LoanError::invalid_configuration("grace max_months must be at least 1"));
        }
        if self.skip.max_skips == 0 {
            return Err(LoanError::invalid_configuration("max_skips must be at least 1"));
        }
        if self.skip.penalty_rate < Decimal::ZERO {
            return Err(LoanError::invalid_configuration("skip penalty rate cannot be negative"));
        }
        if self.holiday.min_months == 0 || self.holiday.min_months > self.holiday.max_months {
            return Err(LoanError::invalid_configuration(format!(
                "holiday months range {}..={} is empty",
                self.holiday.min_months, self.holiday.max_months
            )));
        }
        if self.arrears.late_fee.is_negative() {
            return Err(LoanError::invalid_configuration("late fee cannot be negative"));
        }
        if self.tolerance.is_negative() {
            return Err(LoanError::invalid_configuration("tolerance cannot be negative"));
        }
        Ok(())
    }
}
