use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

/// calculate (1 + r)^n by repeated multiplication
pub fn compound_factor(monthly_rate: Decimal, periods: u32) -> Result<Decimal> {
    let base = Decimal::ONE + monthly_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound = compound.checked_mul(base).ok_or_else(|| LoanError::CalculationError {
            message: format!("compound factor overflow after {} periods", periods),
        })?;
    }
    Ok(compound)
}

/// level payment that retires `balance` over `periods` months, rounded to cents
///
/// payment = P * r * (1 + r)^n / ((1 + r)^n - 1), or P / n when r = 0
pub fn level_payment(balance: Money, annual_rate: Rate, periods: u32) -> Result<Money> {
    if periods == 0 {
        return Ok(balance.round_cents());
    }

    let r = annual_rate.monthly_rate().as_decimal();
    if r.is_zero() {
        return Ok((balance / Decimal::from(periods)).round_cents());
    }

    let compound = compound_factor(r, periods)?;
    let numerator = balance.as_decimal() * r * compound;
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(LoanError::CalculationError {
            message: "level payment denominator is zero".to_string(),
        });
    }

    Ok(Money::from_decimal(numerator / denominator).round_cents())
}

/// one month of interest on `balance`, rounded to cents
pub fn period_interest(balance: Money, annual_rate: Rate) -> Money {
    Money::from_decimal(balance.as_decimal() * annual_rate.monthly_rate().as_decimal()).round_cents()
}

/// number of months a fixed payment needs to retire `balance`, capped at `max_periods`
pub fn term_for_payment(balance: Money, annual_rate: Rate, payment: Money, max_periods: u32) -> u32 {
    if !balance.is_positive() {
        return 0;
    }
    if !payment.is_positive() {
        return max_periods;
    }

    let mut remaining = balance;
    let mut months = 0;

    while remaining.is_positive() && months < max_periods {
        let interest = period_interest(remaining, annual_rate);
        let principal = payment - interest;

        if !principal.is_positive() {
            // payment never covers interest
            return max_periods;
        }

        remaining = (remaining - principal).max(Money::ZERO);
        months += 1;
    }

    months
}

/// add calendar months, clamping to the end of shorter months
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
