use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::handlers::payment_holiday::PaymentHoliday;
use crate::payments::{add_months, Arrears};
use crate::strategies::StrategySelector;
use crate::types::{HolidayId, LoanId, RatePeriodId};

/// a loan and its amortization schedule
///
/// Handlers never mutate a `Loan` in place: each one returns a new value and leaves the
/// input untouched, so a failed event cannot leave a half-applied loan behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub principal: Money,
    pub annual_rate: Rate,
    /// current total term in months, including any extensions
    pub months: u32,
    pub start_date: NaiveDate,
    pub current_balance: Money,
    pub balloon_amount: Option<Money>,
    pub rate_periods: Vec<RatePeriod>,
    pub schedule: Vec<ScheduleRow>,
    pub payments_made: u32,
    pub arrears: Option<Arrears>,
    pub holidays: Vec<PaymentHoliday>,
    pub updated_at: DateTime<Utc>,
}

/// a time-bounded interval with a constant rate, covering `[start_date, end_date)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePeriod {
    pub id: RatePeriodId,
    pub loan_id: LoanId,
    pub rate: Rate,
    pub start_date: NaiveDate,
    /// none means open-ended; only the last period may be open-ended
    pub end_date: Option<NaiveDate>,
}

/// one row of an amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub payment_number: u32,
    pub payment_date: NaiveDate,
    pub payment_amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    /// balance after this row
    pub balance: Money,
    pub rate: Rate,
    pub rate_period_id: Option<RatePeriodId>,
    /// set only on the final row of a balloon schedule
    pub balloon_amount: Option<Money>,
    /// period inside a grace, skip or holiday window; nothing is due
    #[serde(default)]
    pub deferred: bool,
}

impl RatePeriod {
    pub fn new(loan_id: LoanId, rate: Rate, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            rate,
            start_date,
            end_date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date < end)
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_date.is_none()
    }
}

impl ScheduleRow {
    /// a period in which nothing is due and the balance is carried unchanged
    pub fn deferral(
        payment_number: u32,
        payment_date: NaiveDate,
        balance: Money,
        rate: Rate,
        rate_period_id: Option<RatePeriodId>,
    ) -> Self {
        Self {
            payment_number,
            payment_date,
            payment_amount: Money::ZERO,
            principal_portion: Money::ZERO,
            interest_portion: Money::ZERO,
            balance,
            rate,
            rate_period_id,
            balloon_amount: None,
            deferred: true,
        }
    }
}

/// check ordering, contiguity and the open-ended rule
pub fn validate_rate_periods(loan_id: LoanId, periods: &[RatePeriod]) -> Result<()> {
    for (i, period) in periods.iter().enumerate() {
        if !period.rate.is_valid_annual() {
            return Err(LoanError::invalid_input(format!(
                "rate period {} has rate {} outside [0, 1]",
                i, period.rate.as_decimal()
            )));
        }
        if period.loan_id != loan_id {
            return Err(LoanError::invalid_configuration(format!(
                "rate period {} belongs to loan {}",
                i, period.loan_id
            )));
        }
        if let Some(end) = period.end_date {
            if end <= period.start_date {
                return Err(LoanError::invalid_configuration(format!(
                    "rate period {} ends on or before its start",
                    i
                )));
            }
        }
    }

    for (i, pair) in periods.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        match prev.end_date {
            None => {
                return Err(LoanError::invalid_configuration(format!(
                    "rate period {} is open-ended but is not the last period",
                    i
                )));
            }
            Some(end) if next.start_date != end => {
                return Err(LoanError::invalid_configuration(format!(
                    "rate periods {} and {} are not contiguous: {} vs {}",
                    i,
                    i + 1,
                    end,
                    next.start_date
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

impl Loan {
    pub fn builder() -> LoanBuilder {
        LoanBuilder::new()
    }

    /// enforce the data-model invariants
    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LoanError::invalid_input(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        if !self.annual_rate.is_valid_annual() {
            return Err(LoanError::invalid_input(format!(
                "annual rate {} outside [0, 1]",
                self.annual_rate.as_decimal()
            )));
        }
        if self.months == 0 {
            return Err(LoanError::invalid_input("term must be at least one month"));
        }
        if self.current_balance.is_negative() {
            return Err(LoanError::invalid_input("current balance cannot be negative"));
        }
        if let Some(balloon) = self.balloon_amount {
            if !balloon.is_positive() || balloon >= self.principal {
                return Err(LoanError::invalid_input(format!(
                    "balloon amount {} must be between zero and principal {}",
                    balloon, self.principal
                )));
            }
            if !self.rate_periods.is_empty() {
                return Err(LoanError::invalid_configuration(
                    "balloon loans cannot carry rate periods",
                ));
            }
        }
        validate_rate_periods(self.id, &self.rate_periods)
    }

    /// rate in force on `date`: the covering rate period, else the base annual rate
    pub fn applicable_rate(&self, date: NaiveDate) -> (Rate, Option<RatePeriodId>) {
        self.rate_periods
            .iter()
            .find(|p| p.contains(date))
            .map_or((self.annual_rate, None), |p| (p.rate, Some(p.id)))
    }

    /// months left to amortize
    pub fn remaining_months(&self) -> u32 {
        self.months.saturating_sub(self.payments_made)
    }

    pub fn is_paid_off(&self) -> bool {
        self.current_balance.is_zero()
    }

    /// rows already serviced
    pub fn paid_rows(&self) -> &[ScheduleRow] {
        let paid = (self.payments_made as usize).min(self.schedule.len());
        &self.schedule[..paid]
    }

    /// next row with something due
    pub fn next_unpaid_row(&self) -> Option<&ScheduleRow> {
        self.schedule
            .iter()
            .find(|row| row.payment_number > self.payments_made && !row.deferred)
    }

    /// deferral rows scheduled immediately after the last paid row
    pub fn pending_deferrals(&self) -> u32 {
        self.schedule
            .iter()
            .skip(self.payments_made as usize)
            .take_while(|row| row.deferred)
            .count() as u32
    }

    /// regular payment currently due, if a schedule exists
    pub fn regular_payment(&self) -> Option<Money> {
        self.next_unpaid_row().map(|row| row.payment_amount)
    }

    /// date of installment `payments_made + 1`
    pub fn next_payment_date(&self) -> NaiveDate {
        if let Some(row) = self.schedule.get(self.payments_made as usize) {
            return row.payment_date;
        }
        match self.paid_rows().last() {
            Some(last) => add_months(last.payment_date, 1),
            None => add_months(self.start_date, self.payments_made + 1),
        }
    }

    /// date of the last row in the schedule
    pub fn maturity_date(&self) -> NaiveDate {
        self.schedule
            .last()
            .map(|row| row.payment_date)
            .unwrap_or_else(|| add_months(self.start_date, self.months))
    }

    /// outstanding arrears, zero when none were ever recorded
    pub fn arrears_total(&self) -> Money {
        self.arrears.as_ref().map_or(Money::ZERO, Arrears::total)
    }

    pub fn holiday(&self, id: HolidayId) -> Option<&PaymentHoliday> {
        self.holidays.iter().find(|h| h.id == id)
    }

    pub(crate) fn holiday_mut(&mut self, id: HolidayId) -> Result<&mut PaymentHoliday> {
        self.holidays
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(LoanError::HolidayNotFound { id })
    }

    pub(crate) fn arrears_mut(&mut self) -> &mut Arrears {
        let loan_id = self.id;
        self.arrears.get_or_insert_with(|| Arrears::new(loan_id))
    }

    pub(crate) fn touch(&mut self, time_provider: &SafeTimeProvider) {
        self.updated_at = time_provider.now();
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoanError::CalculationError {
            message: format!("loan serialization failed: {}", e),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let loan: Loan = serde_json::from_str(json).map_err(|e| LoanError::invalid_input(e.to_string()))?;
        loan.validate()?;
        Ok(loan)
    }
}

/// builder for loans; `build` validates and generates the initial schedule
pub struct LoanBuilder {
    id: Option<LoanId>,
    principal: Option<Money>,
    annual_rate: Option<Rate>,
    months: Option<u32>,
    start_date: Option<NaiveDate>,
    balloon_amount: Option<Money>,
    rate_periods: Vec<(Rate, NaiveDate, Option<NaiveDate>)>,
}

impl LoanBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            principal: None,
            annual_rate: None,
            months: None,
            start_date: None,
            balloon_amount: None,
            rate_periods: Vec::new(),
        }
    }

    pub fn id(mut self, id: LoanId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn annual_rate(mut self, rate: Rate) -> Self {
        self.annual_rate = Some(rate);
        self
    }

    pub fn months(mut self, months: u32) -> Self {
        self.months = Some(months);
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn balloon_amount(mut self, amount: Money) -> Self {
        self.balloon_amount = Some(amount);
        self
    }

    /// append a rate period; periods must be added in chronological order
    pub fn rate_period(mut self, rate: Rate, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        self.rate_periods.push((rate, start_date, end_date));
        self
    }

    pub fn build(self, time_provider: &SafeTimeProvider) -> Result<Loan> {
        let principal = self.principal.ok_or_else(|| LoanError::invalid_input("principal required"))?;
        let annual_rate = self.annual_rate.ok_or_else(|| LoanError::invalid_input("annual rate required"))?;
        let months = self.months.ok_or_else(|| LoanError::invalid_input("term required"))?;
        let now = time_provider.now();
        let start_date = self.start_date.unwrap_or_else(|| now.date_naive());
        let id = self.id.unwrap_or_else(Uuid::new_v4);

        let rate_periods = self
            .rate_periods
            .into_iter()
            .map(|(rate, start, end)| RatePeriod::new(id, rate, start, end))
            .collect();

        let mut loan = Loan {
            id,
            principal,
            annual_rate,
            months,
            start_date,
            current_balance: principal,
            balloon_amount: self.balloon_amount,
            rate_periods,
            schedule: Vec::new(),
            payments_made: 0,
            arrears: None,
            holidays: Vec::new(),
            updated_at: now,
        };
        loan.validate()?;

        let selector = StrategySelector::default();
        let strategy = selector.select(&loan)?;
        loan.schedule = strategy.calculate_schedule(&loan)?;

        Ok(loan)
    }
}

impl Default for LoanBuilder {
    fn default() -> Self {
        Self::new()
    }
}
