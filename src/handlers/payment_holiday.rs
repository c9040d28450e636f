use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HolidayConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore, LoanEvent};
use crate::loan::Loan;
use crate::payments::add_months;
use crate::recalculation::ScheduleRecalculationService;
use crate::types::{EventType, HolidayId, HolidayMode, HolidayStatus, LoanId};

use super::EventHandler;

/// a requested break from payments, approved and activated in separate steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHoliday {
    pub id: HolidayId,
    pub loan_id: LoanId,
    pub months: u32,
    pub mode: HolidayMode,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: HolidayStatus,
    /// interest the holiday will add, quoted at request time
    pub quoted_interest: Money,
    pub approved_by: Option<String>,
    pub approval_note: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// payment holidays: Pending -> Approved -> Active
///
/// The event path only records a pending quote. Approval and activation are explicit
/// calls so that an operator sits between request and effect.
pub struct PaymentHolidayHandler {
    priority: i32,
    config: HolidayConfig,
    recalculation: ScheduleRecalculationService,
}

impl PaymentHolidayHandler {
    pub fn new(priority: i32, config: HolidayConfig) -> Self {
        Self {
            priority,
            config,
            recalculation: ScheduleRecalculationService::default(),
        }
    }

    /// pending quote; nothing on the loan changes
    pub fn create_holiday(
        &self,
        loan: &Loan,
        months: u32,
        mode: HolidayMode,
        reason: impl Into<String>,
        start_date: NaiveDate,
    ) -> PaymentHoliday {
        let quoted_interest = match mode {
            HolidayMode::Accrual => self.calculate_accrued_interest(loan, months),
            HolidayMode::Deferral => self.calculate_deferred_interest(loan, months),
        };

        PaymentHoliday {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            months,
            mode,
            reason: reason.into(),
            start_date,
            end_date: add_months(start_date, months),
            status: HolidayStatus::Pending,
            quoted_interest,
            approved_by: None,
            approval_note: None,
            approved_at: None,
            activated_at: None,
        }
    }

    pub fn is_valid_holiday(&self, loan: &Loan, holiday: &PaymentHoliday) -> bool {
        self.rejection_reason(loan, holiday).is_none()
    }

    fn rejection_reason(&self, loan: &Loan, holiday: &PaymentHoliday) -> Option<String> {
        let remaining = loan.remaining_months();
        if holiday.months < self.config.min_months || holiday.months > self.config.max_months {
            return Some(format!(
                "holiday of {} months outside {}..={}",
                holiday.months, self.config.min_months, self.config.max_months
            ));
        }
        if holiday.months > remaining {
            return Some(format!(
                "holiday of {} months exceeds the {} months remaining",
                holiday.months, remaining
            ));
        }
        // accrual keeps the term, so at least one paying month must be left
        let amortizing = remaining.saturating_sub(loan.pending_deferrals());
        if holiday.mode == HolidayMode::Accrual && holiday.months >= amortizing {
            return Some(format!(
                "accrual holiday of {} months leaves no month to repay in",
                holiday.months
            ));
        }
        None
    }

    pub fn calculate_accrued_interest(&self, loan: &Loan, months: u32) -> Money {
        loan.current_balance
            .simple_monthly_interest(loan.annual_rate, months)
            .round_cents()
    }

    pub fn calculate_deferred_interest(&self, loan: &Loan, months: u32) -> Money {
        loan.current_balance
            .simple_monthly_interest(loan.annual_rate, months)
            .round_cents()
    }

    /// add the accrued interest to the balance; the term stays as is
    pub fn apply_accrual(&self, loan: &Loan, holiday: &PaymentHoliday) -> Loan {
        let mut next = loan.clone();
        next.current_balance += self.calculate_accrued_interest(loan, holiday.months);
        next
    }

    /// extend the term and capitalize the deferred interest
    pub fn apply_deferral(&self, loan: &Loan, holiday: &PaymentHoliday) -> Loan {
        let mut next = loan.clone();
        next.current_balance += self.calculate_deferred_interest(loan, holiday.months);
        next.months = loan.months + holiday.months;
        next
    }

    /// deferral rows for the holiday window, then repayment from `end_date`
    ///
    /// The window follows any deferral rows already pending, so it always opens on an
    /// unpaid installment.
    pub fn recalculate_schedule(&self, loan: &Loan, holiday: &PaymentHoliday) -> Result<Loan> {
        self.recalculation.regenerate_remaining(
            loan,
            loan.pending_deferrals() + holiday.months,
            loan.next_payment_date(),
        )
    }

    /// first installment not yet paid or deferred
    fn window_start(loan: &Loan) -> NaiveDate {
        add_months(loan.next_payment_date(), loan.pending_deferrals())
    }

    pub fn approve_holiday(
        &self,
        loan: &Loan,
        holiday_id: HolidayId,
        approver: impl Into<String>,
        note: Option<String>,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let approver = approver.into();
        let mut next = loan.clone();
        let holiday = next.holiday_mut(holiday_id)?;
        expect_status(holiday, HolidayStatus::Pending)?;

        holiday.status = HolidayStatus::Approved;
        holiday.approved_by = Some(approver.clone());
        holiday.approval_note = note;
        holiday.approved_at = Some(time_provider.now());
        next.touch(time_provider);

        info!(loan_id = %loan.id, holiday_id = %holiday_id, approver = %approver, "payment holiday approved");
        events.emit(Event::PaymentHolidayApproved {
            loan_id: loan.id,
            holiday_id,
            approved_by: approver,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }

    pub fn activate_holiday(
        &self,
        loan: &Loan,
        holiday_id: HolidayId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let mut holiday = loan
            .holiday(holiday_id)
            .ok_or(LoanError::HolidayNotFound { id: holiday_id })?
            .clone();
        expect_status(&holiday, HolidayStatus::Approved)?;

        // installments may have been paid or deferred since the request
        if let Some(reason) = self.rejection_reason(loan, &holiday) {
            return Err(LoanError::sequencing(format!(
                "holiday {} can no longer be activated: {}",
                holiday_id, reason
            )));
        }
        holiday.start_date = Self::window_start(loan);
        holiday.end_date = add_months(holiday.start_date, holiday.months);

        let applied = match holiday.mode {
            HolidayMode::Accrual => self.apply_accrual(loan, &holiday),
            HolidayMode::Deferral => self.apply_deferral(loan, &holiday),
        };
        let interest = applied.current_balance - loan.current_balance;

        let mut next = self.recalculate_schedule(&applied, &holiday)?;
        let stored = next.holiday_mut(holiday_id)?;
        stored.start_date = holiday.start_date;
        stored.end_date = holiday.end_date;
        stored.status = HolidayStatus::Active;
        stored.activated_at = Some(time_provider.now());
        next.touch(time_provider);

        info!(
            loan_id = %loan.id,
            holiday_id = %holiday_id,
            mode = ?holiday.mode,
            interest = %interest,
            months = next.months,
            "payment holiday activated"
        );
        events.emit(Event::PaymentHolidayActivated {
            loan_id: loan.id,
            holiday_id,
            mode: holiday.mode,
            interest,
            new_balance: next.current_balance,
            new_term: next.months,
            timestamp: time_provider.now(),
        });

        Ok(next)
    }
}

fn expect_status(holiday: &PaymentHoliday, expected: HolidayStatus) -> Result<()> {
    if holiday.status != expected {
        return Err(LoanError::InvalidState {
            current: holiday.status,
            expected,
        });
    }
    Ok(())
}

impl EventHandler for PaymentHolidayHandler {
    fn name(&self) -> &'static str {
        "payment_holiday"
    }

    fn supports(&self, event: &LoanEvent) -> bool {
        event.event_type == EventType::PaymentHoliday
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
        let months = event.month_count()?;
        let mode = event.holiday_mode.unwrap_or_default();
        let reason = event.notes.clone().unwrap_or_default();
        let holiday = self.create_holiday(loan, months, mode, reason, Self::window_start(loan));

        if let Some(reason) = self.rejection_reason(loan, &holiday) {
            warn!(loan_id = %loan.id, months, reason = %reason, "payment holiday rejected");
            events.emit(Event::PaymentHolidayRejected {
                loan_id: loan.id,
                months,
                reason,
                timestamp: time_provider.now(),
            });
            return Ok(loan.clone());
        }

        info!(
            loan_id = %loan.id,
            holiday_id = %holiday.id,
            months,
            quoted_interest = %holiday.quoted_interest,
            "payment holiday requested"
        );
        events.emit(Event::PaymentHolidayRequested {
            loan_id: loan.id,
            holiday_id: holiday.id,
            months,
            mode,
            quoted_interest: holiday.quoted_interest,
            timestamp: time_provider.now(),
        });

        let mut next = loan.clone();
        next.holidays.push(holiday);
        next.touch(time_provider);
        Ok(next)
    }
}
