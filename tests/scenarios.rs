use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{
    EngineConfig, Event, EventStore, ExtraPaymentStrategy, HandlerRegistry, HolidayConfig, HolidayMode,
    HolidayStatus, Loan, LoanError, LoanEvent, Money, PaymentHolidayHandler, Rate, SafeTimeProvider,
    ScheduleRecalculationService, TimeSource,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_time() -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
}

fn standard_loan(time: &SafeTimeProvider) -> Loan {
    Loan::builder()
        .principal(Money::from_major(10_000))
        .annual_rate(Rate::from_percentage(5))
        .months(60)
        .start_date(date(2024, 1, 1))
        .build(time)
        .unwrap()
}

fn assert_schedule_consistent(loan: &Loan) {
    assert_eq!(loan.schedule.len() as u32, loan.months);
    for (i, row) in loan.schedule.iter().enumerate() {
        assert_eq!(row.payment_number, i as u32 + 1);
        assert_eq!(row.payment_amount, row.principal_portion + row.interest_portion);
    }
    if let Some(last) = loan.schedule.last() {
        assert!(last.balance.approx_eq(Money::ZERO, Money::TOLERANCE));
    }
}

#[test]
fn scenario_balloon_loan() {
    let time = test_time();
    let loan = Loan::builder()
        .principal(Money::from_major(50_000))
        .annual_rate(Rate::from_percentage(5))
        .months(60)
        .balloon_amount(Money::from_major(12_000))
        .start_date(date(2024, 1, 1))
        .build(&time)
        .unwrap();

    let last = loan.schedule.last().unwrap();
    assert_eq!(last.balloon_amount, Some(Money::from_major(12_000)));
    assert!(last.balance.approx_eq(Money::ZERO, Money::TOLERANCE));
    assert_schedule_consistent(&loan);
}

#[test]
fn scenario_extra_payment() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::default();
    let mut events = EventStore::new();

    let event = LoanEvent::extra_payment(Money::from_major(500), date(2024, 1, 20));
    let next = registry.dispatch(&loan, &event, &time, &mut events).unwrap();

    assert_eq!(next.current_balance, Money::from_major(9_500));
    assert!(next.months <= 60);
    assert_schedule_consistent(&next);
}

#[test]
fn scenario_skip_payment() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::default();
    let mut events = EventStore::new();

    let next = registry
        .dispatch(&loan, &LoanEvent::skip_payment(1, date(2024, 1, 20)), &time, &mut events)
        .unwrap();

    assert_eq!(next.months, 61);
    assert_eq!(next.current_balance, Money::from_str_exact("10003.33").unwrap());
    assert_schedule_consistent(&next);
}

#[test]
fn failed_event_leaves_loan_untouched() {
    let time = test_time();
    let loan = standard_loan(&time);
    let snapshot = loan.clone();
    let registry = HandlerRegistry::default();
    let mut events = EventStore::new();

    let too_large = LoanEvent::partial_payment(Money::from_major(1_000), date(2024, 2, 1));
    assert!(matches!(
        registry.dispatch(&loan, &too_large, &time, &mut events),
        Err(LoanError::Sequencing { .. })
    ));
    assert_eq!(loan, snapshot);
    assert!(events.is_empty());
}

#[test]
fn partial_payment_then_arrears_recovery() {
    let time = test_time();
    let loan = standard_loan(&time);
    let config = EngineConfig::from_json(
        &serde_json::to_string(&serde_json::json!({
            "priorities": EngineConfig::default().priorities,
            "skip": { "max_skips": 12, "penalty_rate": "0.02" },
            "holiday": { "min_months": 1, "max_months": 12 },
            "arrears": { "late_fee": "25" },
            "tolerance": "0.02"
        }))
        .unwrap(),
    )
    .unwrap();
    let registry = HandlerRegistry::new(&config);
    let mut events = EventStore::new();

    let short = registry
        .dispatch(
            &loan,
            &LoanEvent::partial_payment(Money::from_major(100), date(2024, 2, 5)),
            &time,
            &mut events,
        )
        .unwrap();

    let arrears = short.arrears.clone().unwrap();
    assert_eq!(arrears.penalty(), Money::from_major(25));
    assert_eq!(arrears.principal(), Money::from_str_exact("88.71").unwrap());
    // the february installment was due four days earlier
    assert_eq!(arrears.days_overdue, 4);
    assert_eq!(short.payments_made, 1);
    assert_schedule_consistent(&short);

    let owed = short.arrears_total();
    let cleared = registry
        .dispatch(&short, &LoanEvent::arrears_payment(owed, date(2024, 2, 20)), &time, &mut events)
        .unwrap();

    assert!(cleared.arrears.as_ref().unwrap().is_cleared());
    assert_eq!(
        cleared.current_balance,
        short.current_balance - Money::from_str_exact("88.71").unwrap()
    );
    assert_schedule_consistent(&cleared);
    assert!(matches!(events.events().last(), Some(Event::ArrearsPaymentApplied { .. })));
}

#[test]
fn payment_holiday_round_trip() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::default();
    let holidays = PaymentHolidayHandler::new(50, HolidayConfig::default());
    let mut events = EventStore::new();

    let requested = registry
        .dispatch(
            &loan,
            &LoanEvent::payment_holiday(3, HolidayMode::Deferral, date(2024, 1, 10)).with_notes("medical leave"),
            &time,
            &mut events,
        )
        .unwrap();
    let id = requested.holidays[0].id;
    assert_eq!(requested.holidays[0].reason, "medical leave");
    assert_eq!(requested.holidays[0].status, HolidayStatus::Pending);

    time.test_control().unwrap().advance(Duration::days(3));
    let approved = holidays
        .approve_holiday(&requested, id, "credit-ops", None, &time, &mut events)
        .unwrap();
    let active = holidays.activate_holiday(&approved, id, &time, &mut events).unwrap();

    assert_eq!(active.months, 63);
    assert!(active.current_balance > loan.current_balance);
    assert_eq!(active.pending_deferrals(), 3);
    assert_schedule_consistent(&active);
    assert_eq!(active.updated_at, time.now());
}

#[test]
fn grace_then_rate_change_with_pipeline_priorities() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::new(&EngineConfig::pipeline());
    let mut events = EventStore::new();

    let batch = vec![
        LoanEvent::rate_change(Rate::from_percentage(7), date(2024, 1, 15)),
        LoanEvent::grace_period(2, date(2024, 1, 15)),
    ];
    let next = registry.apply_all(&loan, &batch, &time, &mut events).unwrap();

    // grace runs first under both presets
    assert!(matches!(events.events()[0], Event::GracePeriodApplied { .. }));
    assert_eq!(next.months, 62);
    assert_eq!(next.annual_rate, Rate::from_percentage(7));
    assert_eq!(next.pending_deferrals(), 2);
    assert_schedule_consistent(&next);
}

#[test]
fn reduce_payment_on_variable_rate_loan() {
    let time = test_time();
    let loan = Loan::builder()
        .principal(Money::from_major(30_000))
        .annual_rate(Rate::from_percentage(5))
        .months(36)
        .start_date(date(2024, 1, 1))
        .rate_period(Rate::from_percentage(4), date(2024, 1, 1), Some(date(2025, 1, 1)))
        .rate_period(Rate::from_percentage(6), date(2025, 1, 1), None)
        .build(&time)
        .unwrap();
    let registry = HandlerRegistry::default();
    let mut events = EventStore::new();

    let event = LoanEvent::extra_payment(Money::from_major(5_000), date(2024, 1, 20))
        .with_strategy(ExtraPaymentStrategy::ReducePayment);
    let next = registry.dispatch(&loan, &event, &time, &mut events).unwrap();

    assert_eq!(next.months, 36);
    assert!(next.schedule[0].payment_amount < loan.schedule[0].payment_amount);
    assert_eq!(next.schedule[0].rate, Rate::from_percentage(4));
    assert_eq!(next.schedule[20].rate, Rate::from_percentage(6));
    assert_schedule_consistent(&next);
}

#[test]
fn state_survives_json_after_events() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::default();
    let mut events = EventStore::new();

    let batch = vec![
        LoanEvent::skip_payment(2, date(2024, 1, 10)),
        LoanEvent::partial_payment(Money::from_major(50), date(2024, 4, 1)),
        LoanEvent::payment_holiday(1, HolidayMode::Accrual, date(2024, 5, 1)),
    ];
    let next = registry.apply_all(&loan, &batch, &time, &mut events).unwrap();

    let restored = Loan::from_json(&next.to_json_pretty().unwrap()).unwrap();
    assert_eq!(restored, next);

    let audit = events.to_json_pretty().unwrap();
    assert!(audit.contains("PaymentsSkipped"));
    assert!(audit.contains("PartialPaymentReceived"));
    assert!(audit.contains("PaymentHolidayRequested"));
}

#[test]
fn recalculation_summary_after_prepayment() {
    let time = test_time();
    let loan = standard_loan(&time);
    let registry = HandlerRegistry::default();
    let service = ScheduleRecalculationService::default();
    let mut events = EventStore::new();

    let before = service.summarize(&loan).unwrap();
    let next = registry
        .dispatch(
            &loan,
            &LoanEvent::extra_payment(Money::from_major(2_000), date(2024, 1, 20)),
            &time,
            &mut events,
        )
        .unwrap();
    let after = service.summarize(&next).unwrap();

    assert!(after.total_interest < before.total_interest);
    assert!(after.remaining_payments < before.remaining_payments);
    assert!(after.payoff_date < before.payoff_date);
}

#[test]
fn stacked_deferrals_on_variable_rate_loan() {
    let time = test_time();
    let loan = Loan::builder()
        .principal(Money::from_major(10_000))
        .annual_rate(Rate::from_percentage(3))
        .months(60)
        .start_date(date(2024, 1, 1))
        .rate_period(Rate::from_percentage(3), date(2024, 1, 1), Some(date(2024, 6, 1)))
        .rate_period(Rate::from_percentage(7), date(2024, 6, 1), None)
        .build(&time)
        .unwrap();
    let registry = HandlerRegistry::default();
    let holidays = PaymentHolidayHandler::new(50, HolidayConfig::default());
    let mut events = EventStore::new();

    let batch = vec![
        LoanEvent::grace_period(2, date(2024, 1, 10)),
        LoanEvent::skip_payment(1, date(2024, 1, 10)),
        LoanEvent::payment_holiday(2, HolidayMode::Deferral, date(2024, 1, 10)),
    ];
    let requested = registry.apply_all(&loan, &batch, &time, &mut events).unwrap();
    assert_eq!(requested.months, 63);
    assert_eq!(requested.pending_deferrals(), 3);

    let id = requested.holidays[0].id;
    let approved = holidays
        .approve_holiday(&requested, id, "credit-ops", None, &time, &mut events)
        .unwrap();
    let active = holidays.activate_holiday(&approved, id, &time, &mut events).unwrap();

    // the holiday window opens after the three months already deferred
    assert_eq!(active.holidays[0].start_date, date(2024, 5, 1));
    assert_eq!(active.holidays[0].end_date, date(2024, 7, 1));
    assert_eq!(active.months, 65);
    assert_eq!(active.pending_deferrals(), 5);
    assert_schedule_consistent(&active);
    for row in &active.schedule {
        assert_eq!((row.rate, row.rate_period_id), active.applicable_rate(row.payment_date));
    }
    assert!(active.schedule[..5].iter().all(|row| row.deferred));
    assert_eq!(active.schedule[5].rate, Rate::from_percentage(7));
}
