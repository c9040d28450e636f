/// event pipeline - replay a batch of life-cycle events against one loan
use chrono::{NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{
    EngineConfig, EventStore, HandlerRegistry, HolidayMode, Loan, LoanEvent, Money, Rate,
    SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows strategy selection and handler dispatch
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== event pipeline ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let loan = Loan::builder()
        .principal(Money::from_major(25_000))
        .annual_rate(Rate::from_percentage(6))
        .months(48)
        .start_date(date(2024, 1, 1))
        .build(&time)?;

    let registry = HandlerRegistry::new(&EngineConfig::pipeline());
    println!("handlers: {:?}\n", registry.handler_names());

    // same-day events run in priority order
    let batch = vec![
        LoanEvent::rate_change(Rate::from_percentage(7), date(2024, 1, 15)),
        LoanEvent::grace_period(1, date(2024, 1, 15)),
        LoanEvent::extra_payment(Money::from_major(2_000), date(2024, 3, 1)),
        LoanEvent::skip_payment(1, date(2024, 4, 1)),
        LoanEvent::payment_holiday(2, HolidayMode::Accrual, date(2024, 5, 1)).with_notes("relocation"),
    ];

    let mut events = EventStore::new();
    let next = registry.apply_all(&loan, &batch, &time, &mut events)?;

    println!("  balance: ${} -> ${}", loan.current_balance, next.current_balance);
    println!("  months: {} -> {}", loan.months, next.months);
    println!("  rate: {} -> {}", loan.annual_rate, next.annual_rate);
    println!("  pending deferrals: {}", next.pending_deferrals());

    println!("\nemitted events:");
    for event in events.events() {
        println!("  {}", serde_json::to_string(event)?);
    }

    Ok(())
}
