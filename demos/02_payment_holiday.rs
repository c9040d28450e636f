/// payment holiday - request, approve and activate a deferral
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{
    EventStore, HandlerRegistry, HolidayConfig, HolidayMode, Loan, LoanEvent, Money, PaymentHolidayHandler,
    Rate, SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== payment holiday ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let loan = Loan::builder()
        .principal(Money::from_major(10_000))
        .annual_rate(Rate::from_percentage(5))
        .months(60)
        .start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .build(&time)?;
    let registry = HandlerRegistry::default();
    let holidays = PaymentHolidayHandler::new(50, HolidayConfig::default());
    let mut events = EventStore::new();

    // 1. request
    println!("1. request");
    println!("----------");
    let request = LoanEvent::payment_holiday(3, HolidayMode::Deferral, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
        .with_notes("medical leave");
    let requested = registry.dispatch(&loan, &request, &time, &mut events)?;
    let holiday = &requested.holidays[0];
    println!("  status: {:?}", holiday.status);
    println!("  window: {} to {}", holiday.start_date, holiday.end_date);
    println!("  quoted interest: ${}", holiday.quoted_interest);

    // 2. approval a few days later
    controller.advance(Duration::days(3));
    println!("\n2. approval");
    println!("-----------");
    let approved = holidays.approve_holiday(&requested, holiday.id, "credit-ops", None, &time, &mut events)?;
    println!("  approved at: {}", time.now().format("%Y-%m-%d"));

    // 3. activation reshapes the schedule
    println!("\n3. activation");
    println!("-------------");
    let active = holidays.activate_holiday(&approved, holiday.id, &time, &mut events)?;
    println!("  balance: ${} -> ${}", loan.current_balance, active.current_balance);
    println!("  months: {} -> {}", loan.months, active.months);
    let resumed = active.schedule.iter().find(|row| !row.deferred).map(|row| row.payment_amount);
    println!("  payment: ${} -> ${}",
        loan.regular_payment().unwrap_or(Money::ZERO),
        resumed.unwrap_or(Money::ZERO));
    for row in active.schedule.iter().take(4) {
        println!("    #{} {} ${} deferred={}", row.payment_number, row.payment_date, row.payment_amount, row.deferred);
    }

    println!("\n{} events recorded", events.len());

    Ok(())
}
