/// quick start - build a loan and print its first installments
use chrono::{NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{Loan, Money, Rate, SafeTimeProvider, ScheduleRecalculationService, TimeSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));

    // a $10,000 loan at 5% over five years
    let loan = Loan::builder()
        .principal(Money::from_major(10_000))
        .annual_rate(Rate::from_percentage(5))
        .months(60)
        .start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .build(&time)?;

    println!("=== quick start ===\n");
    println!("  rate: {}", loan.annual_rate);
    println!("  months: {}", loan.months);
    println!("  payment: ${}", loan.regular_payment().unwrap_or(Money::ZERO));
    println!("  maturity: {}", loan.maturity_date());

    println!("\n  #   date        payment   principal  interest  balance");
    for row in loan.schedule.iter().take(3) {
        println!(
            "  {:<3} {}  {:>8}  {:>9}  {:>8}  {:>9}",
            row.payment_number, row.payment_date, row.payment_amount,
            row.principal_portion, row.interest_portion, row.balance
        );
    }

    // what paying $100 more each month would save
    let service = ScheduleRecalculationService::default();
    let extra = Money::from_major(100);
    println!("\n  total interest: ${}", service.calculate_total_interest(&loan)?);
    println!("  with ${} extra: paid off {}", extra, service.calculate_early_payoff_date(&loan, extra)?);
    println!("  interest saved: ${}", service.calculate_interest_savings(&loan, extra)?);

    Ok(())
}
