pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod loan;
pub mod payments;
pub mod recalculation;
pub mod strategies;
pub mod types;

// re-export key types
pub use config::{
    ArrearsConfig, EngineConfig, GraceConfig, HandlerPriorities, HolidayConfig, SkipPaymentConfig,
};
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore, LoanEvent};
pub use handlers::{
    ArrearsPaymentHandler, EventHandler, ExtraPaymentHandler, GracePeriodHandler, GracePeriodResult,
    HandlerRegistry, PartialPaymentHandler, PaymentHoliday, PaymentHolidayHandler, RateChangeHandler,
    SkipPaymentHandler,
};
pub use loan::{Loan, LoanBuilder, RatePeriod, ScheduleRow};
pub use payments::{Arrears, ArrearsApplication, ArrearsBucket};
pub use recalculation::{RecalculationSummary, ScheduleRecalculationService};
pub use strategies::{
    AmortizationStrategy, BalloonPaymentStrategy, ScheduleSegment, StandardStrategy, StrategySelector,
    VariableRateStrategy,
};
pub use types::{
    EventType, ExtraPaymentStrategy, HolidayId, HolidayMode, HolidayStatus, LoanId, RatePeriodId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
