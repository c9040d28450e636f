pub mod amortization;
pub mod waterfall;

pub use amortization::{add_months, level_payment, period_interest, term_for_payment};
pub use waterfall::{Arrears, ArrearsApplication, ArrearsBucket};
