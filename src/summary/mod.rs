//! Settlement totals over calendar periods.

mod core;
mod summary_page;

pub use core::{MAX_WEEK, PeriodTotals, SummaryPeriod, get_period_totals};
pub use summary_page::get_summary_page;
