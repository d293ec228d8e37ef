//! Scan output port.

use crate::domain::error::SamscanError;
use crate::domain::scan::SecondScanReport;
use crate::domain::watchlist::Watchlist;

/// Port for writing scan outputs somewhere a person or another tool can read them.
pub trait ReportPort {
    fn write_watchlist(&self, watchlist: &Watchlist, output_path: &str) -> Result<(), SamscanError>;

    fn write_results(&self, report: &SecondScanReport, output_path: &str) -> Result<(), SamscanError>;
}
