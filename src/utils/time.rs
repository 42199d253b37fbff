use chrono::NaiveDate;

/// This is the standard way of converting a date to a string in dalos. The ledger expects
/// `YYYY-MM-DD`.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
