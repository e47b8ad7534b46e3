//! Log view: criteria-based filtering and CSV export.

use crate::types::{VisitorRecord, VisitorStatus};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt::Display;
use std::io::Write;

/// Export column headers.
pub const EXPORT_HEADER: [&str; 8] = [
    "ID",
    "Name",
    "Age",
    "Gender",
    "Profession",
    "Check-in",
    "Check-out",
    "Status",
];

const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    CheckedIn,
    CheckedOut,
}

impl StatusFilter {
    fn accepts(self, status: VisitorStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::CheckedIn => status == VisitorStatus::CheckedIn,
            StatusFilter::CheckedOut => status == VisitorStatus::CheckedOut,
        }
    }
}

/// Operator-selected view criteria. The default accepts everything.
///
/// Dates are calendar days in UTC; `end_date` includes its whole day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: StatusFilter,
    pub name_substring: Option<String>,
}

impl Criteria {
    fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.start_date.map(midnight_utc)
    }

    /// Exclusive upper bound: midnight after `end_date`.
    fn end_bound(&self) -> Option<DateTime<Utc>> {
        self.end_date.and_then(|d| d.succ_opt()).map(midnight_utc)
    }

    fn needle(&self) -> Option<String> {
        self.name_substring
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Records matching `criteria`, in input order.
pub fn filter(records: &[VisitorRecord], criteria: &Criteria) -> Vec<VisitorRecord> {
    let start = criteria.start_bound();
    let end = criteria.end_bound();
    let needle = criteria.needle();

    records
        .iter()
        .filter(|r| start.map_or(true, |s| r.timestamp() >= s))
        .filter(|r| end.map_or(true, |e| r.timestamp() < e))
        .filter(|r| criteria.status.accepts(r.status()))
        .filter(|r| {
            needle
                .as_deref()
                .map_or(true, |n| r.enhanced_profile().name.to_lowercase().contains(n))
        })
        .cloned()
        .collect()
}

/// Write records as CSV, formatting instants in `tz`.
pub fn write_csv<W, Tz>(out: W, records: &[VisitorRecord], tz: &Tz) -> Result<(), csv::Error>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(EXPORT_HEADER)?;
    for r in records {
        let p = r.enhanced_profile();
        let check_in = r.timestamp().with_timezone(tz).format(EXPORT_DATE_FORMAT).to_string();
        let check_out = r
            .check_out_time()
            .map(|t| t.with_timezone(tz).format(EXPORT_DATE_FORMAT).to_string())
            .unwrap_or_else(|| "N/A".to_string());
        writer.write_record([
            r.id().to_string(),
            p.name.clone(),
            p.age.clone(),
            p.gender.clone(),
            p.profession.clone(),
            check_in,
            check_out,
            r.status().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV export as a string.
pub fn export_csv<Tz>(records: &[VisitorRecord], tz: &Tz) -> Result<String, csv::Error>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut buf = Vec::new();
    write_csv(&mut buf, records, tz)?;
    String::from_utf8(buf)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Download name for an export produced on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("visitor_log_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Patch, VisitorLog};
    use crate::types::fixtures::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_log() -> VisitorLog {
        let log = VisitorLog::new()
            .insert(record("Alice Smith", "2024-06-09T08:00:00Z"))
            .unwrap()
            .insert(record("Bob Jones", "2024-06-10T23:00:00Z"))
            .unwrap()
            .insert(record("Carol Alison", "2024-06-12T00:00:00Z"))
            .unwrap();
        let bob = log.records()[1].id();
        log.update(bob, &Patch::CheckOut { at: at("2024-06-11T01:00:00Z") })
    }

    fn names(records: &[VisitorRecord]) -> Vec<&str> {
        records.iter().map(|r| r.enhanced_profile().name.as_str()).collect()
    }

    #[test]
    fn test_empty_criteria_is_identity() {
        let log = sample_log();
        assert_eq!(filter(log.records(), &Criteria::default()), log.records());
    }

    #[test]
    fn test_empty_name_substring_is_ignored() {
        let log = sample_log();
        let c = Criteria { name_substring: Some(String::new()), ..Default::default() };
        assert_eq!(filter(log.records(), &c).len(), 3);
    }

    #[test]
    fn test_name_filter_case_insensitive() {
        let log = VisitorLog::new()
            .insert(record("Alice Smith", "2024-06-10T09:00:00Z"))
            .unwrap();
        let c = Criteria { name_substring: Some("alice".into()), ..Default::default() };
        assert_eq!(names(&filter(log.records(), &c)), vec!["Alice Smith"]);
    }

    #[test]
    fn test_name_filter_matches_substring_anywhere() {
        let log = sample_log();
        let c = Criteria { name_substring: Some("ALI".into()), ..Default::default() };
        assert_eq!(names(&filter(log.records(), &c)), vec!["Carol Alison", "Alice Smith"]);
    }

    #[test]
    fn test_end_date_includes_whole_day() {
        let log = sample_log();
        let c = Criteria { end_date: Some(date("2024-06-10")), ..Default::default() };
        assert_eq!(names(&filter(log.records(), &c)), vec!["Bob Jones", "Alice Smith"]);
    }

    #[test]
    fn test_start_date_inclusive_from_midnight() {
        let log = sample_log();
        let c = Criteria { start_date: Some(date("2024-06-10")), ..Default::default() };
        assert_eq!(names(&filter(log.records(), &c)), vec!["Carol Alison", "Bob Jones"]);

        let c = Criteria { start_date: Some(date("2024-06-12")), ..Default::default() };
        assert_eq!(names(&filter(log.records(), &c)), vec!["Carol Alison"]);
    }

    #[test]
    fn test_status_filter() {
        let log = sample_log();
        let out = Criteria { status: StatusFilter::CheckedOut, ..Default::default() };
        assert_eq!(names(&filter(log.records(), &out)), vec!["Bob Jones"]);
        let inside = Criteria { status: StatusFilter::CheckedIn, ..Default::default() };
        assert_eq!(names(&filter(log.records(), &inside)), vec!["Carol Alison", "Alice Smith"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let log = sample_log();
        let c = Criteria {
            start_date: Some(date("2024-06-09")),
            end_date: Some(date("2024-06-11")),
            status: StatusFilter::All,
            name_substring: Some("o".into()),
        };
        let once = filter(log.records(), &c);
        assert_eq!(filter(&once, &c), once);
    }

    #[test]
    fn test_filter_idempotent_across_criteria() {
        let tied = VisitorLog::new()
            .insert(record("Dana", "2024-06-10T12:00:00Z"))
            .unwrap()
            .insert(record("Dan", "2024-06-10T12:00:00Z"))
            .unwrap();
        let criteria = [
            Criteria::default(),
            Criteria { status: StatusFilter::CheckedIn, ..Default::default() },
            Criteria { name_substring: Some("dan".into()), ..Default::default() },
            Criteria {
                start_date: Some(date("2024-06-10")),
                end_date: Some(date("2024-06-10")),
                ..Default::default()
            },
            Criteria { end_date: Some(date("2024-06-01")), ..Default::default() },
        ];
        for log in [VisitorLog::new(), tied, sample_log()] {
            for c in &criteria {
                let once = filter(log.records(), c);
                assert_eq!(filter(&once, c), once, "criteria {c:?}");
                assert!(once.len() <= log.len());
            }
        }
    }

    #[test]
    fn test_export_csv_rows() {
        let log = sample_log();
        let csv = export_csv(log.records(), &Utc).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ID,Name,Age,Gender,Profession,Check-in,Check-out,Status");
        assert_eq!(lines.len(), 4);

        let bob = &log.records()[1];
        assert_eq!(
            lines[2],
            format!(
                "{},Bob Jones,30-35,Female,Engineer,2024-06-10 23:00:00,2024-06-11 01:00:00,Checked-out",
                bob.id()
            )
        );
        assert!(lines[1].ends_with(",N/A,Checked-in"));
    }

    #[test]
    fn test_export_csv_quotes_commas() {
        let log = VisitorLog::new()
            .insert(record("Smith, Alice", "2024-06-10T09:00:00Z"))
            .unwrap();
        let csv = export_csv(log.records(), &Utc).unwrap();
        assert!(csv.contains("\"Smith, Alice\""));
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(date("2024-06-10")), "visitor_log_2024-06-10.csv");
    }
}
