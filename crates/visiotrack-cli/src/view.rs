//! Terminal rendering of visitor records.

use chrono::{DateTime, Local, Utc};
use visiotrack_core::{Profile, ProfileField, VisitorRecord};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn check_out_cell(record: &VisitorRecord) -> String {
    record
        .check_out_time()
        .map(local)
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn print_table(records: &[VisitorRecord]) {
    if records.is_empty() {
        println!("No visitors match");
        return;
    }
    println!(
        "{:<36}  {:<24}  {:<8}  {:<8}  {:<20}  {:<16}  {:<16}  {}",
        "ID", "NAME", "AGE", "GENDER", "PROFESSION", "CHECK-IN", "CHECK-OUT", "STATUS"
    );
    for r in records {
        let p = r.enhanced_profile();
        println!(
            "{:<36}  {:<24}  {:<8}  {:<8}  {:<20}  {:<16}  {:<16}  {}",
            r.id(),
            truncate(&p.name, 24),
            truncate(&p.age, 8),
            truncate(&p.gender, 8),
            truncate(&p.profession, 20),
            local(r.timestamp()),
            check_out_cell(r),
            r.status()
        );
    }
    println!("{} visitor(s)", records.len());
}

pub fn print_details(record: &VisitorRecord) {
    println!("Visitor   {}", record.id());
    println!("Status    {}", record.status());
    println!("Check-in  {}", local(record.timestamp()));
    println!("Check-out {}", check_out_cell(record));
    println!("Photo     {} bytes (data URL)", record.photo().len());
    println!();
    println!("{:<12}  {:<28}  {}", "", "AI ANALYSIS", "REVIEWED");
    let (raw, enhanced) = (record.raw_profile(), record.enhanced_profile());
    for field in ProfileField::ALL {
        let marker = if raw.field(field) != enhanced.field(field) { "*" } else { "" };
        println!(
            "{:<12}  {:<28}  {}{marker}",
            field.key(),
            raw.field(field),
            enhanced.field(field)
        );
    }
}

/// Candidate profile shown during scan review.
pub fn print_profile(profile: &Profile) {
    println!();
    for field in ProfileField::ALL {
        println!("  {:<12} {}", field.key(), profile.field(field));
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
