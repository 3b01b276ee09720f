//! Guest-list intake — CSV parsing and phone validation.

use std::path::Path;

use tracing::warn;

use crate::model::NewGuest;

/// Accept a phone number iff it is `+` followed by one or more digits.
pub fn is_e164(number: &str) -> bool {
    number
        .strip_prefix('+')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Header variants accepted for the guest-name column, compared after
/// lowering and stripping spaces (and a leading BOM).
const NAME_HEADERS: &[&str] = &["guestname", "name", "fullname"];
const PHONE_HEADERS: &[&str] = &["phonenumber", "phone", "contactnumber", "mobilenumber"];

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace(' ', "")
}

/// Parse a guest-list CSV into `NewGuest` entries.
///
/// Tolerant by design: a missing file, an empty file, or a file without a
/// recognizable name and phone header yields an empty list rather than an
/// error, and rows missing either field are skipped. The caller decides
/// what an empty list means.
pub fn parse_guest_csv(path: &Path) -> Vec<NewGuest> {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Guest CSV unreadable");
            return Vec::new();
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Guest CSV has no headers");
            return Vec::new();
        }
    };

    let mut name_col = None;
    let mut phone_col = None;
    for (index, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        if NAME_HEADERS.contains(&normalized.as_str()) {
            name_col = Some(index);
        } else if PHONE_HEADERS.contains(&normalized.as_str()) {
            phone_col = Some(index);
        }
    }

    let (Some(name_col), Some(phone_col)) = (name_col, phone_col) else {
        warn!(
            path = %path.display(),
            headers = ?headers.iter().collect::<Vec<_>>(),
            "Guest CSV missing name or phone header"
        );
        return Vec::new();
    };

    let mut guests = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };

        let guest_name = record.get(name_col).unwrap_or_default().trim();
        let phone_number = record.get(phone_col).unwrap_or_default().trim();

        if guest_name.is_empty() && phone_number.is_empty() {
            continue;
        }
        if guest_name.is_empty() || phone_number.is_empty() {
            warn!(name = guest_name, phone = phone_number, "Skipping incomplete guest row");
            continue;
        }

        guests.push(NewGuest {
            guest_name: guest_name.to_string(),
            phone_number: phone_number.to_string(),
        });
    }

    if guests.is_empty() {
        warn!(path = %path.display(), "No valid guest rows found");
    }
    guests
}
