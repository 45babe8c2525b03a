//! CSV row source: turns an uploaded sheet into normalized `ProfileRecord`s.

use std::io::Read;

use crate::models::profile::ProfileRecord;

const URL_MARKER: &str = "linkedin.com/in/";

#[derive(Debug, thiserror::Error)]
pub enum CsvSourceError {
    #[error("No valid LinkedIn URLs found in CSV")]
    EmptyInput,

    #[error("Failed to read CSV: {0}")]
    Malformed(#[from] csv::Error),
}

/// Parse an uploaded CSV into profile records.
///
/// Column names are matched case-insensitively with surrounding whitespace
/// trimmed; unrecognized columns are ignored. A row is kept when its
/// `linkedinurl` column contains a `linkedin.com/in/` URL. This acceptance
/// is deliberately looser than the strict validation applied later in the
/// pipeline; loose-but-invalid rows still get a per-record failure outcome
/// instead of being dropped here. The CRM contact id is carried through
/// when the sheet has one; rows without it fall back to URL-derived keys
/// downstream.
pub fn parse<R: Read>(reader: R) -> Result<Vec<ProfileRecord>, CsvSourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let url_col = column("linkedinurl");
    let id_col = column("record id - contact");
    let first_name_col = column("first name");
    let last_name_col = column("last name");
    let picture_col = column("profilepicture");

    let field = |row: &csv::StringRecord, col: Option<usize>| -> Option<String> {
        col.and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;

        let Some(url) = field(&row, url_col).filter(|u| u.contains(URL_MARKER)) else {
            tracing::warn!("no LinkedIn URL found in row");
            continue;
        };

        let full_name = match (
            field(&row, first_name_col),
            field(&row, last_name_col),
        ) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(single), None) | (None, Some(single)) => Some(single),
            (None, None) => None,
        };

        records.push(ProfileRecord {
            hubspot_id: field(&row, id_col),
            linkedin_url: url,
            full_name,
            profile_picture: field(&row, picture_col),
        });
    }

    if records.is_empty() {
        return Err(CsvSourceError::EmptyInput);
    }

    tracing::info!(count = records.len(), "parsed valid profile rows");
    Ok(records)
}
