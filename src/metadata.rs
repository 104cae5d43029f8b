//! FADGI metadata for one job, and the rules it must satisfy before any transcription runs.
//!
//! The record keeps fields as the manifest supplied them (strings) so that validation can report
//! *which* rule a row breaks. [`validate`] is pure and evaluates its rules in a fixed order; the
//! first failing rule wins.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::codes::is_country_code;
use crate::manifest::ManifestRow;

/// FADGI "Type" vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadgiType {
    Subtitle,
    Caption,
    AudioDescription,
    Chapters,
    Metadata,
}

impl FadgiType {
    pub fn as_str(self) -> &'static str {
        match self {
            FadgiType::Subtitle => "subtitle",
            FadgiType::Caption => "caption",
            FadgiType::AudioDescription => "audio-description",
            FadgiType::Chapters => "chapters",
            FadgiType::Metadata => "metadata",
        }
    }
}

impl fmt::Display for FadgiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FadgiType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtitle" => Ok(FadgiType::Subtitle),
            "caption" => Ok(FadgiType::Caption),
            "audio-description" => Ok(FadgiType::AudioDescription),
            "chapters" => Ok(FadgiType::Chapters),
            "metadata" => Ok(FadgiType::Metadata),
            _ => Err(MetadataError::Type),
        }
    }
}

/// Which responsible party a rule failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    One,
    Two,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::One => f.write_str("1"),
            Party::Two => f.write_str("2"),
        }
    }
}

/// A metadata rule violation. The `Display` text is the audit-log reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Provided WebVTT type does not comply with FADGI vocabulary")]
    Type,

    #[error("Responsible Party {0} does not follow [Country], [Partner Name] formatting")]
    PartyFormat(Party),

    #[error("Country code for Responsible Party {0} does not comply with ISO 3166-2")]
    PartyCountry(Party),

    #[error("Object Identifier does not have correct number of underscores")]
    IdentifierSeparator,

    #[error("Object Identifier does not contain a number in expected position")]
    IdentifierNumber,

    #[error("Media Identifier Type for CA-R object identifier is not local")]
    IdentifierType,

    #[error("Key and Value Fields must be used together if using Local Usage Elements")]
    LocalPair,
}

/// Fixed program values merged into every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDefaults {
    /// FADGI type term.
    pub kind: String,
    /// Responsible Party 1, `"<country>, <name>"`.
    pub party1: String,
    /// `File Creator:` label.
    pub file_creator: String,
}

impl Default for MetadataDefaults {
    fn default() -> Self {
        Self {
            kind: FadgiType::Caption.as_str().to_owned(),
            party1: "US, California Revealed".to_owned(),
            file_creator: "OpenAI Whisper".to_owned(),
        }
    }
}

/// The only identifier scheme we embed.
pub const LOCAL_IDENTIFIER_TYPE: &str = "local";

/// Structured FADGI metadata for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub kind: String,
    /// ISO 639-3 code; filled only after a successful transcription.
    pub language: Option<String>,
    pub party1: String,
    pub party2: String,
    pub media_identifier: String,
    pub media_identifier_type: String,
    pub originating_file: String,
    pub file_creator: String,
    pub title: String,
    pub origin_history: String,
    pub local_key1: String,
    pub local_value1: String,
    pub local_key2: String,
    pub local_value2: String,
}

impl MetadataRecord {
    /// Build a record from a manifest row plus program defaults.
    pub fn from_row(row: &ManifestRow, defaults: &MetadataDefaults) -> Self {
        Self {
            kind: defaults.kind.clone(),
            language: None,
            party1: defaults.party1.clone(),
            party2: row.party2.clone(),
            media_identifier: row.media_identifier.clone(),
            media_identifier_type: row.media_identifier_type.clone(),
            originating_file: row.source_name.clone(),
            file_creator: defaults.file_creator.clone(),
            title: row.title.clone(),
            origin_history: row.origin_history.clone(),
            local_key1: row.local_key1.clone(),
            local_value1: row.local_value1.clone(),
            local_key2: row.local_key2.clone(),
            local_value2: row.local_value2.clone(),
        }
    }

    /// The FADGI header lines for this record, in embedding order.
    ///
    /// Local usage lines appear only when both key and value are non-empty.
    pub fn header_lines(&self, created: NaiveDate) -> Vec<String> {
        let mut lines = vec![
            format!("Type: {}", self.kind),
            format!("Language: {}", self.language.as_deref().unwrap_or_default()),
            format!("Responsible Party: {}; {}", self.party1, self.party2),
            format!(
                "Media Identifier: {}, {}",
                self.media_identifier, self.media_identifier_type
            ),
            format!("Originating File: {}", self.originating_file),
            format!("File Creator: {}", self.file_creator),
            format!("File Creation Date: {}", created.format("%Y-%m-%d")),
            format!("Title: {}", self.title),
            format!("Origin History: {}", self.origin_history),
        ];

        for (key, value) in self.local_pairs() {
            if !key.is_empty() && !value.is_empty() {
                lines.push(format!("{key}: {value}"));
            }
        }

        lines
    }

    fn local_pairs(&self) -> [(&str, &str); 2] {
        [
            (self.local_key1.as_str(), self.local_value1.as_str()),
            (self.local_key2.as_str(), self.local_value2.as_str()),
        ]
    }
}

/// Split a responsible party into `(country, name)`.
///
/// Exactly one comma is required. Surrounding whitespace is trimmed from both tokens.
pub fn split_party(party: &str) -> Option<(&str, &str)> {
    let mut tokens = party.split(',');
    let country = tokens.next()?;
    let name = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((country.trim(), name.trim()))
}

/// Validate a record, returning the first rule it breaks.
pub fn validate(record: &MetadataRecord) -> Result<(), MetadataError> {
    record.kind.parse::<FadgiType>()?;

    let p1 = split_party(&record.party1).ok_or(MetadataError::PartyFormat(Party::One))?;
    let p2 = split_party(&record.party2).ok_or(MetadataError::PartyFormat(Party::Two))?;

    if !is_country_code(p1.0) {
        return Err(MetadataError::PartyCountry(Party::One));
    }
    if !is_country_code(p2.0) {
        return Err(MetadataError::PartyCountry(Party::Two));
    }

    let tokens: Vec<&str> = record.media_identifier.split('_').collect();
    let [_, number] = tokens.as_slice() else {
        return Err(MetadataError::IdentifierSeparator);
    };
    if number.parse::<i64>().is_err() {
        return Err(MetadataError::IdentifierNumber);
    }

    if record.media_identifier_type != LOCAL_IDENTIFIER_TYPE {
        return Err(MetadataError::IdentifierType);
    }

    for (key, value) in record.local_pairs() {
        if key.is_empty() != value.is_empty() {
            return Err(MetadataError::LocalPair);
        }
    }

    Ok(())
}
