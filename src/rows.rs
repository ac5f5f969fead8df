//! CSV input files and the typed records built from their rows.
//!
//! Each file kind has a canonical header. The first non-blank row is consumed
//! as a header only when its tokens are exactly the canonical attribute names
//! (in any order); otherwise the canonical order applies positionally and that
//! row is data.
//! Blank fields never reach the attribute map.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::debug;

/// Canonical attribute names per file kind
pub mod headers {
    pub const NAME: &str = "name";
    pub const SUBACCOUNT_ID: &str = "subaccount_id";
    pub const DOMAIN: &str = "domain";
    pub const TRACKING_DOMAIN: &str = "tracking_domain";
    pub const SIGNING_DOMAIN: &str = "signing_domain";
    pub const PRIVATE: &str = "private";
    pub const PUBLIC: &str = "public";
    pub const SELECTOR: &str = "selector";
    pub const HEADERS: &str = "headers";
    pub const PORT: &str = "port";
    pub const SECURE: &str = "secure";
    pub const DEFAULT: &str = "default";

    pub const SUBACCOUNT_FILE: &[&str] = &[NAME];
    pub const DOMAIN_FILE: &[&str] = &[
        SUBACCOUNT_ID,
        DOMAIN,
        TRACKING_DOMAIN,
        SIGNING_DOMAIN,
        PRIVATE,
        PUBLIC,
        SELECTOR,
        HEADERS,
    ];
    pub const TRACKING_FILE: &[&str] = &[SUBACCOUNT_ID, TRACKING_DOMAIN, PORT, SECURE, DEFAULT];
}

/// Port used for tracking domains when the file gives none
pub const DEFAULT_TRACKING_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Subaccount,
    Domain,
    Tracking,
}

impl FileKind {
    pub fn header(self) -> &'static [&'static str] {
        match self {
            Self::Subaccount => headers::SUBACCOUNT_FILE,
            Self::Domain => headers::DOMAIN_FILE,
            Self::Tracking => headers::TRACKING_FILE,
        }
    }
}

/// Failure to read an input file; aborts the run
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Error opening file {path}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("Error reading file {path}")]
    Parse { path: String, source: csv::Error },
}

/// Failure to turn one row into a record; the row is skipped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("line {line}: missing {attribute}")]
    Missing { line: u64, attribute: &'static str },
    #[error("line {line}: subaccount id {value:?} is not a number")]
    InvalidSubaccountId { line: u64, value: String },
    #[error("line {line}: port {value:?} is not a valid port number")]
    InvalidPort { line: u64, value: String },
    #[error("line {line}: DKIM keys need private, public and selector together")]
    IncompleteDkim { line: u64 },
}

/// One input line mapped onto attribute names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    line: u64,
    attrs: BTreeMap<String, String>,
}

impl Row {
    fn from_record(line: u64, header: &[String], record: &StringRecord) -> Self {
        let attrs = header
            .iter()
            .zip(record.iter())
            .filter(|(name, value)| !name.is_empty() && !value.trim().is_empty())
            .map(|(name, value)| (name.clone(), value.trim().to_string()))
            .collect();
        Self { line, attrs }
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attrs.get(attribute).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    fn require(&self, attribute: &'static str) -> Result<&str, RowError> {
        self.get(attribute).ok_or(RowError::Missing {
            line: self.line,
            attribute,
        })
    }

    fn subaccount_id(&self) -> Result<u64, RowError> {
        let value = self.require(headers::SUBACCOUNT_ID)?;
        value
            .parse()
            .map_err(|_| RowError::InvalidSubaccountId {
                line: self.line,
                value: value.to_string(),
            })
    }

    fn owned(&self, attribute: &str) -> Option<String> {
        self.get(attribute).map(str::to_string)
    }
}

/// Read and map every row of an input file
pub fn read_rows(path: &Path, kind: FileKind) -> Result<Vec<Row>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let rows = parse_rows(file, kind).map_err(|source| InputError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "read input file");
    Ok(rows)
}

/// Map CSV content onto rows of the given kind
pub fn parse_rows<R: Read>(reader: R, kind: FileKind) -> Result<Vec<Row>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let canonical: Vec<String> = kind.header().iter().map(|s| s.to_string()).collect();
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        if header.is_none() {
            let consumed = is_header(&record, kind);
            header = Some(if consumed {
                record.iter().map(|s| s.trim().to_string()).collect()
            } else {
                canonical.clone()
            });
            if consumed {
                continue;
            }
        }

        let active = header.as_deref().unwrap_or(canonical.as_slice());
        let row = Row::from_record(line, active, &record);
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// True when the record holds exactly the canonical attribute names
fn is_header(record: &StringRecord, kind: FileKind) -> bool {
    let tokens: BTreeSet<&str> = record
        .iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let expected: BTreeSet<&str> = kind.header().iter().copied().collect();
    tokens == expected
}

/// Parse a boolean flag column: "true" or "1", case-insensitive
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Row of a subaccount file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubaccountRecord {
    pub line: u64,
    pub name: String,
}

impl TryFrom<&Row> for SubaccountRecord {
    type Error = RowError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            line: row.line,
            name: row.require(headers::NAME)?.to_string(),
        })
    }
}

/// Pre-existing DKIM key material supplied for a sending domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimMaterial {
    pub private: String,
    pub public: String,
    pub selector: String,
    pub signing_domain: Option<String>,
    pub headers: Option<String>,
}

/// Row of a sending domain file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub line: u64,
    pub subaccount_id: u64,
    pub domain: String,
    pub tracking_domain: Option<String>,
    pub dkim: Option<DkimMaterial>,
}

impl TryFrom<&Row> for DomainRecord {
    type Error = RowError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let subaccount_id = row.subaccount_id()?;
        let domain = row.require(headers::DOMAIN)?.to_string();

        let keys = (
            row.owned(headers::PRIVATE),
            row.owned(headers::PUBLIC),
            row.owned(headers::SELECTOR),
        );
        let dkim = match keys {
            (Some(private), Some(public), Some(selector)) => Some(DkimMaterial {
                private,
                public,
                selector,
                signing_domain: row.owned(headers::SIGNING_DOMAIN),
                headers: row.owned(headers::HEADERS),
            }),
            (None, None, None) => None,
            _ => return Err(RowError::IncompleteDkim { line: row.line }),
        };

        Ok(Self {
            line: row.line,
            subaccount_id,
            domain,
            tracking_domain: row.owned(headers::TRACKING_DOMAIN),
            dkim,
        })
    }
}

/// Row of a tracking domain file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRecord {
    pub line: u64,
    pub subaccount_id: u64,
    pub domain: String,
    pub port: u16,
    pub secure: Option<bool>,
    pub default: Option<bool>,
}

impl TryFrom<&Row> for TrackingRecord {
    type Error = RowError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let subaccount_id = row.subaccount_id()?;
        let domain = row.require(headers::TRACKING_DOMAIN)?.to_string();
        let port = match row.get(headers::PORT) {
            Some(value) => value.parse().map_err(|_| RowError::InvalidPort {
                line: row.line,
                value: value.to_string(),
            })?,
            None => DEFAULT_TRACKING_PORT,
        };

        Ok(Self {
            line: row.line,
            subaccount_id,
            domain,
            port,
            secure: row.get(headers::SECURE).map(parse_flag),
            default: row.get(headers::DEFAULT).map(parse_flag),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, kind: FileKind) -> Vec<Row> {
        parse_rows(text.as_bytes(), kind).unwrap()
    }

    #[test]
    fn blank_trailing_columns_are_absent() {
        let rows = parse("123, example.com, , \n", FileKind::Domain);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(headers::SUBACCOUNT_ID), Some("123"));
        assert_eq!(rows[0].get(headers::DOMAIN), Some("example.com"));
        assert_eq!(rows[0].get(headers::TRACKING_DOMAIN), None);
        assert_eq!(rows[0].get(headers::SIGNING_DOMAIN), None);
    }

    #[test]
    fn canonical_header_is_consumed() {
        let text = "subaccount_id,tracking_domain,port,secure,default\n7,track.example.com,443,true,0\n";
        let rows = parse(text, FileKind::Tracking);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(headers::PORT), Some("443"));
        assert_eq!(rows[0].line(), 2);
    }

    #[test]
    fn reordered_header_maps_by_name() {
        let text = "tracking_domain, default, subaccount_id, secure, port\ntrack.example.com,,9\n";
        let rows = parse(text, FileKind::Tracking);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(headers::TRACKING_DOMAIN), Some("track.example.com"));
        assert_eq!(rows[0].get(headers::SUBACCOUNT_ID), Some("9"));
        assert_eq!(rows[0].get(headers::DEFAULT), None);
    }

    #[test]
    fn partial_header_is_treated_as_data() {
        let rows = parse("subaccount_id,domain\n1,a.example.com\n", FileKind::Domain);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(headers::SUBACCOUNT_ID), Some("subaccount_id"));
        assert!(DomainRecord::try_from(&rows[0]).is_err());
        assert!(DomainRecord::try_from(&rows[1]).is_ok());
    }

    #[test]
    fn first_data_row_is_kept() {
        let rows = parse("alpha\nbeta\n", FileKind::Subaccount);
        let names: Vec<_> = rows
            .iter()
            .map(|r| SubaccountRecord::try_from(r).unwrap().name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn header_after_blank_lines_is_consumed() {
        let text = " , \n\nsubaccount_id,tracking_domain,port,secure,default\n5,t.example.com\n";
        let rows = parse(text, FileKind::Tracking);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(headers::SUBACCOUNT_ID), Some("5"));
        assert_eq!(rows[0].line(), 4);
        assert!(TrackingRecord::try_from(&rows[0]).is_ok());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows = parse("alpha\n\n , \nbeta\n", FileKind::Subaccount);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn domain_record_with_dkim_material() {
        let rows = parse(
            "5,example.com,click.example.com,mail.example.com,PRIV,PUB,s1,from:to\n",
            FileKind::Domain,
        );
        let record = DomainRecord::try_from(&rows[0]).unwrap();
        assert_eq!(record.subaccount_id, 5);
        assert_eq!(record.tracking_domain.as_deref(), Some("click.example.com"));
        let dkim = record.dkim.unwrap();
        assert_eq!(dkim.selector, "s1");
        assert_eq!(dkim.signing_domain.as_deref(), Some("mail.example.com"));
        assert_eq!(dkim.headers.as_deref(), Some("from:to"));
    }

    #[test]
    fn domain_record_rejects_partial_dkim() {
        let rows = parse("5,example.com,,,PRIV,,s1\n", FileKind::Domain);
        assert_eq!(
            DomainRecord::try_from(&rows[0]),
            Err(RowError::IncompleteDkim { line: 1 })
        );
    }

    #[test]
    fn domain_record_rejects_non_numeric_id() {
        let rows = parse("abc,example.com\n", FileKind::Domain);
        assert!(matches!(
            DomainRecord::try_from(&rows[0]),
            Err(RowError::InvalidSubaccountId { .. })
        ));
    }

    #[test]
    fn domain_record_requires_domain() {
        let rows = parse("12\n", FileKind::Domain);
        assert_eq!(
            DomainRecord::try_from(&rows[0]),
            Err(RowError::Missing {
                line: 1,
                attribute: headers::DOMAIN
            })
        );
    }

    #[test]
    fn tracking_record_defaults() {
        let rows = parse("3,track.example.com\n", FileKind::Tracking);
        let record = TrackingRecord::try_from(&rows[0]).unwrap();
        assert_eq!(record.port, DEFAULT_TRACKING_PORT);
        assert_eq!(record.secure, None);
        assert_eq!(record.default, None);
    }

    #[test]
    fn tracking_record_flags_and_port() {
        let rows = parse("3,track.example.com,443,TRUE,no\n", FileKind::Tracking);
        let record = TrackingRecord::try_from(&rows[0]).unwrap();
        assert_eq!(record.port, 443);
        assert_eq!(record.secure, Some(true));
        assert_eq!(record.default, Some(false));

        let rows = parse("3,track.example.com,http\n", FileKind::Tracking);
        assert!(matches!(
            TrackingRecord::try_from(&rows[0]),
            Err(RowError::InvalidPort { .. })
        ));
    }

    #[test]
    fn open_error_names_its_cause_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = read_rows(&path, FileKind::Domain).unwrap_err();
        let cause = File::open(&path).unwrap_err().to_string();

        assert!(!err.to_string().contains(&cause));
        let rendered = format!("{:#}", anyhow::Error::from(err));
        assert!(rendered.starts_with("Error opening file "));
        assert_eq!(rendered.matches(&cause).count(), 1);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("True"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
