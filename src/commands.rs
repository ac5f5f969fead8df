//! Verb dispatch: read the input file, issue one request per row, report.
//!
//! Per-row failures (bad row, API error, transport error) are printed and
//! counted, and the run moves on to the next row. Calls that serve the whole
//! run (listing subaccounts) fail the run instead.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::args::Command;
use crate::client::{ApiError, SparkPostClient};
use crate::dns::{self, RecordWriter};
use crate::rows::{
    self, DomainRecord, FileKind, InputError, Row, RowError, SubaccountRecord, TrackingRecord,
};
use crate::types::Subaccount;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Error writing file {path}")]
    Output {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Per-run tally of processed rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub ok: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ok, {} failed", self.ok, self.failed)
    }
}

impl Summary {
    fn row_error(&mut self, err: &RowError) {
        warn!(%err, "skipping row");
        println!("Skipping {}", err);
        self.failed += 1;
    }
}

/// How a `-findsub` row names its subaccount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubaccountLookup {
    Id(u64),
    Name(String),
}

impl From<&SubaccountRecord> for SubaccountLookup {
    fn from(record: &SubaccountRecord) -> Self {
        match record.name.parse() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(record.name.clone()),
        }
    }
}

/// Run one command. Row-based verbs return their tally.
pub async fn execute(client: &SparkPostClient, command: Command) -> Result<Option<Summary>, CliError> {
    info!(verb = %command.verb(), base = client.base_url(), "running");
    println!("{} :", command.verb());

    let summary = match command {
        Command::CreateSub { input } => create_subaccounts(client, &input).await?,
        Command::DeleteSub => {
            println!("DeleteSub : sorry this is currently unsupported in SparkPost.");
            return Ok(None);
        }
        Command::ViewSub => {
            view_subaccounts(client).await?;
            return Ok(None);
        }
        Command::FindSub { input } => find_subaccounts(client, &input).await?,
        Command::CreateDomains { input, output } => {
            create_domains(client, &input, output.as_deref()).await?
        }
        Command::DeleteDomains { input } => delete_domains(client, &input).await?,
        Command::ViewDomains { input, output } => {
            view_domains(client, &input, output.as_deref()).await?
        }
        Command::CreateTrack { input } => create_tracking(client, &input).await?,
        Command::DeleteTrack { input } => delete_tracking(client, &input).await?,
        Command::ViewTrack { input, output } => {
            view_tracking(client, &input, output.as_deref()).await?
        }
    };
    Ok(Some(summary))
}

/// Read every row, then validate each into a record of kind `T`
fn load<T>(input: &Path, kind: FileKind) -> Result<Vec<Result<T, RowError>>, CliError>
where
    T: for<'a> TryFrom<&'a Row, Error = RowError>,
{
    let rows = rows::read_rows(input, kind)?;
    Ok(rows.iter().map(|row| T::try_from(row)).collect())
}

fn open_output(path: Option<&Path>) -> Result<RecordWriter, CliError> {
    let writer = RecordWriter::create(path).map_err(|source| output_error(path, source))?;
    if let Some(path) = writer.path() {
        println!("Writing DNS entries in {}", path.display());
    }
    Ok(writer)
}

fn write_record(writer: &mut RecordWriter, line: &str) -> Result<(), CliError> {
    writer
        .write_line(line)
        .map_err(|source| output_error(writer.path(), source))
}

fn close_output(writer: RecordWriter) -> Result<(), CliError> {
    let path: Option<PathBuf> = writer.path().map(Path::to_path_buf);
    let written = writer
        .finish()
        .map_err(|source| output_error(path.as_deref(), source))?;
    if let Some(path) = path {
        println!("Wrote {} DNS entries to {}", written, path.display());
    }
    Ok(())
}

fn output_error(path: Option<&Path>, source: std::io::Error) -> CliError {
    CliError::Output {
        path: path.map(|p| p.display().to_string()).unwrap_or_default(),
        source,
    }
}

async fn create_subaccounts(client: &SparkPostClient, input: &Path) -> Result<Summary, CliError> {
    let mut summary = Summary::default();
    for record in load::<SubaccountRecord>(input, FileKind::Subaccount)? {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!("Create subaccount name= {}", record.name);
        match client.create_subaccount(&record.name).await {
            Ok(created) => {
                println!(
                    "{} : id= {} label= {} key= {}",
                    prefix,
                    created.subaccount_id,
                    created.label.as_deref().unwrap_or(""),
                    created.key.as_deref().unwrap_or("")
                );
                summary.ok += 1;
            }
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn view_subaccounts(client: &SparkPostClient) -> Result<(), CliError> {
    let subaccounts = client.list_subaccounts().await?;
    println!("{:>8}  {:<40} {:<12} compliance", "id", "name", "status");
    for subaccount in &subaccounts {
        println!("{}", subaccount);
    }
    println!("{} subaccount(s)", subaccounts.len());
    Ok(())
}

async fn find_subaccounts(client: &SparkPostClient, input: &Path) -> Result<Summary, CliError> {
    let records = load::<SubaccountRecord>(input, FileKind::Subaccount)?;

    let wants_names = records
        .iter()
        .flatten()
        .any(|r| matches!(SubaccountLookup::from(r), SubaccountLookup::Name(_)));
    let by_name: HashMap<String, Subaccount> = if wants_names {
        client
            .list_subaccounts()
            .await?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect()
    } else {
        HashMap::new()
    };

    let mut summary = Summary::default();
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        match SubaccountLookup::from(&record) {
            SubaccountLookup::Id(id) => match client.get_subaccount(id).await {
                Ok(subaccount) => {
                    println!("{}", subaccount);
                    summary.ok += 1;
                }
                Err(err) => {
                    println!("View subaccount= {} : Error: {}", id, err);
                    summary.failed += 1;
                }
            },
            SubaccountLookup::Name(name) => match by_name.get(&name) {
                Some(subaccount) => {
                    println!("{}", subaccount);
                    summary.ok += 1;
                }
                None => {
                    println!("View subaccount name= {} : not found", name);
                    summary.failed += 1;
                }
            },
        }
    }
    Ok(summary)
}

async fn create_domains(
    client: &SparkPostClient,
    input: &Path,
    output: Option<&Path>,
) -> Result<Summary, CliError> {
    let records = load::<DomainRecord>(input, FileKind::Domain)?;
    let mut writer = open_output(output)?;
    let mut summary = Summary::default();

    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "Create subaccount= {} domain= {}",
            record.subaccount_id, record.domain
        );
        match client.create_sending_domain(&record).await {
            Ok(created) => {
                println!(
                    "{} : {}",
                    prefix,
                    created.message.as_deref().unwrap_or("created")
                );
                if let Some(dkim) = &created.dkim {
                    if let Some((selector, public)) = dkim.key_pair() {
                        let domain = dkim.signing_domain.as_deref().unwrap_or(&created.domain);
                        write_record(&mut writer, &dns::dkim_txt_record(selector, domain, public))?;
                    }
                }
                summary.ok += 1;
            }
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                write_record(&mut writer, &dns::error_marker(&record.domain))?;
                summary.failed += 1;
            }
        }
    }

    close_output(writer)?;
    Ok(summary)
}

async fn delete_domains(client: &SparkPostClient, input: &Path) -> Result<Summary, CliError> {
    let mut summary = Summary::default();
    for record in load::<DomainRecord>(input, FileKind::Domain)? {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "Delete subaccount= {} domain= {}",
            record.subaccount_id, record.domain
        );
        match client
            .delete_sending_domain(record.subaccount_id, &record.domain)
            .await
        {
            Ok(()) => {
                println!("{} : done", prefix);
                summary.ok += 1;
            }
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Compare the owning subaccount reported by the API with the one in the file
fn check_owner(expected: u64, actual: Option<u64>) -> Result<(), String> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(format!(
            "subaccount mismatch: expected {}, got {}",
            expected, actual
        )),
        None => Err(format!(
            "subaccount mismatch: expected {}, got master account",
            expected
        )),
    }
}

async fn view_domains(
    client: &SparkPostClient,
    input: &Path,
    output: Option<&Path>,
) -> Result<Summary, CliError> {
    let records = load::<DomainRecord>(input, FileKind::Domain)?;
    let mut writer = open_output(output)?;
    let mut summary = Summary::default();

    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "View subaccount= {} domain= {}",
            record.subaccount_id, record.domain
        );
        let domain = match client
            .get_sending_domain(record.subaccount_id, &record.domain)
            .await
        {
            Ok(domain) => domain,
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
                continue;
            }
        };

        if let Err(mismatch) = check_owner(record.subaccount_id, domain.subaccount_id) {
            println!("{} : {}", prefix, mismatch);
            summary.failed += 1;
            continue;
        }

        println!("{} : {}", prefix, domain);
        match domain.dkim.as_ref().and_then(|d| d.key_pair()) {
            Some((selector, public)) => {
                write_record(
                    &mut writer,
                    &dns::dkim_txt_record(selector, &record.domain, public),
                )?;
            }
            None => println!("{} : no DKIM key on record", prefix),
        }
        summary.ok += 1;
    }

    close_output(writer)?;
    Ok(summary)
}

async fn create_tracking(client: &SparkPostClient, input: &Path) -> Result<Summary, CliError> {
    let mut summary = Summary::default();
    for record in load::<TrackingRecord>(input, FileKind::Tracking)? {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "Create subaccount= {} tracking domain= {} port= {}",
            record.subaccount_id, record.domain, record.port
        );
        match client.create_tracking_domain(&record).await {
            Ok(_) => {
                println!("{} : done", prefix);
                summary.ok += 1;
            }
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn delete_tracking(client: &SparkPostClient, input: &Path) -> Result<Summary, CliError> {
    let mut summary = Summary::default();
    for record in load::<TrackingRecord>(input, FileKind::Tracking)? {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "Delete subaccount= {} tracking domain= {}",
            record.subaccount_id, record.domain
        );
        match client
            .delete_tracking_domain(record.subaccount_id, &record.domain)
            .await
        {
            Ok(()) => {
                println!("{} : done", prefix);
                summary.ok += 1;
            }
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn view_tracking(
    client: &SparkPostClient,
    input: &Path,
    output: Option<&Path>,
) -> Result<Summary, CliError> {
    let records = load::<TrackingRecord>(input, FileKind::Tracking)?;
    let mut writer = open_output(output)?;
    let mut summary = Summary::default();

    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                summary.row_error(&err);
                continue;
            }
        };

        let prefix = format!(
            "View subaccount= {} tracking domain= {}",
            record.subaccount_id, record.domain
        );
        let tracking = match client
            .get_tracking_domain(record.subaccount_id, &record.domain)
            .await
        {
            Ok(tracking) => tracking,
            Err(err) => {
                println!("{} : Error: {}", prefix, err);
                summary.failed += 1;
                continue;
            }
        };

        if let Err(mismatch) = check_owner(record.subaccount_id, tracking.subaccount_id) {
            println!("{} : {}", prefix, mismatch);
            summary.failed += 1;
            continue;
        }

        println!(
            "{} : port={} secure={} default={} {}",
            prefix,
            tracking.port.unwrap_or(rows::DEFAULT_TRACKING_PORT),
            tracking.secure,
            tracking.default,
            tracking.status
        );
        write_record(&mut writer, &dns::tracking_cname_record(&record.domain))?;
        summary.ok += 1;
    }

    close_output(writer)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use httpmock::MockServer;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn client(server: &MockServer) -> SparkPostClient {
        SparkPostClient::new(&Settings {
            host: server.base_url(),
            api_key: "key".to_string(),
        })
        .unwrap()
    }

    fn tmp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_owner() {
        assert!(check_owner(5, Some(5)).is_ok());
        assert_eq!(
            check_owner(5, Some(6)).unwrap_err(),
            "subaccount mismatch: expected 5, got 6"
        );
        assert!(check_owner(5, None).is_err());
    }

    #[test]
    fn test_subaccount_lookup() {
        let record = |name: &str| SubaccountRecord {
            line: 1,
            name: name.to_string(),
        };
        assert_eq!(SubaccountLookup::from(&record("123")), SubaccountLookup::Id(123));
        assert_eq!(
            SubaccountLookup::from(&record("acme")),
            SubaccountLookup::Name("acme".to_string())
        );
    }

    #[tokio::test]
    async fn view_domains_writes_dkim_and_skips_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/api/v1/sending-domains/good.example.com")
                    .header("x-msys-subaccount", "1");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"results":{"subaccount_id":1,"status":{"dkim_status":"valid"},"dkim":{"public":"ABC123","selector":"s1"}}}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/api/v1/sending-domains/other.example.com");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"results":{"subaccount_id":99,"dkim":{"public":"XYZ","selector":"s2"}}}"#);
            })
            .await;

        let input = tmp_file("2,other.example.com\n1,good.example.com\n");
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dkim.bind");

        let summary = view_domains(&client(&server), input.path(), Some(&output))
            .await
            .unwrap();
        assert_eq!(summary, Summary { ok: 1, failed: 1 });
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "s1._domainkey.good.example.com. IN TXT \"v=DKIM1; h=sha256; k=rsa; s=email; p=ABC123\"\n"
        );
    }

    #[tokio::test]
    async fn create_domains_marks_failures_in_output() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/v1/sending-domains")
                    .json_body_includes(r#"{"domain":"new.example.com"}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"results":{"message":"Successfully Created domain.","domain":"new.example.com","dkim":{"public":"PUB","selector":"sel","signing_domain":"new.example.com"}}}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/v1/sending-domains")
                    .json_body_includes(r#"{"domain":"taken.example.com"}"#);
                then.status(409)
                    .header("content-type", "application/json")
                    .body(r#"{"errors":[{"message":"resource conflict"}]}"#);
            })
            .await;

        let input = tmp_file("3,new.example.com\n3,taken.example.com\nx,bad.example.com\n");
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dkim.bind");

        let summary = create_domains(&client(&server), input.path(), Some(&output))
            .await
            .unwrap();
        assert_eq!(summary, Summary { ok: 1, failed: 2 });
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "sel._domainkey.new.example.com. IN TXT \"v=DKIM1; h=sha256; k=rsa; s=email; p=PUB\"\n*** Error processing taken.example.com\n"
        );
    }

    #[tokio::test]
    async fn delete_tracking_continues_after_failure() {
        let server = MockServer::start_async().await;
        let gone = server
            .mock_async(|when, then| {
                when.method("DELETE").path("/api/v1/tracking-domains/a.example.com");
                then.status(404).body("{}");
            })
            .await;
        let ok = server
            .mock_async(|when, then| {
                when.method("DELETE").path("/api/v1/tracking-domains/b.example.com");
                then.status(204);
            })
            .await;

        let input = tmp_file("subaccount_id,tracking_domain,port,secure,default\n4,a.example.com\n4,b.example.com\n");
        let summary = delete_tracking(&client(&server), input.path()).await.unwrap();
        assert_eq!(summary, Summary { ok: 1, failed: 1 });
        gone.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn missing_input_creates_no_output() {
        let server = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cname.bind");

        let err = view_tracking(
            &client(&server),
            &dir.path().join("absent.csv"),
            Some(&output),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Input(InputError::Open { .. })));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn find_subaccounts_by_name_and_id() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method("GET").path("/api/v1/subaccounts");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"results":[{"id":1,"name":"alpha","status":"active"}]}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/api/v1/subaccounts/2");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"results":{"id":2,"name":"beta","status":"active"}}"#);
            })
            .await;

        let input = tmp_file("alpha\n2\nmissing\n");
        let summary = find_subaccounts(&client(&server), input.path()).await.unwrap();
        assert_eq!(summary, Summary { ok: 2, failed: 1 });
        list.assert_async().await;
    }
}
