//! Command-line surface.
//!
//! Verbs keep the single-dash spelling operators already script against
//! (`-createsub`, `-viewdomains`, ...), so they are parsed as a positional
//! value rather than as clap subcommands.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(
    name = "sparky",
    version,
    about = "SparkPost service provider tool: bulk-create subaccounts, sending domains and tracking domains",
    long_about = None
)]
pub struct Cli {
    /// Settings file with a [SparkPost] section (Host, Authorization)
    #[arg(long, env = "SPARKPOST_INI", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Action, e.g. -createsub, -viewdomains (see usage)
    #[arg(allow_hyphen_values = true)]
    pub action: Option<String>,

    /// Input file, then optional output file
    #[arg(allow_hyphen_values = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Resolve the action and its files; `None` means usage should be shown
    pub fn command(&self) -> Option<Command> {
        let verb = Verb::parse(self.action.as_deref()?)?;
        Command::from_verb(verb, &self.files)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    CreateSub,
    DeleteSub,
    ViewSub,
    FindSub,
    CreateDomains,
    DeleteDomains,
    ViewDomains,
    CreateTrack,
    DeleteTrack,
    ViewTrack,
}

impl Verb {
    pub const ALL: [Verb; 10] = [
        Self::CreateSub,
        Self::DeleteSub,
        Self::ViewSub,
        Self::FindSub,
        Self::CreateDomains,
        Self::DeleteDomains,
        Self::ViewDomains,
        Self::CreateTrack,
        Self::DeleteTrack,
        Self::ViewTrack,
    ];

    /// Case-insensitive; the leading dash is optional
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim().trim_start_matches('-').to_ascii_lowercase();
        Self::ALL.into_iter().find(|verb| verb.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateSub => "createsub",
            Self::DeleteSub => "deletesub",
            Self::ViewSub => "viewsub",
            Self::FindSub => "findsub",
            Self::CreateDomains => "createdomains",
            Self::DeleteDomains => "deletedomains",
            Self::ViewDomains => "viewdomains",
            Self::CreateTrack => "createtrack",
            Self::DeleteTrack => "deletetrack",
            Self::ViewTrack => "viewtrack",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.name())
    }
}

/// A verb bound to its input and output files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateSub { input: PathBuf },
    DeleteSub,
    ViewSub,
    FindSub { input: PathBuf },
    CreateDomains { input: PathBuf, output: Option<PathBuf> },
    DeleteDomains { input: PathBuf },
    ViewDomains { input: PathBuf, output: Option<PathBuf> },
    CreateTrack { input: PathBuf },
    DeleteTrack { input: PathBuf },
    ViewTrack { input: PathBuf, output: Option<PathBuf> },
}

impl Command {
    /// Bind files to a verb; `None` when a required input file is missing
    pub fn from_verb(verb: Verb, files: &[PathBuf]) -> Option<Self> {
        let input = files.first().cloned();
        let output = files.get(1).cloned();

        let command = match verb {
            Verb::DeleteSub => Self::DeleteSub,
            Verb::ViewSub => Self::ViewSub,
            Verb::CreateSub => Self::CreateSub { input: input? },
            Verb::FindSub => Self::FindSub { input: input? },
            Verb::CreateDomains => Self::CreateDomains {
                input: input?,
                output,
            },
            Verb::DeleteDomains => Self::DeleteDomains { input: input? },
            Verb::ViewDomains => Self::ViewDomains {
                input: input?,
                output,
            },
            Verb::CreateTrack => Self::CreateTrack { input: input? },
            Verb::DeleteTrack => Self::DeleteTrack { input: input? },
            Verb::ViewTrack => Self::ViewTrack {
                input: input?,
                output,
            },
        };
        Some(command)
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::CreateSub { .. } => Verb::CreateSub,
            Self::DeleteSub => Verb::DeleteSub,
            Self::ViewSub => Verb::ViewSub,
            Self::FindSub { .. } => Verb::FindSub,
            Self::CreateDomains { .. } => Verb::CreateDomains,
            Self::DeleteDomains { .. } => Verb::DeleteDomains,
            Self::ViewDomains { .. } => Verb::ViewDomains,
            Self::CreateTrack { .. } => Verb::CreateTrack,
            Self::DeleteTrack { .. } => Verb::DeleteTrack,
            Self::ViewTrack { .. } => Verb::ViewTrack,
        }
    }
}

pub fn usage(program: &str) -> String {
    format!(
        r#"
NAME
   {program}
   SparkPost Service Provider tool for creating subaccounts, and creating, viewing and deleting
   subaccount sending domains and tracking domains.

SYNOPSIS
  {program} [--config sparkpost.ini] action [files]

MANDATORY PARAMETERS
    action               -createsub subfile_in
    action               -deletesub        ** currently unsupported in SparkPost
    action               -viewsub          list all subaccounts
    action               -findsub subfile_in
    action               -createdomains domfile_in [bindfile_out]
    action               -deletedomains domfile_in
    action               -viewdomains domfile_in [bindfile_out]
    action               -createtrack trackfile_in
    action               -deletetrack trackfile_in
    action               -viewtrack trackfile_in [bindfile_out]

    subfile_in           .csv file, each line containing a subaccount name (-findsub also takes ids)
    domfile_in           .csv file, columns: subaccount_id, domain, [tracking_domain, signing_domain,
                         private, public, selector, headers]
    trackfile_in         .csv file, columns: subaccount_id, tracking_domain, [port, secure, default]
    bindfile_out         BIND format DNS entries are written here (DKIM TXT or tracking CNAME)

USAGE
    Create the subaccounts first with -createsub, if you do not already have them. The output lists
    the numeric subaccount IDs; put those IDs in the domain and tracking files.

    A first line naming every column of the file kind is read as a header, and the columns may then
    appear in any order. Otherwise columns are positional. Blank fields and whitespace are ignored.
"#
    )
}
