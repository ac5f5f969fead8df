use serde::{Deserialize, Serialize};
use std::fmt;

/// API key grants attached to every subaccount key created by this tool
pub mod grants {
    pub const SMTP_INJECT: &str = "smtp/inject";
    pub const SENDING_DOMAINS_MANAGE: &str = "sending_domains/manage";
    pub const MESSAGE_EVENTS_VIEW: &str = "message_events/view";
    pub const SUPPRESSION_LISTS_MANAGE: &str = "suppression_lists/manage";

    pub const SUBACCOUNT_DEFAULT: [&str; 4] = [
        SMTP_INJECT,
        SENDING_DOMAINS_MANAGE,
        MESSAGE_EVENTS_VIEW,
        SUPPRESSION_LISTS_MANAGE,
    ];
}

/// Every SparkPost success body wraps its payload in `results`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub results: T,
}

/// Body for `POST /subaccounts`
#[derive(Debug, Serialize)]
pub struct CreateSubaccountRequest<'a> {
    pub name: &'a str,
    pub key_label: String,
    pub key_grants: Vec<&'a str>,
}

impl<'a> CreateSubaccountRequest<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            key_label: format!("key_{}", name),
            key_grants: grants::SUBACCOUNT_DEFAULT.to_vec(),
        }
    }
}

/// Response payload of a successful subaccount creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSubaccount {
    pub subaccount_id: u64,
    pub key: Option<String>,
    pub label: Option<String>,
    pub short_key: Option<String>,
}

/// Subaccount as returned by the listing and lookup endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Subaccount {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub compliance_status: Option<String>,
}

impl fmt::Display for Subaccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>8}  {:<40} {:<12} {}",
            self.id,
            self.name,
            self.status.as_deref().unwrap_or("unknown"),
            self.compliance_status.as_deref().unwrap_or("unknown")
        )
    }
}

/// Caller-supplied DKIM key material for a sending domain
#[derive(Debug, Serialize)]
pub struct DkimKeys<'a> {
    pub private: &'a str,
    pub public: &'a str,
    pub selector: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<&'a str>,
}

/// Body for `POST /sending-domains`
#[derive(Debug, Serialize)]
pub struct CreateSendingDomainRequest<'a> {
    pub domain: &'a str,
    pub generate_dkim: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dkim: Option<DkimKeys<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_domain: Option<&'a str>,
}

/// DKIM block of a sending domain response
#[derive(Debug, Clone, Deserialize)]
pub struct Dkim {
    pub public: Option<String>,
    pub selector: Option<String>,
    pub signing_domain: Option<String>,
}

impl Dkim {
    /// Selector and public key, when both were returned
    pub fn key_pair(&self) -> Option<(&str, &str)> {
        let selector = self.selector.as_deref().filter(|s| !s.is_empty())?;
        let public = self.public.as_deref().filter(|s| !s.is_empty())?;
        Some((selector, public))
    }
}

/// Response payload of a successful sending domain creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSendingDomain {
    #[serde(default)]
    pub message: Option<String>,
    pub domain: String,
    pub dkim: Option<Dkim>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendingDomainStatus {
    pub ownership_verified: Option<bool>,
    pub dkim_status: Option<String>,
    pub spf_status: Option<String>,
    pub cname_status: Option<String>,
    pub compliance_status: Option<String>,
}

impl fmt::Display for SendingDomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ownership_verified={} dkim={} spf={} compliance={}",
            self.ownership_verified.unwrap_or(false),
            self.dkim_status.as_deref().unwrap_or("unknown"),
            self.spf_status.as_deref().unwrap_or("unknown"),
            self.compliance_status.as_deref().unwrap_or("unknown"),
        )
    }
}

/// Sending domain as returned by `GET /sending-domains/{domain}`
#[derive(Debug, Clone, Deserialize)]
pub struct SendingDomain {
    /// Absent when the domain belongs to the master account
    pub subaccount_id: Option<u64>,
    pub tracking_domain: Option<String>,
    #[serde(default)]
    pub status: SendingDomainStatus,
    pub dkim: Option<Dkim>,
}

impl fmt::Display for SendingDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(tracking_domain) = &self.tracking_domain {
            write!(f, " tracking_domain={}", tracking_domain)?;
        }
        Ok(())
    }
}

/// Body for `POST /tracking-domains`
#[derive(Debug, Serialize)]
pub struct CreateTrackingDomainRequest<'a> {
    pub domain: &'a str,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTrackingDomain {
    pub domain: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingDomainStatus {
    pub verified: Option<bool>,
    pub cname_status: Option<String>,
    pub compliance_status: Option<String>,
}

impl fmt::Display for TrackingDomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verified={} cname={} compliance={}",
            self.verified.unwrap_or(false),
            self.cname_status.as_deref().unwrap_or("unknown"),
            self.compliance_status.as_deref().unwrap_or("unknown"),
        )
    }
}

/// Tracking domain as returned by `GET /tracking-domains/{domain}`
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingDomain {
    pub domain: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub default: bool,
    pub subaccount_id: Option<u64>,
    #[serde(default)]
    pub status: TrackingDomainStatus,
}
