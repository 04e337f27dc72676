//! Pure transformation functions for the Salesforce SOAP and REST APIs.
//!
//! This module contains zero I/O operations and is fully testable with fixture data.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// API version used for login and queries.
pub const API_VERSION: &str = "59.0";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SalesforceError {
    #[error("Salesforce login failed: {0}")]
    LoginFault(String),

    #[error("Salesforce response is missing <{0}>")]
    MissingField(&'static str),

    #[error("Invalid Salesforce server URL: {0}")]
    InvalidServerUrl(String),
}

// ============================================================================
// Domain Models
// ============================================================================

/// Username/password credentials as stored in the secrets file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceCredentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
    /// `login` for production, `test` for sandboxes, or a My Domain prefix.
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "login".to_string()
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceSession {
    pub session_id: String,
    pub instance_url: String,
    pub server_url: String,
}

/// SOQL query response from the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "totalSize")]
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, rename = "nextRecordsUrl")]
    pub next_records_url: Option<String>,
}

/// Query result flattened for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryOutput {
    pub total_size: u64,
    pub done: bool,
    pub columns: Vec<String>,
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

// ============================================================================
// Login
// ============================================================================

/// SOAP login endpoint for a domain.
pub fn login_url(domain: &str) -> String {
    format!(
        "https://{}.salesforce.com/services/Soap/u/{}",
        domain, API_VERSION
    )
}

/// SOAP envelope for the `login` call. The security token is appended to the
/// password.
pub fn build_login_envelope(credentials: &SalesforceCredentials) -> String {
    let username = html_escape::encode_text(&credentials.username);
    let password = html_escape::encode_text(&format!(
        "{}{}",
        credentials.password, credentials.security_token
    ))
    .into_owned();

    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope
        xmlns:xsd="http://www.w3.org/2001/XMLSchema"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
        xmlns:urn="urn:partner.soap.sforce.com">
    <env:Header>
        <urn:CallOptions>
            <urn:client>cpq-agent</urn:client>
        </urn:CallOptions>
    </env:Header>
    <env:Body>
        <n1:login xmlns:n1="urn:partner.soap.sforce.com">
            <n1:username>{username}</n1:username>
            <n1:password>{password}</n1:password>
        </n1:login>
    </env:Body>
</env:Envelope>"#
    )
}

fn element_text(xml: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<(?:\w+:)?{tag}>(.*?)</(?:\w+:)?{tag}>");
    let re = Regex::new(&pattern).ok()?;

    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
}

/// Scheme and host of a server URL.
pub fn instance_url_from_server_url(server_url: &str) -> Result<String, SalesforceError> {
    let re = Regex::new(r"^(https?://[^/]+)").map_err(|e| {
        SalesforceError::InvalidServerUrl(format!("{server_url}: {e}"))
    })?;

    re.captures(server_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SalesforceError::InvalidServerUrl(server_url.to_string()))
}

/// Parse a SOAP login response (success or fault).
pub fn parse_login_response(xml: &str) -> Result<SalesforceSession, SalesforceError> {
    if let Some(fault) = element_text(xml, "faultstring") {
        return Err(SalesforceError::LoginFault(fault));
    }

    let session_id =
        element_text(xml, "sessionId").ok_or(SalesforceError::MissingField("sessionId"))?;
    let server_url =
        element_text(xml, "serverUrl").ok_or(SalesforceError::MissingField("serverUrl"))?;
    let instance_url = instance_url_from_server_url(&server_url)?;

    Ok(SalesforceSession {
        session_id,
        instance_url,
        server_url,
    })
}

// ============================================================================
// Query
// ============================================================================

/// REST query URL for a SOQL statement.
pub fn query_url(instance_url: &str, soql: &str) -> String {
    format!(
        "{}/services/data/v{}/query?q={}",
        instance_url.trim_end_matches('/'),
        API_VERSION,
        urlencoding::encode(soql)
    )
}

/// Drop per-record `attributes` and collect column names in first-seen order.
pub fn transform_query_response(response: QueryResponse) -> QueryOutput {
    let mut columns: Vec<String> = Vec::new();

    let records = response
        .records
        .into_iter()
        .map(|mut record| {
            record.remove("attributes");
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            record
        })
        .collect();

    QueryOutput {
        total_size: response.total_size,
        done: response.done,
        columns,
        records,
    }
}

/// Display text for a single field value.
pub fn format_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => {
            let mut map = map.clone();
            map.remove("attributes");
            serde_json::Value::Object(map).to_string()
        }
        other => other.to_string(),
    }
}
