use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUBJECT_CLAIM: &str = "sub";
pub const SESSION_ID_CLAIM: &str = "sid";

const FORMAT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum TicketError {
    #[error("authentication ticket is malformed")]
    Malformed(#[from] serde_json::Error),

    #[error("authentication ticket format version {0} is not supported")]
    UnsupportedVersion(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Claim {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Claim {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationTicket {
    pub scheme: String,
    pub claims: Vec<Claim>,
    pub issued: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    v: u32,
    ticket: &'a AuthenticationTicket,
}

#[derive(Deserialize)]
struct RawEnvelope {
    v: u32,
    ticket: serde_json::Value,
}

impl AuthenticationTicket {
    pub fn new(scheme: impl Into<String>) -> Self {
        AuthenticationTicket {
            scheme: scheme.into(),
            claims: Vec::new(),
            issued: None,
            expires: None,
            items: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push(Claim::new(kind, value));
        self
    }

    pub fn issued_at(mut self, issued: DateTime<Utc>) -> Self {
        self.issued = Some(issued);
        self
    }

    pub fn expires_at(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    pub fn find_claim(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.kind == kind)
            .map(|claim| claim.value.as_str())
    }

    pub fn subject_id(&self) -> &str {
        self.find_claim(SUBJECT_CLAIM).unwrap_or_default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.find_claim(SESSION_ID_CLAIM)
    }

    pub fn issued_or_now(&self) -> DateTime<Utc> {
        self.issued.unwrap_or_else(Utc::now)
    }

    pub fn serialize(&self) -> Result<String, TicketError> {
        Ok(serde_json::to_string(&Envelope {
            v: FORMAT_VERSION,
            ticket: self,
        })?)
    }

    pub fn deserialize(blob: &str) -> Result<Self, TicketError> {
        let envelope: RawEnvelope = serde_json::from_str(blob)?;

        if envelope.v != FORMAT_VERSION {
            return Err(TicketError::UnsupportedVersion(envelope.v));
        }

        Ok(serde_json::from_value(envelope.ticket)?)
    }
}
