//! Push notification types
//!
//! Transient types for broadcast requests, per-endpoint delivery outcomes
//! and the push protocol headers.

use std::{fmt, io, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct PushHeader {
    pub ttl: i64,
    pub urgency: Urgency,
}

#[derive(Debug, Clone)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Urgency::VeryLow => write!(f, "very-low"),
            Urgency::Low => write!(f, "low"),
            Urgency::Normal => write!(f, "normal"),
            Urgency::High => write!(f, "high"),
        }
    }
}

impl FromStr for Urgency {
    type Err = io::Error;

    fn from_str(value: &str) -> Result<Urgency, Self::Err> {
        match value {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            _ => Err(io::Error::other("Urgency not supported")),
        }
    }
}

/// Body of `POST /send-notification`.
#[derive(Debug, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
}

impl Notification {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::ValidationError(String::from(
                "title is required",
            )));
        }
        if self.body.trim().is_empty() {
            return Err(Error::ValidationError(String::from(
                "body is required",
            )));
        }
        Ok(())
    }

    /// The JSON document delivered to every subscriber; a missing `url`
    /// falls back to the configured default.
    pub fn payload(&self, default_url: &str) -> NotificationPayload {
        NotificationPayload {
            title: self.title.to_owned(),
            body: self.body.to_owned(),
            url: self
                .url
                .to_owned()
                .unwrap_or_else(|| default_url.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub aud: String,
    pub sub: String,
    pub exp: i64,
}

/// Result of one delivery attempt chain against a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    TransientFailure(String),
    PermanentFailure(String),
}

/// Aggregate counts returned by `POST /send-notification`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: u64,
    pub pruned: u64,
    pub failed: u64,
}
