//! Wire format of the companion link (JSON, camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// An action the companion asks the primary to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteAction {
    #[serde(alias = "takeSnus")]
    TakeOne,
    UsePanic,
    #[serde(rename = "requestUpdate")]
    RequestSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub action: RemoteAction,
}

impl RemoteRequest {
    pub fn new(action: RemoteAction) -> Self {
        Self { action }
    }

    /// Decode a request. Anything unrecognised, malformed JSON included,
    /// yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    /// A snapshot request was accepted; the context follows.
    Updating,
    UnknownAction,
    /// Recognised but refused: the allowance is exhausted.
    OutOfAllowance,
    FeatureLocked,
    /// Onboarding has not been completed on the primary.
    NotConfigured,
    /// The action could not be persisted; nothing changed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReply {
    pub status: ReplyStatus,
}

impl RemoteReply {
    pub fn new(status: ReplyStatus) -> Self {
        Self { status }
    }
}

/// Full state handed to the companion. Both the transient message and the
/// store-and-forward context use this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPayload {
    /// Epoch seconds of the countdown end; 0 when ready.
    pub countdown_end_timestamp: f64,
    pub daily_remaining: u32,
    pub panic_remaining: u32,
    pub substance_label: String,
    pub sequence: u64,
    pub device_id: String,
    /// Epoch seconds.
    pub sent_at: i64,
}

impl ContextPayload {
    pub fn from_snapshot(snapshot: &Snapshot, sequence: u64, device_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            countdown_end_timestamp: snapshot
                .countdown_end
                .map(|end| end.timestamp_millis() as f64 / 1000.0)
                .unwrap_or(0.0),
            daily_remaining: snapshot.daily_remaining,
            panic_remaining: snapshot.weekly_panic_remaining,
            substance_label: snapshot.substance.label().to_string(),
            sequence,
            device_id: device_id.to_string(),
            sent_at: now.timestamp(),
        }
    }

    /// Countdown end, `None` when the payload says ready.
    pub fn countdown_end(&self) -> Option<DateTime<Utc>> {
        if self.countdown_end_timestamp <= 0.0 {
            return None;
        }
        DateTime::from_timestamp_millis((self.countdown_end_timestamp * 1000.0).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        assert_eq!(
            RemoteRequest::parse(r#"{"action":"takeOne"}"#),
            Some(RemoteRequest::new(RemoteAction::TakeOne))
        );
        assert_eq!(
            RemoteRequest::parse(r#"{"action":"takeSnus"}"#),
            Some(RemoteRequest::new(RemoteAction::TakeOne))
        );
        assert_eq!(
            RemoteRequest::parse(r#"{"action":"requestUpdate"}"#),
            Some(RemoteRequest::new(RemoteAction::RequestSnapshot))
        );
    }

    #[test]
    fn unknown_or_malformed_is_none() {
        assert!(RemoteRequest::parse(r#"{"action":"dance"}"#).is_none());
        assert!(RemoteRequest::parse("not json").is_none());
        assert!(RemoteRequest::parse("{}").is_none());
    }

    #[test]
    fn request_encodes_camel_case() {
        assert_eq!(
            RemoteRequest::new(RemoteAction::UsePanic).to_json(),
            r#"{"action":"usePanic"}"#
        );
    }

    #[test]
    fn reply_status_is_snake_case() {
        let json = serde_json::to_string(&RemoteReply::new(ReplyStatus::UnknownAction)).unwrap();
        assert_eq!(json, r#"{"status":"unknown_action"}"#);
    }

    #[test]
    fn payload_field_names() {
        let payload = ContextPayload {
            countdown_end_timestamp: 0.0,
            daily_remaining: 4,
            panic_remaining: 1,
            substance_label: "snus".into(),
            sequence: 9,
            device_id: "urge-x".into(),
            sent_at: 100,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["countdownEndTimestamp"], 0.0);
        assert_eq!(value["dailyRemaining"], 4);
        assert_eq!(value["panicRemaining"], 1);
        assert_eq!(value["substanceLabel"], "snus");
        assert_eq!(value["deviceId"], "urge-x");
        assert!(payload.countdown_end().is_none());
    }
}
