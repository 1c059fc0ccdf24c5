//! Minimal OpenRTB 2.1 bid-request/bid-response records.
//!
//! Only `request.app.id` is ever dereferenced by the orchestrator; everything
//! else is passed through opaquely so unknown/extra fields round-trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRef {
    pub id: String,
    #[serde(default)]
    pub publisher: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Impression {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub id: String,
    #[serde(default)]
    pub imp: Vec<Impression>,
    #[serde(default)]
    pub app: Option<AppRef>,
    #[serde(default)]
    pub site: Option<Value>,
    #[serde(default)]
    pub device: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub at: Option<u32>,
    #[serde(default)]
    pub tmax: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BidResponse {
    /// The "no-bid" response returned when no DSP answers before the deadline.
    pub fn empty(request_id: &str) -> Self {
        Self {
            id: request_id.to_string(),
            seatbid: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_request_round_trips_through_json() {
        let raw = r#"{"id":"1","imp":[{"id":"1","banner":{"w":300,"h":250}}],"app":{"id":"1250","publisher":{"id":"1"}}}"#;
        let decoded: BidRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.id, "1");
        assert_eq!(decoded.app.as_ref().unwrap().id, "1250");
        assert_eq!(decoded.imp.len(), 1);
        assert!(decoded.imp[0].extra.contains_key("banner"));

        let encoded = serde_json::to_value(&decoded).unwrap();
        let reparsed: BidRequest = serde_json::from_value(encoded).unwrap();
        assert_eq!(reparsed.id, decoded.id);
        assert_eq!(reparsed.app.unwrap().id, "1250");
    }

    #[test]
    fn bid_response_round_trips_and_keeps_unknown_fields() {
        let raw = r#"{"id":"123","seatbid":[{"bid":[{"id":"123","impid":"123","price":1.0}]}],"cur":"USD"}"#;
        let decoded: BidResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded.seatbid[0].bid[0].price, 1.0);
        assert_eq!(decoded.extra.get("cur").unwrap(), "USD");

        let reencoded = serde_json::to_string(&decoded).unwrap();
        let reparsed: BidResponse = serde_json::from_str(&reencoded).unwrap();
        assert_eq!(reparsed.id, "123");
        assert_eq!(reparsed.extra.get("cur").unwrap(), "USD");
    }

    #[test]
    fn empty_bid_response_has_no_seatbid() {
        let empty = BidResponse::empty("req-1");
        assert_eq!(empty.id, "req-1");
        assert!(empty.seatbid.is_empty());
        let encoded = serde_json::to_string(&empty).unwrap();
        assert!(encoded.contains("\"seatbid\":[]"));
    }
}
