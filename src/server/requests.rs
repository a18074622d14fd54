use serde::{Deserialize, Serialize};

use crate::location::{LocationError, LocationFix};
use crate::session::SessionEvent;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LocationErrorQuery {
    /// `GeolocationPositionError.code` as reported by the browser.
    pub code: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub text: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HouseQuery {
    pub house_number: String,
}

// Unified request interface
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "query", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum RequestPayload {
    Position(LocationFix),
    LocationError(LocationErrorQuery),
    SearchInput(TextQuery),
    Search(TextQuery),
    SelectHouse(HouseQuery),
    Recenter,
    Repeat,
}

impl RequestPayload {
    pub fn into_event(self) -> SessionEvent {
        match self {
            RequestPayload::Position(fix) => SessionEvent::PositionFix(fix),
            RequestPayload::LocationError(query) => {
                SessionEvent::LocationFailed(LocationError::from_code(query.code))
            }
            RequestPayload::SearchInput(query) => SessionEvent::SearchInput(query.text),
            RequestPayload::Search(query) => SessionEvent::SearchSubmitted(query.text),
            RequestPayload::SelectHouse(query) => SessionEvent::HouseSelected(query.house_number),
            RequestPayload::Recenter => SessionEvent::Recenter,
            RequestPayload::Repeat => SessionEvent::Repeat,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

impl Request {
    pub fn parse(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse<T> {
    pub request_id: String,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> RequestResponse<T> {
    pub fn ok(request_id: String, data: T) -> Self {
        RequestResponse {
            request_id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(request_id: String, error: String) -> Self {
        RequestResponse {
            request_id,
            success: false,
            data: None,
            error: Some(error),
        }
    }
}
