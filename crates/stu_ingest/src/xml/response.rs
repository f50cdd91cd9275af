use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

/// Placeholder correlation identifier for envelopes that carried none
pub const PLACEHOLDER_MESSAGE_ID: &str = "00000000000000000000000000000000";

const RESPONSE_SCHEMA_LOCATION: &str = "http://cody.glpconnect.com/XSD/StuResponse_Rev1_0.xsd";

/// Acknowledgment state mandated by the feed protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pass,
    Fail,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pass => "pass",
            DeliveryState::Fail => "fail",
        }
    }
}

/// Protocol acknowledgment for one inbound envelope
#[derive(Debug, Clone)]
pub struct StuResponse {
    pub message_id: String,
    pub state: DeliveryState,
    pub state_message: String,
    pub delivered_at: DateTime<Utc>,
}

impl StuResponse {
    pub fn new(
        message_id: Option<&str>,
        state: DeliveryState,
        state_message: impl Into<String>,
    ) -> Self {
        let message_id = match message_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => PLACEHOLDER_MESSAGE_ID.to_string(),
        };
        Self {
            message_id,
            state,
            state_message: state_message.into(),
            delivered_at: Utc::now(),
        }
    }

    /// Render the stuResponseMsg document
    ///
    /// The provider requires the dd/MM/yyyy GMT timestamp format and both
    /// messageID and correlationID echoing the inbound identifier.
    pub fn to_xml(&self) -> String {
        let timestamp = self.delivered_at.format("%d/%m/%Y %H:%M:%S GMT");
        let id = escape(self.message_id.as_str());
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<stuResponseMsg xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:noNamespaceSchemaLocation=\"{schema}\" deliveryTimeStamp=\"{timestamp}\" messageID=\"{id}\" correlationID=\"{id}\">\n    <state>{state}</state>\n    <stateMessage>{message}</stateMessage>\n</stuResponseMsg>",
            schema = RESPONSE_SCHEMA_LOCATION,
            state = self.state.as_str(),
            message = escape(self.state_message.as_str()),
        )
    }
}
