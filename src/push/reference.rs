//! Client reference codec.
//!
//! A client reference correlates an initiator's waiting session with one
//! pending attempt. It is a reversible encoding of `{request_id, email}`,
//! carried through client navigation state, and never contains the OTP.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Fixed tag tokens framing the reference payload.
const TAG_SCOPE: &str = "auth";
const TAG_FLOW: &str = "login";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// The blob cannot be decoded: bad base64, bad UTF-8, wrong tag tokens,
    /// or wrong field count. Fatal for the session that presented it.
    #[error("malformed client reference")]
    Malformed,
    /// The request id would collide with the field delimiter.
    #[error("request id must not contain '_'")]
    InvalidRequestId,
}

/// Decoded client reference fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReference {
    request_id: String,
    email: String,
}

impl ClientReference {
    /// Build a reference from its parts.
    ///
    /// # Errors
    /// Returns `InvalidRequestId` if the request id contains the `_`
    /// delimiter; decoding would then split into the wrong fields. Request
    /// ids are ULIDs, whose alphabet never includes `_`.
    pub fn new(request_id: &str, email: &str) -> Result<Self, ReferenceError> {
        if request_id.is_empty() || request_id.contains('_') {
            return Err(ReferenceError::InvalidRequestId);
        }
        Ok(Self {
            request_id: request_id.to_string(),
            email: email.to_string(),
        })
    }

    /// Encode as base64 of `auth_login_<request_id>_<email>`.
    #[must_use]
    pub fn encode(&self) -> String {
        let formatted = format!(
            "{TAG_SCOPE}_{TAG_FLOW}_{}_{}",
            self.request_id, self.email
        );
        STANDARD.encode(formatted)
    }

    /// Decode a reference blob back into its fields.
    ///
    /// The payload splits into at most four fields so emails keep their
    /// underscores.
    ///
    /// # Errors
    /// Returns `Malformed` for anything that is not a validly framed blob.
    pub fn decode(blob: &str) -> Result<Self, ReferenceError> {
        let bytes = STANDARD
            .decode(blob.trim())
            .map_err(|_| ReferenceError::Malformed)?;
        let decoded = String::from_utf8(bytes).map_err(|_| ReferenceError::Malformed)?;

        let parts: Vec<&str> = decoded.splitn(4, '_').collect();
        if parts.len() != 4 || parts[0] != TAG_SCOPE || parts[1] != TAG_FLOW {
            return Err(ReferenceError::Malformed);
        }
        if parts[2].is_empty() {
            return Err(ReferenceError::Malformed);
        }

        Ok(Self {
            request_id: parts[2].to_string(),
            email: parts[3].to_string(),
        })
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn encode_decode_round_trips() -> Result<()> {
        let reference = ClientReference::new("01JXAMPLE0000000000000000G", "owner@example.com")?;
        let decoded = ClientReference::decode(&reference.encode())?;
        assert_eq!(decoded, reference);
        assert_eq!(decoded.request_id(), "01JXAMPLE0000000000000000G");
        assert_eq!(decoded.email(), "owner@example.com");
        Ok(())
    }

    #[test]
    fn round_trips_email_with_underscores() -> Result<()> {
        let reference = ClientReference::new("r1", "first_last_name@example.com")?;
        let decoded = ClientReference::decode(&reference.encode())?;
        assert_eq!(decoded.email(), "first_last_name@example.com");
        Ok(())
    }

    #[test]
    fn rejects_request_id_with_delimiter() {
        assert_eq!(
            ClientReference::new("r_1", "owner@example.com"),
            Err(ReferenceError::InvalidRequestId)
        );
        assert_eq!(
            ClientReference::new("", "owner@example.com"),
            Err(ReferenceError::InvalidRequestId)
        );
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert_eq!(
            ClientReference::decode("not base64!!!"),
            Err(ReferenceError::Malformed)
        );
    }

    #[test]
    fn decode_rejects_non_utf8_payload() {
        let blob = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));
    }

    #[test]
    fn decode_rejects_wrong_tags() {
        let blob = STANDARD.encode("auth_reset_r1_owner@example.com");
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));

        let blob = STANDARD.encode("push_login_r1_owner@example.com");
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let blob = STANDARD.encode("auth_login_r1");
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));

        let blob = STANDARD.encode("auth_login");
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));
    }

    #[test]
    fn decode_rejects_empty_request_id_field() {
        let blob = STANDARD.encode("auth_login__owner@example.com");
        assert_eq!(ClientReference::decode(&blob), Err(ReferenceError::Malformed));
    }
}
