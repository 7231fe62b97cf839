//! Telegram Login Widget verification.
//!
//! The widget hands the browser a payload of profile fields plus `hash`,
//! an HMAC-SHA256 keyed with `SHA256(bot_token)` over the remaining fields
//! rendered as sorted `key=value` lines joined by `\n`.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{ExternalIdentity, ProviderError, display_name};
use crate::config::TelegramConfig;
use crate::domain::AuthProvider;

type HmacSha256 = Hmac<Sha256>;

pub type WidgetPayload = BTreeMap<String, Value>;

#[derive(Clone)]
pub struct TelegramWidget {
    bot_token: String,
    max_age: Duration,
}

impl TelegramWidget {
    #[must_use]
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            max_age: Duration::hours(config.auth_max_age_hours),
        }
    }

    fn mac(&self, payload: &WidgetPayload) -> Result<HmacSha256, ProviderError> {
        let secret = Sha256::digest(self.bot_token.as_bytes());
        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| ProviderError::InvalidSignature(e.to_string()))?;
        mac.update(data_check_string(payload).as_bytes());
        Ok(mac)
    }

    /// Hex signature for `payload`, ignoring any `hash` field already present.
    pub fn sign(&self, payload: &WidgetPayload) -> Result<String, ProviderError> {
        Ok(hex::encode(self.mac(payload)?.finalize().into_bytes()))
    }

    /// Checks the payload signature and freshness and extracts the identity.
    pub fn verify_widget_signature(
        &self,
        payload: &WidgetPayload,
    ) -> Result<ExternalIdentity, ProviderError> {
        if self.bot_token.is_empty() {
            return Err(ProviderError::NotConfigured(AuthProvider::Telegram));
        }

        let supplied = payload
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidSignature("missing hash".to_string()))?;
        let supplied = hex::decode(supplied)
            .map_err(|_| ProviderError::InvalidSignature("malformed hash".to_string()))?;

        self.mac(payload)?
            .verify_slice(&supplied)
            .map_err(|_| ProviderError::InvalidSignature("hash mismatch".to_string()))?;

        let auth_date = payload
            .get("auth_date")
            .and_then(field_as_i64)
            .ok_or_else(|| ProviderError::InvalidSignature("missing auth_date".to_string()))?;
        if Utc::now().timestamp() - auth_date > self.max_age.num_seconds() {
            return Err(ProviderError::InvalidSignature(
                "login data is too old".to_string(),
            ));
        }

        let provider_id = payload
            .get("id")
            .and_then(render_value)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::InvalidSignature("missing id".to_string()))?;

        let text = |key: &str| payload.get(key).and_then(Value::as_str);

        Ok(ExternalIdentity {
            provider: AuthProvider::Telegram,
            provider_id,
            username: display_name(&[text("username"), text("first_name")]),
            email: None,
            avatar_url: text("photo_url").map(str::to_string),
        })
    }
}

/// Sorted `key=value` lines excluding `hash` and null fields.
#[must_use]
pub fn data_check_string(payload: &WidgetPayload) -> String {
    payload
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .filter_map(|(key, value)| render_value(value).map(|value| format!("{key}={value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn field_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget() -> TelegramWidget {
        TelegramWidget::new(&TelegramConfig {
            bot_token: "123456:TEST-BOT-TOKEN".to_string(),
            auth_max_age_hours: 24,
        })
    }

    fn signed_payload(widget: &TelegramWidget) -> WidgetPayload {
        let mut payload: WidgetPayload = serde_json::from_value(json!({
            "id": 424242,
            "first_name": "Aki",
            "username": "aki_fan",
            "photo_url": "https://t.me/i/userpic/aki.jpg",
            "auth_date": Utc::now().timestamp(),
        }))
        .unwrap();
        let hash = widget.sign(&payload).unwrap();
        payload.insert("hash".to_string(), Value::String(hash));
        payload
    }

    #[test]
    fn check_string_is_sorted_and_skips_hash() {
        let payload: WidgetPayload = serde_json::from_value(json!({
            "username": "b",
            "auth_date": 10,
            "hash": "ff",
            "id": 7,
            "last_name": null,
        }))
        .unwrap();
        assert_eq!(data_check_string(&payload), "auth_date=10\nid=7\nusername=b");
    }

    #[test]
    fn valid_payload_verifies() {
        let widget = widget();
        let identity = widget
            .verify_widget_signature(&signed_payload(&widget))
            .unwrap();

        assert_eq!(identity.provider, AuthProvider::Telegram);
        assert_eq!(identity.provider_id, "424242");
        assert_eq!(identity.username, "aki_fan");
        assert_eq!(
            identity.avatar_url.as_deref(),
            Some("https://t.me/i/userpic/aki.jpg")
        );
    }

    #[test]
    fn any_mutated_field_breaks_the_signature() {
        let widget = widget();
        let original = signed_payload(&widget);

        for (key, replacement) in [
            ("id", json!(424243)),
            ("first_name", json!("Mallory")),
            ("username", json!("admin")),
            ("photo_url", json!("https://evil.example/x.jpg")),
            ("auth_date", json!(Utc::now().timestamp() + 1)),
        ] {
            let mut tampered = original.clone();
            tampered.insert(key.to_string(), replacement);
            assert!(
                matches!(
                    widget.verify_widget_signature(&tampered),
                    Err(ProviderError::InvalidSignature(_))
                ),
                "mutating {key} should invalidate the payload"
            );
        }

        let mut extra = original;
        extra.insert("last_name".to_string(), json!("Injected"));
        assert!(widget.verify_widget_signature(&extra).is_err());
    }

    #[test]
    fn stale_payload_is_rejected() {
        let widget = widget();
        let mut payload: WidgetPayload = serde_json::from_value(json!({
            "id": 1,
            "first_name": "Old",
            "auth_date": (Utc::now() - Duration::hours(25)).timestamp(),
        }))
        .unwrap();
        let hash = widget.sign(&payload).unwrap();
        payload.insert("hash".to_string(), Value::String(hash));

        assert!(matches!(
            widget.verify_widget_signature(&payload),
            Err(ProviderError::InvalidSignature(_))
        ));
    }

    #[test]
    fn missing_bot_token_is_a_configuration_error() {
        let widget = TelegramWidget::new(&TelegramConfig::default());
        assert!(matches!(
            widget.verify_widget_signature(&WidgetPayload::new()),
            Err(ProviderError::NotConfigured(AuthProvider::Telegram))
        ));
    }
}
