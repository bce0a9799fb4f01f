//! Delivery transport for claimed hook rows.
//!
//! The transport's whole contract with the processor is the
//! [`DeliveryVerdict`]: delivered, worth retrying, permanently rejected,
//! or ignorable. Classification happens here so the processor can stay a
//! pure lease/retry engine.

use crate::entities::HookChannel;
use crate::entities::notification_hook::NotificationHook;
use async_trait::async_trait;
use tipcast_sdk::objects::hooks::HookEnvelope;
use tipcast_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use url::Url;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryVerdict {
    /// Delivered; the hook is done.
    Delivered,
    /// Recoverable failure; the hook goes to the retry pool.
    Retry(String),
    /// Permanent failure; retrying cannot succeed.
    Reject(String),
    /// Unrecoverable but non-fatal (e.g. the recipient endpoint is gone);
    /// the hook is parked as IGNORED rather than counted as a failure.
    Ignore(String),
}

/// One delivery integration (push gateway, webhook consumer, test double).
#[async_trait]
pub trait HookTransport: Send + Sync {
    async fn deliver(&self, hook: &NotificationHook) -> DeliveryVerdict;
}

/// A signed HTTP delivery target.
#[derive(Debug, Clone)]
pub struct HookEndpoint {
    pub url: Url,
    pub secret: Box<[u8]>,
}

/// HTTP transport: POSTs a signed [`HookEnvelope`] to the endpoint for the
/// hook's channel.
pub struct HttpHookTransport {
    client: reqwest::Client,
    push: HookEndpoint,
    webhook: Option<HookEndpoint>,
}

impl HttpHookTransport {
    pub fn new(push: HookEndpoint, webhook: Option<HookEndpoint>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            push,
            webhook,
        }
    }

    fn endpoint_for(&self, channel: HookChannel) -> Option<&HookEndpoint> {
        match channel {
            HookChannel::Push => Some(&self.push),
            HookChannel::Webhook => self.webhook.as_ref(),
        }
    }
}

#[async_trait]
impl HookTransport for HttpHookTransport {
    async fn deliver(&self, hook: &NotificationHook) -> DeliveryVerdict {
        let Some(endpoint) = self.endpoint_for(hook.channel) else {
            return DeliveryVerdict::Ignore(format!(
                "no endpoint configured for channel {}",
                hook.channel
            ));
        };

        let envelope = HookEnvelope {
            event_kind: hook.event_kind.into(),
            payload: hook.payload.clone(),
            sent_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        };

        let signed = match SignedObject::new(envelope, &endpoint.secret) {
            Ok(signed) => signed,
            Err(e) => {
                // A payload that cannot be serialized will never deliver.
                return DeliveryVerdict::Reject(format!("payload serialization failed: {e}"));
            }
        };

        let response = self
            .client
            .post(endpoint.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await;

        match response {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) => DeliveryVerdict::Retry(format!("request failed: {e}")),
        }
    }
}

/// Map an HTTP status to a delivery verdict.
///
/// 2xx delivered; 410 means the recipient is gone for good (ignore); 429
/// and 5xx are worth retrying; any other 4xx is a contract violation on
/// our side and retrying cannot fix it.
pub fn classify_status(status: u16) -> DeliveryVerdict {
    match status {
        200..=299 => DeliveryVerdict::Delivered,
        410 => DeliveryVerdict::Ignore("endpoint gone (410)".to_string()),
        429 => DeliveryVerdict::Retry("rate limited (429)".to_string()),
        400..=499 => DeliveryVerdict::Reject(format!("rejected with status {status}")),
        _ => DeliveryVerdict::Retry(format!("server error {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::notification_hook::NotificationHook;
    use crate::entities::{HookEventKind, HookStatus};

    fn queued_hook(channel: HookChannel) -> NotificationHook {
        let date = time::Date::from_calendar_date(2025, time::Month::March, 1).unwrap();
        let ts = time::PrimitiveDateTime::new(date, time::Time::MIDNIGHT);
        NotificationHook {
            id: 1,
            event_kind: HookEventKind::TopupDone,
            channel,
            payload: serde_json::json!({"user_id": 1}),
            recipient_ids: vec![1],
            status: HookStatus::Pending,
            lock_id: None,
            lock_expires_at: None,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn webhook_channel_without_endpoint_is_ignored() {
        let transport = HttpHookTransport::new(
            HookEndpoint {
                url: "http://127.0.0.1:9/push".parse().unwrap(),
                secret: b"secret".to_vec().into_boxed_slice(),
            },
            None,
        );
        let verdict = transport.deliver(&queued_hook(HookChannel::Webhook)).await;
        assert!(matches!(verdict, DeliveryVerdict::Ignore(_)));
    }

    #[test]
    fn success_statuses_deliver() {
        assert_eq!(classify_status(200), DeliveryVerdict::Delivered);
        assert_eq!(classify_status(204), DeliveryVerdict::Delivered);
    }

    #[test]
    fn gone_is_ignored() {
        assert!(matches!(classify_status(410), DeliveryVerdict::Ignore(_)));
    }

    #[test]
    fn rate_limit_and_server_errors_retry() {
        assert!(matches!(classify_status(429), DeliveryVerdict::Retry(_)));
        assert!(matches!(classify_status(500), DeliveryVerdict::Retry(_)));
        assert!(matches!(classify_status(503), DeliveryVerdict::Retry(_)));
    }

    #[test]
    fn client_errors_reject() {
        assert!(matches!(classify_status(400), DeliveryVerdict::Reject(_)));
        assert!(matches!(classify_status(404), DeliveryVerdict::Reject(_)));
        assert!(matches!(classify_status(422), DeliveryVerdict::Reject(_)));
    }
}
