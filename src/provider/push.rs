use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Url,
};

use crate::{
    configuration::Config,
    error::Error,
    model::Subscription,
    types::{Claims, DeliveryOutcome, PushHeader},
};

/// Web Push delivery capability: VAPID-signed, `aes128gcm`-encrypted POST
/// to a subscription's endpoint.
#[derive(Debug)]
pub struct WebPush {
    http: Client,
    vapid_private_key: Vec<u8>,
    vapid_public_key: String,
    mail_to: String,
    permanent_statuses: Vec<u16>,
}

impl WebPush {
    /// Credential material is validated here so that a broken VAPID setup
    /// fails at startup instead of per subscriber.
    pub fn new(config: &Config) -> Result<WebPush, Error> {
        EncodingKey::from_ec_pem(&config.vapid_private_key).map_err(|e| {
            Error::ConfigurationError(format!("VAPID private key: {}", e))
        })?;

        let vapid_public_key =
            String::from_utf8(config.vapid_public_key.to_owned())
                .map_err(|_| {
                    Error::ConfigurationError(String::from(
                        "VAPID public key is not valid UTF-8",
                    ))
                })?
                .trim()
                .to_owned();
        if vapid_public_key.is_empty() {
            return Err(Error::ConfigurationError(String::from(
                "VAPID public key is empty",
            )));
        }

        let http = Client::builder().timeout(config.delivery_timeout).build()?;

        Ok(WebPush {
            http,
            vapid_private_key: config.vapid_private_key.to_owned(),
            vapid_public_key,
            mail_to: config.mail_to.to_owned(),
            permanent_statuses: config.status_code_to_delete.to_owned(),
        })
    }

    /// One delivery attempt. Transport errors are transient; the upstream
    /// status code decides between delivered, transient and permanent.
    pub async fn deliver(
        &self,
        subscription: &Subscription,
        header: &PushHeader,
        payload: &[u8],
    ) -> DeliveryOutcome {
        match self.send(subscription, header, payload).await {
            Ok(status) => classify(&self.permanent_statuses, status),
            Err(e) => DeliveryOutcome::TransientFailure(e.to_string()),
        }
    }

    async fn send(
        &self,
        subscription: &Subscription,
        push_header: &PushHeader,
        payload: &[u8],
    ) -> Result<u16, Error> {
        let url = Url::parse(&subscription.endpoint)?;
        let exp = Utc::now().timestamp() + push_header.ttl;

        let scheme = url.scheme();
        let host = if let Some(h) = url.host() {
            h.to_string()
        } else {
            return Err(Error::InvalidOption {
                option: String::from("host"),
            });
        };

        let aud = format!("{}://{}", scheme, host);
        let sub = format!("mailto:{}", &self.mail_to);

        let key = EncodingKey::from_ec_pem(&self.vapid_private_key)?;
        let claims = Claims { aud, sub, exp };
        let token = encode(&Header::new(Algorithm::ES256), &claims, &key)?;

        let p256dh = BASE64_URL.decode(&subscription.p256dh)?;
        let auth = BASE64_URL.decode(&subscription.auth)?;
        let data = ece::encrypt(&p256dh, &auth, payload)?;

        let mut header_map = HeaderMap::new();
        header_map.insert(
            HeaderName::from_static("user-agent"),
            HeaderValue::from_static("relay"),
        );
        header_map.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("WebPush {}", token))?,
        );
        header_map.insert(
            HeaderName::from_static("content-encoding"),
            HeaderValue::from_static("aes128gcm"),
        );
        header_map.insert(
            HeaderName::from_static("ttl"),
            HeaderValue::from_str(&push_header.ttl.to_string())?,
        );
        header_map.insert(
            HeaderName::from_static("urgency"),
            HeaderValue::from_str(&push_header.urgency.to_string())?,
        );
        header_map.insert(
            HeaderName::from_static("crypto-key"),
            HeaderValue::from_str(&format!(
                "p256ecdsa={}",
                self.vapid_public_key
            ))?,
        );

        let response = self
            .http
            .post(url)
            .headers(header_map)
            .body(data)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}

fn classify(permanent: &[u16], status: u16) -> DeliveryOutcome {
    if (200..300).contains(&status) {
        DeliveryOutcome::Delivered
    } else if permanent.contains(&status) {
        DeliveryOutcome::PermanentFailure(format!(
            "endpoint gone, status {}",
            status
        ))
    } else {
        DeliveryOutcome::TransientFailure(format!(
            "upstream status {}",
            status
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        let permanent = vec![404, 410];

        assert_eq!(classify(&permanent, 201), DeliveryOutcome::Delivered);
        assert!(matches!(
            classify(&permanent, 410),
            DeliveryOutcome::PermanentFailure(_)
        ));
        assert!(matches!(
            classify(&permanent, 404),
            DeliveryOutcome::PermanentFailure(_)
        ));
        assert!(matches!(
            classify(&permanent, 429),
            DeliveryOutcome::TransientFailure(_)
        ));
        assert!(matches!(
            classify(&permanent, 502),
            DeliveryOutcome::TransientFailure(_)
        ));
    }
}
