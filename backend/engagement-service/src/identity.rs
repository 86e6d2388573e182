//! Token verification over the identity service's HTTP API.

use async_trait::async_trait;
use engagement_core::{EngagementError, EntityId, Result, TokenVerifier};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    user_id: EntityId,
}

/// Calls `POST {base}/api/v1/auth/verify`. Deadlines and breaking are left to
/// the wrapping `GuardedVerifier`.
pub struct HttpTokenVerifier {
    client: Client,
    verify_url: String,
}

impl HttpTokenVerifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            verify_url: format!("{}/api/v1/auth/verify", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str, refresh_token: &str) -> Result<EntityId> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest {
                token,
                refresh_token,
            })
            .send()
            .await
            .map_err(|e| EngagementError::Upstream(format!("identity service: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|e| EngagementError::Upstream(format!("identity service: {}", e)))?;
                debug!(user_id = body.user_id, "Token verified");
                Ok(body.user_id)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                EngagementError::Unauthenticated("invalid or expired token".to_string()),
            ),
            status => Err(EngagementError::Upstream(format!(
                "identity service returned {}",
                status
            ))),
        }
    }
}
