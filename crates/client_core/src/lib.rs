use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::{multipart, Client, RequestBuilder};
use serde::Serialize;
use shared::{
    domain::{NotificationId, RequestId, UserId},
    error::{ApiException, ErrorCode},
    protocol::{
        BlockStatus, ChatMessage, CreateOrderRequest, CreateOrderResponse, InterestRequest,
        LoginResponse, Notification, PaymentRecord, Plan, Profile, RegisterRequest,
        VerifyPaymentRequest,
    },
};
use url::Url;

pub mod best_effort;
pub mod config;
pub mod conversation;
pub mod display;
mod durable_session;
pub mod session;

pub use durable_session::DurableSessionStore;
pub use session::{EphemeralSessionPersistence, Session, SessionPersistence, SessionStore};

use config::Settings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email_id: String,
    create_password: String,
}

#[derive(Debug, Serialize)]
struct EmailRequest {
    email: String,
}

#[derive(Debug, Serialize)]
struct OtpVerifyRequest {
    email: String,
    otp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    new_password: String,
    confirm_password: String,
}

#[derive(Debug, Serialize)]
struct SendChatMessageRequest {
    message: String,
}

/// Converts a failed response into a typed [`ApiException`] carrying the
/// backend's message when one is present. Only user-initiated operations
/// route through this; passive sync sticks to `error_for_status`.
async fn action_error(response: reqwest::Response) -> anyhow::Error {
    let code = ErrorCode::from_status(response.status().as_u16());
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "request failed".to_string()
            } else {
                body.clone()
            }
        });
    ApiException::new(code, message).into()
}

async fn expect_action_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(action_error(response).await)
    }
}

/// Thin typed REST client over the matchmaking backend. Every
/// authenticated request goes through one token-attachment path backed by
/// the injected [`SessionStore`]; an empty in-memory session is rehydrated
/// from durable storage before the request is sent.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(settings: &Settings, session: Arc<SessionStore>) -> Result<Self> {
        let base_url = config::normalize_base_url(&settings.base_url);
        Url::parse(&base_url).with_context(|| format!("invalid base url '{base_url}'"))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Token-attachment contract: use the in-memory token when present,
    /// otherwise rehydrate from durable storage once. Without a token from
    /// either source the request proceeds unauthenticated and the backend
    /// decides.
    async fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = match self.session.get_session().token {
            Some(token) => Some(token),
            None => self.session.load_session_from_storage().await.token,
        };
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- auth ----

    /// Logs in and replaces the session wholesale with the returned
    /// identity. Validation failures never reach the network.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        if email.trim().is_empty() {
            return Err(ApiException::new(ErrorCode::Validation, "email is required").into());
        }
        if password.is_empty() {
            return Err(ApiException::new(ErrorCode::Validation, "password is required").into());
        }

        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest {
                email_id: email.trim().to_string(),
                create_password: password.to_string(),
            })
            .send()
            .await?;
        let response: LoginResponse = expect_action_success(response).await?.json().await?;

        self.session
            .set_session(Session {
                token: Some(response.token.clone()),
                user_id: Some(response.id.0),
                email: Some(response.email.clone()),
                photo_version: None,
            })
            .await;

        Ok(response)
    }

    /// Clears the local session. The backend holds no server-side session
    /// to invalidate.
    pub async fn logout(&self) {
        self.session.clear_session().await;
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        if request.email_id.as_deref().unwrap_or("").trim().is_empty() {
            return Err(ApiException::new(ErrorCode::Validation, "email is required").into());
        }
        if request
            .create_password
            .as_deref()
            .unwrap_or("")
            .trim()
            .is_empty()
        {
            return Err(ApiException::new(ErrorCode::Validation, "password is required").into());
        }

        let response = self
            .http
            .post(self.url("/api/profiles/register"))
            .json(request)
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/auth/forgot-password"))
            .json(&EmailRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn verify_reset_otp(&self, email: &str, otp: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/auth/verify-otp"))
            .json(&OtpVerifyRequest {
                email: email.to_string(),
                otp: otp.to_string(),
            })
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if new_password != confirm_password {
            return Err(ApiException::new(ErrorCode::Validation, "passwords do not match").into());
        }
        let response = self
            .http
            .post(self.url("/api/auth/reset-password"))
            .json(&ResetPasswordRequest {
                email: email.to_string(),
                new_password: new_password.to_string(),
                confirm_password: confirm_password.to_string(),
            })
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn send_registration_otp(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/auth/register/send-otp"))
            .json(&EmailRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn verify_registration_otp(&self, email: &str, otp: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/api/auth/register/verify-otp"))
            .json(&OtpVerifyRequest {
                email: email.to_string(),
                otp: otp.to_string(),
            })
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    // ---- profiles ----

    pub async fn my_profile(&self, user_id: UserId) -> Result<Profile> {
        let profile = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/profiles/myprofiles/{}", user_id.0))),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }

    pub async fn update_profile(&self, user_id: UserId, profile: &Profile) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .put(self.url(&format!("/api/profiles/update/{}", user_id.0)))
                    .json(profile),
            )
            .await
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn all_profiles(&self) -> Result<Vec<Profile>> {
        let profiles = self
            .authed(self.http.get(self.url("/api/profiles/Allprofiles")))
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profiles)
    }

    /// Multipart photo upload. On success the photo cache-bust version is
    /// advanced so stale avatars fall out of image caches.
    pub async fn upload_photo(
        &self,
        user_id: UserId,
        filename: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<i64> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .with_context(|| format!("invalid mime type '{mime_type}'"))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .authed(
                self.http
                    .put(self.url(&format!("/api/admin/photo/{}", user_id.0)))
                    .multipart(form),
            )
            .await
            .send()
            .await?;
        expect_action_success(response).await?;

        Ok(self.session.set_photo_version(None).await)
    }

    // ---- interests ----

    pub async fn send_interest(&self, sender: UserId, receiver: UserId) -> Result<()> {
        self.authed(
            self.http
                .post(self.url(&format!("/api/friends/send/{}/{}", sender.0, receiver.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn cancel_sent_interest(&self, request_id: RequestId) -> Result<()> {
        self.authed(
            self.http
                .delete(self.url(&format!("/api/friends/sent/delete/{}", request_id.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn received_interests(&self, user_id: UserId) -> Result<Vec<InterestRequest>> {
        self.fetch_interests(&format!("/api/friends/received/{}", user_id.0))
            .await
    }

    pub async fn sent_interests(&self, user_id: UserId) -> Result<Vec<InterestRequest>> {
        self.fetch_interests(&format!("/api/friends/sent/{}", user_id.0))
            .await
    }

    /// Accepted contacts are the union of accepted requests in both
    /// directions; they are the only peers chat is offered for.
    pub async fn accepted_contacts(&self, user_id: UserId) -> Result<Vec<InterestRequest>> {
        let mut contacts = self
            .fetch_interests(&format!("/api/friends/accepted/received/{}", user_id.0))
            .await?;
        contacts.extend(
            self.fetch_interests(&format!("/api/friends/accepted/sent/{}", user_id.0))
                .await?,
        );
        Ok(contacts)
    }

    async fn fetch_interests(&self, path: &str) -> Result<Vec<InterestRequest>> {
        let interests = self
            .authed(self.http.get(self.url(path)))
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(interests)
    }

    // ---- chat ----

    pub async fn conversation_page(
        &self,
        me: UserId,
        other: UserId,
        page: u32,
        size: u32,
    ) -> Result<Vec<ChatMessage>> {
        let messages = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/chat/conversation/{}/{}", me.0, other.0)))
                    .query(&[("page", page), ("size", size)]),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    pub async fn send_chat_message(&self, me: UserId, other: UserId, text: &str) -> Result<()> {
        self.authed(
            self.http
                .post(self.url(&format!("/api/chat/send/{}/{}", me.0, other.0)))
                .json(&SendChatMessageRequest {
                    message: text.to_string(),
                }),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    /// Tells the backend that `me` has seen the thread with `other` up to
    /// now. Callers treat this as fire-and-forget.
    pub async fn mark_conversation_seen(&self, other: UserId, me: UserId) -> Result<()> {
        self.authed(
            self.http
                .post(self.url(&format!("/api/chat/seen/{}/{}", other.0, me.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn block_status(&self, me: UserId, other: UserId) -> Result<BlockStatus> {
        let status = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/chat/block-status/{}/{}", me.0, other.0))),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }

    pub async fn block_user(&self, me: UserId, other: UserId) -> Result<()> {
        self.pair_mutation("block", me, other).await
    }

    pub async fn unblock_user(&self, me: UserId, other: UserId) -> Result<()> {
        self.pair_mutation("unblock", me, other).await
    }

    pub async fn report_user(&self, me: UserId, other: UserId) -> Result<()> {
        self.pair_mutation("report", me, other).await
    }

    pub async fn clear_chat(&self, me: UserId, other: UserId) -> Result<()> {
        self.authed(
            self.http
                .delete(self.url(&format!("/api/chat/clear/{}/{}", me.0, other.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    async fn pair_mutation(&self, action: &str, me: UserId, other: UserId) -> Result<()> {
        self.authed(
            self.http
                .post(self.url(&format!("/api/chat/{action}/{}/{}", me.0, other.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn online_users(&self) -> Result<Vec<UserId>> {
        let ids = self
            .authed(self.http.get(self.url("/api/chat/online-users")))
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ids)
    }

    // ---- notifications ----

    pub async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let notifications = self
            .authed(
                self.http
                    .get(self.url("/api/notifications/GetAll"))
                    .query(&[("userId", user_id.0)]),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(notifications)
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<()> {
        self.authed(
            self.http
                .post(self.url(&format!("/api/notifications/read/{}", id.0))),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<()> {
        self.authed(
            self.http
                .post(self.url("/api/notifications/mark-all-read"))
                .query(&[("userId", user_id.0)]),
        )
        .await
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    // ---- payments ----

    pub async fn plans(&self) -> Result<Vec<Plan>> {
        let plans = self
            .authed(self.http.get(self.url("/api/plans")))
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(plans)
    }

    pub async fn create_payment_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse> {
        let response = self
            .authed(
                self.http
                    .post(self.url("/api/payment/create-order"))
                    .json(request),
            )
            .await
            .send()
            .await?;
        let order = expect_action_success(response).await?.json().await?;
        Ok(order)
    }

    pub async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<()> {
        let response = self
            .authed(self.http.post(self.url("/api/payment/verify")).json(request))
            .await
            .send()
            .await?;
        expect_action_success(response).await?;
        Ok(())
    }

    pub async fn latest_payment(&self, profile_id: UserId) -> Result<PaymentRecord> {
        let record = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/payment/successful/{}/latest", profile_id.0))),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }

    pub async fn payment_history(&self, profile_id: UserId) -> Result<Vec<PaymentRecord>> {
        let records = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/payment/successful/{}", profile_id.0))),
            )
            .await
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(records)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
