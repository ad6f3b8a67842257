use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{NotificationId, PlanId, RequestId, UserId};

/// Successful login payload. `id` is the caller's profile id; the backend
/// also reports the account role, which clients may ignore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Registration payload. The backend treats every field as nullable, so
/// absent values serialize as explicit `null`s rather than being omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub profile_for: Option<String>,
    pub gender: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub date_of_birth: Option<String>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    pub sub_caste: Option<String>,
    pub mother_tongue: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub marital_status: Option<String>,
    pub no_of_children: Option<i64>,
    pub height: Option<String>,
    pub highest_education: Option<String>,
    pub college_name: Option<String>,
    pub sector: Option<String>,
    pub occupation: Option<String>,
    pub company_name: Option<String>,
    pub annual_income: Option<String>,
    pub work_location: Option<String>,
    pub email_id: Option<String>,
    pub mobile_number: Option<String>,
    pub create_password: Option<String>,
    pub role: Option<String>,
}

/// A member profile as served by the profile endpoints. Optional-heavy by
/// contract; the same shape is sent back on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: Option<UserId>,
    pub profile_for: Option<String>,
    pub gender: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub date_of_birth: Option<String>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    pub sub_caste: Option<String>,
    pub mother_tongue: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub marital_status: Option<String>,
    pub no_of_children: Option<i64>,
    pub height: Option<String>,
    pub highest_education: Option<String>,
    pub college_name: Option<String>,
    pub sector: Option<String>,
    pub occupation: Option<String>,
    pub company_name: Option<String>,
    pub annual_income: Option<String>,
    pub work_location: Option<String>,
    pub email_id: Option<String>,
    pub mobile_number: Option<String>,
    pub update_photo: Option<String>,
    pub premium: Option<bool>,
    pub premium_end: Option<DateTime<Utc>>,
}

/// One message in a two-party thread. Messages carry no server id; a row is
/// identified by its sender, timestamp and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub seen: bool,
}

/// Block relation between the requesting member and a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockStatus {
    pub blocked_by_me: bool,
    pub blocked_by_other: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterestRequest {
    pub request_id: Option<RequestId>,
    pub sender_id: Option<UserId>,
    pub receiver_id: Option<UserId>,
    pub sender_name: Option<String>,
    pub receiver_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub profile_id: UserId,
    pub plan_id: PlanId,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentRecord {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub amount: Option<f64>,
    pub plan_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    #[test]
    fn chat_message_round_trips_camel_case() {
        let message = ChatMessage {
            sender_id: UserId(1),
            receiver_id: UserId(2),
            message: "namaste".to_string(),
            timestamp: "2024-06-01T10:00:00Z".parse().expect("timestamp"),
            seen: false,
        };
        let raw = serde_json::to_value(&message).expect("serialize");
        assert_eq!(raw["senderId"], 1);
        assert_eq!(raw["receiverId"], 2);
        let parsed: ChatMessage = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(parsed, message);
    }

    #[test]
    fn chat_message_seen_defaults_to_false() {
        let parsed: ChatMessage = serde_json::from_str(
            r#"{"senderId":1,"receiverId":2,"message":"hi","timestamp":"2024-06-01T10:00:00Z"}"#,
        )
        .expect("deserialize");
        assert!(!parsed.seen);
    }

    #[test]
    fn register_request_serializes_absent_fields_as_null() {
        let raw = serde_json::to_value(RegisterRequest::default()).expect("serialize");
        assert!(raw["firstName"].is_null());
        assert!(raw["createPassword"].is_null());
    }

    #[test]
    fn profile_tolerates_missing_fields() {
        let profile: Profile = serde_json::from_str(r#"{"id":9,"firstName":"Asha"}"#)
            .expect("deserialize");
        assert_eq!(profile.id, Some(UserId(9)));
        assert_eq!(profile.first_name.as_deref(), Some("Asha"));
        assert!(profile.premium.is_none());
    }
}
