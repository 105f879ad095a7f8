use serde::{Deserialize, Serialize};

/// Request payload for POST /api/v1/auth/register
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Request payload for POST /api/v1/auth/login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Request payload for POST /api/v1/auth/refresh and /auth/logout.
/// The refresh token may come from the body (cross-origin clients) or the
/// httpOnly cookie (same-origin fallback).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: String,
    pub is_guest: bool,
}

impl From<&entity::user::Model> for UserInfo {
    fn from(user: &entity::user::Model) -> Self {
        UserInfo {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            is_guest: user.is_guest(),
        }
    }
}

/// Response for successful authentication (register/login/guest/refresh)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Access token claims (HS256)
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Token type: always "access"
    pub token_type: String,
    /// User role ("GUEST" or "USER")
    pub role: String,
    pub is_guest: bool,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Request payload for POST /api/v1/oauth/start
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStartPayload {
    pub provider: String,
}

/// Response for OAuth start
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStartResponse {
    pub authorization_url: String,
}

/// Query for GET /api/v1/oauth/callback
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub state: String,
}

/// Stateless OAuth state, carried as a signed JWT through the provider redirect
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
    pub provider: String,
}

/// Response for GET /api/v1/progress/wallet
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub tokens_earned_today: i64,
    pub daily_limit: i64,
    pub remaining_today: i64,
}

/// Request payload for POST /api/v1/progress/wallet/spend
#[derive(Debug, Serialize, Deserialize)]
pub struct SpendPayload {
    pub amount: i64,
    pub purpose: String,
    pub metadata: Option<serde_json::Value>,
}

/// Spend outcome; business failures are reported via `reason`, not HTTP errors
#[derive(Debug, Serialize, Deserialize)]
pub struct SpendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub balance: i64,
}

/// Query for GET /api/v1/progress/wallet/transactions
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    pub tx_type: String,
    pub amount: i64,
    pub balance_after: i64,
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
}

/// Request payload for POST /api/v1/progress/minigame/start
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameStartPayload {
    pub game_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameStartResponse {
    pub session_id: String,
    pub expires_at: i64,
    pub max_duration_ms: i64,
}

/// Request payload for POST /api/v1/progress/minigame/complete
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameCompletePayload {
    pub session_id: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameCompleteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub can_claim_reward: bool,
    pub reward_tokens: i64,
}

/// Request payload for POST /api/v1/progress/ad/complete
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCompletePayload {
    pub transaction_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCompleteResponse {
    pub success: bool,
    pub duplicate: bool,
    pub reward_tokens: i64,
    pub balance: i64,
}

/// Request payload for POST /api/v1/content/unlock
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockPayload {
    pub content_type: String,
    pub content_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub balance: i64,
    pub tokens_spent: i64,
}

/// Query for GET /api/v1/content/access
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessQuery {
    pub content_type: String,
    pub content_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub has_access: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementInfo {
    pub provider: String,
    pub provider_subscription_id: String,
    pub product_id: Option<String>,
    pub expires_at: i64,
}

/// Response for GET /api/v1/payment/subscription
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub active: bool,
    pub entitlements: Vec<EntitlementInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_payload_deserialization() {
        let json = r#"{
            "email": "player@example.com",
            "password": "hunter22"
        }"#;

        let payload: LoginPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.email, "player@example.com");
        assert_eq!(payload.password, "hunter22");
    }

    #[test]
    fn test_auth_response_serialization() {
        let response = AuthResponse {
            user: UserInfo {
                id: "u1".to_string(),
                email: Some("player@example.com".to_string()),
                name: None,
                role: "USER".to_string(),
                is_guest: false,
            },
            access_token: "jwt".to_string(),
            refresh_token: "opaque".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("accessToken"));
        assert!(json.contains("refreshToken"));
        assert!(json.contains("isGuest"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Invalid credentials".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("unauthorized"));
        assert!(json.contains("Invalid credentials"));
    }

    #[test]
    fn test_spend_response_omits_reason_on_success() {
        let ok = SpendResponse {
            success: true,
            reason: None,
            balance: 7,
        };
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("reason"));

        let failed = SpendResponse {
            success: false,
            reason: Some("insufficient_balance".to_string()),
            balance: 2,
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("insufficient_balance"));
    }

    #[test]
    fn test_access_claims_roundtrip() {
        let claims = AccessClaims {
            iss: "http://localhost:8080".to_string(),
            sub: "user-id".to_string(),
            aud: "mindcase-web".to_string(),
            exp: 1_234_567_890,
            iat: 1_234_567_000,
            token_type: "access".to_string(),
            role: "GUEST".to_string(),
            is_guest: true,
            email: None,
            name: None,
        };

        let json = serde_json::to_string(&claims).unwrap();
        let decoded: AccessClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.token_type, "access");
        assert!(decoded.is_guest);
    }
}
