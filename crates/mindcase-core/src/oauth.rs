use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthErrorFields {
    pub error: String,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthTokenParseError {
    /// The provider returned an explicit error payload (often with HTTP 200).
    ProviderError(OAuthErrorFields),

    /// The body was parseable but did not contain an access token or a provider error.
    MissingAccessToken,

    /// The body could not be parsed as JSON.
    InvalidFormat,
}

impl std::fmt::Display for OAuthTokenParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthTokenParseError::ProviderError(err) => {
                write!(f, "OAuth token exchange returned error '{}'", err.error)?;
                if let Some(desc) = &err.error_description {
                    if !desc.is_empty() {
                        write!(f, ": {desc}")?;
                    }
                }
                Ok(())
            }
            OAuthTokenParseError::MissingAccessToken => {
                write!(f, "OAuth token exchange response missing access_token")
            }
            OAuthTokenParseError::InvalidFormat => {
                write!(f, "OAuth token exchange response had an unrecognized format")
            }
        }
    }
}

impl std::error::Error for OAuthTokenParseError {}

/// Parse an OAuth token exchange response body and extract `access_token`.
///
/// This intentionally does **not** return the full raw body on error to avoid
/// accidentally leaking access tokens into logs.
pub fn parse_access_token_from_token_exchange_body(
    body: &str,
) -> Result<String, OAuthTokenParseError> {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return Err(OAuthTokenParseError::InvalidFormat);
    };

    if let Some(tok) = v.get("access_token").and_then(|v| v.as_str()) {
        return Ok(tok.to_string());
    }

    if let Some(err) = v.get("error").and_then(|v| v.as_str()) {
        let desc = v
            .get("error_description")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        return Err(OAuthTokenParseError::ProviderError(OAuthErrorFields {
            error: err.to_string(),
            error_description: desc,
        }));
    }

    Err(OAuthTokenParseError::MissingAccessToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_access_token() {
        let body = r#"{"access_token":"gho_abc","token_type":"bearer"}"#;
        assert_eq!(
            parse_access_token_from_token_exchange_body(body).unwrap(),
            "gho_abc"
        );
    }

    #[test]
    fn test_surfaces_provider_error() {
        let body = r#"{"error":"bad_verification_code","error_description":"The code is incorrect"}"#;
        match parse_access_token_from_token_exchange_body(body) {
            Err(OAuthTokenParseError::ProviderError(fields)) => {
                assert_eq!(fields.error, "bad_verification_code");
                assert!(fields.error_description.unwrap().contains("incorrect"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_json() {
        assert_eq!(
            parse_access_token_from_token_exchange_body("not json"),
            Err(OAuthTokenParseError::InvalidFormat)
        );
    }
}
