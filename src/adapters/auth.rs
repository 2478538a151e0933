use crate::adapters::{endpoint_url, error_detail};
use crate::config::IngestSettings;
use crate::utils::error::{IngestError, Result};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

/// OAuth access token 來源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// 直接指定的 token
    Static(String),
    /// 執行環境的 metadata server（Cloud Functions / Cloud Run / GCE）
    MetadataServer { endpoint: String },
    /// 不帶 Authorization，用於模擬器
    Anonymous,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Credentials {
    pub fn from_settings(settings: &IngestSettings) -> Self {
        if settings.anonymous {
            Credentials::Anonymous
        } else if let Some(token) = &settings.access_token {
            Credentials::Static(token.clone())
        } else {
            Credentials::MetadataServer {
                endpoint: settings.metadata_endpoint.clone(),
            }
        }
    }

    pub async fn access_token(&self, client: &Client) -> Result<Option<String>> {
        match self {
            Credentials::Anonymous => Ok(None),
            Credentials::Static(token) => Ok(Some(token.clone())),
            Credentials::MetadataServer { endpoint } => {
                let url = endpoint_url(
                    endpoint,
                    &[
                        "computeMetadata",
                        "v1",
                        "instance",
                        "service-accounts",
                        "default",
                        "token",
                    ],
                )?;

                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| IngestError::ConfigError {
                        message: format!("Metadata server unreachable: {}", e),
                    })?;

                if !response.status().is_success() {
                    return Err(IngestError::ConfigError {
                        message: format!(
                            "Failed to obtain access token: {}",
                            error_detail(response).await
                        ),
                    });
                }

                let token: TokenResponse = response.json().await?;
                Ok(Some(token.access_token))
            }
        }
    }

    /// 視需要加上 `Authorization: Bearer ...`
    pub async fn authorize(&self, client: &Client, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.access_token(client).await?;
        Ok(with_token(request, token.as_deref()))
    }
}

/// 套用已取得的 token；同一次工作的多個請求共用
pub fn with_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_from_settings_precedence() {
        let mut settings = IngestSettings {
            access_token: Some("abc".to_string()),
            ..IngestSettings::default()
        };
        assert_eq!(
            Credentials::from_settings(&settings),
            Credentials::Static("abc".to_string())
        );

        settings.anonymous = true;
        assert_eq!(Credentials::from_settings(&settings), Credentials::Anonymous);

        let settings = IngestSettings::default();
        assert!(matches!(
            Credentials::from_settings(&settings),
            Credentials::MetadataServer { .. }
        ));
    }

    #[tokio::test]
    async fn test_metadata_server_token() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/computeMetadata/v1/instance/service-accounts/default/token")
                    .header("metadata-flavor", "Google");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "ya29.test",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let credentials = Credentials::MetadataServer {
            endpoint: server.base_url(),
        };
        let token = credentials.access_token(&Client::new()).await.unwrap();

        token_mock.assert_async().await;
        assert_eq!(token.as_deref(), Some("ya29.test"));
    }

    #[tokio::test]
    async fn test_metadata_server_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(404).body("not found");
            })
            .await;

        let credentials = Credentials::MetadataServer {
            endpoint: server.base_url(),
        };
        let err = credentials.access_token(&Client::new()).await.unwrap_err();
        assert!(matches!(err, IngestError::ConfigError { .. }));
    }

    #[tokio::test]
    async fn test_anonymous_has_no_token() {
        let token = Credentials::Anonymous
            .access_token(&Client::new())
            .await
            .unwrap();
        assert!(token.is_none());
    }
}
