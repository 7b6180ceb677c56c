use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::GeminiApiConfig;
use crate::error::{parse_error_message, GeminiApiError};
use crate::headers::build_headers;
use crate::payload::{GenerateContentRequest, GenerateContentResponse};
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::url::{generate_content_url, sanitize_model};

#[derive(Debug)]
pub struct GeminiApiClient {
    http: Client,
    config: GeminiApiConfig,
}

impl GeminiApiClient {
    pub fn new(config: GeminiApiConfig) -> Result<Self, GeminiApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(GeminiApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiApiConfig {
        &self.config
    }

    pub fn endpoint(&self, model: &str) -> String {
        generate_content_url(&self.config.base_url, model)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, GeminiApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| GeminiApiError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| GeminiApiError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<reqwest::RequestBuilder, GeminiApiError> {
        if sanitize_model(model).is_empty() {
            return Err(GeminiApiError::MissingModel);
        }

        let headers = self.build_headers()?;
        Ok(self
            .http
            .post(self.endpoint(model))
            .headers(headers)
            .json(request))
    }

    pub async fn send_with_retry(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Response, GeminiApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.build_request(model, request)?.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    last_status = Some(status);
                    let body = response.text().await.unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tokio::time::sleep(retry_delay_ms(attempt)).await;
                        continue;
                    }

                    return Err(GeminiApiError::Status(status, message));
                }
                Err(error) => {
                    let retryable = error.is_connect() || error.is_timeout();
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES && retryable {
                        tokio::time::sleep(retry_delay_ms(attempt)).await;
                        continue;
                    }
                    if !retryable {
                        return Err(GeminiApiError::Request(error));
                    }
                    return Err(GeminiApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(GeminiApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Sends one non-streaming `generateContent` call and decodes the reply.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiApiError> {
        let response = self.send_with_retry(model, request).await?;
        let body = response.text().await.map_err(GeminiApiError::from)?;
        decode_response(&body)
    }
}

/// Decode a `generateContent` body; blank bodies are rejected.
pub fn decode_response(body: &str) -> Result<GenerateContentResponse, GeminiApiError> {
    if body.trim().is_empty() {
        return Err(GeminiApiError::Unknown(
            "generateContent returned an empty body".to_string(),
        ));
    }

    serde_json::from_str(body).map_err(GeminiApiError::from)
}
