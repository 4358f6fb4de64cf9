//! HTTP client wrapper for the AEM web console
//!
//! All console endpoints use HTTP basic auth and either form-encoded or
//! multipart POST bodies. The wrapper owns a configured reqwest client and
//! the default credentials; the password module overrides credentials per
//! request while probing.

use reqwest::multipart::Form;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::modules::aem::utils::connection::ConnectionSpec;

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct AemClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl AemClient {
    pub fn new(conn: &ConnectionSpec) -> Result<Self, HttpClientError> {
        let mut builder = ClientBuilder::new();

        if let Some(timeout_secs) = conn.timeout {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }

        if !conn.validate_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder = builder.user_agent(concat!("aem-console/", env!("CARGO_PKG_VERSION")));

        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: conn.base_url.trim_end_matches('/').to_string(),
            user: conn.user.clone(),
            password: conn.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, HttpClientError> {
        self.get_with_auth(path, &self.user, &self.password).await
    }

    /// GET with explicit credentials, used for password probing.
    pub async fn get_with_auth(
        &self,
        path: &str,
        user: &str,
        password: &str,
    ) -> Result<HttpResponse, HttpClientError> {
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(user, Some(password))
            .send()
            .await?;
        Self::into_response(response).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<HttpResponse, HttpClientError> {
        self.post_form_with_auth(path, fields, &self.user, &self.password)
            .await
    }

    pub async fn post_form_with_auth(
        &self,
        path: &str,
        fields: &[(String, String)],
        user: &str,
        password: &str,
    ) -> Result<HttpResponse, HttpClientError> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(user, Some(password))
            .form(fields)
            .send()
            .await?;
        Self::into_response(response).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: Form,
    ) -> Result<HttpResponse, HttpClientError> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.user, Some(&self.password))
            .multipart(form)
            .send()
            .await?;
        Self::into_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse, HttpClientError> {
        let status = response.status().as_u16();
        let content = response.text().await?;
        Ok(HttpResponse { status, content })
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_checks() {
        let ok = HttpResponse {
            status: 200,
            content: "OK".to_string(),
        };
        assert!(ok.is_success());

        let missing = HttpResponse {
            status: 404,
            content: "Not Found".to_string(),
        };
        assert!(!missing.is_success());
    }

    #[test]
    fn json_parsing() {
        let response = HttpResponse {
            status: 200,
            content: r#"{"hits": []}"#.to_string(),
        };
        let value = response.json().unwrap();
        assert_eq!(value["hits"].as_array().unwrap().len(), 0);
    }
}
