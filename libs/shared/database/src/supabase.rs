use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST + Storage client. Every Supabase-backed store goes through it.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    anyhow!("Authentication error: {}", error_text)
                }
                StatusCode::NOT_FOUND => anyhow!("Resource not found: {}", error_text),
                StatusCode::CONFLICT => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// `GET` on a table path, returning every matching row.
    pub async fn select<T>(&self, path: &str, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request(Method::GET, path, Some(auth_token), None).await
    }

    /// `POST`/`PATCH` with `Prefer: return=representation`, so the affected rows come back.
    /// An empty vector after a filtered `PATCH` means no row matched the filter.
    pub async fn write_returning<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: &str,
        body: Value,
    ) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            method,
            path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        )
        .await
    }

    /// `DELETE` with `Prefer: return=representation`; returns the removed rows.
    pub async fn delete_returning<T>(&self, path: &str, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::DELETE,
            path,
            Some(auth_token),
            None,
            Some(Self::representation_headers()),
        )
        .await
    }

    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Uploads raw bytes to a storage bucket and returns the object's public URL.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(Some(auth_token))?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);

        let response = self.client
            .post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Storage upload failed ({}): {}", status, error_text);
            return Err(anyhow!("Storage upload failed ({}): {}", status, error_text));
        }

        Ok(self.get_public_url(&format!(
            "/storage/v1/object/public/{}/{}",
            bucket, object_path
        )))
    }

    // Method to get public URL for a storage path
    pub fn get_public_url(&self, storage_path: &str) -> String {
        format!("{}{}", self.base_url, storage_path)
    }
}
