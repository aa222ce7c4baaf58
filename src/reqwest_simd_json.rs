use anyhow::{Context, Result};
use reqwest::Response;

/// Extension trait to parse GitHub responses with simd-json
pub trait ResponseSimdJsonExt {
    /// Parse response body as JSON using simd-json
    async fn simd_json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned;

    /// Like `simd_json`, but turn a non-2xx status into an error carrying
    /// the API's `message` field when there is one.
    async fn checked_simd_json<T>(self, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned;
}

#[derive(serde::Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error_message(body: &[u8]) -> Option<String> {
    let mut body = body.to_vec();
    simd_json::from_slice::<ApiErrorBody>(&mut body)
        .ok()
        .map(|b| b.message)
}

impl ResponseSimdJsonExt for Response {
    async fn simd_json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        let mut bytes = bytes.to_vec();
        let result = simd_json::from_slice(&mut bytes)?;
        Ok(result)
    }

    async fn checked_simd_json<T>(self, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = self.status();
        if !status.is_success() {
            let body = self.bytes().await.unwrap_or_default();
            match api_error_message(&body) {
                Some(message) => anyhow::bail!("{what}: GitHub API returned {status}: {message}"),
                None => anyhow::bail!("{what}: GitHub API returned {status}"),
            }
        }
        self.simd_json()
            .await
            .with_context(|| format!("{what}: malformed response body"))
    }
}
