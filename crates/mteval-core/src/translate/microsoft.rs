use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{TextItem, TranslateError, TranslationResult, Translator};
use crate::config::Settings;

const API_VERSION: &str = "3.0";
const MAX_ERROR_BODY: usize = 200;

/// Client for the Microsoft Translator v3 `translate` operation, including
/// Custom Translator models selected through `category`.
pub struct MicrosoftTranslator {
    client: reqwest::Client,
    endpoint: String,
    subscription_key: String,
    region: String,
    timeout: Duration,
}

impl MicrosoftTranslator {
    pub fn new(settings: &Settings) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mteval/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            client,
            endpoint: settings.endpoint.clone(),
            subscription_key: settings.subscription_key.clone(),
            region: settings.region.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    pub fn request_url(&self, to: &str, category: &str) -> String {
        let mut url = format!(
            "{}/translate?api-version={}&to={}",
            self.endpoint,
            API_VERSION,
            urlencoding::encode(to)
        );
        if !category.is_empty() {
            url.push_str(&format!("&category={}", urlencoding::encode(category)));
        }
        url
    }
}

impl Translator for MicrosoftTranslator {
    fn name(&self) -> &str {
        "Microsoft Translator"
    }

    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        to: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranslationResult>, TranslateError>> + Send + 'a>>
    {
        Box::pin(async move {
            let body: Vec<TextItem> = texts
                .iter()
                .map(|t| TextItem { text: t.clone() })
                .collect();

            let resp = self
                .client
                .post(self.request_url(to, category))
                .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
                .header("Ocp-Apim-Subscription-Region", &self.region)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await?;

            let results = parse_response(resp).await?;
            tracing::trace!(category, to, results = results.len(), "translation response");
            Ok(results)
        })
    }
}

/// Map a raw response to translation results, separating rate limiting and
/// other HTTP failures from bodies that are not the documented shape.
pub async fn parse_response(
    resp: reqwest::Response,
) -> Result<Vec<TranslationResult>, TranslateError> {
    let status = resp.status();
    if status.as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(TranslateError::RateLimited { retry_after });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TranslateError::Status {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    let text = resp.text().await?;
    serde_json::from_str::<Vec<TranslationResult>>(&text)
        .map_err(|e| TranslateError::Malformed(e.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
