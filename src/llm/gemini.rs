//! Gemini capability client: `generateContent` over the Google AI REST API.
//!
//! Two calls, both one request / one response, no streaming:
//! - size estimation: user photo + instruction → text model → one size token
//! - composite: user photo + product image + instruction → image model → image
//!
//! Differences from the usual text flow:
//! - API key travels in the `x-goog-api-key` header, never in the URL,
//!   so endpoints can be logged as-is
//! - images are sent as `inlineData` parts ahead of the text part
//! - the image model returns `inlineData` (sometimes `inline_data`) parts

use super::error::CapabilityError;
use super::prompts::{self, SIZE_MAX_TOKENS, SIZE_TEMPERATURE};
use super::types::SizeLabel;
use super::TryOnCapability;
use crate::imaging::InlineImage;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SIZE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Returns the API key to use for the next request, if any.
///
/// Called once per request so a key selected mid-session is picked up
/// without rebuilding the client. May block (keychain access).
pub type ApiKeyResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_base: String,
    pub size_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            size_model: DEFAULT_SIZE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(90),
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    settings: GeminiSettings,
    api_key: ApiKeyResolver,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings, api_key: ApiKeyResolver) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[GEMINI] HTTP client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            http,
            settings,
            api_key,
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        endpoint_for_model(&self.settings.api_base, model)
    }

    async fn resolve_key(&self) -> Result<String, CapabilityError> {
        let resolver = Arc::clone(&self.api_key);
        let key = tokio::task::spawn_blocking(move || resolver())
            .await
            .map_err(|e| CapabilityError::generic(format!("key lookup task failed: {}", e)))?;
        match key {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => {
                log::warn!("[GEMINI] No API key configured");
                Err(CapabilityError::credential("no Gemini API key configured"))
            }
        }
    }

    /// POST a `generateContent` body and return the parsed JSON response.
    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value, CapabilityError> {
        let api_key = self.resolve_key().await?;
        let endpoint = self.endpoint_for_model(model);

        log::info!("[GEMINI] POST {}", endpoint);
        let start = std::time::Instant::now();

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("[GEMINI] HTTP request failed: {}", e);
                CapabilityError::from_transport(&e)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CapabilityError::from_transport(&e).with_status(status.as_u16()))?;
        let elapsed_ms = start.elapsed().as_millis();

        if !status.is_success() {
            let err = CapabilityError::from_response(status.as_u16(), &text);
            log::error!(
                "[GEMINI] {} returned {} after {}ms ({:?}): {}",
                model,
                status,
                elapsed_ms,
                err.kind,
                err.message
            );
            return Err(err);
        }

        log::info!("[GEMINI] {} responded in {}ms", model, elapsed_ms);

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            CapabilityError::generic(format!("unparseable response: {}", e))
                .with_status(status.as_u16())
        })?;

        if let Some(usage) = json.get("usageMetadata") {
            log::info!(
                "[GEMINI] Tokens: prompt={} candidates={}",
                usage["promptTokenCount"].as_u64().unwrap_or(0),
                usage["candidatesTokenCount"].as_u64().unwrap_or(0)
            );
        }

        Ok(json)
    }
}

#[async_trait]
impl TryOnCapability for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn estimate_size(
        &self,
        user_image: &InlineImage,
        product_label: &str,
    ) -> Result<SizeLabel, CapabilityError> {
        let body = build_size_request(user_image, product_label);
        let response = self
            .generate_content(&self.settings.size_model, &body)
            .await?;

        let text = extract_text(&response).ok_or_else(|| no_output_error(&response, "text"))?;
        let size = SizeLabel::parse_response(&text).ok_or_else(|| {
            log::warn!("[GEMINI] Unrecognized size answer: {:?}", text);
            CapabilityError::generic(format!("unrecognized size answer: {}", text.trim()))
        })?;

        log::info!("[GEMINI] Size estimate for {}: {}", product_label, size);
        Ok(size)
    }

    async fn generate_composite(
        &self,
        user_image: &InlineImage,
        product_image: &InlineImage,
        product_label: &str,
    ) -> Result<InlineImage, CapabilityError> {
        let body = build_composite_request(user_image, product_image, product_label);
        let response = self
            .generate_content(&self.settings.image_model, &body)
            .await?;

        let image = extract_image(&response)?
            .ok_or_else(|| no_output_error(&response, "image"))?;

        log::info!(
            "[GEMINI] Composite for {}: {} bytes ({})",
            product_label,
            image.data.len(),
            image.mime_type
        );
        Ok(image)
    }
}

// ── Request building ────────────────────────────────────────────────

pub(crate) fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{}", trimmed)
    };
    format!(
        "{}/{}:generateContent",
        api_base.trim().trim_end_matches('/'),
        model_path
    )
}

fn inline_part(image: &InlineImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.to_base64(),
        }
    })
}

pub(crate) fn build_size_request(user_image: &InlineImage, product_label: &str) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    inline_part(user_image),
                    { "text": prompts::build_size_prompt(product_label) }
                ]
            }
        ],
        "generationConfig": {
            "maxOutputTokens": SIZE_MAX_TOKENS,
            "temperature": SIZE_TEMPERATURE
        }
    })
}

pub(crate) fn build_composite_request(
    user_image: &InlineImage,
    product_image: &InlineImage,
    product_label: &str,
) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    inline_part(user_image),
                    inline_part(product_image),
                    { "text": prompts::build_composite_prompt(product_label) }
                ]
            }
        ],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    })
}

// ── Response parsing ────────────────────────────────────────────────

fn candidate_parts(response: &Value) -> Vec<&Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|c| c.get("content")?.get("parts")?.as_array())
                .flatten()
                .collect()
        })
        .unwrap_or_default()
}

/// Concatenated text of all text parts, or `None` if there is none.
pub(crate) fn extract_text(response: &Value) -> Option<String> {
    let text: String = candidate_parts(response)
        .into_iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First inline image in the response, if any.
pub(crate) fn extract_image(response: &Value) -> Result<Option<InlineImage>, CapabilityError> {
    for part in candidate_parts(response) {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        let image = InlineImage::from_base64(mime_type, data)
            .map_err(|e| CapabilityError::generic(format!("image base64 decode failed: {}", e)))?;
        return Ok(Some(image));
    }
    Ok(None)
}

/// Error for a 200 response that carried no usable output, with the
/// block/finish reason when Gemini gave one.
fn no_output_error(response: &Value, wanted: &str) -> CapabilityError {
    let block_reason = response
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str);
    let finish_reason = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finishReason"))
        .and_then(Value::as_str);

    match block_reason.or(finish_reason) {
        Some(reason) => {
            log::warn!("[GEMINI] No {} in response, reason: {}", wanted, reason);
            CapabilityError::generic(format!("no {} returned ({})", wanted, reason))
                .with_status(200)
                .with_reason(reason)
        }
        None => {
            log::warn!("[GEMINI] No {} in response", wanted);
            CapabilityError::generic(format!("no {} returned", wanted)).with_status(200)
        }
    }
}
