//! Gemini generateContent backend.
//!
//! Key differences from the other two:
//! - API key in the URL query param, not a header
//! - `responseMimeType: "application/json"` enforces valid JSON
//! - Images are `inline_data` parts
//! - Text in `candidates[0].content.parts[*].text`

use super::provider::BackendFamily;
use super::response;
use super::types::ImagePayload;
use super::StageRequest;
use crate::error::GatewayError;

pub(crate) fn build_request(request: &StageRequest<'_>) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "text": request.user_message })];
    parts.extend(request.images.iter().map(inline_part));

    serde_json::json!({
        "contents": [{ "role": "user", "parts": parts }],
        "systemInstruction": {
            "parts": [{ "text": request.system_prompt }]
        },
        "generationConfig": {
            "maxOutputTokens": request.max_tokens,
            "temperature": 0.2,
            "responseMimeType": "application/json"
        }
    })
}

fn inline_part(image: &ImagePayload) -> serde_json::Value {
    serde_json::json!({
        "inline_data": {
            "mime_type": image.mime_type,
            "data": image.base64_data,
        }
    })
}

pub(crate) async fn send(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<String, GatewayError> {
    let resp = client
        .post(format!("{}/models/{}:generateContent", base_url, model))
        .query(&[("key", api_key)])
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        log::error!(
            "[LLM] Gemini returned {}: {}",
            status,
            response::preview(&text, 300)
        );
        return Err(response::upstream_error(BackendFamily::Gemini, status.as_u16(), &text));
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if let Some(usage) = parsed.get("usageMetadata") {
        log::info!(
            "[LLM] Gemini tokens: prompt={} candidates={}",
            usage["promptTokenCount"].as_u64().unwrap_or(0),
            usage["candidatesTokenCount"].as_u64().unwrap_or(0)
        );
    }
    extract_text(&parsed)
        .ok_or_else(|| GatewayError::Parse("Gemini response had no candidate text".to_string()))
}

/// Concatenated text parts of the first candidate.
pub(crate) fn extract_text(body: &serde_json::Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_inline_data_and_json_mime() {
        let images = vec![ImagePayload::png("AAA")];
        let request = StageRequest {
            model: "gemini-2.0-flash",
            system_prompt: "sys",
            user_message: "extract".to_string(),
            images: &images,
            max_tokens: 100,
        };
        let body = build_request(&request);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[1]["inline_data"]["data"], "AAA");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn joins_text_parts() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}}]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("{\"a\": 1}"));
        let empty = serde_json::json!({"candidates": [{"content": {"parts": []}}]});
        assert!(extract_text(&empty).is_none());
    }
}
