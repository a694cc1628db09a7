//! Anthropic Messages backend.
//!
//! Images go in as base64 `image` blocks ahead of the text block. There is
//! no JSON mode, so replies may arrive fenced and are stripped downstream.

use super::provider::BackendFamily;
use super::response;
use super::types::ImagePayload;
use super::StageRequest;
use crate::error::GatewayError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) fn build_request(request: &StageRequest<'_>) -> serde_json::Value {
    let mut content: Vec<serde_json::Value> = request.images.iter().map(image_block).collect();
    content.push(serde_json::json!({
        "type": "text",
        "text": request.user_message,
    }));

    serde_json::json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "system": request.system_prompt,
        "messages": [{ "role": "user", "content": content }]
    })
}

fn image_block(image: &ImagePayload) -> serde_json::Value {
    serde_json::json!({
        "type": "image",
        "source": {
            "type": "base64",
            "media_type": image.mime_type,
            "data": image.base64_data,
        }
    })
}

pub(crate) async fn send(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<String, GatewayError> {
    let resp = client
        .post(format!("{}/messages", base_url))
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        log::error!(
            "[LLM] Anthropic returned {}: {}",
            status,
            response::preview(&text, 300)
        );
        return Err(response::upstream_error(BackendFamily::Anthropic, status.as_u16(), &text));
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if let Some(usage) = parsed.get("usage") {
        log::info!(
            "[LLM] Anthropic tokens: input={} output={}",
            usage["input_tokens"].as_u64().unwrap_or(0),
            usage["output_tokens"].as_u64().unwrap_or(0)
        );
    }
    extract_text(&parsed)
        .ok_or_else(|| GatewayError::Parse("Anthropic response had no text block".to_string()))
}

/// First `text` block of `content`.
pub(crate) fn extract_text(body: &serde_json::Value) -> Option<String> {
    body.get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_puts_images_before_text() {
        let images = vec![ImagePayload::png("AAA")];
        let request = StageRequest {
            model: "claude-sonnet-4-5",
            system_prompt: "sys",
            user_message: "solve".to_string(),
            images: &images,
            max_tokens: 100,
        };
        let body = build_request(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["data"], "AAA");
        assert_eq!(content[1]["text"], "solve");
        assert_eq!(body["system"], "sys");
    }

    #[test]
    fn skips_non_text_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "{}"}
            ]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("{}"));
    }
}
