//! OpenAI Chat Completions backend.
//!
//! Images go in as `image_url` parts with data URLs. JSON output is
//! enforced with `response_format: json_object`, so no fence stripping is
//! normally needed (it is still tolerated downstream).

use super::provider::BackendFamily;
use super::response;
use super::types::ImagePayload;
use super::StageRequest;
use crate::error::GatewayError;

/// Build the Chat Completions request body.
pub(crate) fn build_request(request: &StageRequest<'_>) -> serde_json::Value {
    let mut content = vec![serde_json::json!({
        "type": "text",
        "text": request.user_message,
    })];
    content.extend(request.images.iter().map(image_part));

    serde_json::json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "temperature": 0.2,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": content }
        ]
    })
}

fn image_part(image: &ImagePayload) -> serde_json::Value {
    serde_json::json!({
        "type": "image_url",
        "image_url": { "url": image.data_url(), "detail": "high" }
    })
}

/// Send the request and return the assistant's text.
pub(crate) async fn send(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<String, GatewayError> {
    let resp = client
        .post(format!("{}/chat/completions", base_url))
        .bearer_auth(api_key)
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        log::error!(
            "[LLM] OpenAI returned {}: {}",
            status,
            response::preview(&text, 300)
        );
        return Err(response::upstream_error(BackendFamily::OpenAi, status.as_u16(), &text));
    }

    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))?;
    log_usage(&parsed);
    extract_text(&parsed)
        .ok_or_else(|| GatewayError::Parse("OpenAI response had no message content".to_string()))
}

/// `choices[0].message.content`
pub(crate) fn extract_text(body: &serde_json::Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn log_usage(body: &serde_json::Value) {
    if let Some(usage) = body.get("usage") {
        log::info!(
            "[LLM] OpenAI tokens: prompt={} completion={}",
            usage["prompt_tokens"].as_u64().unwrap_or(0),
            usage["completion_tokens"].as_u64().unwrap_or(0)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_puts_text_before_images() {
        let images = vec![ImagePayload::png("AAA"), ImagePayload::png("BBB")];
        let request = StageRequest {
            model: "gpt-4o",
            system_prompt: "sys",
            user_message: "extract".to_string(),
            images: &images,
            max_tokens: 100,
        };
        let body = build_request(&request);
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAA");
        assert_eq!(content[2]["image_url"]["url"], "data:image/png;base64,BBB");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn extracts_message_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("{\"ok\": true}"));
        assert!(extract_text(&serde_json::json!({"choices": []})).is_none());
    }
}
