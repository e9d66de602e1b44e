use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{TextResult, VoiceResult};

// Ultra-short prompts - the model answers faster and has less room to chat
const VOICE_PROMPT: &str = "Transcribe and translate EN<->KM audio.\n\
Return JSON only: {\"lang\":\"en\",\"text\":\"...\",\"translation\":\"...\"}";

const TEXT_PROMPT: &str = "Translate EN<->KM.\n\
Return JSON only: {\"from\":\"en\",\"to\":\"km\",\"translation\":\"...\"}\n\
Text: ";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("could not read staged audio: {0}")]
    Io(#[from] std::io::Error),
}

// Client for the external transcription/translation capability. One API call
// does both STT and translation for voice messages.
pub struct Provider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl Provider {
    pub fn new(client: reqwest::Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            model,
            api_key,
        }
    }

    // Transcribe + translate a staged voice payload in a single call.
    pub async fn translate_audio(&self, path: &Path) -> Result<VoiceResult, ProviderError> {
        info!(path = %path.display(), "sending audio to provider");

        let bytes = tokio::fs::read(path).await?;
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": VOICE_PROMPT },
                    { "inline_data": { "mime_type": "audio/ogg", "data": BASE64.encode(&bytes) } },
                ]
            }]
        });

        let text = self.generate(body).await?;
        let result: VoiceResult = serde_json::from_value(extract_json(&text)?)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(lang = %result.lang, "provider voice result");
        Ok(result)
    }

    pub async fn translate_text(&self, text: &str) -> Result<TextResult, ProviderError> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{TEXT_PROMPT}{text}") }]
            }]
        });

        let text = self.generate(body).await?;
        let result: TextResult = serde_json::from_value(extract_json(&text)?)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(from = %result.from, to = %result.to, "provider text result");
        Ok(result)
    }

    async fn generate(&self, body: Value) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await?;
        value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::Malformed("no candidate text in response".to_string()))
    }
}

// The model is asked for bare JSON but still wraps it in markdown fences or
// stray prose now and then - strip fences, then slice first '{' to last '}'.
pub fn extract_json(text: &str) -> Result<Value, ProviderError> {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // drop the language tag line and the closing fence
        let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or(rest);
        text = rest.rsplit_once("```").map(|(r, _)| r).unwrap_or(rest).trim();
    }

    let slice = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &text[start..=end],
        _ => text,
    };

    serde_json::from_str(slice).map_err(|e| {
        let preview: String = slice.chars().take(100).collect();
        ProviderError::Malformed(format!("{e}: {preview}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_json() {
        let value = extract_json(r#"{"lang":"en","text":"hi","translation":"x"}"#).unwrap();
        assert_eq!(value["lang"], "en");
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "```json\n{\"from\":\"en\",\"to\":\"km\",\"translation\":\"y\"}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["to"], "km");
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let raw = "Sure! Here is the result: {\"lang\":\"km\",\"text\":\"a\",\"translation\":\"b\"} Hope that helps.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["lang"], "km");
    }

    #[test]
    fn malformed_output_is_an_error_not_a_panic() {
        assert!(matches!(
            extract_json("the model refused"),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            extract_json("{not json at all]"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn fenced_block_without_newline_still_parses() {
        let value = extract_json("```{\"lang\":\"en\",\"text\":\"t\",\"translation\":\"u\"}```");
        assert!(value.is_ok());
    }
}
