use serde::{Deserialize, Serialize};

// POST /api/translate/text request body
#[derive(Deserialize, Clone)]
pub struct TextRequest {
    pub user_id: i64,
    pub text: String,
}

// POST /api/translate/voice request body - audio is base64, with or without
// a data URI prefix
#[derive(Deserialize, Clone)]
pub struct VoiceRequest {
    pub user_id: i64,
    #[serde(default)]
    pub message_id: Option<String>,
    pub audio: String,
    // transport-supplied duration, used when the local probe comes up empty
    #[serde(default)]
    pub duration_hint: Option<f64>,
}

// Provider result for a voice message: detected language, transcription,
// translation. Doubles as the response body.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct VoiceResult {
    pub lang: String,
    pub text: String,
    pub translation: String,
}

// Provider result for a text translation
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct TextResult {
    pub from: String,
    pub to: String,
    pub translation: String,
}

// Response body for text translation - echoes the original
#[derive(Serialize)]
pub struct TextResponse {
    pub from: String,
    pub to: String,
    pub original: String,
    pub translation: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<u64>,
}
