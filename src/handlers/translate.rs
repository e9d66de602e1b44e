use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::error;

use crate::audio;
use crate::metrics::{PROVIDER_LATENCY, RATE_LIMITED_TOTAL, REQUEST_TOTAL};
use crate::models::{ErrorResponse, TextRequest, TextResponse, VoiceRequest};
use crate::rate_limit::RateDecision;
use crate::state::AppState;

pub async fn translate_text_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TextRequest>,
) -> Response {
    REQUEST_TOTAL.inc();

    let decision = state.rate_limiter.check(payload.user_id);
    if !decision.allowed {
        RATE_LIMITED_TOTAL.inc();
        return rate_limited(decision);
    }

    let text = payload.text.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    }

    state.rate_limiter.record(payload.user_id);

    let start = Instant::now();
    let result = state.provider.translate_text(text).await;
    PROVIDER_LATENCY.observe(start.elapsed().as_secs_f64());

    match result {
        Ok(r) => Json(TextResponse {
            from: r.from,
            to: r.to,
            original: text.to_string(),
            translation: r.translation,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "text translation failed");
            error_response(StatusCode::BAD_GATEWAY, "processing failed, please try again")
        }
    }
}

pub async fn translate_voice_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VoiceRequest>,
) -> Response {
    REQUEST_TOTAL.inc();

    let decision = state.rate_limiter.check(payload.user_id);
    if !decision.allowed {
        RATE_LIMITED_TOTAL.inc();
        return rate_limited(decision);
    }

    // a missing staging directory is a broken environment, not a cleanup
    // hiccup - surface it
    if let Err(e) = state.janitor.ensure_workspace() {
        error!(error = %e, "staging directory unavailable");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
    }

    let Ok(bytes) = BASE64.decode(normalize_base64(&payload.audio)) else {
        return error_response(StatusCode::BAD_REQUEST, "audio must be base64-encoded");
    };

    let path = state
        .janitor
        .dir()
        .join(staged_file_name(payload.user_id, payload.message_id.as_deref()));

    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        error!(path = %path.display(), error = %e, "could not stage voice payload");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
    }

    // duration gate runs before record() so an over-long recording never
    // consumes quota
    let probed = audio::probe_duration(&path).await;
    let duration = if probed > 0.0 {
        probed
    } else {
        payload.duration_hint.unwrap_or(0.0)
    };
    if !audio::within_limit(duration, state.max_audio_secs) {
        state.janitor.delete([path]);
        state.janitor.tick();
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("recording too long, maximum is {} seconds", state.max_audio_secs),
        );
    }

    state.rate_limiter.record(payload.user_id);

    let start = Instant::now();
    let result = state.provider.translate_audio(&path).await;
    PROVIDER_LATENCY.observe(start.elapsed().as_secs_f64());

    state.janitor.delete([path]);
    state.janitor.tick();

    match result {
        Ok(r) => Json(r).into_response(),
        Err(e) => {
            error!(error = %e, "voice translation failed");
            error_response(StatusCode::BAD_GATEWAY, "processing failed, please try again")
        }
    }
}

// Staged-file name for one message. The client id only tags the file for
// diagnostics - it is sanitized down to a filename-safe alphabet so it can
// never form a path, and a process-unique sequence number provides the
// actual uniqueness so two requests reusing one id never share a file.
fn staged_file_name(user_id: i64, message_id: Option<&str>) -> String {
    static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

    let nonce = chrono::Utc::now().timestamp_micros();
    let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);

    let tag: String = message_id
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();

    if tag.is_empty() {
        format!("{user_id}-{nonce}-{seq}.oga")
    } else {
        format!("{user_id}-{tag}-{nonce}-{seq}.oga")
    }
}

// Strip a data URI prefix (data:audio/ogg;base64,AAAA...) - plain base64
// passes through unchanged.
fn normalize_base64(input: &str) -> &str {
    match input.find(";base64,") {
        Some(idx) => &input[idx + 8..],
        None => input,
    }
}

fn rate_limited(decision: RateDecision) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse {
            error: format!(
                "rate limit exceeded, try again in {} minutes",
                decision.retry_after_minutes
            ),
            retry_after_minutes: Some(decision.retry_after_minutes),
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            retry_after_minutes: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_data_uri_prefix() {
        assert_eq!(normalize_base64("data:audio/ogg;base64,AAAA"), "AAAA");
        assert_eq!(normalize_base64("AAAA"), "AAAA");
    }

    #[test]
    fn staged_name_never_contains_path_separators() {
        let name = staged_file_name(7, Some("../../etc/passwd"));
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(!name.contains(".."));
        assert!(name.starts_with("7-"));
        assert!(name.ends_with(".oga"));

        let name = staged_file_name(7, Some("a/b"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn staged_names_are_unique_for_a_reused_id() {
        let first = staged_file_name(7, Some("msg-1"));
        let second = staged_file_name(7, Some("msg-1"));
        assert_ne!(first, second);
    }

    #[test]
    fn staged_name_survives_an_all_garbage_id() {
        let name = staged_file_name(7, Some("///"));
        assert!(name.starts_with("7-"));
        assert!(name.ends_with(".oga"));
        assert!(!name.contains('/'));
    }
}
