use crate::cleanup::Janitor;
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub rate_limiter: RateLimiter,
    pub janitor: Janitor,
    pub provider: Provider,
    pub max_audio_secs: u64,
}
