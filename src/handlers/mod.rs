mod health;
mod metrics;
mod translate;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use translate::{translate_text_handler, translate_voice_handler};
