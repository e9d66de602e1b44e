use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "voicebridge")]
#[command(about = "Voice/text translation assistant service")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Translation provider base URL
    #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
    pub provider_url: String,

    // Provider model name
    #[arg(long, default_value = "gemini-2.0-flash")]
    pub model: String,

    // Provider API key
    #[arg(long, env = "GEMINI_API_KEY")]
    pub api_key: String,

    // Max accepted requests per user per window
    #[arg(long, default_value_t = 30)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 3600)]
    pub rate_window: u64,

    // Directory for staged voice payloads
    #[arg(long, default_value = "temp")]
    pub temp_dir: String,

    // Minimum age in seconds before a staged file is swept
    #[arg(long, default_value_t = 300)]
    pub retention: u64,

    // Sweep fires every N processed messages
    #[arg(long, default_value_t = 10)]
    pub sweep_after: u32,

    // Max voice message duration in seconds
    #[arg(long, default_value_t = 60)]
    pub max_audio_secs: u64,
}
