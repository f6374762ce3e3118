use std::time::Duration;

use crate::config::ServeArgs;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub rate_limiter: RateLimiter,
    pub chat_url: String,       // where study requests are forwarded
    pub default_model: String,  // used when the request names no model
}

impl AppState {
    pub fn new(client: reqwest::Client, rate_limiter: RateLimiter, chat_url: impl Into<String>) -> Self {
        Self {
            client,
            rate_limiter,
            chat_url: chat_url.into(),
            default_model: "neuman-google".to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn from_args(args: &ServeArgs) -> Self {
        let rate_limiter = RateLimiter::in_memory(args.rate_limit, Duration::from_secs(args.rate_window))
            .with_sweep_probability(args.sweep_probability);
        Self::new(reqwest::Client::new(), rate_limiter, args.chat_url.clone())
            .with_default_model(args.default_model.clone())
    }
}
