use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "openbook-gateway")]
#[command(about = "Rate limited API gateway and study mode proxy for OpenBook")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    // Emit logs as JSON lines instead of human readable text
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP gateway
    Serve(ServeArgs),
    /// Show (and update) the local visit streak
    Streak(StreakArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Chat endpoint that study mode requests are forwarded to
    #[arg(long, default_value = "http://localhost:3000/api/chat")]
    pub chat_url: String,

    // Model used when a study request does not name one
    #[arg(long, default_value = "neuman-google")]
    pub default_model: String,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 60)]
    pub rate_limit: u64,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Chance per request of sweeping stale rate limit buckets
    #[arg(long, default_value_t = 0.01, value_parser = parse_probability)]
    pub sweep_probability: f64,
}

#[derive(Args, Debug, Clone)]
pub struct StreakArgs {
    // JSON file holding the persisted streak values
    #[arg(long, default_value = "openbook-streak.json")]
    pub store: PathBuf,

    // Keep running and re-evaluate periodically
    #[arg(long)]
    pub watch: bool,

    // Re-evaluation interval in seconds (with --watch)
    #[arg(long, default_value_t = 60)]
    pub interval: u64,

    // Forget the stored streak before evaluating
    #[arg(long)]
    pub reset: bool,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{} is not between 0 and 1", p))
    }
}
