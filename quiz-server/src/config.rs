use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auto_next_delay_seconds: u64,
    pub results_cache_ttl_seconds: u64,
    pub room_timeout_minutes: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            auto_next_delay_seconds: env::var("AUTO_NEXT_DELAY_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("Invalid AUTO_NEXT_DELAY_SECONDS"),
            results_cache_ttl_seconds: env::var("RESULTS_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .expect("Invalid RESULTS_CACHE_TTL_SECONDS"),
            room_timeout_minutes: env::var("ROOM_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .expect("Invalid ROOM_TIMEOUT_MINUTES"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
