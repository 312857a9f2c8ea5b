/// Controls how the response layer renders errors.
#[derive(Debug, Clone)]
pub struct ErrorResponseConfig {
    /// Send the debug record (cause and trace included) instead of the
    /// public one. Development servers only.
    pub expose_debug: bool,
    /// When a message key cannot be localized, send the raw key instead of
    /// replacing the response with a generic internal error.
    pub fallback_to_key: bool,
}

impl ErrorResponseConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("API_ERROR_EXPOSE_DEBUG")
            && let Some(parsed) = parse_bool(&value)
        {
            config.expose_debug = parsed;
        }
        if let Some(value) = lookup("API_ERROR_FALLBACK_TO_KEY")
            && let Some(parsed) = parse_bool(&value)
        {
            config.fallback_to_key = parsed;
        }

        config
    }
}

impl Default for ErrorResponseConfig {
    fn default() -> Self {
        Self {
            expose_debug: false,
            fallback_to_key: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
