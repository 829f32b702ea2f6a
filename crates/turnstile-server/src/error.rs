use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required configuration: set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a missing settings field to the environment variable that supplies
/// it. The only required settings live under `[platform]`.
pub fn to_env_var(field: &str) -> String {
    match field {
        "platform" | "endpoint" => "TURNSTILE_PLATFORM__ENDPOINT".to_string(),
        _ => format!("TURNSTILE_{}", field.replace('.', "__").to_uppercase()),
    }
}
