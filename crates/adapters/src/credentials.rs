use savedq_core::config::{AppConfig, TokenSource};

const DEFAULT_KEYRING_SERVICE: &str = "savedq";

/// Resolves the API token. With the keyring source, a token found only in
/// the environment is written to the keyring for next time.
#[must_use]
pub fn resolve_auth_token(config: &AppConfig) -> Option<String> {
    let env_token = config.env_auth_token();

    match config.token_source {
        TokenSource::EnvVar => env_token,
        TokenSource::Keyring => {
            if let Some(token) = load_keyring_token(config) {
                return Some(token);
            }

            if let Some(token) = env_token {
                store_keyring_token(config, &token);
                return Some(token);
            }

            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

#[cfg_attr(
    not(any(target_os = "linux", target_os = "macos", target_os = "windows")),
    allow(dead_code)
)]
fn keyring_target(config: &AppConfig) -> (&str, &str) {
    let service = non_empty(config.keyring_service.as_deref()).unwrap_or(DEFAULT_KEYRING_SERVICE);
    let account =
        non_empty(config.keyring_account.as_deref()).unwrap_or(config.organization.as_str());
    (service, account)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn load_keyring_token(config: &AppConfig) -> Option<String> {
    let entry = keyring_entry(config)?;
    entry.get_password().ok().filter(|token| !token.is_empty())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn load_keyring_token(_config: &AppConfig) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn store_keyring_token(config: &AppConfig, token: &str) {
    if token.is_empty() {
        return;
    }
    if let Some(entry) = keyring_entry(config) {
        if let Err(error) = entry.set_password(token) {
            tracing::warn!(%error, "failed to store API token in keyring");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn store_keyring_token(_config: &AppConfig, _token: &str) {}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn keyring_entry(config: &AppConfig) -> Option<keyring::Entry> {
    let (service, account) = keyring_target(config);
    keyring::Entry::new(service, account).ok()
}
