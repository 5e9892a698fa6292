use std::sync::Arc;
use std::time::Duration;

use savedq_adapters::credentials::resolve_auth_token;
use savedq_adapters::http::HttpSavedQueryApi;
use savedq_adapters::local::LocalSavedQueryApi;
use savedq_core::config::{default_config_dir, AppConfig};
use savedq_core::saved_query::{default_saved_queries_path, Organization};
use savedq_tui::{SavedQueryService, TuiError, TuiOptions};

mod logging;

fn build_service(
    config: &AppConfig,
) -> Result<Arc<dyn SavedQueryService>, Box<dyn std::error::Error>> {
    if let Some(base_url) = &config.api_base_url {
        tracing::info!(
            %base_url,
            organization = %config.organization,
            "using remote saved queries"
        );
        let api = HttpSavedQueryApi::new(
            base_url.clone(),
            resolve_auth_token(config),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        return Ok(Arc::new(api));
    }

    let path = match &config.saved_queries_path {
        Some(path) => path.clone(),
        None => default_saved_queries_path()?,
    };
    tracing::info!(path = %path.display(), "using local saved queries");
    Ok(Arc::new(LocalSavedQueryApi::load_from_path(path)?))
}

fn results_path(organization: &Organization) -> String {
    format!("/organizations/{}/discover/results/", organization.slug)
}

fn run_app(
    config: &AppConfig,
    run_tui: impl FnOnce(TuiOptions) -> Result<(), TuiError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let organization = Organization::new(config.organization.clone());
    let options = TuiOptions {
        api: build_service(config)?,
        results_path: results_path(&organization),
        organization,
    };
    run_tui(options)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_default()?;
    let _log_guard = logging::init(&default_config_dir()?, &config.log_filter)?;
    tracing::info!(ui = savedq_tui::ui_name(), "starting");

    let result = run_app(&config, savedq_tui::run);
    if let Err(error) = &result {
        tracing::error!(%error, "exited with error");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io;

    use savedq_core::config::AppConfig;
    use tempfile::TempDir;

    use super::run_app;

    fn local_config(temp_dir: &TempDir) -> AppConfig {
        AppConfig {
            organization: "acme".to_string(),
            saved_queries_path: Some(temp_dir.path().join("saved_queries.toml")),
            ..AppConfig::default()
        }
    }

    #[test]
    fn run_app_hands_the_tui_a_local_service() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let result = run_app(&local_config(&temp_dir), |options| {
            assert_eq!(options.organization.slug, "acme");
            assert_eq!(
                options.results_path,
                "/organizations/acme/discover/results/"
            );
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn run_app_uses_http_when_base_url_is_set() {
        let config = AppConfig {
            api_base_url: Some("https://sentry.example.com/".to_string()),
            ..AppConfig::default()
        };
        let result = run_app(&config, |_| Ok(()));
        assert!(result.is_ok());
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let result = run_app(&local_config(&temp_dir), |_| {
            Err(savedq_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
    }

    #[test]
    fn unreadable_saved_queries_file_fails_before_the_tui_starts() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("saved_queries.toml");
        std::fs::write(&path, "queries = [").expect("failed to write store");
        let config = AppConfig {
            saved_queries_path: Some(path),
            ..AppConfig::default()
        };

        let result = run_app(&config, |_| panic!("tui should not start"));
        assert!(result.is_err());
    }
}
