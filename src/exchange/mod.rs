pub mod adapter;
pub mod dry_run;
pub mod mexc;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigError, Settings};
use crate::context::ExecutionContext;
use adapter::OrderExecutor;
use dry_run::DryRunExecutor;
use mexc::MexcExecutor;

/// Pick the executor for this run: dry run when configured, MEXC REST otherwise.
pub fn select_executor(
    settings: &Settings,
    ctx: &ExecutionContext,
) -> Result<Arc<dyn OrderExecutor>, ConfigError> {
    if settings.debug.dry_run {
        warn!("⚠️ Dry run enabled: orders will be logged, not sent");
        return Ok(Arc::new(DryRunExecutor::new(ctx)));
    }

    let credentials = settings.resolve_credentials()?;
    let executor = MexcExecutor::new(credentials, &settings.mode, ctx)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    info!(
        environment = %settings.mode.environment,
        market_type = %settings.mode.market_type,
        "✅ MEXC executor ready"
    );
    Ok(Arc::new(executor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;

    #[test]
    fn test_dry_run_selected_when_configured() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        let executor = select_executor(&settings, &ExecutionContext::new_system()).unwrap();
        assert_eq!(executor.name(), "dry-run");
    }

    #[test]
    fn test_live_selects_mexc() {
        let raw = SAMPLE.replace("dry_run = true", "dry_run = false");
        let settings = Settings::from_toml_str(&raw).unwrap();
        let executor = select_executor(&settings, &ExecutionContext::new_system()).unwrap();
        assert_eq!(executor.name(), "mexc-rest");
    }

    #[test]
    fn test_unresolvable_secret_fails_startup() {
        let raw = SAMPLE
            .replace("dry_run = true", "dry_run = false")
            .replace(
                r#"api_secret = "secret""#,
                r#"api_secret = "env:SIGNAL_TEST_UNSET_SECRET_XYZ""#,
            );
        let settings = Settings::from_toml_str(&raw).unwrap();
        let err = select_executor(&settings, &ExecutionContext::new_system()).err();
        assert!(matches!(err, Some(ConfigError::Secret(_))));
    }
}
