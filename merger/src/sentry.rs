use std::sync::Arc;

use config::Environment;
use config::shared::MergerConfig;
use etl::error::EtlError;
use secrecy::ExposeSecret;
use tracing::info;

use crate::APP_VERSION_ENV_NAME;

/// Initializes Sentry when a DSN is configured, returning [`None`] otherwise.
///
/// Panics are captured and every event is tagged with `service=merger` and, when set, the
/// version from `APP_VERSION`.
pub fn init(
    config: &MergerConfig,
    environment: Environment,
) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured for merger, skipping initialization");
        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(sentry_config.dsn.expose_secret().parse()?),
        environment: Some(environment.to_string().into()),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        attach_stacktrace: true,
        ..Default::default()
    });

    let version = std::env::var(APP_VERSION_ENV_NAME);
    sentry::configure_scope(|scope| {
        scope.set_tag("service", "merger");
        scope.set_tag("pipeline_id", config.pipeline.id);
        if let Ok(version) = version {
            scope.set_tag("version", version);
        }
    });

    Ok(Some(guard))
}

/// Reports a failed run. Pipeline errors carry the kinds of every failed table as a tag.
pub fn capture_error(err: &anyhow::Error) {
    match err.downcast_ref::<EtlError>() {
        Some(etl_err) => {
            let kinds: Vec<&str> = etl_err.kinds().iter().map(|kind| kind.as_str()).collect();
            sentry::with_scope(
                |scope| scope.set_tag("error_kinds", kinds.join(",")),
                || sentry::capture_error(etl_err),
            );
        }
        None => {
            sentry::capture_error::<dyn std::error::Error + Send + Sync>(err.as_ref());
        }
    }
}
