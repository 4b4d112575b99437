use std::sync::Arc;

use tokio::io::BufReader;

use quit_onboarding::cli::Wizard;
use quit_onboarding::config::FunnelConfig;
use quit_onboarding::gateway::{AccountProvisioner, EmailRegistry, HttpGateway, MockGateway};
use quit_onboarding::onboarding::{FileDraftStore, ManagerDeps, OnboardingManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FunnelConfig::from_env();
    config.validate()?;

    // Stdout is the wizard, so logs go to a rolling file.
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "quit-onboarding.log");
    let (log_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(log_writer)
        .with_ansi(false)
        .with_target(false)
        .init();

    eprintln!("🚭 Quit Onboarding v{}", env!("CARGO_PKG_VERSION"));
    if config.offline {
        eprintln!("   Backend: offline (in-process accounts)");
    } else {
        eprintln!("   Backend: {}", config.api_url);
    }
    eprintln!("   Draft: {}", config.draft_path.display());
    eprintln!("   Logs: {}", config.log_dir.display());
    eprintln!("   Type 'back' to go back a step, /quit to exit.\n");

    // ── Gateways ─────────────────────────────────────────────────────────
    let (registry, provisioner): (Arc<dyn EmailRegistry>, Arc<dyn AccountProvisioner>) =
        if config.offline {
            let mock = Arc::new(MockGateway::new());
            (mock.clone(), mock)
        } else {
            let http = Arc::new(HttpGateway::new(&config.api_url, config.http_timeout)?);
            (http.clone(), http)
        };

    let deps = ManagerDeps {
        store: Arc::new(FileDraftStore::new(config.draft_path.clone())),
        registry,
        provisioner,
    };
    let manager = Arc::new(OnboardingManager::resume(config.manager.clone(), deps).await);
    tracing::info!(
        session_id = %manager.session_id(),
        offline = config.offline,
        "Wizard starting"
    );

    let wizard = Wizard::new(
        Arc::clone(&manager),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    let outcome = tokio::select! {
        result = wizard.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            manager.close().await;
            eprintln!("\nInterrupted. Your progress has been saved.");
            None
        }
    };

    match outcome {
        Some(provisioned) => {
            tracing::info!(
                user_id = %provisioned.session.user.id,
                record_id = %provisioned.record.id,
                "Onboarding finished"
            );
        }
        None => tracing::info!("Wizard exited before provisioning"),
    }

    Ok(())
}
