use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use transdovic_infra::backend::HttpBackend;
use transdovic_session::{
    AuthorizationContext, AuthorizationSnapshot, BackendConfig, Credentials, NavEntry, navigation,
};

#[derive(Serialize)]
struct Report<'a> {
    snapshot: &'a AuthorizationSnapshot,
    navigation: Vec<NavEntry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    transdovic_observability::init();

    let config = BackendConfig::from_env().context("loading backend configuration")?;
    let credentials = Credentials::from_env().context("loading sign-in credentials")?;
    tracing::info!(url = %config.url, timeout = ?config.timeout, "connecting to backend");

    let backend = HttpBackend::new(config.url, config.anon_key, config.timeout)
        .context("building HTTP backend")?;
    let context = AuthorizationContext::start(Arc::new(backend));

    let snapshot = match credentials {
        Some(Credentials { email, password }) => {
            context.wait_until_loaded().await?;
            context
                .sign_in_with_password(&email, &password)
                .await
                .context("signing in")?;
            context
                .wait_for(|s| s.is_authenticated() && !s.loading)
                .await?
        }
        None => {
            tracing::info!("TRANSDOVIC_EMAIL/TRANSDOVIC_PASSWORD not set; reporting anonymous state");
            context.wait_until_loaded().await?
        }
    };

    let report = Report {
        navigation: navigation(&snapshot),
        snapshot: &snapshot,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if snapshot.is_authenticated() {
        if let Err(e) = context.sign_out().await {
            tracing::warn!(error = %e, "sign-out failed");
        }
    }
    context.shutdown().await;
    Ok(())
}
