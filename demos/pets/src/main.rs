//! Pets demo: one REST collection bound to reducer-driven state.
//!
//! # Usage
//!
//! Run in local mode (no server, operations apply directly to state):
//! ```bash
//! cargo run --bin pets-demo
//! ```
//!
//! Run against a live API exposing `/pets/`:
//! ```bash
//! PETS_API=http://localhost:3000/ cargo run --bin pets-demo
//! ```

use anyhow::Context;
use composable_rest::{
    ApiConfig, Config, ConfigOverride, HttpTransport, Resource, ResolvedRequest, RestAction, RestEnvironment, RestState,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pets = match std::env::var("PETS_API") {
        Ok(domain) => {
            info!(%domain, "Using live API");
            let transport = HttpTransport::with_timeout(Duration::from_secs(10)).context("building HTTP client")?;
            Resource::list(
                Config::with_api(ApiConfig::new(domain, "pets")),
                RestEnvironment::new(Arc::new(transport)),
            )
        },
        Err(_) => {
            info!("PETS_API not set, running in local mode");
            Resource::list(Config::default(), RestEnvironment::local())
        },
    };

    // Log every transition the way a UI adapter would observe them
    let mut transitions = pets.subscribe();
    tokio::spawn(async move {
        while let Ok(action) = transitions.recv().await {
            tracing::debug!(action = action.name(), "Transition");
            if let RestAction::Settled(settlement) = action {
                tracing::debug!(status = settlement.response.status, "Response");
            }
        }
    });

    let report = ConfigOverride::default()
        .with_after_failure(|request: &ResolvedRequest| {
            tracing::warn!(url = %request.url, status = request.status, "Request failed");
        });

    if pets.config().is_remote() {
        pets.index(Some(&report)).await.context("listing pets")?;
        print_state("After index", &pets.state().await);
    }

    pets.create(json!({"name": "Fifi", "type": "dog"}), Some(&report))
        .await
        .context("creating Fifi")?;
    pets.create(json!({"name": "Milo", "type": "cat"}), Some(&report))
        .await
        .context("creating Milo")?;
    print_state("After create", &pets.state().await);

    let state = pets.state().await;
    if let Some(fifi) = state.items().and_then(|items| items.iter().find(|pet| pet["name"] == "Fifi")) {
        let mut renamed = fifi.clone();
        renamed["name"] = json!("Fififi");
        pets.update(renamed, Some(&report)).await.context("renaming Fifi")?;
    }
    print_state("After update", &pets.state().await);

    let state = pets.state().await;
    if let Some(milo) = state.items().and_then(|items| items.iter().find(|pet| pet["name"] == "Milo")) {
        pets.del(milo.clone(), Some(&report)).await.context("deleting Milo")?;
    }
    print_state("After delete", &pets.state().await);

    pets.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

fn print_state(label: &str, state: &RestState) {
    println!("\n{label}:");
    for pet in state.items().unwrap_or_default() {
        println!("  {pet}");
    }
    println!(
        "  requests: {}, fetching: {}, error: {}",
        state.requests().len(),
        state.is_fetching(),
        state.error_message().unwrap_or("none")
    );
}
