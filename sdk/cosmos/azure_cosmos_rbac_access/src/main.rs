// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::process::ExitCode;

use azure_cosmos_rbac_access::{
    clients::{ContainerClient, ContainerClientMethods},
    config::SETTINGS_FILE,
    ConfigurationError, CosmosClient, CredentialResolver, OutcomeReporter, Settings,
    ShutdownSignal, StoreError, WorkloadDriver, WorkloadOptions,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const BANNER: &str = "Azure Cosmos DB - RBAC access demo";

/// Failures that prevent the workload from starting.
#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("unable to connect to the account: {0}")]
    Connect(#[source] StoreError),

    #[error("unable to create database '{database}': {source}")]
    Provisioning {
        database: String,
        #[source]
        source: StoreError,
    },

    #[error("container '{container}' in database '{database}' is not accessible: {source}")]
    ContainerUnavailable {
        database: String,
        container: String,
        #[source]
        source: StoreError,
    },
}

fn note(reporter: &mut OutcomeReporter, message: &str) {
    if let Err(error) = reporter.note(message) {
        warn!(%error, "unable to write to stdout");
    }
}

/// Loads settings, authenticates and makes sure the target container is reachable.
async fn connect() -> Result<(ContainerClient, WorkloadOptions), StartupError> {
    let settings = Settings::load(SETTINGS_FILE)?;
    let mode = CredentialResolver::select_mode(&settings.auth_mode);
    info!(
        %mode,
        data_model = ?settings.data_model,
        endpoint = %settings.endpoint,
        region = %settings.region,
        "starting workload"
    );

    let session = CredentialResolver::default().resolve(mode, &settings)?;
    let client = CosmosClient::connect(&session)
        .await
        .map_err(StartupError::Connect)?;

    if session.provisions_database() {
        let created = client
            .create_database_if_not_exists(&settings.database)
            .await
            .map_err(|source| StartupError::Provisioning {
                database: settings.database.clone(),
                source,
            })?;
        info!(database = %settings.database, created, "database ready");
    }

    let unavailable = |source| StartupError::ContainerUnavailable {
        database: settings.database.clone(),
        container: settings.container.clone(),
        source,
    };
    let container = client
        .database_client(&settings.database)
        .container_client(&settings.container)
        .await
        .map_err(unavailable)?;
    let properties = container.read().await.map_err(unavailable)?.item;
    info!(
        container = %properties.id,
        partition_key_paths = ?properties.partition_key.map(|p| p.paths),
        "container ready"
    );

    Ok((container, WorkloadOptions::from_settings(&settings, mode)))
}

async fn watch_ctrl_c(shutdown: ShutdownSignal) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown requested, stopping after the current operation");
            shutdown.trigger();
        }
        Err(error) => warn!(%error, "unable to listen for ctrl-c"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut reporter = OutcomeReporter::stdout();
    note(&mut reporter, &format!("{} ... start", BANNER));

    let (container, options) = match connect().await {
        Ok(connected) => connected,
        Err(e) => {
            error!(error = %e, "startup failed");
            note(&mut reporter, &format!("{} ... Error: {}", BANNER, e));
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownSignal::new();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    let mut driver = WorkloadDriver::new(container, options, reporter, shutdown);
    driver.run().await;
    info!(completed_rounds = driver.round() - 1, "workload stopped");
    ExitCode::SUCCESS
}
