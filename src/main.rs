use std::time::Duration;

use crate::{
    configuration::Configuration, configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface, http::start_server, local_store::LocalStore,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod any_barber;
mod availability;
mod backend;
mod booking;
mod clock;
mod configuration;
mod configuration_handler;
mod database_interface;
mod feasibility;
mod financials;
mod http;
mod local_store;
mod lookup;
mod management;
mod schema;
#[cfg(test)]
mod testutils;
mod time_window;
mod types;
mod walk_in;

const CONNECT_ATTEMPTS: u32 = 5;

fn local_store<C: Configuration>(configuration: &C) -> LocalStore {
    let Some(path) = configuration.seed_file() else {
        return LocalStore::default();
    };
    match LocalStore::load_seed_file(&path) {
        Ok(store) => {
            info!(path = %path.display(), "Seeded in-memory store");
            store
        }
        Err(err) => {
            error!(?err, "Failed to load seed file. Starting with an empty store.");
            LocalStore::default()
        }
    }
}

async fn connect(database_url: &str) -> Option<DatabaseInterface> {
    for attempt in 1..=CONNECT_ATTEMPTS {
        match DatabaseInterface::new(database_url) {
            Ok(backend) => {
                info!("Successfully connected to database");
                return Some(backend);
            }
            Err(err) => {
                error!(?err, attempt, "Failed to establish database connection. Retry in 1 sec.");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
    None
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let configuration = ConfigurationHandler::parse_arguments();
    info!(
        port = configuration.port(),
        offset = %configuration.timezone().offset(),
        "Starting barber booking service"
    );

    let served = match configuration.database_url() {
        Some(database_url) => match connect(&database_url).await {
            Some(backend) => start_server(backend, configuration).await,
            None => {
                warn!("Database unreachable. Falling back to the in-memory store.");
                let backend = local_store(&configuration);
                start_server(backend, configuration).await
            }
        },
        None => {
            let backend = local_store(&configuration);
            start_server(backend, configuration).await
        }
    };

    if let Err(err) = served {
        error!(?err, "Server stopped");
        std::process::exit(1);
    }
}
