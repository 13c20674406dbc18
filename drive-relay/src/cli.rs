/// # drive-relay CLI Interface (Module)
///
/// This module implements the CLI for drive-relay — command parsing,
/// argument validation and component wiring.
///
/// All core business logic (classification, adapters, authorization,
/// dispatch) lives in the [`drive-relay-core`] crate. This module is
/// strictly for CLI glue and orchestration.
///
/// ## How To Use
/// - For command-line users: run the `drive-relay` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// ## Extending
/// When adding subcommands, update [`Commands`] below and keep all
/// non-trivial business logic inside `drive-relay-core`.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use drive_relay_core::auth::AuthorizationFlow;
use drive_relay_core::credentials::FileCredentialStore;
use drive_relay_core::download::{FallbackFetcher, HttpFetcher, MegaFetcher, ShareLinkFetcher};
use drive_relay_core::transfer::{Adapters, TransferDispatcher};
use drive_relay_core::upload::Uploader;

use crate::gateway::{ConsoleReporter, Gateway};
use crate::load_config::load_config;
use crate::oauth::GoogleExchanger;
use crate::upload::GoogleDriveClient;

/// CLI for drive-relay: mirror user-submitted links into an authorized
/// cloud drive.
#[derive(Parser)]
#[clap(
    name = "drive-relay",
    version,
    about = "Relay user-submitted links into an authorized cloud drive"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay with the given config file, reading events from stdin
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config)?;

            let store = Arc::new(FileCredentialStore::new(&config.credentials_dir));
            let exchanger = Arc::new(
                GoogleExchanger::new_from_env()
                    .context("Failed to construct token exchanger from env")?,
            );
            let auth = Arc::new(AuthorizationFlow::new(store, exchanger));

            let adapters = Adapters {
                direct: Arc::new(HttpFetcher::new(&config.download_dir)),
                share_redirect: Arc::new(ShareLinkFetcher::new(&config.download_dir)),
                cloud_drive: Arc::new(MegaFetcher::new(
                    &config.download_dir,
                    config.cloud_source.clone(),
                )),
                fallback: Arc::new(FallbackFetcher::new(&config.download_dir)),
            };
            let uploader = Uploader::new(
                Arc::new(GoogleDriveClient::new()),
                auth.clone(),
                config.drive_folder_name.clone(),
            );
            let dispatcher = Arc::new(TransferDispatcher::new(
                auth.clone(),
                uploader,
                Arc::new(ConsoleReporter),
                adapters,
                config.fallback_enabled,
            ));

            info!(command = "serve", "relay wired, starting gateway");
            Gateway::new(auth, dispatcher).run().await
        }
    }
}
