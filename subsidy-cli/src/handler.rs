//! Command Handlers
//!
//! Handler functions for CLI commands.

use crate::client::{SubsidyClient, TransactionFilter};
use crate::commands::{subsidy::SubsidyCommands, transaction::TransactionCommands, Cli, Commands, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subsidy_api::{ApiConfig, AppState, AuthConfig, ClientConfig, Collaborators, CreateTransactionRequest, MetricsConfig};
use subsidy_core::{InMemoryLedgerStore, LedgerStore, NewSubsidy};

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    let format = cli.format;
    match cli.command {
        Commands::Start { host, port, subsidies } => handle_start(host, port, subsidies).await,
        command => {
            let client = SubsidyClient::new(&cli.api_url, cli.token)?;
            match command {
                Commands::Health => handle_health(&client, format).await,
                Commands::Subsidy(cmd) => handle_subsidy(&client, cmd, format).await,
                Commands::Transaction(cmd) => handle_transaction(&client, cmd, format).await,
                Commands::Metadata { content, enterprise } => {
                    let metadata = client.content_metadata(&content, &enterprise).await?;
                    output::print_metadata(&metadata, format);
                    Ok(())
                }
                Commands::Start { .. } => Err(CliError::invalid_arg("start does not talk to a remote API")),
            }
        }
    }
}

/// Read subsidies to provision from a JSON array of `NewSubsidy`
pub fn load_seed_file(path: &Path) -> CliResult<Vec<NewSubsidy>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Provision seed subsidies into a ledger
pub async fn seed_ledger(ledger: &dyn LedgerStore, subsidies: Vec<NewSubsidy>) -> CliResult<usize> {
    let mut created = 0;
    for new in subsidies {
        let subsidy = ledger.create_subsidy(new).await?;
        tracing::info!(
            subsidy_uuid = %subsidy.uuid,
            enterprise_customer_uuid = %subsidy.enterprise_customer_uuid,
            ledger_uuid = %subsidy.ledger_uuid,
            "Provisioned subsidy"
        );
        created += 1;
    }
    Ok(created)
}

/// Bind address: `--host` / `--port` replace the matching half of the configured address
fn listen_addr(host: Option<String>, port: Option<u16>, configured: &str) -> String {
    if host.is_none() && port.is_none() {
        return configured.to_string();
    }
    let (configured_host, configured_port) = match configured.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.to_string()),
        None => (configured.to_string(), subsidy_api::DEFAULT_PORT.to_string()),
    };
    format!(
        "{}:{}",
        host.unwrap_or(configured_host),
        port.map(|p| p.to_string()).unwrap_or(configured_port)
    )
}

/// Handle starting the API server
async fn handle_start(host: Option<String>, port: Option<u16>, subsidies: Option<PathBuf>) -> CliResult<()> {
    let mut api_config = ApiConfig::from_env();
    api_config.listen_addr = listen_addr(host, port, &api_config.listen_addr);
    let auth_config =
        AuthConfig::from_env().map_err(|e| CliError::config(format!("SUBSIDY_API_TOKENS: {}", e)))?;
    let client_config = ClientConfig::from_env();
    let metrics_config = MetricsConfig::from_env();

    if auth_config.enabled && auth_config.tokens.is_empty() {
        tracing::warn!("Authentication is enabled but SUBSIDY_API_TOKENS is empty; every API call will be rejected");
    }
    if !auth_config.enabled {
        tracing::warn!("Authentication disabled; every caller acts as an operator");
    }

    subsidy_api::init_metrics(&metrics_config).map_err(CliError::server)?;

    let ledger = Arc::new(InMemoryLedgerStore::new());
    if let Some(path) = subsidies {
        let seed = load_seed_file(&path)?;
        let count = seed_ledger(ledger.as_ref(), seed).await?;
        tracing::info!(count, path = %path.display(), "Seeded subsidies");
    }

    let collaborators = Collaborators::http(&client_config).map_err(|e| CliError::config(e.to_string()))?;
    tracing::info!(
        catalog = %client_config.catalog_base_url,
        lms = %client_config.lms_base_url,
        "Configured collaborators"
    );

    let state = AppState::with_config(api_config, ledger, collaborators).with_auth(auth_config);

    subsidy_api::start_server(state)
        .await
        .map_err(|e| CliError::server(format!("Server error: {}", e)))
}

/// Handle health check command
async fn handle_health(client: &SubsidyClient, format: OutputFormat) -> CliResult<()> {
    let health = client.health().await?;
    output::print_health(&health, format);
    Ok(())
}

/// Handle subsidy commands
async fn handle_subsidy(client: &SubsidyClient, cmd: SubsidyCommands, format: OutputFormat) -> CliResult<()> {
    match cmd {
        SubsidyCommands::List {
            enterprise,
            page,
            page_size,
        } => {
            let subsidies = client.list_subsidies(enterprise.as_deref(), page, page_size).await?;
            output::print_subsidies(&subsidies, format);
        }
        SubsidyCommands::Get { uuid } => {
            let subsidy = client.get_subsidy(&uuid).await?;
            output::print_subsidy(&subsidy, format);
        }
    }
    Ok(())
}

/// Handle transaction commands
async fn handle_transaction(client: &SubsidyClient, cmd: TransactionCommands, format: OutputFormat) -> CliResult<()> {
    match cmd {
        TransactionCommands::Create {
            subsidy,
            learner_id,
            content_key,
            access_policy,
            idempotency_key,
        } => {
            let request = CreateTransactionRequest {
                subsidy_uuid: Some(subsidy),
                learner_id: Some(serde_json::Value::from(learner_id)),
                content_key: Some(content_key),
                access_policy_uuid: Some(access_policy),
                idempotency_key,
            };
            let tx = client.create_transaction(&request).await?;
            output::print_transaction(&tx, format);
        }
        TransactionCommands::Get { uuid } => {
            let tx = client.get_transaction(&uuid).await?;
            output::print_transaction(&tx, format);
        }
        TransactionCommands::List {
            subsidy,
            learner_id,
            content_key,
            page,
            page_size,
        } => {
            let filter = TransactionFilter {
                subsidy_uuid: subsidy,
                lms_user_id: learner_id,
                content_key,
                page,
                page_size,
            };
            let transactions = client.list_transactions(&filter).await?;
            output::print_transactions(&transactions, format);
        }
        TransactionCommands::Reverse { uuid } => {
            let tx = client.reverse_transaction(&uuid).await?;
            output::print_transaction(&tx, format);
        }
    }
    Ok(())
}
