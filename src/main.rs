use std::collections::BTreeSet;
use std::env;
use std::process::ExitCode;

use idem_ledger::csv::{read_requests, write_balances};
use idem_ledger::store::TimeoutStore;
use idem_ledger::{Engine, LedgerConfig, MemoryStore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        error!("usage: idem-ledger <requests.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = match LedgerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let rows = match read_requests(path.clone()) {
        Ok(rows) => rows,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let store = MemoryStore::provisioned(&config).await;
    let engine = Engine::new(TimeoutStore::new(store, config.request_timeout), config);
    let (tx_sender, tx_receiver) = tokio::sync::mpsc::channel(16);

    let reader = tokio::spawn(async move {
        let mut users = BTreeSet::new();
        for result in rows {
            match result {
                Ok(request) => {
                    if let Some(user) = request.user_id.as_ref().filter(|u| !u.trim().is_empty()) {
                        users.insert(user.clone());
                    }
                    if tx_sender.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
        users
    });

    let stats = engine.run(ReceiverStream::new(tx_receiver)).await;
    info!(applied = stats.applied, rejected = stats.rejected, "run complete");

    let users = match reader.await {
        Ok(users) => users,
        Err(e) => {
            error!("reader task failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let lookup = engine.balances();
    let mut balances = Vec::with_capacity(users.len());
    for user in &users {
        match lookup.get_balance(user).await {
            Ok(balance) => balances.push((user.as_str(), balance)),
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Err(e) = write_balances(std::io::stdout().lock(), balances) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
