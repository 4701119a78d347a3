use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use helix_gateway::config::{self, GatewayConfig};
use helix_gateway::infrastructure::file_system::load_records;
use helix_gateway::{
    CancellationToken, EntityKind, HelixClient, IngestionOrchestrator, QueryClient,
    SimilaritySearchGateway, WorkerPool,
};

const USAGE: &str = "Usage:
  helix-gateway search <document|code_example> <query> [limit]
  helix-gateway ingest <records.jsonl[.gz]>";

enum Command {
    Search {
        kind: EntityKind,
        query: String,
        limit: Option<usize>,
    },
    Ingest {
        path: PathBuf,
    },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [cmd, kind, query, rest @ ..] if cmd == "search" && rest.len() <= 1 => {
            let limit = rest
                .first()
                .map(|s| s.parse::<usize>().with_context(|| format!("Invalid limit '{}'", s)))
                .transpose()?;
            Ok(Command::Search {
                kind: kind.parse()?,
                query: query.clone(),
                limit,
            })
        }
        [cmd, path] if cmd == "ingest" => Ok(Command::Ingest {
            path: PathBuf::from(path),
        }),
        _ => Err(anyhow!("{}", USAGE)),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = config::load_config()?;
    log::debug!("Configuration loaded: {:?}", config);

    // The blocking HTTP client owns its own runtime; keep the last handle
    // here so it is dropped outside of ours.
    let client: Arc<dyn QueryClient> = Arc::new(HelixClient::new(&config.client)?);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run(command, config, client.clone()));
    drop(runtime);
    drop(client);
    result
}

async fn run(command: Command, config: GatewayConfig, client: Arc<dyn QueryClient>) -> Result<()> {
    let pool = WorkerPool::new(client, config.ingest.worker_threads);

    match command {
        Command::Search { kind, query, limit } => {
            let gateway = SimilaritySearchGateway::new(pool);
            let limit = limit.unwrap_or(config.search.default_limit);
            let rows = gateway.vector_search(&query, limit, kind).await;
            if rows.is_empty() {
                log::warn!("No results (the search may also have failed; see log above).");
            }
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
            Ok(())
        }
        Command::Ingest { path } => {
            let records = tokio::task::spawn_blocking(move || load_records(&path)).await??;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, finishing in-flight batches...");
                    on_signal.cancel();
                }
            });

            let orchestrator = IngestionOrchestrator::new(pool, config.ingest.clone());
            let summary = orchestrator.ingest_records(records, &cancel).await?;

            for failure in summary.failures() {
                eprintln!(
                    "failed: {} {} chunk {}: {}",
                    failure.record.kind(),
                    failure.record.url(),
                    failure.record.chunk_number(),
                    failure.error
                );
            }
            println!(
                "run {}: {} succeeded, {} failed{}",
                summary.run_id,
                summary.total_succeeded(),
                summary.total_failed(),
                if summary.cancelled { ", cancelled" } else { "" }
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_search_with_limit() {
        match parse_args(&args(&["search", "code_example", "retry loop", "3"])).unwrap() {
            Command::Search { kind, query, limit } => {
                assert_eq!(kind, EntityKind::CodeExample);
                assert_eq!(query, "retry loop");
                assert_eq!(limit, Some(3));
            }
            Command::Ingest { .. } => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_ingest() {
        assert!(matches!(
            parse_args(&args(&["ingest", "records.jsonl"])).unwrap(),
            Command::Ingest { path } if path == PathBuf::from("records.jsonl")
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_input() {
        assert!(parse_args(&args(&["search", "table", "q"])).is_err());
        assert!(parse_args(&args(&["search", "document", "q", "zero"])).is_err());
        assert!(parse_args(&args(&["delete"])).is_err());
    }
}
