use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use colored::*;
use reconkit::{
    config::AppConfig,
    error::ErrorKind,
    service::{registry, ReconService},
    utils::Logger,
    ToolResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};

/// Requests `serve` runs at once unless `--max-requests` says otherwise
const DEFAULT_MAX_REQUESTS: &str = "4";

/// One `serve` request line
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    params: Value,
}

/// One `serve` response line
#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    result: ToolResult,
    finished_at: String,
}

fn cli() -> Command {
    Command::new("reconkit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scope-guarded recon and enumeration tools behind one JSON interface")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file (default: ~/.reconkit.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Disable colored status lines"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("tools").about("List available operations"))
        .subcommand(
            Command::new("call")
                .about("Run one operation and print its result envelope")
                .arg(Arg::new("name").required(true).help("Operation name, e.g. recon.ping_sweep"))
                .arg(
                    Arg::new("params")
                        .short('p')
                        .long("params")
                        .value_name("JSON")
                        .default_value("{}")
                        .help("Parameters as a JSON object"),
                )
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Pretty-print the envelope"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Read JSON-lines requests {id, tool, params} on stdin, answer on stdout")
                .arg(
                    Arg::new("max-requests")
                        .long("max-requests")
                        .value_name("N")
                        .default_value(DEFAULT_MAX_REQUESTS)
                        .value_parser(clap::value_parser!(usize))
                        .help("Requests executed concurrently; further lines wait"),
                ),
        )
}

fn list_tools() {
    for op in registry::OPERATIONS {
        println!("{:<34} {} (requires: {})", op.name.bright_cyan(), op.summary, op.required);
    }
}

fn status_line(result: &ToolResult) {
    match &result.error {
        None => eprintln!("{} {} completed", "[✓]".bright_green(), result.tool.bright_cyan()),
        Some(error) => eprintln!(
            "{} {} failed ({}): {}",
            "[!]".bright_red(),
            result.tool.bright_yellow(),
            error.kind,
            error.message
        ),
    }
}

async fn call(service: &ReconService, name: &str, params: &str, pretty: bool) -> anyhow::Result<bool> {
    let params: Value = serde_json::from_str(params).context("--params is not valid JSON")?;
    let result = service.dispatch(name, params).await;
    status_line(&result);

    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", rendered);
    Ok(result.success)
}

fn response_line(id: Value, result: ToolResult) -> String {
    let response = Response {
        id,
        result,
        finished_at: chrono::Utc::now().to_rfc3339(),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        log::error!("Failed to serialise response: {}", e);
        json!({
            "id": Value::Null,
            "result": {"success": false, "tool": "", "error": {"kind": ErrorKind::Internal, "message": e.to_string()}},
        })
        .to_string()
    })
}

/// Answer JSON-lines requests from `input` on `output`.
///
/// At most `max_requests` run at once: a permit is taken before a request
/// task is spawned, so reading pauses while the limit is reached. A single
/// writer task owns `output`.
async fn serve<R, W>(service: ReconService, input: R, output: W, max_requests: usize) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            if output.write_all(line.as_bytes()).await.is_err() || output.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = output.flush().await;
        }
    });

    let permits = Arc::new(Semaphore::new(max_requests.max(1)));
    let mut lines = input.lines();
    log::info!(
        "Serving {} operations, up to {} requests at once",
        registry::OPERATIONS.len(),
        max_requests.max(1)
    );

    while let Some(line) = lines.next_line().await.context("failed to read requests")? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let result = ToolResult::failure("", ErrorKind::InvalidParams, format!("malformed request: {}", e));
                let _ = tx.send(response_line(Value::Null, result)).await;
                continue;
            }
        };

        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("request limiter closed")?;
        let service = service.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = service.dispatch(&request.tool, request.params).await;
            drop(permit);
            status_line(&result);
            let _ = tx.send(response_line(request.id, result)).await;
        });
    }

    // input closed: the writer ends once every in-flight request has answered
    drop(tx);
    writer.await.context("output writer failed")?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    Logger::init(Logger::level_for(matches.get_count("verbose")));
    if matches.get_flag("no-color") {
        colored::control::set_override(false);
    }

    let config_path = matches.get_one::<PathBuf>("config");
    let config = match AppConfig::load(config_path.map(PathBuf::as_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(2);
        }
    };

    let outcome = match matches.subcommand() {
        Some(("tools", _)) => {
            list_tools();
            Ok(true)
        }
        Some(("call", sub)) => {
            let service = ReconService::new(config);
            let name = sub.get_one::<String>("name").map(String::as_str).unwrap_or_default();
            let params = sub.get_one::<String>("params").map(String::as_str).unwrap_or("{}");
            call(&service, name, params, sub.get_flag("pretty")).await
        }
        Some(("serve", sub)) => {
            let max_requests = sub.get_one::<usize>("max-requests").copied().unwrap_or(4);
            let input = BufReader::new(tokio::io::stdin());
            serve(ReconService::new(config), input, tokio::io::stdout(), max_requests)
                .await
                .map(|_| true)
        }
        _ => Ok(false),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "[!]".bright_red(), e);
            process::exit(2);
        }
    }
}
