//! `BoardSync` CLI -- drive a shared task board from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Print the board
//! boardsync --token alice-token ls
//!
//! # Create a task
//! boardsync --token alice-token add "Write the report"
//!
//! # Move a task (id prefix, destination column, destination index)
//! boardsync --token alice-token mv 0192f3a1 done 0
//!
//! # Stream the board live
//! boardsync --token alice-token watch
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};

use boardsync::board::{Applied, Dispatcher, LocalCache, apply_event};
use boardsync::config::{ClientCliArgs, ClientConfig};
use boardsync::net::{NetCommand, NetEvent, spawn_net};
use boardsync_proto::task::{TaskId, TaskStatus};
use boardsync_proto::wire::BoardEvent;

/// How long a one-shot command lingers for a rejection after sending
/// its request. Confirmation itself arrives via broadcast and needs no
/// waiting.
const LINGER: Duration = Duration::from_millis(600);

#[derive(Parser, Debug)]
#[command(version, about = "BoardSync task board client")]
struct Cli {
    #[command(flatten)]
    connection: ClientCliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board.
    Ls,
    /// Create a task in the todo column.
    Add {
        /// Title of the new task.
        title: String,
    },
    /// Move a task to a column position.
    Mv {
        /// Task id or unique id prefix.
        task: String,
        /// Destination column: todo, in_progress, or done.
        status: TaskStatus,
        /// Destination index within the column.
        index: u32,
    },
    /// Delete a task.
    Rm {
        /// Task id or unique id prefix.
        task: String,
    },
    /// Rename a task.
    Edit {
        /// Task id or unique id prefix.
        task: String,
        /// New title.
        title: String,
    },
    /// Stream the board live, reprinting on every change.
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::load(&cli.connection) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Watch => watch(&config).await,
        other => one_shot(other, &config).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Connects, syncs the snapshot, runs one command, and lingers briefly
/// for a rejection.
async fn one_shot(command: Command, config: &ClientConfig) -> Result<(), String> {
    let (cmd_tx, mut evt_rx, actor) = spawn_net(config.net_config())
        .await
        .map_err(|e| e.to_string())?;
    let mut cache = LocalCache::new();
    wait_for_snapshot(&mut evt_rx, &mut cache).await?;

    let dispatcher = Dispatcher::new(actor);
    let request = match command {
        Command::Ls => {
            print_board(&cache);
            let _ = cmd_tx.send(NetCommand::Shutdown).await;
            return Ok(());
        }
        Command::Add { title } => dispatcher
            .create_task(&mut cache, &title)
            .map_err(|e| e.to_string())?,
        Command::Mv {
            task,
            status,
            index,
        } => {
            let id = resolve_task(&cache, &task)?;
            dispatcher
                .move_task(&mut cache, &id, status, index)
                .map_err(|e| e.to_string())?
        }
        Command::Rm { task } => {
            let id = resolve_task(&cache, &task)?;
            dispatcher
                .delete_task(&mut cache, &id)
                .map_err(|e| e.to_string())?
        }
        Command::Edit { task, title } => {
            let id = resolve_task(&cache, &task)?;
            dispatcher
                .edit_title(&mut cache, &id, &title)
                .map_err(|e| e.to_string())?
        }
        // Routed to watch() before we get here.
        Command::Watch => unreachable!("watch is handled separately"),
    };

    cmd_tx
        .send(NetCommand::Send(request))
        .await
        .map_err(|_| "sync channel closed".to_string())?;
    linger_for_rejection(&mut evt_rx, &mut cache).await?;
    let _ = cmd_tx.send(NetCommand::Shutdown).await;
    print_board(&cache);
    Ok(())
}

/// Streams the board, reconnecting with a fixed backoff. Each new
/// connection starts from an empty cache so the fresh snapshot is the
/// sole source of truth.
async fn watch(config: &ClientConfig) -> Result<(), String> {
    let mut first_attempt = true;
    loop {
        match spawn_net(config.net_config()).await {
            Ok((_cmd_tx, mut evt_rx, actor)) => {
                first_attempt = false;
                println!("connected as {actor}");
                let mut cache = LocalCache::new();
                while let Some(event) = evt_rx.recv().await {
                    match event {
                        NetEvent::Board(BoardEvent::Error { code, reason }) => {
                            eprintln!("server error: {code}: {reason}");
                        }
                        NetEvent::Board(event) => {
                            if apply_event(&mut cache, &event) == Applied::Changed {
                                println!();
                                print_board(&cache);
                            }
                        }
                        NetEvent::Disconnected => {
                            eprintln!("sync channel lost, reconnecting...");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                if first_attempt {
                    return Err(e.to_string());
                }
                eprintln!("reconnect failed: {e}");
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

/// Drains events until the connect-time snapshot has been applied.
async fn wait_for_snapshot(
    evt_rx: &mut tokio::sync::mpsc::Receiver<NetEvent>,
    cache: &mut LocalCache,
) -> Result<(), String> {
    loop {
        match evt_rx.recv().await {
            Some(NetEvent::Board(event)) => {
                let is_snapshot = matches!(event, BoardEvent::TaskBulkUpdate { .. });
                apply_event(cache, &event);
                if is_snapshot {
                    return Ok(());
                }
            }
            Some(NetEvent::Disconnected) | None => {
                return Err("disconnected before the initial snapshot".to_string());
            }
        }
    }
}

/// Drains events for a short window after sending a request, surfacing
/// a server rejection if one comes back.
async fn linger_for_rejection(
    evt_rx: &mut tokio::sync::mpsc::Receiver<NetEvent>,
    cache: &mut LocalCache,
) -> Result<(), String> {
    let deadline = tokio::time::sleep(LINGER);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return Ok(()),
            event = evt_rx.recv() => match event {
                Some(NetEvent::Board(BoardEvent::Error { code, reason })) => {
                    // Keep draining: the corrective bulk follows the
                    // rejection and rolls our optimistic guess back.
                    drain_briefly(evt_rx, cache).await;
                    return Err(format!("{code}: {reason}"));
                }
                Some(NetEvent::Board(event)) => {
                    apply_event(cache, &event);
                }
                Some(NetEvent::Disconnected) | None => return Ok(()),
            },
        }
    }
}

/// Applies whatever arrives within a short grace window.
async fn drain_briefly(
    evt_rx: &mut tokio::sync::mpsc::Receiver<NetEvent>,
    cache: &mut LocalCache,
) {
    let deadline = tokio::time::sleep(Duration::from_millis(200));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return,
            event = evt_rx.recv() => match event {
                Some(NetEvent::Board(event)) => {
                    apply_event(cache, &event);
                }
                Some(NetEvent::Disconnected) | None => return,
            },
        }
    }
}

/// Resolves a task reference: a full id, or a unique id prefix.
fn resolve_task(cache: &LocalCache, reference: &str) -> Result<TaskId, String> {
    if let Ok(id) = reference.parse::<TaskId>()
        && cache.get(&id).is_some()
    {
        return Ok(id);
    }
    let matches = cache.find_by_id_prefix(reference);
    match matches.len() {
        0 => Err(format!("no task matches {reference:?}")),
        1 => Ok(matches[0].id.clone()),
        n => Err(format!("{reference:?} is ambiguous ({n} matches)")),
    }
}

/// Prints the board column by column.
fn print_board(cache: &LocalCache) {
    for status in TaskStatus::ALL {
        let tasks = cache.column(status);
        println!("{status} ({})", tasks.len());
        for task in tasks {
            let id = task.id.to_string();
            println!("  {}. {}  [{}] @{}", task.order, task.title, &id[..8], task.owner);
        }
    }
}
