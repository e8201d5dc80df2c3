use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use editor_core::{
    normalizer::{normalize_payload, to_layout_payload},
    Collaborators, EditorSession, PageContext, SaveStatus,
};
use serde_json::json;
use shared::{
    domain::{BlockContent, BlockId, BlockType, Breakpoint, PageSummary, UserId},
    handle::PageHandle,
};
use storage::{Storage, StorageBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "pagectl", about = "Inspect and edit responsive block pages")]
struct Cli {
    #[arg(long)]
    database_url: Option<String>,
    /// Acting user id; mutations require the page owner.
    #[arg(long = "as")]
    user_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreatePage {
        handle: String,
        #[arg(long)]
        title: Option<String>,
    },
    AddBlock {
        handle: String,
        kind: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Print the normalised blocks and both breakpoint layouts as JSON.
    Show {
        handle: String,
    },
    /// Resize to a stored-size label such as 4x2.
    Resize {
        handle: String,
        block_id: String,
        size: String,
        #[arg(long)]
        mobile: bool,
    },
    /// Move a block to canvas column `x`, row `y`.
    Move {
        handle: String,
        block_id: String,
        x: i64,
        y: i64,
        #[arg(long)]
        mobile: bool,
    },
    Reorder {
        handle: String,
        active_id: String,
        over_id: String,
    },
    Delete {
        handle: String,
        block_id: String,
    },
    /// Normalise a layout payload file offline.
    Normalize {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }
    if let Some(user_id) = cli.user_id {
        settings.user_id = Some(user_id);
    }

    if let Command::Normalize { file } = &cli.command {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let payload: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not JSON", file.display()))?;
        let blocks = normalize_payload(&payload);
        println!("{}", serde_json::to_string_pretty(&to_layout_payload(&blocks)?)?);
        return Ok(());
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open {database_url}"))?;

    match cli.command {
        Command::CreatePage { handle, title } => {
            let handle = PageHandle::parse(&handle)?;
            let owner = acting_user(&settings)?;
            let page = storage
                .create_page(&handle, &owner, title.as_deref())
                .await?;
            println!("created page_id={} handle={}", page.page_id, page.handle);
        }
        Command::AddBlock {
            handle,
            kind,
            content,
            url,
            title,
        } => {
            let block_type: BlockType = kind.parse()?;
            let session = open_session(&storage, &settings, &handle).await?;
            let temp = session.create_placeholder(block_type).await?;
            let data = BlockContent {
                content,
                url,
                title,
                ..BlockContent::default()
            };
            let block = session.commit_placeholder(&temp, data).await?;
            println!("created block_id={}", block.id);
            finish(session).await?;
        }
        Command::Show { handle } => {
            let session = open_session(&storage, &settings, &handle).await?;
            let blocks = session.lifecycle().blocks().await;
            let layouts = session.layouts().await;
            let mut by_grid = serde_json::Map::new();
            for breakpoint in Breakpoint::ALL {
                by_grid.insert(
                    breakpoint.grid_key().to_string(),
                    serde_json::to_value(layouts.get(breakpoint))?,
                );
            }
            let out = json!({
                "page": session.page().page_id,
                "handle": session.page().handle,
                "editable": session.page().is_owner,
                "blocks": blocks,
                "layouts": by_grid,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Resize {
            handle,
            block_id,
            size,
            mobile,
        } => {
            let session = open_session(&storage, &settings, &handle).await?;
            enter_breakpoint(&session, mobile).await;
            session.resize_label(&BlockId::new(block_id), &size).await?;
            finish(session).await?;
        }
        Command::Move {
            handle,
            block_id,
            x,
            y,
            mobile,
        } => {
            let session = open_session(&storage, &settings, &handle).await?;
            enter_breakpoint(&session, mobile).await;
            session.move_block(&BlockId::new(block_id), x, y).await?;
            finish(session).await?;
        }
        Command::Reorder {
            handle,
            active_id,
            over_id,
        } => {
            let session = open_session(&storage, &settings, &handle).await?;
            let orderings = session
                .reorder_blocks(&BlockId::new(active_id), &BlockId::new(over_id))
                .await?;
            for entry in orderings {
                println!("{} {}", entry.ordering, entry.id);
            }
            finish(session).await?;
        }
        Command::Delete { handle, block_id } => {
            let session = open_session(&storage, &settings, &handle).await?;
            if !session.delete_block(&BlockId::new(block_id)).await? {
                println!("delete already pending");
            }
            finish(session).await?;
        }
        Command::Normalize { .. } => {}
    }

    Ok(())
}

fn acting_user(settings: &Settings) -> Result<UserId> {
    settings
        .user_id
        .as_deref()
        .map(UserId::from)
        .ok_or_else(|| anyhow!("no acting user; pass --as or set APP__USER_ID"))
}

async fn find_page(storage: &Storage, raw_handle: &str) -> Result<(PageHandle, PageSummary)> {
    let handle = PageHandle::parse(raw_handle)?;
    let page = storage
        .page_by_handle(handle.as_str())
        .await?
        .ok_or_else(|| anyhow!("no page with handle '{handle}'"))?;
    Ok((handle, page))
}

async fn open_session(storage: &Storage, settings: &Settings, raw_handle: &str) -> Result<EditorSession> {
    let (handle, page) = find_page(storage, raw_handle).await?;
    let user_id = settings.user_id.as_deref().map(UserId::from);
    let is_owner = user_id.as_ref() == Some(&page.owner_id);
    let blocks = normalize_payload(&storage.load_layout_payload(&page.page_id).await?);

    info!(handle = %handle, blocks = blocks.len(), is_owner, "opening page");
    Ok(EditorSession::open(
        PageContext {
            page_id: page.page_id,
            handle,
            is_owner,
        },
        blocks,
        Collaborators::new(Arc::new(StorageBackend::new(storage.clone(), user_id))),
        settings.autosave(),
    ))
}

/// Switches the grid to mobile the way a viewport change would.
async fn enter_breakpoint(session: &EditorSession, mobile: bool) {
    if !mobile {
        return;
    }
    session.handle_breakpoint_change(Breakpoint::Mobile).await;
    let reflow = session.layouts().await.mobile;
    session.handle_layout_change(reflow).await;
}

async fn finish(session: EditorSession) -> Result<()> {
    session.flush().await;
    let status = session.status().get();
    session.close().await;
    if status == SaveStatus::Error {
        bail!("changes could not be saved");
    }
    Ok(())
}
