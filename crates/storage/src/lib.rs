use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use editor_core::normalizer::{apply_metrics, to_layout_payload};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        Block, BlockContent, BlockId, BlockStyle, BlockType, PageId, PageSummary,
        ResponsiveBlockLayout, UserId,
    },
    handle::PageHandle,
    protocol::BlockOrdering,
};

mod backend;
pub use backend::StorageBackend;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_page(
        &self,
        handle: &PageHandle,
        owner_id: &UserId,
        title: Option<&str>,
    ) -> Result<PageSummary> {
        let page_id = PageId::generate();
        sqlx::query(
            "INSERT INTO pages (id, handle, owner_id, title, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(page_id.as_str())
        .bind(handle.as_str())
        .bind(owner_id.as_str())
        .bind(title)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create page '{handle}'"))?;

        Ok(PageSummary {
            page_id,
            handle: handle.to_string(),
            owner_id: owner_id.clone(),
            title: title.map(str::to_string),
        })
    }

    pub async fn page_by_handle(&self, handle: &str) -> Result<Option<PageSummary>> {
        let row = sqlx::query("SELECT id, handle, owner_id, title FROM pages WHERE handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| page_from_row(&row)))
    }

    pub async fn page_by_id(&self, page_id: &PageId) -> Result<Option<PageSummary>> {
        let row = sqlx::query("SELECT id, handle, owner_id, title FROM pages WHERE id = ?")
            .bind(page_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| page_from_row(&row)))
    }

    /// Blocks of a page in ordering, unordered ones last by creation time.
    pub async fn list_blocks(&self, page_id: &PageId) -> Result<Vec<Block>> {
        let rows = sqlx::query(
            "SELECT id, type, data, style, position, ordering, created_at FROM blocks
             WHERE page_id = ?
             ORDER BY ordering IS NULL, ordering, created_at",
        )
        .bind(page_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(block_from_row).collect()
    }

    pub async fn block_page(&self, block_id: &BlockId) -> Result<Option<PageId>> {
        let row = sqlx::query("SELECT page_id FROM blocks WHERE id = ?")
            .bind(block_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| PageId(r.get::<String, _>(0))))
    }

    /// Appends a block after the page's last ordering, sized to its type preset.
    pub async fn insert_block(
        &self,
        page_id: &PageId,
        block_type: BlockType,
        data: &BlockContent,
    ) -> Result<Block> {
        let next_ordering: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(ordering) + 1, 0) FROM blocks WHERE page_id = ?",
        )
        .bind(page_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        let preset = block_type.default_stored_size().to_string();
        let mut block = Block::new(BlockId::generate(), block_type);
        block.content = data.clone();
        block.ordering = Some(next_ordering);
        block.created_at = Some(Utc::now());
        block.style = BlockStyle {
            desktop: Some(preset.clone()),
            mobile: Some(preset),
        };

        sqlx::query(
            "INSERT INTO blocks (id, page_id, type, data, style, position, ordering, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(block.id.as_str())
        .bind(page_id.as_str())
        .bind(block_type.as_str())
        .bind(serde_json::to_string(&block.content)?)
        .bind(serde_json::to_string(&block.style)?)
        .bind(serde_json::to_string(&block.position)?)
        .bind(next_ordering)
        .bind(block.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert {block_type} block on page {page_id}"))?;
        Ok(block)
    }

    pub async fn delete_block(&self, block_id: &BlockId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blocks WHERE id = ?")
            .bind(block_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete block {block_id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes the given orderings for blocks of `page_id`; other ids are ignored.
    pub async fn apply_orderings(&self, page_id: &PageId, orderings: &[BlockOrdering]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in orderings {
            sqlx::query("UPDATE blocks SET ordering = ? WHERE id = ? AND page_id = ?")
                .bind(entry.ordering)
                .bind(entry.id.as_str())
                .bind(page_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await.context("failed to commit block orderings")?;
        Ok(())
    }

    /// Rewrites style sizes and positions from saved placements. Returns the
    /// number of blocks updated; ids not on the page are skipped.
    pub async fn save_layout(
        &self,
        page_id: &PageId,
        placements: &[ResponsiveBlockLayout],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for placement in placements {
            let row = sqlx::query(
                "SELECT id, type, data, style, position, ordering, created_at FROM blocks
                 WHERE id = ? AND page_id = ?",
            )
            .bind(placement.id.as_str())
            .bind(page_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
            let Some(row) = row else {
                continue;
            };

            let block = apply_metrics(block_from_row(&row)?, placement);
            sqlx::query("UPDATE blocks SET style = ?, position = ? WHERE id = ?")
                .bind(serde_json::to_string(&block.style)?)
                .bind(serde_json::to_string(&block.position)?)
                .bind(block.id.as_str())
                .execute(&mut *tx)
                .await?;
            updated += 1;
        }
        tx.commit()
            .await
            .with_context(|| format!("failed to commit layout for page {page_id}"))?;
        Ok(updated)
    }

    /// The page's blocks as a `{layout:{blocks:[..]}}` payload.
    pub async fn load_layout_payload(&self, page_id: &PageId) -> Result<Value> {
        let blocks = self.list_blocks(page_id).await?;
        to_layout_payload(&blocks)
            .with_context(|| format!("failed to encode layout payload for page {page_id}"))
    }
}

fn page_from_row(row: &SqliteRow) -> PageSummary {
    PageSummary {
        page_id: PageId(row.get::<String, _>("id")),
        handle: row.get::<String, _>("handle"),
        owner_id: UserId(row.get::<String, _>("owner_id")),
        title: row.get::<Option<String>, _>("title"),
    }
}

fn block_from_row(row: &SqliteRow) -> Result<Block> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("type")?;
    let block_type = kind
        .parse::<BlockType>()
        .with_context(|| format!("block {id} has an unsupported type"))?;
    let data: String = row.try_get("data")?;
    let style: String = row.try_get("style")?;
    let position: String = row.try_get("position")?;

    Ok(Block {
        block_type,
        content: serde_json::from_str(&data)
            .with_context(|| format!("block {id} has malformed data"))?,
        ordering: row.try_get("ordering")?,
        created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
        style: serde_json::from_str(&style)
            .with_context(|| format!("block {id} has malformed style"))?,
        position: serde_json::from_str(&position)
            .with_context(|| format!("block {id} has malformed position"))?,
        id: BlockId(id),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
