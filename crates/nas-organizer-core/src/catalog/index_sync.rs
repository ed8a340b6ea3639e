use rusqlite::{params, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::error::Result;
use crate::paths::{normalize_posix_path, split_remote_path};
use crate::plan::{OperationKind, Plan};
use crate::storage::models::utc_timestamp;
use crate::storage::queries::dir_prefix;
use crate::storage::Database;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexUpdateStats {
    pub inserted: usize,
    pub deleted: usize,
    pub updated_prefix: usize,
}

fn normalize_root(root: &str) -> String {
    let normalized = normalize_posix_path(root);
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Longest known root containing `path`. `roots` must be sorted longest first.
fn pick_root<'a>(path: &str, roots: &'a [String]) -> Option<&'a str> {
    let path = normalize_posix_path(path);
    roots.iter().map(String::as_str).find(|root| {
        let marker = normalize_root(root);
        marker == "/" || path == marker || path.starts_with(&format!("{}/", marker))
    })
}

fn upsert_row(tx: &Transaction, path: &str, root: &str, scanned_at: &str) -> Result<()> {
    let (dir, name, ext) = split_remote_path(path);
    tx.prepare_cached(
        "INSERT INTO files (path, dir, name, ext, root, scanned_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(path) DO UPDATE SET \
             dir = excluded.dir, name = excluded.name, ext = excluded.ext, \
             root = excluded.root, scanned_at = excluded.scanned_at",
    )?
    .execute(params![path, dir, name, ext, root, scanned_at])?;
    Ok(())
}

fn row_root(tx: &Transaction, path: &str) -> Result<Option<String>> {
    let root = tx
        .prepare_cached("SELECT root FROM files WHERE path = ?1")?
        .query_row(params![path], |row| row.get(0))
        .optional()?;
    Ok(root)
}

/// Rewrite every row below `src_dir` to live below `dst_dir`. Returns the
/// number of rows affected, counted before the update.
fn rewrite_prefix(tx: &Transaction, src_dir: &str, dst_dir: &str, scanned_at: &str) -> Result<usize> {
    let src_prefix = dir_prefix(src_dir);
    let dst_prefix = dir_prefix(dst_dir);

    let affected: i64 = tx
        .prepare_cached("SELECT COUNT(*) FROM files WHERE substr(path, 1, length(?1)) = ?1")?
        .query_row(params![src_prefix], |row| row.get(0))?;
    if affected == 0 {
        return Ok(0);
    }

    tx.prepare_cached(
        "UPDATE OR REPLACE files SET \
             path = ?2 || substr(path, length(?1) + 1), \
             dir = CASE WHEN dir = ?3 THEN ?4 ELSE ?2 || substr(dir, length(?1) + 1) END, \
             scanned_at = ?5 \
         WHERE substr(path, 1, length(?1)) = ?1",
    )?
    .execute(params![
        src_prefix,
        dst_prefix,
        src_dir.trim_end_matches('/'),
        dst_dir.trim_end_matches('/'),
        scanned_at
    ])?;
    Ok(affected as usize)
}

/// Mirror the selected operations of a successfully executed plan into the
/// catalog, inside one transaction.
///
/// `roots_hint` adds root markers that may not be cataloged yet. Callers treat
/// a returned error as a warning: the remote run has already completed.
pub fn apply_plan_to_index(db: &Database, plan: &Plan, roots_hint: &[String]) -> Result<IndexUpdateStats> {
    let mut roots = db.distinct_roots(5000)?;
    for hint in roots_hint {
        if !hint.is_empty() && !roots.contains(hint) {
            roots.push(hint.clone());
        }
    }
    roots.sort_by_key(|r| std::cmp::Reverse(normalize_root(r).len()));

    let scanned_at = utc_timestamp();
    let mut stats = IndexUpdateStats::default();
    let tx = db.connection().unchecked_transaction()?;

    for op in plan.selected_operations() {
        match op.kind {
            OperationKind::Move | OperationKind::Rename => {
                let (Some(src), Some(dst)) = (op.src.as_deref(), op.dst.as_deref()) else {
                    continue;
                };
                if src.is_empty() || dst.is_empty() {
                    continue;
                }

                if let Some(old_root) = row_root(&tx, src)? {
                    tx.prepare_cached("DELETE FROM files WHERE path = ?1")?
                        .execute(params![src])?;
                    stats.deleted += 1;
                    let root = pick_root(dst, &roots).map(str::to_string).unwrap_or(old_root);
                    upsert_row(&tx, dst, &root, &scanned_at)?;
                    stats.inserted += 1;
                    continue;
                }

                let src_dir = normalize_posix_path(src);
                let dst_dir = normalize_posix_path(dst);
                if src_dir != dst_dir && src_dir != "/" {
                    let rewritten = rewrite_prefix(&tx, &src_dir, &dst_dir, &scanned_at)?;
                    if rewritten > 0 {
                        debug!("Rewrote {} rows from {} to {}", rewritten, src_dir, dst_dir);
                    }
                    stats.updated_prefix += rewritten;
                }
            }
            OperationKind::Link | OperationKind::Copy => {
                let Some(dst) = op.dst.as_deref().filter(|d| !d.is_empty()) else {
                    continue;
                };
                let src = op.src.as_deref().filter(|s| !s.is_empty());
                let root = match pick_root(dst, &roots) {
                    Some(root) => root.to_string(),
                    None => match src {
                        Some(src) => match row_root(&tx, src)? {
                            Some(root) => root,
                            None => pick_root(src, &roots).unwrap_or_default().to_string(),
                        },
                        None => String::new(),
                    },
                };
                upsert_row(&tx, dst, &root, &scanned_at)?;
                stats.inserted += 1;
            }
            OperationKind::Mkdir => {}
        }
    }

    tx.commit()?;
    info!(
        "Catalog updated: {} inserted, {} deleted, {} rewritten by prefix",
        stats.inserted, stats.deleted, stats.updated_prefix
    );
    Ok(stats)
}
