use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Result, Row};
use tracing::debug;

use super::models::{utc_timestamp, CatalogRow};
use super::sqlite::Database;

const ROW_COLUMNS: &str = "path, dir, name, ext, root, scanned_at";

fn row_to_catalog(row: &Row) -> Result<CatalogRow> {
    Ok(CatalogRow {
        path: row.get(0)?,
        dir: row.get(1)?,
        name: row.get(2)?,
        ext: row.get(3)?,
        root: row.get(4)?,
        scanned_at: row.get(5)?,
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn like_escape(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `dir` with exactly one trailing slash, for prefix comparisons.
pub fn dir_prefix(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

/// Appends optional `root = ?` and `ext IN (...)` conditions.
fn push_filters(sql: &mut String, args: &mut Vec<Value>, root: Option<&str>, exts: &[String]) {
    if let Some(root) = root {
        sql.push_str(" AND root = ?");
        args.push(Value::Text(root.to_string()));
    }
    let exts: Vec<String> = exts
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if !exts.is_empty() {
        let marks = vec!["?"; exts.len()].join(", ");
        sql.push_str(&format!(" AND ext IN ({})", marks));
        args.extend(exts.into_iter().map(Value::Text));
    }
}

impl Database {
    // ── Upsert ───────────────────────────────────────────────────

    /// Insert or refresh `paths` under the scan root `root`. Returns the number
    /// of rows written.
    pub fn upsert_paths<S: AsRef<str>>(&self, paths: &[S], root: &str) -> Result<usize> {
        let scanned_at = utc_timestamp();
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO files (path, dir, name, ext, root, scanned_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(path) DO UPDATE SET \
                     dir = excluded.dir, \
                     name = excluded.name, \
                     ext = excluded.ext, \
                     root = excluded.root, \
                     scanned_at = excluded.scanned_at",
            )?;
            for path in paths {
                let path = path.as_ref().trim_end_matches('\r');
                if path.is_empty() {
                    continue;
                }
                let row = CatalogRow::from_path(path, root, &scanned_at);
                count += stmt.execute(params![row.path, row.dir, row.name, row.ext, row.root, row.scanned_at])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} catalog rows under root {}", count, root);
        Ok(count)
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn get_row(&self, path: &str) -> Result<Option<CatalogRow>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM files WHERE path = ?1", ROW_COLUMNS),
                params![path],
                row_to_catalog,
            )
            .optional()
    }

    pub fn count_files(&self, root: Option<&str>) -> Result<i64> {
        let mut sql = "SELECT COUNT(*) FROM files WHERE 1 = 1".to_string();
        let mut args = Vec::new();
        push_filters(&mut sql, &mut args, root, &[]);
        self.connection()
            .query_row(&sql, params_from_iter(args), |row| row.get(0))
    }

    pub fn distinct_roots(&self, limit: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .connection()
            .prepare_cached("SELECT DISTINCT root FROM files ORDER BY root LIMIT ?1")?;
        let roots = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(roots)
    }

    /// Distinct directories, optionally scoped to a root and starting with
    /// `prefix` (literal match).
    pub fn distinct_dirs(&self, root: Option<&str>, prefix: &str, limit: i64) -> Result<Vec<String>> {
        let mut sql = "SELECT DISTINCT dir FROM files WHERE 1 = 1".to_string();
        let mut args = Vec::new();
        push_filters(&mut sql, &mut args, root, &[]);
        if !prefix.is_empty() {
            sql.push_str(" AND substr(dir, 1, length(?)) = ?");
            args.push(Value::Text(prefix.to_string()));
            args.push(Value::Text(prefix.to_string()));
        }
        sql.push_str(" ORDER BY dir LIMIT ?");
        args.push(Value::Integer(limit));

        let mut stmt = self.connection().prepare(&sql)?;
        let dirs = stmt
            .query_map(params_from_iter(args), |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(dirs)
    }

    /// Files directly inside `dir`.
    pub fn files_in_dir(
        &self,
        root: Option<&str>,
        dir: &str,
        exts: &[String],
        limit: i64,
    ) -> Result<Vec<CatalogRow>> {
        let mut sql = format!("SELECT {} FROM files WHERE dir = ?", ROW_COLUMNS);
        let mut args = vec![Value::Text(dir.trim_end_matches('/').to_string())];
        push_filters(&mut sql, &mut args, root, exts);
        sql.push_str(" ORDER BY path LIMIT ?");
        args.push(Value::Integer(limit));

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_catalog)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Paths anywhere below `dir`.
    pub fn files_under_dir(
        &self,
        root: Option<&str>,
        dir: &str,
        exts: &[String],
        limit: i64,
    ) -> Result<Vec<String>> {
        let prefix = dir_prefix(dir);
        let mut sql = "SELECT path FROM files WHERE substr(path, 1, length(?)) = ?".to_string();
        let mut args = vec![Value::Text(prefix.clone()), Value::Text(prefix)];
        push_filters(&mut sql, &mut args, root, exts);
        sql.push_str(" ORDER BY path LIMIT ?");
        args.push(Value::Integer(limit));

        let mut stmt = self.connection().prepare(&sql)?;
        let paths = stmt
            .query_map(params_from_iter(args), |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(paths)
    }

    /// Substring search over name, path and directory.
    pub fn search_files(
        &self,
        root: Option<&str>,
        term: &str,
        exts: &[String],
        limit: i64,
    ) -> Result<Vec<CatalogRow>> {
        let pattern = format!("%{}%", like_escape(term.trim()));
        let mut sql = format!(
            "SELECT {} FROM files WHERE (name LIKE ?1 ESCAPE '\\' OR path LIKE ?1 ESCAPE '\\' \
             OR dir LIKE ?1 ESCAPE '\\')",
            ROW_COLUMNS
        );
        let mut args = vec![Value::Text(pattern)];
        push_filters(&mut sql, &mut args, root, exts);
        sql.push_str(" ORDER BY path LIMIT ?");
        args.push(Value::Integer(limit));

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_catalog)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn rows_for_root(&self, root: &str) -> Result<Vec<CatalogRow>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM files WHERE root = ?1 ORDER BY path",
            ROW_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![root], row_to_catalog)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Exports ──────────────────────────────────────────────────

    /// Write every row of `root` as CSV with a header line.
    pub fn export_root_csv(&self, root: &str, out_path: &Path) -> crate::Result<usize> {
        let rows = self.rows_for_root(root)?;
        let mut writer = csv::Writer::from_path(out_path)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        debug!("Exported {} rows of {} to {}", rows.len(), root, out_path.display());
        Ok(rows.len())
    }

    /// Write every row of `root` as one JSON object per line.
    pub fn export_root_jsonl(&self, root: &str, out_path: &Path) -> crate::Result<usize> {
        let rows = self.rows_for_root(root)?;
        let mut writer = BufWriter::new(File::create(out_path)?);
        for row in &rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!("Exported {} rows of {} to {}", rows.len(), root, out_path.display());
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_escape() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix("/a/b/"), "/a/b/");
        assert_eq!(dir_prefix("/a/b"), "/a/b/");
    }
}
