use std::fs;

use nas_organizer_core::catalog::{apply_plan_to_index, IndexUpdateStats};
use nas_organizer_core::storage::{CatalogRow, Database};
use nas_organizer_core::{Operation, Plan};

fn seeded() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.upsert_paths(
        &[
            "/volume1/media/Movies/Inception (2010)/Inception.mkv",
            "/volume1/media/Movies/Inception (2010)/Inception.nfo",
            "/volume1/media/Movies/Heat (1995)/Heat.mkv",
            "/volume1/media/Movies/100%_real/clip.mp4",
        ],
        "/volume1/media",
    )
    .unwrap();
    db.upsert_paths(&["/volume2/lib/Movies/Heat.mkv"], "/volume2/lib").unwrap();
    db
}

#[test]
fn test_upsert_is_idempotent_and_reassigns_root() {
    let db = seeded();
    assert_eq!(db.count_files(None).unwrap(), 5);

    db.upsert_paths(&["/volume2/lib/Movies/Heat.mkv"], "/volume2").unwrap();
    assert_eq!(db.count_files(None).unwrap(), 5);
    let row = db.get_row("/volume2/lib/Movies/Heat.mkv").unwrap().unwrap();
    assert_eq!(row.root, "/volume2");
    assert_eq!(row.name, "Heat.mkv");
    assert_eq!(row.ext, "mkv");
    assert_eq!(row.dir, "/volume2/lib/Movies");
}

#[test]
fn test_roots_dirs_and_filters() {
    let db = seeded();
    assert_eq!(db.distinct_roots(10).unwrap(), vec!["/volume1/media", "/volume2/lib"]);
    assert_eq!(db.count_files(Some("/volume1/media")).unwrap(), 4);

    let dirs = db
        .distinct_dirs(Some("/volume1/media"), "/volume1/media/Movies/H", 10)
        .unwrap();
    assert_eq!(dirs, vec!["/volume1/media/Movies/Heat (1995)"]);

    let in_dir = db
        .files_in_dir(None, "/volume1/media/Movies/Inception (2010)/", &["MKV".to_string()], 10)
        .unwrap();
    assert_eq!(in_dir.len(), 1);
    assert_eq!(in_dir[0].name, "Inception.mkv");

    let under = db.files_under_dir(None, "/volume1/media/Movies", &[], 10).unwrap();
    assert_eq!(under.len(), 4);
}

#[test]
fn test_search_treats_wildcards_literally() {
    let db = seeded();
    let hits = db.search_files(None, "100%_", &[], 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "clip.mp4");

    assert!(db.search_files(None, "%", &[], 10).unwrap().len() == 1);
    let heat = db.search_files(Some("/volume1/media"), "heat", &[".mkv".to_string()], 10).unwrap();
    assert_eq!(heat.len(), 1);
}

#[test]
fn test_exports_write_every_row_of_root() {
    let db = seeded();
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("media.csv");
    assert_eq!(db.export_root_csv("/volume1/media", &csv_path).unwrap(), 4);
    let csv_text = fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv_text.lines();
    assert_eq!(lines.next(), Some("path,dir,name,ext,root,scanned_at"));
    assert_eq!(lines.count(), 4);

    let jsonl_path = dir.path().join("media.jsonl");
    assert_eq!(db.export_root_jsonl("/volume1/media", &jsonl_path).unwrap(), 4);
    let rows: Vec<CatalogRow> = fs::read_to_string(&jsonl_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.root == "/volume1/media"));
}

#[test]
fn test_index_sync_for_mixed_plan() {
    let db = seeded();
    let plan = Plan::with_operations(
        "mixed",
        vec![
            Operation::mkdir("/volume1/media/Movies/New", ""),
            Operation::rename(
                "/volume1/media/Movies/Inception (2010)",
                "/volume1/media/Movies/Inception (2010) [tt1375666]",
                "",
            ),
            Operation::move_to("/volume1/media/Movies/Heat (1995)/Heat.mkv", "/volume1/media/Movies/New/Heat.mkv", ""),
            Operation::link("/volume1/media/Movies/New/Heat.mkv", "/volume2/lib/Action/Heat.mkv", "Action"),
            Operation::copy("/volume1/media/Movies/100%_real/clip.mp4", "/volume3/clip.mp4", "").deselected(),
        ],
    );

    let stats = apply_plan_to_index(&db, &plan, &[]).unwrap();
    assert_eq!(stats, IndexUpdateStats { inserted: 2, deleted: 1, updated_prefix: 2 });

    let renamed = db
        .get_row("/volume1/media/Movies/Inception (2010) [tt1375666]/Inception.nfo")
        .unwrap()
        .unwrap();
    assert_eq!(renamed.dir, "/volume1/media/Movies/Inception (2010) [tt1375666]");
    assert!(db.get_row("/volume1/media/Movies/Heat (1995)/Heat.mkv").unwrap().is_none());
    assert_eq!(db.get_row("/volume2/lib/Action/Heat.mkv").unwrap().unwrap().root, "/volume2/lib");
    assert!(db.get_row("/volume3/clip.mp4").unwrap().is_none());
}

#[test]
fn test_index_sync_link_root_falls_back_to_source_row() {
    let db = seeded();
    let plan = Plan::with_operations(
        "link",
        vec![Operation::link("/volume1/media/Movies/Heat (1995)/Heat.mkv", "/volume9/x/Heat.mkv", "")],
    );
    apply_plan_to_index(&db, &plan, &[]).unwrap();
    assert_eq!(db.get_row("/volume9/x/Heat.mkv").unwrap().unwrap().root, "/volume1/media");

    let hinted = Plan::with_operations(
        "link",
        vec![Operation::link("/volume1/media/Movies/Heat (1995)/Heat.mkv", "/volume9/y/Heat.mkv", "")],
    );
    apply_plan_to_index(&db, &hinted, &["/volume9".to_string()]).unwrap();
    assert_eq!(db.get_row("/volume9/y/Heat.mkv").unwrap().unwrap().root, "/volume9");
}

#[test]
fn test_file_database_reopens_with_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let path = path.to_str().unwrap();
    {
        let db = Database::open(path).unwrap();
        db.upsert_paths(&["/r/a.mkv"], "/r").unwrap();
    }
    let db = Database::open(path).unwrap();
    assert_eq!(db.count_files(Some("/r")).unwrap(), 1);
    db.truncate_all().unwrap();
    assert_eq!(db.count_files(None).unwrap(), 0);
}
