//! CLI Page Commands
//!
//! Load a JSON page snapshot into a session and run rules or the picker
//! against it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use veil_core::{Document, KeyValueStore, PageSnapshot};
use veil_picker::{GestureOutcome, PointerEvent};
use veil_session::{CommitOutcome, Session, SessionOptions};

use crate::terminal_output::{note_info, note_warn, print_notices, render_table, Column};

pub async fn load_page(path: &Path, host: Option<&str>) -> Result<Document> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read page snapshot: {}", path.display()))?;
    let mut doc = PageSnapshot::from_json(&raw)?.into_document()?;
    if let Some(host) = host {
        doc.set_host(host);
    }
    info!(host = doc.host(), elements = doc.elements().len(), "Loaded page snapshot");
    Ok(doc)
}

fn options() -> SessionOptions {
    SessionOptions {
        settings_quiet_period: None,
        ..SessionOptions::default()
    }
}

/// Open a session on the page and list what the stored rules hide.
pub async fn apply(kv: Arc<dyn KeyValueStore>, doc: Document, summary: bool) -> Result<()> {
    let mut session = Session::open(doc, kv, options()).await;
    let report = session.apply(summary);
    print_notices(&session.take_notices());

    for skipped in &report.skipped {
        note_warn(&format!("Skipped {}: {}", skipped.rule, skipped.reason));
    }

    let mut rows: Vec<Vec<String>> = session
        .engine()
        .table()
        .nodes()
        .map(|node| {
            let selector = session
                .preview_selector(node)
                .unwrap_or_else(|| format!("<{}>", node));
            vec![selector]
        })
        .collect();
    rows.sort();
    if rows.is_empty() {
        note_info("Nothing on this page is hidden.");
    } else {
        print!("{}", render_table(&[Column::left("Hidden element")], &rows));
    }

    session.close().await;
    Ok(())
}

/// Simulate a tap at (`x`, `y`), optionally widen it, and show (or save)
/// the resulting rule.
pub async fn pick(
    kv: Arc<dyn KeyValueStore>,
    doc: Document,
    x: f64,
    y: f64,
    level: usize,
    save: bool,
) -> Result<()> {
    let mut session = Session::open(doc, kv, options()).await;
    session.set_selecting(true);
    session.handle_pointer(&PointerEvent::down(x, y));
    let outcome = session.handle_pointer(&PointerEvent::up(x, y));

    if !matches!(outcome, GestureOutcome::Committed { .. }) {
        note_warn(&format!("Nothing selectable at ({x}, {y})."));
        session.close().await;
        return Ok(());
    }
    if level > 0 {
        let max = session.max_ancestor_level();
        if level > max {
            note_warn(&format!("Only {max} ancestor level(s) available."));
        }
        session.set_ancestor_level(level.min(max));
    }

    if let Some(node) = session.selected() {
        if let Some(preview) = session.preview_selector(node) {
            note_info(&format!("Selected: {preview}"));
        }
    }

    if save {
        let outcome = session.commit_selection().await;
        print_notices(&session.take_notices());
        if let Ok(CommitOutcome::Added { hidden, .. }) = &outcome {
            note_info(&format!("{hidden} element(s) hidden on this page."));
        }
        session.close().await;
        outcome?;
    } else {
        if let Some(rule) = session.rule_text_for_selection() {
            println!("{rule}");
        }
        print_notices(&session.take_notices());
        session.close().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::MemoryKvStore;
    use veil_rules::RULES_KEY;

    const PAGE: &str = r#"{
        "host": "example.com",
        "rect": { "x": 0, "y": 0, "width": 400, "height": 800 },
        "body": [
            { "tag": "aside", "attrs": { "id": "promo" },
              "rect": { "x": 0, "y": 0, "width": 400, "height": 100 },
              "children": [ { "text": "Sale!" } ] },
            { "tag": "p", "rect": { "x": 0, "y": 100, "width": 400, "height": 50 } }
        ]
    }"#;

    async fn page() -> Document {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, PAGE).unwrap();
        load_page(&path, None).await.unwrap()
    }

    #[tokio::test]
    async fn pick_with_save_stores_rule() {
        let kv = Arc::new(MemoryKvStore::new());
        pick(kv.clone(), page().await, 20.0, 20.0, 0, true)
            .await
            .unwrap();
        assert_eq!(
            kv.get(RULES_KEY).await.unwrap().as_deref(),
            Some(r#"["example.com###promo"]"#)
        );
    }

    #[tokio::test]
    async fn pick_without_save_stores_nothing() {
        let kv = Arc::new(MemoryKvStore::new());
        pick(kv.clone(), page().await, 20.0, 20.0, 0, false)
            .await
            .unwrap();
        assert_eq!(kv.get(RULES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn host_override_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, PAGE).unwrap();
        let doc = load_page(&path, Some("news.example")).await.unwrap();
        assert_eq!(doc.host(), "news.example");
    }

    #[tokio::test]
    async fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_page(&dir.path().join("nope.json"), None).await.is_err());
    }
}
