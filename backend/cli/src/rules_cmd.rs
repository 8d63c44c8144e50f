//! CLI Rules Subcommands
//!
//! Read and edit the stored rule list without a page.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use veil_core::KeyValueStore;
use veil_rules::{AddResult, Rejection, RuleRecord, RuleStore, Scope};

use crate::terminal_output::{dim, note_info, note_success, note_warn, render_table, Column};

#[derive(Subcommand)]
pub enum RuleCommands {
    /// List every stored rule
    List,
    /// Save a rule for the current host
    Add {
        /// CSS selector to hide
        selector: String,
        /// Store as `*##selector` so the rule applies on every site
        #[arg(long, conflicts_with = "no_site")]
        all_sites: bool,
        /// Store as `##selector` without a host
        #[arg(long)]
        no_site: bool,
    },
    /// Delete a rule by its exact text
    Remove { rule: String },
}

pub async fn run(cmd: RuleCommands, kv: Arc<dyn KeyValueStore>, host: &str) -> Result<()> {
    let mut store = RuleStore::load(kv, host)
        .await
        .context("Failed to load rules")?;

    match cmd {
        RuleCommands::List => print_rules(&store, host),
        RuleCommands::Add {
            selector,
            all_sites,
            no_site,
        } => {
            let record = if all_sites {
                RuleRecord::new(Scope::Wildcard, selector)
            } else {
                RuleRecord::for_host(host, &selector, !no_site)
            };
            let result = match record {
                Ok(record) => store.add_record(&record).await?,
                Err(e) => AddResult::Rejected(Rejection::Invalid(e)),
            };
            match result {
                AddResult::Added { rule } => note_success(&format!("Rule saved: {rule}")),
                AddResult::Rejected(Rejection::Duplicate) => {
                    note_info("This rule is already saved.")
                }
                AddResult::Rejected(Rejection::Invalid(e)) => {
                    note_warn(&format!("Rule not saved: {e}."))
                }
            }
        }
        RuleCommands::Remove { rule } => {
            if store.remove(&rule).await? {
                note_success(&format!("Rule deleted: {rule}"));
            } else {
                note_info(&format!("No rule named '{rule}'."));
            }
        }
    }
    Ok(())
}

fn print_rules(store: &RuleStore, host: &str) {
    if store.is_empty() {
        note_info("No rules saved.");
        return;
    }
    let columns = [
        Column::right("#"),
        Column::left("Scope"),
        Column::left("Selector"),
        Column::left("Here"),
    ];
    let rows: Vec<Vec<String>> = store
        .list()
        .iter()
        .enumerate()
        .map(|(i, raw)| match RuleRecord::parse(raw) {
            Ok(record) => vec![
                (i + 1).to_string(),
                match record.scope() {
                    Scope::Unscoped => dim("(none)"),
                    scope => scope.as_str().to_string(),
                },
                record.selector().to_string(),
                if record.applies_to(host) { "yes" } else { "no" }.to_string(),
            ],
            Err(e) => vec![
                (i + 1).to_string(),
                dim("-"),
                raw.clone(),
                dim(&e.to_string()),
            ],
        })
        .collect();
    print!("{}", render_table(&columns, &rows));
}
