// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use pulse_kernel::{ChainVerification, IntegrityLedger};

use super::load_ledger;

const PREVIEW_CHARS: usize = 40;

fn preview(s: &str) -> String {
    let flat = s.replace('\n', "⏎");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((i, _)) => format!("{}…", &flat[..i]),
        None => flat,
    }
}

/// Build the entry table: index, timestamp, agent, previews and digest.
/// Entries at or after the fault in `verdict` are marked untrusted.
pub fn entry_table(ledger: &IntegrityLedger, verdict: &ChainVerification) -> Table {
    let bad_from = verdict.fault_index(ledger.len());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Timestamp", "Agent", "Input", "Output", "Hash", "Status"]);

    for (i, entry) in ledger.entries().iter().enumerate() {
        let ts = chrono::DateTime::parse_from_rfc3339(&entry.timestamp)
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_else(|_| entry.timestamp.clone());
        let hash = ledger.entry_hash(entry);
        let status = match bad_from {
            Some(b) if i >= b => "UNTRUSTED",
            _ => "OK",
        };

        table.add_row(vec![
            i.to_string(),
            ts,
            entry.agent.clone(),
            preview(&entry.input),
            preview(&entry.output),
            hash[..16].to_string(),
            status.to_string(),
        ]);
    }

    table
}

pub fn run(snapshot_path: &Path, algorithm: &str) -> anyhow::Result<()> {
    let ledger = load_ledger(snapshot_path, algorithm)?;
    let verdict = ledger.verify_chain();

    println!("\nPulse Ledger Report");
    println!("-------------------");
    println!("Snapshot:  {}", snapshot_path.display());
    println!("Algorithm: {}", algorithm);
    println!("Entries:   {}", ledger.len());
    println!("Cursor:    {}", ledger.cursor());
    println!("Chain:     {}", if verdict.is_valid() { "VALID" } else { "BROKEN" });

    let table = entry_table(&ledger, &verdict);
    println!("\n{table}\n");

    Ok(())
}
