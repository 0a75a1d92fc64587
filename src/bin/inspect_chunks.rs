//! Summarize the graph chunk files in a directory.
//!
//! Usage:
//!   cargo run --release --bin inspect_chunks -- --dir pathgraph
//!   cargo run --release --bin inspect_chunks -- --config graph.json --heal
//!
//! `--heal` loads every file through the graph chunk loader, which deletes
//! corrupt files instead of only reporting them.

use std::path::PathBuf;

use trinav::graph::disk_io::{self, SpotRecord};
use trinav::graph::{GraphChunk, GraphConfig, SpotFlags};

#[derive(Default)]
struct Totals {
    files: usize,
    corrupt: usize,
    spots: usize,
    blocked: usize,
    mapped: usize,
    connections: usize,
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a String> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1))
}

fn summarize(records: &[SpotRecord]) -> (usize, usize, usize) {
    let blocked = records.iter().filter(|r| r.flags.contains(SpotFlags::BLOCKED)).count();
    let mapped = records.iter().filter(|r| r.flags.contains(SpotFlags::MAPPED)).count();
    let connections = records.iter().map(|r| r.paths.len()).sum();
    (blocked, mapped, connections)
}

fn run(args: &[String]) -> trinav::core::Result<()> {
    let dir = match (arg_value(args, "--dir"), arg_value(args, "--config")) {
        (Some(dir), _) => PathBuf::from(dir),
        (None, Some(config)) => GraphConfig::from_json_file(&PathBuf::from(config))?.chunk_dir,
        (None, None) => GraphConfig::default().chunk_dir,
    };
    let heal = args.iter().any(|a| a == "--heal");

    let mut coords: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| disk_io::chunk_file_coord(&entry.file_name().to_string_lossy()))
        .collect();
    coords.sort();
    log::info!("{} chunk files in {}", coords.len(), dir.display());

    let mut totals = Totals::default();
    for coord in coords {
        totals.files += 1;
        let path = disk_io::chunk_path(&dir, coord);
        match disk_io::read_chunk_file(&path) {
            Ok(Some(records)) => {
                let (blocked, mapped, connections) = summarize(&records);
                log::info!(
                    "({:4}, {:4}): {:6} spots, {:6} blocked, {:6} mapped, {:7} links",
                    coord.x, coord.y, records.len(), blocked, mapped, connections
                );
                totals.spots += records.len();
                totals.blocked += blocked;
                totals.mapped += mapped;
                totals.connections += connections;
            }
            Ok(None) => {}
            Err(e) => {
                totals.corrupt += 1;
                log::warn!("({}, {}): {e}", coord.x, coord.y);
                if heal && e.is_corruption() {
                    GraphChunk::new(coord).load(&dir);
                }
            }
        }
    }

    log::info!(
        "{} files ({} corrupt{}), {} spots, {} blocked, {} mapped, {} links",
        totals.files,
        totals.corrupt,
        if heal { ", deleted" } else { "" },
        totals.spots,
        totals.blocked,
        totals.mapped,
        totals.connections
    );
    Ok(())
}

fn main() {
    trinav::core::logging::init();
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
