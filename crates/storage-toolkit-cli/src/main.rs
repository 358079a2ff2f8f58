mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use storage_toolkit_api::AppState;
use storage_toolkit_core::model::{CategoryStats, DuplicateFilter, DuplicateStats, ScanPhase};
use storage_toolkit_core::storage::{AttachmentGroup, ImportOptions};
use storage_toolkit_core::{AppConfig, CatalogStore, ScanEngine, StatisticsAggregator};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let guard = logging::init_logger();

    let config = match storage_toolkit_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { bind }) => run_serve(&config, bind),
        Some(Commands::Scan) => run_scan(&config),
        Some(Commands::Duplicates {
            page,
            size,
            media_type,
            sort,
        }) => {
            let filter = DuplicateFilter {
                media_type,
                sort: sort.into(),
            };
            run_duplicates(&config, page, size, &filter)
        }
        Some(Commands::Delete {
            attachment_name,
            yes,
        }) => run_delete(&config, &attachment_name, yes),
        Some(Commands::Stats) => run_stats(&config),
        Some(Commands::Import {
            dir,
            policy,
            template,
            group,
            ignore_globs,
        }) => {
            let catalog = open_catalog(&config)?;
            catalog.ensure_policy(&policy, &template)?;
            let summary = catalog.import_directory(
                &dir,
                &ImportOptions {
                    policy_name: policy,
                    group_name: group,
                    ignore_globs,
                },
            )?;
            info!(
                "Imported {} of {} files from {}",
                format!("{}", summary.imported).green(),
                summary.discovered,
                dir.display()
            );
            Ok(())
        }
        Some(Commands::AddGroup { name, display_name }) => {
            let catalog = open_catalog(&config)?;
            let display_name = display_name.unwrap_or_else(|| name.clone());
            catalog.add_group(&AttachmentGroup { name, display_name })?;
            Ok(())
        }
        Some(Commands::Reference {
            attachment_name,
            source,
            remove,
        }) => {
            let catalog = open_catalog(&config)?;
            if remove {
                if !catalog.remove_reference(&attachment_name, &source)? {
                    info!("{} had no reference from {}", attachment_name, source);
                }
            } else {
                catalog.add_reference(&attachment_name, &source)?;
            }
            let references = catalog.references(&attachment_name)?;
            info!("{} is referenced {} times", attachment_name, references.len());
            Ok(())
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::ResetCatalogue) => run_reset_catalogue(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
    Ok(())
}

fn open_catalog(config: &AppConfig) -> anyhow::Result<CatalogStore> {
    CatalogStore::from_config(config)
        .with_context(|| format!("opening catalogue {}", config.catalog_path))
}

fn scan_engine(config: &AppConfig) -> anyhow::Result<ScanEngine> {
    let catalog = open_catalog(config)?;
    Ok(ScanEngine::new(Arc::new(catalog))
        .with_analysis_config(config.analysis.clone())
        .with_reporter(Arc::new(CliReporter::new())))
}

/// Run one scan to completion. Fails unless it completed.
fn scan_to_completion(engine: &ScanEngine) -> anyhow::Result<DuplicateStats> {
    engine.start_scan()?;
    engine.wait_for_scan();
    let stats = engine.stats();
    match stats.phase {
        ScanPhase::Completed => Ok(stats),
        _ => anyhow::bail!(
            "scan did not complete: {}",
            stats.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn run_serve(config: &AppConfig, bind: Option<String>) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let state = AppState::from_store(Arc::new(catalog), config.analysis.clone());
    let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;
    runtime
        .block_on(storage_toolkit_api::serve(&bind_addr, state))
        .with_context(|| format!("serving on {}", bind_addr))
}

fn run_scan(config: &AppConfig) -> anyhow::Result<()> {
    let engine = scan_engine(config)?;
    let stats = scan_to_completion(&engine)?;

    println!();
    info!(
        "Scanned {}/{} attachments",
        format!("{}", stats.scanned_count).green(),
        stats.total_count
    );
    info!(
        "{} duplicate groups, {} files with duplicates, {} reclaimable",
        format!("{}", stats.duplicate_group_count).red(),
        format!("{}", stats.duplicate_file_count).red(),
        format!("{}", ByteSize(stats.savable_size)).red(),
    );
    Ok(())
}

fn run_duplicates(
    config: &AppConfig,
    page: usize,
    size: usize,
    filter: &DuplicateFilter,
) -> anyhow::Result<()> {
    let engine = scan_engine(config)?;
    scan_to_completion(&engine)?;
    let result = engine.list_duplicates(page, size, Some(filter))?;

    println!(
        "Page {} ({} per page), {} groups in total",
        result.page, result.size, result.total
    );
    for group in &result.items {
        println!();
        println!(
            "{} {} x {} ({} reclaimable)",
            group.content_hash.chars().take(12).collect::<String>().cyan(),
            group.file_count,
            ByteSize(group.file_size),
            format!("{}", ByteSize(group.savable_size)).red(),
        );
        for file in &group.files {
            let marker = if file.is_recommended {
                "keep".green()
            } else {
                "dup ".yellow()
            };
            let references = match file.reference_count {
                n if n < 0 => "refs: ?".to_string(),
                n => format!("refs: {}", n),
            };
            println!(
                "  {} {} {} [{}]",
                marker,
                file.attachment_name,
                file.display_name,
                references
            );
        }
    }
    Ok(())
}

fn run_delete(config: &AppConfig, attachment_name: &str, yes: bool) -> anyhow::Result<()> {
    let engine = scan_engine(config)?;
    scan_to_completion(&engine)?;

    if !yes {
        let prompt = format!("Delete attachment {} from storage?", attachment_name);
        if !prompt_confirm(&prompt, Some(false))? {
            return Ok(());
        }
    }

    engine.delete_duplicate(attachment_name)?;
    let stats = engine.stats();
    info!(
        "Deleted {}; {} duplicate groups remain ({} reclaimable)",
        attachment_name.red(),
        stats.duplicate_group_count,
        ByteSize(stats.savable_size)
    );
    Ok(())
}

fn run_stats(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let data = StatisticsAggregator::new(Arc::new(catalog)).compute_statistics()?;

    println!(
        "{} attachments, {} in {} policies and {} groups",
        format!("{}", data.total.attachment_count).green(),
        format!("{}", ByteSize(data.total.total_size)).green(),
        data.total.policy_count,
        data.total.group_count
    );
    print_breakdown("By type", &data.by_type);
    print_breakdown("By policy", &data.by_policy);
    print_breakdown("By group", &data.by_group);
    Ok(())
}

fn print_breakdown(title: &str, buckets: &[CategoryStats]) {
    println!();
    println!("{}", title.bold());
    for bucket in buckets {
        println!(
            "  {:<24} {:>8} {:>12} {:>7.2}%",
            bucket.name,
            bucket.count,
            ByteSize(bucket.size).to_string(),
            bucket.percent
        );
    }
}

fn run_reset_catalogue(config: &AppConfig) -> anyhow::Result<()> {
    if !prompt_confirm(
        "Are you SURE you want to COMPLETELY RESET the attachment catalogue?",
        Some(false),
    )? {
        return Ok(());
    }
    open_catalog(config)?.truncate()?;
    println!("All tables truncated");
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
