use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tidyscan::access::{AccessBroker, AccessPrompt};
use tidyscan::cache::{self, ResultCache};
use tidyscan::catalog;
use tidyscan::cli::{Cli, Commands, ConfigActions, OutputFormat};
use tidyscan::config::Config;
use tidyscan::output::{
    format_size, ItemsDocument, LargestDocument, ScanDocument, StatusDocument,
};
use tidyscan::scan::{scan_largest_files, select_probe, ScanEvent, ScanOrchestrator};

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse_args();

    let result = match Config::load() {
        Ok(config) => run(cli, config),
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    match cli.command {
        None => run_scan(&config, OutputFormat::Human, None)?,
        Some(Commands::Scan { format, out }) => run_scan(&config, format, out.as_deref())?,
        Some(Commands::Status { format }) => run_status(format)?,
        Some(Commands::Items {
            category,
            format,
            out,
        }) => run_items(&category, &config, format, out.as_deref())?,
        Some(Commands::Largest {
            threshold,
            limit,
            timeout,
            format,
            out,
        }) => run_largest(&config, threshold, limit, timeout, format, out.as_deref())?,
        Some(Commands::Grant { path }) => run_grant(&path)?,
        Some(Commands::Config { action }) => run_config(action, config)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn run_scan(config: &Config, format: OutputFormat, out: Option<&str>) -> Result<()> {
    let mut broker = AccessBroker::with_defaults();
    broker.restore_access();
    if !broker.check_access() {
        eprintln!(
            "No read access to {}. Run `tidyscan grant <path>` to pick a scan root.",
            broker.root().display()
        );
    }

    let root = broker.root().to_path_buf();
    let categories = catalog::build_categories(&root);
    let probe = select_probe(config.du_path());
    let orchestrator =
        ScanOrchestrator::new(probe, catalog::sweep_roots(&root), config.scan_options());

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async {
        if matches!(format, OutputFormat::Human) {
            let mut events = orchestrator.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        ScanEvent::CategoryFinished {
                            name,
                            size,
                            completed,
                            total,
                            ..
                        } => {
                            eprintln!(
                                "  [{}/{}] {} ({})",
                                completed,
                                total,
                                name,
                                format_size(size)
                            );
                        }
                        ScanEvent::SweepStarted => {
                            eprintln!("  Looking for large files...");
                        }
                        _ => {}
                    }
                }
            });
        }
        orchestrator.scan_all(categories).await
    });

    let cache = ResultCache::new(ResultCache::default_dir());
    if let Err(err) = cache.save(&outcome.categories, Utc::now()) {
        warn!("could not persist scan results: {err}");
    }

    let doc = ScanDocument::new(
        root,
        &outcome.categories,
        &outcome.largest_files,
        outcome.duration.as_millis() as u64,
    );

    match format {
        OutputFormat::Json => write_json(&doc, out)?,
        OutputFormat::Human => {
            println!("Storage usage under {}:\n", doc.root.display());
            for cat in &doc.categories {
                println!("{}:", cat.name);
                println!("  Items: {}", cat.item_count);
                println!("  Size: {}", format_size(cat.size_bytes));
                println!();
            }
            if !doc.largest_files.is_empty() {
                println!("Largest files:");
                for item in doc.largest_files.iter().take(10) {
                    println!(
                        "  - {} ({})",
                        item.path.display(),
                        format_size(item.size_bytes)
                    );
                }
                if doc.largest_files.len() > 10 {
                    println!("  ... and {} more", doc.largest_files.len() - 10);
                }
                println!();
            }
            println!(
                "Total: {} items, {} (in {}ms)",
                doc.total_item_count,
                format_size(doc.total_size_bytes),
                doc.scan_duration_ms
            );
        }
    }

    Ok(())
}

fn run_status(format: OutputFormat) -> Result<()> {
    let mut broker = AccessBroker::with_defaults();
    broker.restore_access();
    let readable = broker.check_access();

    let root = broker.root().to_path_buf();
    let cache = ResultCache::new(ResultCache::default_dir());
    let (categories, last_scan) = cache.load(catalog::build_categories(&root));
    let valid = cache::is_valid(&categories, last_scan, Utc::now());

    let doc = StatusDocument::new(
        root,
        broker.has_grant(),
        broker.has_elevated_access(),
        last_scan,
        valid,
        &categories,
    );

    match format {
        OutputFormat::Json => write_json(&doc, None)?,
        OutputFormat::Human => {
            println!("Root: {}", doc.root.display());
            println!("Access: {}", if readable { "ok" } else { "denied" });
            println!(
                "Grant: {}",
                if doc.has_grant {
                    "persisted"
                } else {
                    "none (using home directory)"
                }
            );
            println!(
                "Library access: {}",
                if doc.has_elevated_access { "yes" } else { "no" }
            );
            match doc.last_scan {
                Some(ts) => println!(
                    "Last scan: {} ({})",
                    ts.format("%Y-%m-%d %H:%M:%S UTC"),
                    if doc.cache_valid { "fresh" } else { "stale" }
                ),
                None => println!("Last scan: never"),
            }
            println!();
            for cat in &doc.categories {
                println!(
                    "  {:<16} {:>10}  {} items",
                    cat.name,
                    format_size(cat.size_bytes),
                    cat.item_count
                );
            }
        }
    }

    Ok(())
}

fn run_items(
    category_id: &str,
    config: &Config,
    format: OutputFormat,
    out: Option<&str>,
) -> Result<()> {
    let mut broker = AccessBroker::with_defaults();
    broker.restore_access();
    let root = broker.root().to_path_buf();

    let categories = catalog::build_categories(&root);
    let Some(category) = categories.iter().find(|c| c.id == category_id) else {
        let known: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();
        anyhow::bail!(
            "unknown category '{}' (known: {})",
            category_id,
            known.join(", ")
        );
    };

    let probe = select_probe(config.du_path());
    let orchestrator = ScanOrchestrator::new(probe, Vec::new(), config.scan_options());

    let runtime = tokio::runtime::Runtime::new()?;
    let items = runtime
        .block_on(orchestrator.load_items(category))
        .unwrap_or_default();

    let cache = ResultCache::new(ResultCache::default_dir());
    let (mut merged, _) = cache.load(catalog::build_categories(&root));
    if let Some(cat) = merged.iter_mut().find(|c| c.id == category_id) {
        cat.size = items.iter().map(|i| i.size).sum();
        cat.items = items.clone();
    }
    if let Err(err) = cache.save(&merged, Utc::now()) {
        warn!("could not persist category reload: {err}");
    }

    let doc = ItemsDocument::new(category, &items);

    match format {
        OutputFormat::Json => write_json(&doc, out)?,
        OutputFormat::Human => {
            println!(
                "{} ({} items, {}):\n",
                doc.category_name,
                doc.items.len(),
                format_size(doc.total_size_bytes)
            );
            for item in &doc.items {
                let marker = if item.is_directory { "/" } else { "" };
                println!(
                    "  {:>10}  {}{}",
                    format_size(item.size_bytes),
                    item.name,
                    marker
                );
            }
        }
    }

    Ok(())
}

fn run_largest(
    config: &Config,
    threshold_mb: Option<u64>,
    limit: Option<usize>,
    timeout_secs: Option<u64>,
    format: OutputFormat,
    out: Option<&str>,
) -> Result<()> {
    let mut broker = AccessBroker::with_defaults();
    broker.restore_access();
    let root = broker.root().to_path_buf();

    let options = config.scan_options();
    let threshold = threshold_mb
        .map(|mb| mb * 1024 * 1024)
        .unwrap_or(options.largest_threshold);
    let limit = limit.unwrap_or(options.largest_limit);
    let deadline = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(options.sweep_timeout);

    let runtime = tokio::runtime::Runtime::new()?;
    let items = runtime.block_on(scan_largest_files(
        catalog::sweep_roots(&root),
        threshold,
        limit,
        deadline,
    ));

    let doc = LargestDocument::new(threshold, &items);

    match format {
        OutputFormat::Json => write_json(&doc, out)?,
        OutputFormat::Human => {
            if doc.items.is_empty() {
                println!(
                    "No files above {} found under {}.",
                    format_size(doc.threshold_bytes),
                    root.display()
                );
            } else {
                println!("Files above {}:\n", format_size(doc.threshold_bytes));
                for item in &doc.items {
                    println!(
                        "  {:>10}  {}",
                        format_size(item.size_bytes),
                        item.path.display()
                    );
                }
            }
        }
    }

    Ok(())
}

struct CliPrompt {
    path: PathBuf,
}

impl AccessPrompt for CliPrompt {
    fn choose_directory(&self, _initial: Option<&Path>) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

fn run_grant(path: &str) -> Result<()> {
    let path = PathBuf::from(path);
    let mut broker = AccessBroker::with_defaults();
    broker.restore_access();

    let prompt = CliPrompt { path: path.clone() };
    let readable = broker.request_access(&prompt, None);
    if !broker.has_grant() {
        anyhow::bail!("could not grant access to {}", path.display());
    }

    println!("Access granted for {}", broker.root().display());
    if !readable {
        println!(
            "Warning: {} is not readable right now.",
            broker.root().display()
        );
    } else if !broker.has_elevated_access() {
        println!(
            "Note: {} is not readable; Library-backed categories will report 0.",
            broker.root().join("Library").display()
        );
    }

    Ok(())
}

fn run_config(action: ConfigActions, mut config: Config) -> Result<()> {
    match action {
        ConfigActions::Show => {
            println!("Configuration ({}):", Config::config_path().display());
            println!("  scan.item_limit = {}", config.scan.item_limit);
            println!(
                "  scan.largest_threshold_mb = {}",
                config.scan.largest_threshold_mb
            );
            println!("  scan.largest_limit = {}", config.scan.largest_limit);
            println!(
                "  scan.sweep_timeout_secs = {}",
                config.scan.sweep_timeout_secs
            );
            println!("  scan.settle_delay_ms = {}", config.scan.settle_delay_ms);
            println!(
                "  probe.du_path = {}",
                config.probe.du_path.as_deref().unwrap_or("(system default)")
            );
        }
        ConfigActions::Set { key, value } => {
            config.set_value(&key, &value)?;
            config.save()?;
            println!("Set {} to {}", key, value);
        }
    }

    Ok(())
}

fn write_json<T: serde::Serialize>(doc: &T, out: Option<&str>) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    match out {
        Some(path) => fs::write(path, &json)?,
        None => println!("{}", json),
    }
    Ok(())
}
