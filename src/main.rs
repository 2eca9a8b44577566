use anyhow::{anyhow, Context, Result};
use crossterm::style::Stylize;
use data_explorer::backend::BackendRegistry;
use data_explorer::config::config::Config;
use data_explorer::data::data_exporter::{DataExporter, ExportFormat};
use data_explorer::data::query::{QueryState, SortDirection};
use data_explorer::data::transform;
use data_explorer::services::{BulkEditService, DataLoaderService};
use data_explorer::utils::app_paths::AppPaths;
use data_explorer::utils::logging::init_tracing;
use std::sync::Arc;

mod table_display;

use table_display::{display_facets, display_page, display_preview};

fn print_help() {
    println!("{}", "Data Explorer - query, facet and transform tabular files".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  data-explorer [OPTIONS] FILE.csv|FILE.json");
    println!();
    println!("{}", "Options:".yellow());
    println!("  {}         - Page length (default from config)", "--size N".green());
    println!("  {}       - Rows to skip", "--offset N".green());
    println!("  {} - Sort key, repeatable; the last one is primary", "--sort field:asc|desc".green());
    println!("  {}  - Exact-match filter, repeatable", "--filter field=value".green());
    println!("  {}      - Count values of a field, repeatable", "--facet field".green());
    println!("  {}  - Preview a Lua transform on the page", "--transform 'src'".green());
    println!("  {}  - Write the page to the export directory", "--export csv|json".green());
    println!("  {}     - Print recent log entries at exit", "--show-logs".green());
    println!("  {} - Generate config file with defaults", "--generate-config".green());
    println!("  {}           - Show this help", "--help".green());
    println!();
    println!("{}", "Example transform:".yellow());
    println!("  function(doc) doc.price = doc.price * 2 return doc end");
    println!();
}

#[derive(Debug, Default)]
struct Options {
    file: Option<String>,
    size: Option<usize>,
    offset: usize,
    sort: Vec<(String, SortDirection)>,
    filters: Vec<(String, String)>,
    facets: Vec<String>,
    transform: Option<String>,
    export: Option<ExportFormat>,
    show_logs: bool,
}

fn parse_sort(spec: &str) -> Result<(String, SortDirection)> {
    let (field, direction) = spec.rsplit_once(':').unwrap_or((spec, "asc"));
    let direction = match direction.to_ascii_lowercase().as_str() {
        "asc" => SortDirection::Asc,
        "desc" => SortDirection::Desc,
        other => return Err(anyhow!("Unknown sort direction: {}", other)),
    };
    Ok((field.to_string(), direction))
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} needs a value", name))
        };
        match arg.as_str() {
            "--size" => options.size = Some(value("--size")?.parse().context("--size")?),
            "--offset" => options.offset = value("--offset")?.parse().context("--offset")?,
            "--sort" => options.sort.push(parse_sort(&value("--sort")?)?),
            "--filter" => {
                let raw = value("--filter")?;
                let (field, term) = raw
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--filter expects field=value, got {}", raw))?;
                options.filters.push((field.to_string(), term.to_string()));
            }
            "--facet" => options.facets.push(value("--facet")?),
            "--transform" => options.transform = Some(value("--transform")?),
            "--export" => options.export = Some(value("--export")?.parse()?),
            "--show-logs" => options.show_logs = true,
            other if other.starts_with("--") => return Err(anyhow!("Unknown option: {}", other)),
            file => options.file = Some(file.to_string()),
        }
    }
    Ok(options)
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating config directory {}", parent.display()))?;
    }
    std::fs::write(&path, Config::create_default_with_comments())?;
    println!("Configuration file created at: {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--generate-config") {
        return generate_config();
    }

    let config = Config::load()?;
    let log_buffer = init_tracing(&config.logging.level);
    let options = parse_args(&args)?;
    let file = options
        .file
        .clone()
        .ok_or_else(|| anyhow!("No data file given (see --help)"))?;

    let registry = Arc::new(BackendRegistry::with_defaults(&config)?);
    let loader = DataLoaderService::new(Arc::clone(&registry));
    let loaded = loader.load_file(&file).await?;
    eprintln!("{}", loaded.status_message().cyan());
    let mut dataset = loaded.dataset;

    let mut query = QueryState::new()
        .with_size(options.size.unwrap_or(config.query.default_page_size))
        .with_offset(options.offset);
    for (field, direction) in options.sort {
        query = query.sort_by(field, direction);
    }
    for (field, term) in options.filters {
        query = query.filter_term(field, term);
    }
    for field in &options.facets {
        query = query.facet(field.clone(), field.clone());
    }

    let response = dataset.query(query).await?;
    display_page(dataset.fields(), &response.documents, response.total, options.offset);
    if let Some(facets) = &response.facets {
        display_facets(facets);
    }

    if let Some(source) = &options.transform {
        match transform::compile(source) {
            Ok(compiled) => display_preview(&BulkEditService::preview(&dataset, &compiled, None)),
            Err(e) => eprintln!("{}", format!("{}", e).red()),
        }
    }

    if let Some(format) = options.export {
        let dir = AppPaths::export_dir()?;
        let path = DataExporter::export_to_file(format, dataset.fields(), dataset.current_documents(), &dir)?;
        println!("{}", format!("Exported to {}", path.display()).green());
    }

    if options.show_logs {
        for entry in log_buffer.get_recent(50) {
            eprintln!("{}", entry.format_for_display());
        }
    }
    Ok(())
}
