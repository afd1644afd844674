use clap::{Parser, Subcommand};
use depscan::{AssetId, DependencyService, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "depscan")]
#[command(about = "Asset dependency indexer with a searchable inverted index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Scan the project and build the dependency index
    Build {
        /// Number of threads for the scan pass (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Project root to scan (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Run a query against the index, building it first when needed
    Query {
        /// Query text, e.g. 'is:broken', 't:mat in>2', 'ref:<id>'
        #[arg(required_unless_present = "used_by_count")]
        query: Vec<String>,

        /// Show only the first N results
        #[arg(long)]
        first: Option<usize>,

        /// Emit results as JSON instead of the table form
        #[arg(long)]
        json: bool,

        /// Print how many documents reference the given id or path
        #[arg(long, value_name = "ID_OR_PATH", conflicts_with_all = ["query", "first"])]
        used_by_count: Option<String>,
    },

    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Init { .. }) {
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    let mut settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });
    depscan::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => match Settings::init_config_file(force) {
            Ok(path) => {
                println!("Edit {} to customize your settings.", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },

        Commands::Config => match toml::to_string_pretty(&settings) {
            Ok(toml_str) => {
                println!("{toml_str}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error displaying config: {e}");
                ExitCode::FAILURE
            }
        },

        Commands::Build { threads, root } => {
            if let Some(t) = threads {
                settings.scan.parallel_threads = t;
            }
            if let Some(r) = root {
                settings.scan.project_root = Some(r);
            }

            let service = DependencyService::new(Arc::new(settings));
            match service.build() {
                Ok(stats) => {
                    println!(
                        "Indexed {} documents, {} edges ({} weak) in {:.2?}",
                        stats.documents, stats.edges, stats.weak_edges, stats.elapsed
                    );
                    println!(
                        "Wrote {} bytes to {}",
                        stats.blob_bytes,
                        service.settings().blob_path().display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Build failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Query {
            query,
            first,
            json,
            used_by_count,
        } => {
            let service = DependencyService::new(Arc::new(settings));

            if let Some(target) = used_by_count {
                return print_use_by_count(&service, &target);
            }

            let input = query.join(" ");
            match service.query(&input, first) {
                Ok(results) => {
                    if json {
                        return print_json(&results);
                    }
                    if results.is_empty() {
                        println!("No matches for '{input}'");
                    } else {
                        for result in &results {
                            let path = result.path.as_deref().unwrap_or("<no path>");
                            println!("{:>5}  {}  {}", result.score, result.id, path);
                        }
                        println!("{} match(es)", results.len());
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Query failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn print_json(results: &[depscan::SearchResult]) -> ExitCode {
    let rows: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id.to_hex(),
                "path": r.path,
                "score": r.score,
            })
        })
        .collect();

    match serde_json::to_string_pretty(&rows) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing results: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_use_by_count(service: &DependencyService, target: &str) -> ExitCode {
    if let Err(e) = service.ensure_ready() {
        eprintln!("Query failed: {e}");
        return ExitCode::FAILURE;
    }

    let id = AssetId::parse(target).or_else(|| {
        service
            .try_query(&format!("path:\"{target}\""))
            .and_then(|results| results.first().map(|r| r.id))
    });

    match id {
        Some(id) => {
            println!("{}", service.use_by_count(&id));
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Unknown document: {target}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
