//! crashdesk CLI — query the testcase dashboard from the terminal.
//!
//! Drives `crashdesk-core` (filters, debounce, dispatch-and-cancel) over the
//! `crashdesk-http` transport.

use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crashdesk_core::controller::ListingController;
use crashdesk_core::cron::load_cron;
use crashdesk_core::debounce::Key;
use crashdesk_core::dispatch::Backend;
use crashdesk_core::matcher::filter_options;
use crashdesk_core::params::{FilterKey, FilterParams};
use crashdesk_core::store::{State, StoreEvent, ViewStatus};
use crashdesk_core::types::{ClientConfig, Method};
use crashdesk_core::{load_config_file, load_crashdesk_config, query};
use crashdesk_http::HttpBackend;

/// crashdesk — search fuzzing testcases from the terminal.
#[derive(Parser)]
#[command(name = "crashdesk", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./.crashdesk.toml, then ~/.crashdesk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dashboard base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request method for listings: get or post (overrides config)
    #[arg(long, global = true)]
    method: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page of testcases matching the filters
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        /// Print the request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Normalize a listing query string
    Query {
        /// Query string, e.g. "q=linux&fuzzer=afl"
        query: String,
    },
    /// Filter option names the way the dropdown search box does
    Match {
        /// Text typed into the dropdown search box
        key: String,

        /// Options to filter (default: one per line on stdin)
        options: Vec<String>,
    },
    /// Validate and list cron declarations
    Cron {
        /// Path to cron.yaml
        #[arg(default_value = "cron.yaml")]
        path: PathBuf,
    },
    /// Type into the keyword box line by line; results refresh as you go
    Interactive {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Start from a shared query string
    #[arg(long, value_name = "QUERY")]
    from: Option<String>,

    /// Keyword search
    #[arg(short = 'q', long)]
    keyword: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    fuzzer: Option<String>,
    #[arg(long)]
    job: Option<String>,
    #[arg(long)]
    platform: Option<String>,
    #[arg(long)]
    reproducible: Option<String>,
    #[arg(long)]
    security: Option<String>,
    #[arg(long)]
    issue: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long)]
    block: Option<String>,
    #[arg(long)]
    days: Option<String>,
    #[arg(long)]
    page: Option<String>,
}

impl FilterArgs {
    fn to_params(&self) -> FilterParams {
        let mut params = self.from.as_deref().map(query::decode).unwrap_or_default();
        let flags = [
            (FilterKey::Keyword, &self.keyword),
            (FilterKey::Project, &self.project),
            (FilterKey::Fuzzer, &self.fuzzer),
            (FilterKey::Job, &self.job),
            (FilterKey::Platform, &self.platform),
            (FilterKey::Reproducible, &self.reproducible),
            (FilterKey::Security, &self.security),
            (FilterKey::Issue, &self.issue),
            (FilterKey::Status, &self.status),
            (FilterKey::Group, &self.group),
            (FilterKey::Sort, &self.sort),
            (FilterKey::Block, &self.block),
            (FilterKey::Days, &self.days),
        ];
        for (key, value) in flags {
            if let Some(v) = value {
                params.update(key, v.as_str());
            }
        }
        // Applied last so an explicit --page survives the reset from other flags.
        if let Some(page) = &self.page {
            params.set(FilterKey::Page, page.as_str());
        }
        params
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "crashdesk=warn",
        1 => "crashdesk=info",
        _ => "crashdesk=debug",
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig, String> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).map_err(|e| e.to_string())?,
        None => {
            let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
            load_crashdesk_config(&cwd)
        }
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(method) = &cli.method {
        config.method = method.parse::<Method>().map_err(|e| e.to_string())?;
    }
    debug!(base_url = config.base_url.as_str(), method = %config.method, "Resolved config");
    Ok(config)
}

fn build_controller(config: &ClientConfig, params: FilterParams) -> Result<ListingController, String> {
    let backend = HttpBackend::new(config).map_err(|e| e.to_string())?;
    let backend: Arc<dyn Backend> = Arc::new(backend);
    Ok(ListingController::new(backend, params, config.debounce()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Search { filters, dry_run } => run_search(&cli, filters, *dry_run).await,
        Commands::Query { query } => run_query(&cli, query),
        Commands::Match { key, options } => run_match(&cli, key, options),
        Commands::Cron { path } => run_cron(&cli, path),
        Commands::Interactive { filters } => run_interactive(&cli, filters).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

async fn run_search(cli: &Cli, filters: &FilterArgs, dry_run: bool) -> Result<ExitCode, String> {
    let config = resolve_config(cli)?;
    let params = filters.to_params();

    if dry_run {
        let backend = HttpBackend::new(&config).map_err(|e| e.to_string())?;
        match config.method {
            Method::Get => println!("GET {}", backend.url_for(&params)),
            Method::Post => {
                println!("POST {}", backend.endpoint());
                let body = query::to_json_body(&params);
                println!("{}", serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?);
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let ctl = build_controller(&config, params)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<State>();
    ctl.subscribe(move |state, event| {
        if matches!(event, StoreEvent::ResultsChanged { .. }) && !state.is_loading() {
            let _ = tx.send(state.clone());
        }
    });
    ctl.load();

    let state = rx.recv().await.ok_or("listing request was dropped")?;
    print_state(cli.json, &state)
}

fn print_state(json: bool, state: &State) -> Result<ExitCode, String> {
    if json {
        println!("{}", serde_json::to_string_pretty(state).map_err(|e| e.to_string())?);
        return Ok(if state.status == ViewStatus::Failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }
    match state.status {
        ViewStatus::Failed => {
            if let Some(err) = &state.error {
                eprintln!("Error: {}", err.message);
                if let Some(trace) = &err.trace_dump {
                    eprintln!("{trace}");
                }
            }
            Ok(ExitCode::FAILURE)
        }
        ViewStatus::Empty => {
            eprintln!("No testcases match these filters");
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            for item in &state.items {
                println!("{item}");
            }
            let pager = &state.pager;
            match (pager.total_pages, pager.total_items) {
                (Some(pages), Some(total)) => {
                    eprintln!("\n{} items (page {} of {pages}, {total} total)", state.items.len(), pager.page)
                }
                _ => eprintln!("\n{} items (page {})", state.items.len(), pager.page),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// query / match / cron
// ---------------------------------------------------------------------------

fn run_query(cli: &Cli, raw: &str) -> Result<ExitCode, String> {
    let params = query::decode(raw);
    if cli.json {
        let set: serde_json::Map<String, serde_json::Value> = params
            .non_empty()
            .map(|(k, v)| (k.name().to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        let output = serde_json::json!({ "query": query::encode(&params), "filters": set });
        println!("{}", serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?);
    } else {
        println!("{}", query::encode(&params));
        for (key, value) in params.non_empty() {
            eprintln!("  {:<14} {}", key.name(), value);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_match(cli: &Cli, key: &str, options: &[String]) -> Result<ExitCode, String> {
    let stdin_options: Vec<String>;
    let options = if options.is_empty() {
        stdin_options = std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        &stdin_options
    } else {
        options
    };

    let matches = filter_options(options, key);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&matches).map_err(|e| e.to_string())?);
    } else {
        for m in &matches {
            println!("{m}");
        }
    }
    Ok(if matches.is_empty() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn run_cron(cli: &Cli, path: &Path) -> Result<ExitCode, String> {
    let jobs = load_cron(path).map_err(|e| e.to_string())?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&jobs).map_err(|e| e.to_string())?);
        return Ok(ExitCode::SUCCESS);
    }
    for job in &jobs {
        println!(
            "{:<40} {:<30} {:<16} {}",
            job.url,
            job.schedule.to_string(),
            job.target_or_default(),
            job.description
        );
    }
    eprintln!("\n{} cron entries OK", jobs.len());
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// interactive
// ---------------------------------------------------------------------------

const INTERACTIVE_HELP: &str = "\
Type to search (results refresh after a pause). Blank line = Enter.
  :set KEY VALUE   change a filter (project, fuzzer, job, ...)
  :page N          jump to page N
  :next / :prev    page through results
  :url             print the shareable query string
  :quit            exit";

async fn run_interactive(cli: &Cli, filters: &FilterArgs) -> Result<ExitCode, String> {
    let config = resolve_config(cli)?;
    let params = filters.to_params();
    let mut text = params.get(FilterKey::Keyword).to_string();
    let ctl = build_controller(&config, params)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<(State, StoreEvent)>();
    ctl.subscribe(move |state, event| {
        let _ = tx.send((state.clone(), event.clone()));
    });
    let json = cli.json;
    let printer = tokio::spawn(async move {
        while let Some((state, event)) = rx.recv().await {
            match event {
                StoreEvent::ResultsChanged { .. } if !state.is_loading() => {
                    let _ = print_state(json, &state);
                }
                StoreEvent::RequestStarted { id } => eprintln!("… searching (request {})", id.0),
                _ => {}
            }
        }
    });

    eprintln!("{INTERACTIVE_HELP}");
    ctl.load();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        let trimmed = line.trim();
        if let Some(command) = trimmed.strip_prefix(':') {
            if !run_interactive_command(&ctl, command, &mut text) {
                break;
            }
            continue;
        }
        if trimmed.is_empty() {
            ctl.type_keyword(&text, &Key::Enter);
        } else {
            text = line;
            ctl.type_keyword(&text, &Key::Other(String::new()));
        }
    }

    ctl.cancel();
    drop(ctl);
    // Give the last render a moment before the printer is torn down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();
    Ok(ExitCode::SUCCESS)
}

/// Returns false when the session should end.
fn run_interactive_command(ctl: &ListingController, command: &str, text: &mut String) -> bool {
    let mut parts = command.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("quit" | "q"), _, _) => return false,
        (Some("set"), Some(key), value) => match key.parse::<FilterKey>() {
            Ok(key) => {
                let value = value.unwrap_or("");
                if key == FilterKey::Keyword {
                    *text = value.to_string();
                }
                if ctl.set_filter(key, value).is_none() {
                    eprintln!("{key} unchanged");
                }
            }
            Err(e) => eprintln!("{e}"),
        },
        (Some("page"), Some(n), _) => match n.parse::<u32>() {
            Ok(n) if n > 0 => {
                ctl.set_page(n);
            }
            _ => eprintln!("page must be a positive number"),
        },
        (Some("next"), _, _) => {
            if ctl.next_page().is_none() {
                eprintln!("already on the last page");
            }
        }
        (Some("prev"), _, _) => {
            if ctl.prev_page().is_none() {
                eprintln!("already on the first page");
            }
        }
        (Some("url"), _, _) => println!("?{}", ctl.query_string()),
        _ => eprintln!("{INTERACTIVE_HELP}"),
    }
    true
}
