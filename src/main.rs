// grove command line entry point.
// Loads settings, installs telemetry and runs one subcommand.

use std::{process, sync::Arc};

use grove::{
    Browser, GroveError, Result,
    cache::{DiskMedium, Medium, MemoryMedium},
    config::{self, CacheCommand, Command, Settings, ShowArgs},
    fetch::Outcome,
    github::{GitHubClient, RepoRef, Tree},
    highlight::{SyntectHighlighter, language_for_path},
    telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &GroveError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "grove failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "grove failed");
    });
}

async fn run() -> Result<()> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let browser = build_browser(&settings)?;

    match cli_args.command {
        Command::Tree(args) => run_tree(&browser, &args.repo).await,
        Command::Show(args) => run_show(&browser, args).await,
        Command::Cache(args) => {
            run_cache(&browser, args.command);
            Ok(())
        }
    }
}

fn build_browser(settings: &Settings) -> Result<Browser> {
    let medium: Arc<dyn Medium> = match settings.cache.dir.as_ref() {
        Some(dir) => Arc::new(DiskMedium::new(dir)),
        None => {
            warn!("No cache directory available, caching only for this run");
            Arc::new(MemoryMedium::new())
        }
    };

    let client = Arc::new(GitHubClient::from_env(
        settings.github.api_base.as_str(),
        settings.github.timeout,
    )?);
    let highlighter = Arc::new(SyntectHighlighter::new());

    Ok(Browser::new(
        medium,
        settings.browser_options(),
        client.clone(),
        client,
        highlighter,
    ))
}

/// Unwrap an outcome, reporting a kept stale value as a warning.
fn settle<V>(outcome: Outcome<V>) -> Result<V> {
    if let Outcome::Fallback { error, .. } = &outcome {
        warn!(%error, "Refresh failed, showing cached copy");
    }
    outcome.into_result()
}

async fn run_tree(browser: &Browser, repo: &RepoRef) -> Result<()> {
    let tree = settle(browser.open_tree(repo).await)?;
    for entry in tree.files() {
        match entry.size {
            Some(size) => println!("{size:>10}  {}", entry.path),
            None => println!("{:>10}  {}", "-", entry.path),
        }
    }
    if tree.truncated {
        warn!(%repo, "Tree listing was truncated by GitHub");
    }
    Ok(())
}

async fn run_show(browser: &Browser, args: ShowArgs) -> Result<()> {
    let tree: Tree = settle(browser.open_tree(&args.repo).await)?;
    let entry = tree
        .files()
        .find(|entry| entry.path == args.path)
        .cloned()
        .ok_or_else(|| GroveError::NotFound(format!("{}:{}", args.repo, args.path)))?;

    let text = settle(browser.open_file(&args.repo, &entry).await)?;
    if !args.highlight {
        print!("{text}");
        return Ok(());
    }

    let language = args
        .language
        .unwrap_or_else(|| language_for_path(&entry.path));
    let rendering = settle(
        browser
            .highlight(
                &args.repo,
                &entry.path,
                &text,
                &language,
                args.theme.as_deref(),
            )
            .await,
    )?;
    println!("{}", rendering.html);
    Ok(())
}

fn run_cache(browser: &Browser, command: CacheCommand) {
    let (verb, removed) = match command {
        CacheCommand::Prune => ("Pruned", browser.prune()),
        CacheCommand::Clear => ("Cleared", browser.clear()),
    };
    println!(
        "{verb} {} tree, {} file, {} highlight entries",
        removed.trees, removed.blobs, removed.highlights
    );
}
