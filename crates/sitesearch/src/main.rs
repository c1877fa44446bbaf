use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sitesearch_core::Index;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

use crate::html::HtmlParser;

mod display;
mod html;

/// Interactive full-text search over a directory tree of HTML documents.
///
/// The tree is crawled and indexed in memory once at startup; queries are
/// then answered from the index until QUIT or end of input.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Opt {
    /// The root directory of the document tree. Prompted for when missing.
    root: Option<PathBuf>,

    /// The maximum number of results printed per query.
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// A `tracing` directive filtering what is logged to stderr.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    setup_logs(&opt.log_filter)?;

    let mut editor = DefaultEditor::new()?;
    let root = match opt.root {
        Some(root) => root,
        None => PathBuf::from(editor.readline("path to the document database: ")?),
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot read the document database at `{}`", root.display()))?;

    display::print_instructions();
    println!("Loading. Please wait...");

    let mut index = Index::new();
    index
        .index_directory(&root, &mut HtmlParser)
        .with_context(|| format!("failed to index `{}`", root.display()))?;

    loop {
        let line = match editor.readline("search (or QUIT to exit)> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(error) => return Err(error.into()),
        };
        let _ = editor.add_history_entry(&line);

        match index.search(&line) {
            Ok(results) => display::print_results(&index, &results, &root, opt.limit),
            Err(sitesearch_core::Error::Query(query_parser::Error::InvalidInput(error))) => {
                println!("invalid query ({error}), please try again.");
            }
            Err(sitesearch_core::Error::Query(query_parser::Error::QuitRequested)) => break,
            Err(error) => return Err(error.into()),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn setup_logs(log_filter: &str) -> anyhow::Result<()> {
    let filter: tracing_subscriber::filter::Targets =
        log_filter.parse().context("invalid --log-filter")?;

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter),
    );
    tracing::subscriber::set_global_default(subscriber).context("could not setup logging")?;

    Ok(())
}
