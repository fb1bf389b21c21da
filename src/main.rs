//! Purpose: `contactsheet` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Pages and exported rows are emitted as JSON on stdout.
//! Invariants: Errors are emitted as JSON on stderr; exit codes come from
//! `api::to_exit_code`.
#![allow(clippy::result_large_err)]

use clap::{Args, Parser, Subcommand};
use contactsheet::api::{
    Cursor, Direction, DocumentIterator, Error, ErrorKind, IteratorOptions, Page, PageError,
    Pager, PagerOptions, PreviousOptions, RemoteViewStore, ViewRef, ViewStore, to_exit_code,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(
    name = "contactsheet",
    version,
    about = "Browse ordered document views page by page"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ViewArgs {
    /// Base URL of the view store.
    #[arg(long, default_value = "http://127.0.0.1:5984")]
    url: String,
    /// Database name.
    #[arg(long)]
    db: String,
    /// Design document holding the view.
    #[arg(long)]
    design: String,
    /// View name.
    #[arg(long)]
    view: String,
    /// Items per page.
    #[arg(long, default_value_t = 10)]
    page_size: usize,
    /// Traverse in descending key order.
    #[arg(long)]
    descending: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the page at a cursor, or the first page.
    Page {
        #[command(flatten)]
        view: ViewArgs,
        /// Cursor JSON, e.g. '{"key":["2013-01-04"],"id":"oid-1"}'.
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Print the page after the page starting at a cursor.
    Next {
        #[command(flatten)]
        view: ViewArgs,
        /// Start cursor of the page just consumed.
        #[arg(long)]
        cursor: String,
    },
    /// Print the page before the page starting at a cursor.
    Previous {
        #[command(flatten)]
        view: ViewArgs,
        /// Start cursor of the page just consumed.
        #[arg(long)]
        cursor: String,
        /// Return a short page at the very beginning instead of re-anchoring
        /// to a full first page.
        #[arg(long)]
        short_page_at_end: bool,
    },
    /// Stream every row of a view as JSON lines.
    Export {
        #[command(flatten)]
        view: ViewArgs,
    },
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start async runtime")
                .with_source(err)
        })?;
    runtime.block_on(dispatch(cli.command))
}

async fn dispatch(command: Command) -> Result<(), Error> {
    match command {
        Command::Page { view, cursor } => {
            let pager = pager_for(&view)?;
            let cursor = cursor.map(|raw| parse_cursor(&raw)).transpose()?;
            print_page(pager.at(cursor.as_ref()).await)
        }
        Command::Next { view, cursor } => {
            let pager = pager_for(&view)?;
            let cursor = parse_cursor(&cursor)?;
            print_page(pager.next(&cursor).await)
        }
        Command::Previous {
            view,
            cursor,
            short_page_at_end,
        } => {
            let pager = pager_for(&view)?;
            let cursor = parse_cursor(&cursor)?;
            let options = PreviousOptions {
                full_page_at_end: !short_page_at_end,
            };
            print_page(pager.previous(&cursor, options).await)
        }
        Command::Export { view } => export(&view).await,
    }
}

fn pager_for(args: &ViewArgs) -> Result<Pager, Error> {
    let options = PagerOptions {
        direction: direction(args),
        ..PagerOptions::default()
    };
    Pager::new(store_for(args)?, view_ref(args), args.page_size, options)
}

async fn export(args: &ViewArgs) -> Result<(), Error> {
    use tokio_stream::StreamExt;

    let options = IteratorOptions {
        direction: direction(args),
        ..IteratorOptions::default()
    };
    let iter = DocumentIterator::new(
        store_for(args)?,
        view_ref(args),
        Some(args.page_size),
        options,
    )?;
    let mut pages = std::pin::pin!(iter.into_pages());
    while let Some(rows) = pages.next().await {
        for row in rows? {
            let line = json!({"cursor": row.cursor(), "doc": row.doc});
            println!("{line}");
        }
    }
    Ok(())
}

fn store_for(args: &ViewArgs) -> Result<Arc<dyn ViewStore>, Error> {
    let base_url = Url::parse(&args.url).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid store url")
            .with_source(err)
    })?;
    Ok(Arc::new(RemoteViewStore::new(base_url, &args.db)))
}

fn view_ref(args: &ViewArgs) -> ViewRef {
    ViewRef::new(&args.design, &args.view)
}

fn direction(args: &ViewArgs) -> Direction {
    if args.descending {
        Direction::Descending
    } else {
        Direction::Ascending
    }
}

fn parse_cursor(raw: &str) -> Result<Cursor, Error> {
    let cursor: Cursor = serde_json::from_str(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(r#"cursor must be JSON like {"key":…,"id":…}"#)
            .with_source(err)
    })?;
    cursor.validate()?;
    Ok(cursor)
}

fn print_page(result: Result<Page, PageError>) -> Result<(), Error> {
    match result {
        Ok(page) => {
            let body = serde_json::to_string_pretty(&page).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode page")
                    .with_source(err)
            })?;
            println!("{body}");
            Ok(())
        }
        Err(PageError::Exhausted) => {
            println!("{}", json!({"exhausted": true}));
            Ok(())
        }
        Err(PageError::Iteration(err)) => Err(err),
    }
}

fn emit_error(err: &Error) {
    let body = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.to_string(),
        }
    });
    eprintln!("{body}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
