mod cache;
mod config;
mod contact;
mod directory;
mod error;
mod observers;
mod raw;
mod search;
mod translit;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cache::{ContactDirectoryCache, ViewRow};
use config::Config;
use contact::{Contact, SortOrder};
use directory::DirectorySource;
use observers::SelectionSource;

type Cache = ContactDirectoryCache<Box<dyn DirectorySource>>;

#[derive(Parser, Debug)]
#[command(name = "contactdir")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List contacts as name, email and chat columns
    List(ViewArgs),
    /// Show the current user's own card
    Me,
    /// Query contacts for email addresses (abook-compatible output for aerc/mutt)
    Query(QueryArgs),
    /// Open a contact from the list in the configured editor
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Only show contacts whose name, email or chat contains this text
    #[arg(long, short = 'f')]
    filter: Option<String>,

    /// Sort order (defaults to the configured one)
    #[arg(long, short = 's', value_enum)]
    sort: Option<SortOrder>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Search term (matches name, email, chat handle)
    query: String,
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Position in the listing, as printed by `list`
    index: usize,

    #[command(flatten)]
    view: ViewArgs,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    debug!(path = %config.config_path.display(), "loaded configuration");

    let mut cache = open_cache(&config);

    match cli.command {
        Command::List(args) => handle_list(&mut cache, &config, args),
        Command::Me => handle_me(&mut cache),
        Command::Query(args) => handle_query(&mut cache, args),
        Command::Edit(args) => handle_edit(&mut cache, &config, args),
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_cache(config: &Config) -> Cache {
    ContactDirectoryCache::with_options(directory::open(config), config.sort, config.search)
}

fn apply_view(cache: &mut Cache, config: &Config, args: &ViewArgs) {
    let updates = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&updates);
    let observer = cache.add_view_observer(Box::new(move || counter.set(counter.get() + 1)));

    cache.set_sort(args.sort.unwrap_or(config.sort));
    cache.set_filter(args.filter.as_deref());
    cache.remove_view_observer(observer);

    debug!(
        filter = ?cache.filter(),
        sort = cache.sort_order().title(),
        updates = updates.get(),
        "view ready"
    );
}

fn format_row(row: &ViewRow) -> String {
    format!("{}\t{}\t{}", row.name, row.email, row.chat)
}

fn handle_list(cache: &mut Cache, config: &Config, args: ViewArgs) -> Result<()> {
    apply_view(cache, config, &args);

    let rows = cache.rows();
    if rows.is_empty() {
        println!("No matching contacts.");
        return Ok(());
    }

    for (index, row) in rows.iter().enumerate() {
        println!("{}\t{}", index, format_row(row));
    }
    Ok(())
}

fn handle_me(cache: &mut Cache) -> Result<()> {
    cache.load();

    match cache.current_user() {
        Some(me) => {
            println!("{}", format_row(&ViewRow::from_contact(me)));
            if !me.phone().is_empty() {
                println!("phone\t{}", me.phone());
            }
        }
        None => println!("No card for the current user."),
    }
    Ok(())
}

fn handle_query(cache: &mut Cache, args: QueryArgs) -> Result<()> {
    let query = args.query.trim();
    cache.set_filter(Some(query));

    let results: Vec<&Rc<Contact>> = cache
        .current_view()
        .iter()
        .filter(|contact| !contact.email().is_empty())
        .collect();

    // Header line (abook-compatible, ignored by mutt/aerc)
    if results.is_empty() {
        println!("No matches for \"{}\"", query);
    } else {
        println!(
            "Found {} contact(s) matching \"{}\"",
            results.len(),
            query
        );
    }

    // Results: email<TAB>name<TAB>notes (abook mutt-query format)
    for contact in results {
        let notes = if contact.phone().is_empty() { " " } else { contact.phone() };
        println!("{}\t{}\t{}", contact.email(), contact.full_name(), notes);
    }

    Ok(())
}

fn handle_edit(cache: &mut Cache, config: &Config, args: EditArgs) -> Result<()> {
    apply_view(cache, config, &args.view);

    if cache.selected_contact(args.index).is_none() {
        bail!(
            "no contact at index {} (the listing has {} entries)",
            args.index,
            cache.current_view().len()
        );
    }

    let observer = cache.add_selection_observer(Box::new(
        |source: SelectionSource, contact: Option<&Rc<Contact>>| {
            if let Some(contact) = contact {
                info!(?source, id = contact.id(), "selected {}", contact.full_name());
            }
        },
    ));
    cache.select(args.index);
    cache.remove_selection_observer(observer);

    let name = cache
        .selection()
        .map(|contact| contact.full_name().to_string())
        .unwrap_or_default();

    cache
        .edit_selected()
        .with_context(|| format!("failed to edit {}", name))?;

    println!("Opened editor for {}.", name);
    Ok(())
}
