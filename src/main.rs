use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use std::error::Error;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tempolog::browser::SessionBrowser;
use tempolog::bulk::delete_selected;
use tempolog::config::{Config, ConfigStore, FileConfigStore};
use tempolog::export::export_csv;
use tempolog::filter::SessionFilter;
use tempolog::selection::Selection;
use tempolog::session::{NewSession, PracticeSession};
use tempolog::store::{SessionStore, SqliteStore};
use time_humanize::{Accuracy, HumanTime, Tense};

/// practice session log with filterable browsing and safe bulk delete
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Log practice sessions (exercise, time, tempo) and browse or bulk-delete them through filtered, paginated listings."
)]
struct Cli {
    /// use this database file instead of the default state directory
    #[clap(long, global = true)]
    database: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// record one practice session
    Log {
        /// name of the exercise practised
        exercise: String,

        /// tempo in beats per minute (defaults to the configured tempo)
        #[clap(short, long)]
        tempo: Option<u32>,

        /// when the session happened (RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD"; defaults to now)
        #[clap(long, value_parser = parse_when)]
        at: Option<DateTime<Local>>,
    },

    /// browse logged sessions page by page
    List {
        #[clap(flatten)]
        filter: FilterArgs,

        /// zero-based page to show (out-of-range pages clamp to the last one)
        #[clap(short, long, default_value_t = 0)]
        page: i64,

        /// rows per page (defaults to the configured page size)
        #[clap(long)]
        page_size: Option<usize>,

        /// output format
        #[clap(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// bulk-delete sessions matching a selection and the given filter
    Delete {
        #[clap(flatten)]
        filter: FilterArgs,

        /// delete exactly these session ids (comma separated)
        #[clap(long, value_delimiter = ',', conflicts_with = "all")]
        ids: Vec<i64>,

        /// delete every matching session
        #[clap(long)]
        all: bool,

        /// with --all, spare these session ids (comma separated)
        #[clap(long, value_delimiter = ',', requires = "all")]
        except: Vec<i64>,
    },

    /// export matching sessions as csv
    Export {
        #[clap(flatten)]
        filter: FilterArgs,

        /// write to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// only sessions whose exercise name contains this text
    #[clap(long)]
    contains: Option<String>,

    /// only sessions recorded at or after this time
    #[clap(long, value_parser = parse_when)]
    since: Option<DateTime<Local>>,

    /// only sessions recorded strictly before this time
    #[clap(long, value_parser = parse_when)]
    until: Option<DateTime<Local>>,

    /// only sessions at or above this tempo (bpm)
    #[clap(long)]
    min_tempo: Option<u32>,

    /// only sessions at or below this tempo (bpm)
    #[clap(long)]
    max_tempo: Option<u32>,
}

impl FilterArgs {
    fn to_filter(&self) -> SessionFilter {
        let mut filter = SessionFilter::all();
        if let Some(contains) = &self.contains {
            filter = filter.exercise_contains(contains.clone());
        }
        if let Some(since) = self.since {
            filter = filter.recorded_from(since);
        }
        if let Some(until) = self.until {
            filter = filter.recorded_until(until);
        }
        if let Some(min) = self.min_tempo {
            filter = filter.tempo_min(min);
        }
        if let Some(max) = self.max_tempo {
            filter = filter.tempo_max(max);
        }
        filter
    }
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
enum ListFormat {
    Table,
    Csv,
}

/// Accepts RFC 3339, "YYYY-MM-DD HH:MM" (local) or a bare "YYYY-MM-DD"
/// (local midnight).
fn parse_when(text: &str) -> Result<DateTime<Local>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Local));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        return local_from_naive(naive);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return local_from_naive(naive);
        }
    }
    Err(format!(
        "'{text}' is not a recognized time (try RFC 3339, 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD')"
    ))
}

fn local_from_naive(naive: NaiveDateTime) -> Result<DateTime<Local>, String> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{naive}' does not exist in the local timezone"))
}

fn open_store(database: Option<&PathBuf>) -> Result<SqliteStore, Box<dyn Error>> {
    let store = match database {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    Ok(store)
}

fn format_when(session: &PracticeSession, relative: bool) -> String {
    if relative {
        let elapsed = Local::now().signed_duration_since(session.recorded_at);
        let secs = elapsed.num_seconds().max(0) as u64;
        HumanTime::from(std::time::Duration::from_secs(secs))
            .to_text_en(Accuracy::Rough, Tense::Past)
    } else {
        session.recorded_at.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn run_log(
    mut store: SqliteStore,
    config: &Config,
    exercise: String,
    tempo: Option<u32>,
    at: Option<DateTime<Local>>,
) -> Result<(), Box<dyn Error>> {
    let session = NewSession::new(
        exercise,
        at.unwrap_or_else(Local::now),
        tempo.unwrap_or(config.default_tempo_bpm),
    );
    let id = store.insert(session)?;
    println!("logged session {id}");
    Ok(())
}

fn run_list(
    store: SqliteStore,
    config: &Config,
    filter: SessionFilter,
    page: i64,
    page_size: Option<usize>,
    format: ListFormat,
) -> Result<(), Box<dyn Error>> {
    let page_size = page_size.unwrap_or(config.page_size).max(1);
    let mut browser = SessionBrowser::new(store, filter.clone(), page_size)?;
    browser.load_page(page.saturating_mul(page_size as i64))?;

    let total = browser.store().count(&filter)?;
    let loaded = browser.page();
    match format {
        ListFormat::Csv => {
            export_csv(browser.store(), &filter, io::stdout().lock())?;
        }
        ListFormat::Table => {
            if loaded.is_empty() {
                println!("no sessions match");
                return Ok(());
            }
            for session in &loaded.items {
                println!(
                    "{:>6}  {:<30}  {:>4} bpm  {}",
                    session.id,
                    session.exercise,
                    session.tempo_bpm,
                    format_when(session, config.relative_times),
                );
            }
            let exercises = loaded
                .items
                .iter()
                .map(|s| s.exercise.as_str())
                .unique()
                .join(", ");
            println!(
                "rows {}..{} of {total}  ({exercises})",
                loaded.offset + 1,
                loaded.offset + loaded.len(),
            );
        }
    }
    Ok(())
}

fn run_delete(
    mut store: SqliteStore,
    filter: SessionFilter,
    ids: Vec<i64>,
    all: bool,
    except: Vec<i64>,
) -> Result<(), Box<dyn Error>> {
    let selection = if all {
        Selection::Exclusive(except.into_iter().collect())
    } else if !ids.is_empty() {
        Selection::Inclusive(ids.into_iter().collect())
    } else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "delete needs --ids or --all",
            )
            .exit();
    };
    let affected = delete_selected(&mut store, &selection, &filter)?;
    println!("deleted {affected} session(s)");
    Ok(())
}

fn run_export(
    store: SqliteStore,
    filter: SessionFilter,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let written = match output {
        Some(path) => export_csv(&store, &filter, File::create(path)?)?,
        None => export_csv(&store, &filter, io::stdout().lock())?,
    };
    eprintln!("exported {written} session(s)");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = FileConfigStore::new().load();
    let store = open_store(cli.database.as_ref())?;

    match cli.command {
        Command::Log { exercise, tempo, at } => run_log(store, &config, exercise, tempo, at),
        Command::List {
            filter,
            page,
            page_size,
            format,
        } => run_list(store, &config, filter.to_filter(), page, page_size, format),
        Command::Delete {
            filter,
            ids,
            all,
            except,
        } => run_delete(store, filter.to_filter(), ids, all, except),
        Command::Export { filter, output } => run_export(store, filter.to_filter(), output),
    }
}
