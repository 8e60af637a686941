use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use wallgrab::cache::DownloadCache;
use wallgrab::collect::{CollectError, CollectOptions, Collector, Failsafe};
use wallgrab::config;
use wallgrab::connectivity::PingProbe;
use wallgrab::http::ReqwestBackend;
use wallgrab::logging;

#[derive(Parser)]
#[command(name = "wallgrab")]
#[command(about = "Download a picture from a Reddit-style JSON listing")]
#[command(long_about = "\
Download a picture from a Reddit-style JSON listing

One run fetches the listing, visits its posts in random order, and saves
the first usable image into the download directory. The saved file's
path is printed to stdout; all diagnostics go to stderr, so the output
composes directly:

  feh --bg-fill \"$(wallgrab fetch)\"

Every attempt is remembered in a cache file, so repeat runs skip posts
that turned out to be removed, non-images, or GIFs without contacting
them again. When the whole listing is exhausted, --fallback picks a
previously collected image instead of failing.")]
#[command(version)]
struct Cli {
    /// Download directory
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = config::default_dir())]
    dir: PathBuf,

    /// Cache file location [default: <dir>/.wallgrab-cache.json]
    #[arg(long, global = true, value_name = "PATH")]
    cache_file: Option<PathBuf>,

    /// Raise log detail (-v info, -vv debug)
    #[arg(short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect one image from the listing and print its path
    Fetch {
        /// Listing URL
        #[arg(short, long, default_value = config::DEFAULT_LISTING_URL)]
        url: String,

        /// Skip images that were already collected
        #[arg(short, long)]
        no_repeat: bool,

        /// Where to turn when the listing yields nothing [default: fail]
        #[arg(long, value_enum, value_name = "POLICY")]
        fallback: Option<Failsafe>,
    },
    /// Print a random image path from the download directory
    Random,
    /// Remove downloaded images and reset the cache
    Clear {
        /// Keep the images; only reset the cache
        #[arg(long)]
        cache_only: bool,
    },
}

fn main() -> ExitCode {
    let Cli {
        dir,
        cache_file,
        verbose,
        command,
    } = Cli::parse();
    logging::init(verbose);

    let Some(command) = command else {
        // Misuse, not an error worth logging: usage goes to stderr, full
        // help when verbose.
        let mut cmd = Cli::command();
        if verbose > 0 {
            eprintln!("{}", cmd.render_help());
        } else {
            eprintln!("{}", cmd.render_usage());
        }
        return ExitCode::FAILURE;
    };

    match run(&dir, cache_file, command) {
        Ok(Some(path)) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    dir: &Path,
    cache_file: Option<PathBuf>,
    command: Command,
) -> Result<Option<PathBuf>, CollectError> {
    let collector = Collector::new(dir)?;
    collector.ensure_dir()?;

    let cache_path = cache_file.unwrap_or_else(|| config::default_cache_file(dir));
    let mut cache = DownloadCache::at_path(cache_path);
    let mut rng = rand::rng();

    match command {
        Command::Fetch {
            url,
            no_repeat,
            fallback,
        } => {
            let http = ReqwestBackend::new()?;
            let options = CollectOptions {
                listing_url: url,
                no_repeat,
                failsafe: fallback.unwrap_or(Failsafe::Fail),
                ..CollectOptions::default()
            };
            let collected = collector.collect(&http, &PingProbe, &mut cache, &mut rng, &options)?;
            Ok(Some(collected.path))
        }
        Command::Random => Ok(Some(collector.random_existing(&mut rng)?)),
        Command::Clear { cache_only } => {
            if !cache_only {
                collector.clear_downloads()?;
            }
            cache.reinitialize()?;
            Ok(None)
        }
    }
}
