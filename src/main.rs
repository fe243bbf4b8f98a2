use std::io::BufRead;
use std::path::PathBuf;

use amqcsl::config::{default_config_path, load_config_file, write_default_config};
use amqcsl::credentials::{resolve_password, store_password};
use amqcsl::{ClientConfig, CslError, Session, TrackSearch};
use clap::{Parser, Subcommand};
use log::{error, info};

/// Command line front end for the AMQ song list database.
#[derive(Debug, Parser)]
#[command(name = "amqcsl", version = env!("CARGO_PKG_VERSION"), about)]
struct Cli {
    /// Path of the config file, defaults to the user config directory
    #[clap(long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// subcommand to run
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List matching tracks
    Tracks { term: Vec<String> },
    /// List matching songs
    Songs { term: Vec<String> },
    /// List matching artists
    Artists { term: Vec<String> },
    /// Show metadata of the tracks matching the search term
    Metadata {
        #[clap(required = true)]
        term: Vec<String>,
    },
    /// Show lists
    Lists,
    /// Show groups
    Groups,
    /// End the stored session
    Logout,
    /// Read a password from stdin into the keyring
    StorePassword,
}

fn load_config(path: Option<PathBuf>) -> amqcsl::Result<ClientConfig> {
    match path.or_else(default_config_path) {
        Some(path) => {
            if let Err(err) = write_default_config(&path) {
                info!("Could not write default config to {}: {}", path.display(), err);
            }
            load_config_file(&path)
        }
        None => Ok(ClientConfig::default()),
    }
}

fn run(command: Command, mut config: ClientConfig) -> amqcsl::Result<()> {
    if let Command::StorePassword = command {
        let username = config
            .username
            .clone()
            .ok_or_else(|| CslError::Config("username is not set".to_string()))?;
        let mut password = String::new();
        std::io::stdin().lock().read_line(&mut password)?;
        store_password(&username, password.trim_end_matches(['\r', '\n']))?;
        println!("Stored password for {username}");
        return Ok(());
    }

    resolve_password(&mut config)?;
    let mut session = Session::connect(&config)?;
    let batch_size = config.default_batch_size;
    match command {
        Command::Tracks { term } => {
            let search = TrackSearch::new(term.join(" ")).batch_size(batch_size);
            for track in session.iter_tracks(search)? {
                let track = track?;
                println!("{}  {} - {}", track.id, track.display_name(), track.credit_string());
            }
        }
        Command::Songs { term } => {
            for song in session.iter_songs(&term.join(" "), batch_size)? {
                let song = song?;
                println!("{}  {}", song.id, song.name);
            }
        }
        Command::Artists { term } => {
            for artist in session.iter_artists(&term.join(" "), batch_size)? {
                let artist = artist?;
                println!("{}  {} [{}]", artist.id, artist.label(), artist.artist_type);
            }
        }
        Command::Metadata { term } => {
            let search = TrackSearch::new(term.join(" ")).batch_size(batch_size);
            let tracks = session.collect_tracks_batched(search)?;
            for track in tracks {
                println!("{}  {}", track.id, track.display_name());
                let Some(metadata) = session.get_metadata(&track)? else {
                    println!("  (no metadata)");
                    continue;
                };
                for credit in &metadata.artist_credits {
                    println!("  {}: {}", credit.role, credit.artist.label());
                }
                for extra in &metadata.extra_metas {
                    println!("  {} {}: {}", extra.scope, extra.key, extra.value);
                }
            }
        }
        Command::Lists => {
            let mut lists: Vec<_> = session.lists()?.values().cloned().collect();
            lists.sort_by(|a, b| a.name.cmp(&b.name));
            for list in lists {
                println!("{}  {} ({})", list.id, list.name, list.count);
            }
        }
        Command::Groups => {
            let mut groups: Vec<_> = session.groups()?.values().cloned().collect();
            groups.sort_by(|a, b| a.name.cmp(&b.name));
            for group in groups {
                println!("{}  {}", group.id, group.name);
            }
        }
        Command::Logout => session.logout()?,
        Command::StorePassword => {}
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let mut clog = colog::default_builder();
    clog.filter(None, config.log_filter());
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    if let Err(err) = run(cli.command, config) {
        error!("{err}");
        return Err(err.into());
    }
    Ok(())
}
