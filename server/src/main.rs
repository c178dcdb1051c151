use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use scribble_session_common::settings_common::LobbySettings;
use scribble_session_server::config::LobbyConfig;
use scribble_session_server::lobbystate::Lobby;
use scribble_session_server::server::LobbyServer;
use scribble_session_server::words::WordList;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, value_parser, default_value_t = 3000)]
    port: u16,
    #[clap(short, long, value_parser, default_value = "assets/words.txt")]
    words: String,
    #[clap(long, value_parser, default_value_t = 12)]
    max_players: usize,
    #[clap(long, value_parser, default_value_t = 4)]
    rounds: u32,
    /// seconds per drawing
    #[clap(long, value_parser, default_value_t = 120)]
    drawing_time: u32,
    /// chance in percent of offering a custom word
    #[clap(long, value_parser, default_value_t = 50)]
    custom_words_chance: u8,
    #[clap(long, value_parser, default_value_t = 1)]
    clients_per_ip: usize,
    #[clap(long, action)]
    public: bool,
    #[clap(long, action)]
    disable_votekick: bool,
    /// seconds a disconnected player keeps their slot
    #[clap(long, value_parser, default_value_t = 30)]
    grace_period: u64,
    /// comma separated list of additional words
    #[clap(long, value_parser, value_delimiter = ',')]
    custom_words: Vec<String>,
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribble_session_server=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(false)
                .with_target(false),
        )
        .init();
}

/// Main function for the server.
///
fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();
    let args = Args::parse();

    let words = read_words_from_file(&args.words)?;
    info!(count = words.len(), file = %args.words, "loaded words");

    let config = LobbyConfig {
        settings: LobbySettings {
            max_players: args.max_players,
            public: args.public,
            enable_votekick: !args.disable_votekick,
            custom_words_chance: args.custom_words_chance,
            clients_per_ip_limit: args.clients_per_ip,
            drawing_time: args.drawing_time,
            rounds: args.rounds,
        },
        reconnect_grace: Duration::from_secs(args.grace_period),
        custom_words: args
            .custom_words
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect(),
        ..LobbyConfig::default()
    };
    let lobby = Lobby::new(config, Box::new(WordList::new(words)))?;

    LobbyServer::init(Ipv4Addr::UNSPECIFIED, args.port, lobby).run()?;
    Ok(())
}

/// Get Words from File and put them in a vector
///
/// # Arguments
/// * `filename` - The path to the file containing the words.
///
/// # Returns
/// * Vec<String> - A vector of strings containing the words, blank lines
///   skipped.
fn read_words_from_file(filename: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let file = File::open(filename)?;
    let buf = BufReader::new(file);
    let mut words = Vec::new();
    for line in buf.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            words.push(line.trim().to_string());
        }
    }
    if words.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "word list is empty"));
    }
    Ok(words)
}
