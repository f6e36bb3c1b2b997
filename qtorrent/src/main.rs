use std::path::PathBuf;

use clap::Parser;
use logger::logger_receiver::Logger;
use qtorrent::{
    bt_client::client::{generate_peer_id, BtClient},
    config::cfg::Cfg,
    torrent_parser::parser::TorrentParser,
};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a .torrent metainfo file (repeatable)
    #[arg(short, long, required = true)]
    file: Vec<String>,
    #[arg(short, long)]
    config: String,
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = Cfg::new(args.config.trim()).expect("Config file not found or incomplete");
    let logger = Logger::new(&config.log_directory, config.max_log_file_kb_size)
        .expect("logger could not be created");

    let mut client = BtClient::new(config, logger.new_sender(), generate_peer_id());
    for file in &args.file {
        let path = PathBuf::from(file.trim());
        let torrent = TorrentParser::parse(&path).expect("parser could not read the torrent file");
        client.add_torrent(torrent);
    }

    if let Err(err) = client.run() {
        eprintln!("Download failed: {:?}", err);
        std::process::exit(1);
    }
}
