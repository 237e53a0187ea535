//! SegmentKV CLI Client
//!
//! Sends one command to a running server and prints the result.

use std::net::TcpStream;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use segmentkv::protocol::{read_response, write_command, Command, Response, Status};

/// SegmentKV CLI
#[derive(Parser, Debug)]
#[command(name = "segmentkv-cli")]
#[command(about = "CLI for the SegmentKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    /// Socket timeout in ms
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to look up
        key: String,
    },

    /// Store a key-value pair
    Put {
        /// The key (no spaces)
        key: String,

        /// The value
        value: String,
    },

    /// Flush the active MemTable to segments
    Flush,

    /// Merge undersized segments
    Compact,

    /// Ping the server
    Ping,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get { key } => Command::Get { key: key.into_bytes() },
            Commands::Put { key, value } => Command::Put {
                key: key.into_bytes(),
                value: value.into_bytes(),
            },
            Commands::Flush => Command::Flush,
            Commands::Compact => Command::Compact,
            Commands::Ping => Command::Ping,
        }
    }
}

fn send(server: &str, timeout: Duration, command: &Command) -> segmentkv::Result<Response> {
    let mut stream = TcpStream::connect(server)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    write_command(&mut stream, command)?;
    read_response(&mut stream)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let command = Command::from(args.command);

    let response = match send(&args.server, Duration::from_millis(args.timeout_ms), &command) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match response.status {
        Status::Ok => {
            match command {
                Command::Put { .. } => println!("OK"),
                _ => println!("{}", response.payload_text()),
            }
            ExitCode::SUCCESS
        }
        Status::NotFound => {
            println!("(not found)");
            ExitCode::FAILURE
        }
        Status::Error => {
            eprintln!("error: {}", response.payload_text());
            ExitCode::FAILURE
        }
    }
}
