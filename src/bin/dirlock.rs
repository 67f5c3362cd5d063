//! Dirlock CLI - Password-based folder locking
//!
//! Command-line interface for locking a folder into an encrypted envelope
//! (AES-256-GCM with a PBKDF2-derived key) and unlocking it again.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use dirlock::file_ops;
use dirlock::passphrase::{
    EnvPassphraseReader, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};

#[derive(Parser)]
#[command(name = "dirlock")]
#[command(version)]
#[command(about = "Password-based folder locking.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true, conflicts_with = "passphrase_env")]
    passphrase_stdin: bool,

    /// Read passphrase from the named environment variable
    #[arg(long, global = true, value_name = "VAR")]
    passphrase_env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lock a folder into an encrypted file
    #[command(alias = "l")]
    Lock {
        /// Path to the folder to lock
        folder: PathBuf,

        /// Path to write the encrypted file to (default: <FOLDER>.dirlock)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Unlock an encrypted file
    #[command(alias = "u")]
    Unlock {
        /// Path to the encrypted file to unlock
        input: PathBuf,

        /// Path to write the recovered archive to (default: <INPUT minus .dirlock>.zip)
        #[arg(short, long, value_name = "FILE", conflicts_with = "extract_to")]
        output: Option<PathBuf>,

        /// Extract the folder contents into this directory instead of
        /// writing the archive
        #[arg(long, value_name = "DIR")]
        extract_to: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let mut reader = get_passphrase_reader(cli.passphrase_stdin, cli.passphrase_env.as_deref());

    let result = match cli.command {
        Commands::Lock { folder, output } => {
            let output = output.unwrap_or_else(|| default_lock_output(&folder));
            file_ops::lock_folder(&folder, &output, &mut *reader)
                .map(|()| format!("locked {} -> {}", folder.display(), output.display()))
        }
        Commands::Unlock {
            input,
            output,
            extract_to,
        } => match extract_to {
            Some(dir) => file_ops::unlock_into(&input, &dir, &mut *reader)
                .map(|()| format!("unlocked {} -> {}", input.display(), dir.display())),
            None => {
                let output = output.unwrap_or_else(|| default_unlock_output(&input));
                file_ops::unlock_file(&input, &output, &mut *reader)
                    .map(|()| format!("unlocked {} -> {}", input.display(), output.display()))
            }
        },
    };

    match result {
        Ok(message) => println!("{}", message),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn get_passphrase_reader(use_stdin: bool, env_var: Option<&str>) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if let Some(var) = env_var {
        Box::new(EnvPassphraseReader::new(var))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn default_lock_output(folder: &Path) -> PathBuf {
    let mut name = folder.file_name().unwrap_or(folder.as_os_str()).to_owned();
    name.push(".dirlock");
    folder.with_file_name(name)
}

fn default_unlock_output(input: &Path) -> PathBuf {
    let stem = match input.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.strip_suffix(".dirlock").unwrap_or(name).to_owned(),
        None => "unlocked".to_owned(),
    };
    input.with_file_name(format!("{stem}.zip"))
}
