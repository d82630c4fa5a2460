//! HexCore CLI - Command line front end for the encrypted vault.
//!
//! Every vault command passes the PIN gate first. Long-running commands run
//! on a task thread while the main loop renders their progress.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use hexcore_common::Algorithm;
use hexcore_crypto::{EncryptionEngine, FileEngine};
use hexcore_vault::{AccessGate, TaskEvent, TaskHandle, VaultOperations, VaultSettings};

/// Environment variable supplying the PIN for non-interactive use.
const ENV_PIN: &str = "HEX_PIN";

/// Interval between event drains.
const TICK: Duration = Duration::from_millis(50);

const BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "hexcore")]
#[command(about = "HexCore - Password-protected file vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON settings file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Vault directory (overrides settings and environment).
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Export directory (overrides settings and environment).
    #[arg(long, global = true)]
    export: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file and move it into the vault.
    Encrypt {
        /// File to encrypt.
        file: PathBuf,

        /// Body cipher: "aes", "chacha20" or "rsa".
        #[arg(short, long, value_parser = parse_algorithm)]
        algo: Option<Algorithm>,

        /// Leave the plaintext source in place.
        #[arg(long)]
        keep_original: bool,
    },

    /// Decrypt every vault file into the export directory.
    Restore {
        /// Leave encrypted files in the vault after export.
        #[arg(long)]
        keep_encrypted: bool,

        /// Print the batch result as JSON instead of rendering progress.
        #[arg(long)]
        json: bool,
    },

    /// Check the integrity of every vault file.
    Verify {
        /// Print the report as JSON instead of rendering progress.
        #[arg(long)]
        json: bool,
    },

    /// Show the header of an encrypted file. No PIN required.
    Inspect {
        /// Encrypted file.
        file: PathBuf,

        /// Print the header as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the files stored in the vault.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = load_settings(&cli)?;
    debug!(?settings, "Settings resolved");

    match cli.command {
        Commands::Inspect { file, json } => cmd_inspect(&file, json),
        Commands::List => cmd_list(&unlock(&settings)?),
        Commands::Encrypt {
            file,
            algo,
            keep_original,
        } => {
            let ops = unlock(&settings)?.delete_original(settings.delete_original && !keep_original);
            cmd_encrypt(&ops, &file, algo.unwrap_or(settings.default_algorithm)).await
        }
        Commands::Restore {
            keep_encrypted,
            json,
        } => {
            let ops =
                unlock(&settings)?.delete_encrypted(settings.delete_encrypted && !keep_encrypted);
            cmd_restore(&ops, json).await
        }
        Commands::Verify { json } => cmd_verify(&unlock(&settings)?, json).await,
    }
}

fn parse_algorithm(s: &str) -> std::result::Result<Algorithm, String> {
    s.parse().map_err(|e: hexcore_common::Error| e.to_string())
}

/// Resolve settings: flags > environment > settings file > defaults.
fn load_settings(cli: &Cli) -> Result<VaultSettings> {
    let mut settings =
        VaultSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(dir) = &cli.vault {
        settings.vault_dir = dir.clone();
    }
    if let Some(dir) = &cli.export {
        settings.export_dir = dir.clone();
    }
    settings
        .ensure_dirs()
        .context("Failed to create vault directories")?;
    Ok(settings)
}

/// Read the PIN and pass the access gate.
fn unlock(settings: &VaultSettings) -> Result<VaultOperations> {
    let gate = AccessGate::from_env().context("Invalid administrator PIN")?;
    let attempt = Zeroizing::new(match std::env::var(ENV_PIN) {
        Ok(pin) => pin,
        Err(_) => rpassword::prompt_password("Enter PIN: ").context("Failed to read PIN")?,
    });
    let credential = gate.unlock(attempt.trim()).context("Unlock failed")?;
    info!("Vault unlocked");

    let engine: Arc<dyn FileEngine> = Arc::new(EncryptionEngine::new());
    Ok(VaultOperations::from_settings(settings, engine, credential))
}

/// Encrypt one file into the vault.
async fn cmd_encrypt(ops: &VaultOperations, file: &Path, algorithm: Algorithm) -> Result<()> {
    info!("Encrypting {} with {}", file.display(), algorithm);
    let handle = ops
        .encrypt_task(file, algorithm)
        .context("Failed to start encryption")?;
    run_until_finished(handle).await;
    Ok(())
}

/// Restore the whole vault.
async fn cmd_restore(ops: &VaultOperations, json: bool) -> Result<()> {
    if json {
        let stats = ops
            .manager()
            .decrypt_vault(ops.engine(), ops.password(), ops.deletes_encrypted())
            .context("Restore failed")?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let handle = ops.restore_task().context("Failed to start restore")?;
    run_until_finished(handle).await;
    Ok(())
}

/// Scan the vault for corrupted files.
async fn cmd_verify(ops: &VaultOperations, json: bool) -> Result<()> {
    if json {
        let report = ops
            .manager()
            .verify_vault(ops.engine(), |_| {})
            .context("Verification failed")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let handle = ops.verify_task().context("Failed to start verification")?;
    run_until_finished(handle).await;
    Ok(())
}

/// Print the header fields of an encrypted file.
fn cmd_inspect(file: &Path, json: bool) -> Result<()> {
    let info = EncryptionEngine::new()
        .inspect(file)
        .with_context(|| format!("Failed to read header of {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("  Version:   {}", info.version);
    println!("  Algorithm: {}", info.algorithm);
    println!("  Body:      {} bytes", info.body_len);
    println!("  Checksum:  {}", info.checksum);

    Ok(())
}

/// List vault contents.
fn cmd_list(ops: &VaultOperations) -> Result<()> {
    let files = ops.manager().list_vault().context("Failed to list vault")?;

    if files.is_empty() {
        println!("Vault is empty.");
    } else {
        println!("Contents of {}:", ops.manager().vault_dir().display());
        for path in files {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            println!("  [FILE] {} ({} bytes)", name, size);
        }
    }

    Ok(())
}

/// Drain task events once per tick until the task finishes.
async fn run_until_finished(mut handle: TaskHandle) {
    let mut tick = tokio::time::interval(TICK);
    let mut bar_visible = false;

    while !handle.is_finished() {
        tick.tick().await;
        for event in handle.drain() {
            render(&event, &mut bar_visible);
        }
    }
}

fn render(event: &TaskEvent, bar_visible: &mut bool) {
    let mut err = std::io::stderr();
    match event {
        TaskEvent::Progress(fraction) => {
            let filled = (fraction * BAR_WIDTH as f32).round() as usize;
            let _ = write!(
                err,
                "\r[{}{}] {:>3.0}%",
                "#".repeat(filled),
                ".".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
                fraction * 100.0
            );
            let _ = err.flush();
            *bar_visible = true;
        }
        TaskEvent::Log(line) => {
            clear_bar(bar_visible);
            println!("  > {}", line);
        }
        TaskEvent::Important(banner) => {
            clear_bar(bar_visible);
            println!("== {} ==", banner);
        }
        TaskEvent::Finished => clear_bar(bar_visible),
    }
}

fn clear_bar(bar_visible: &mut bool) {
    if *bar_visible {
        eprintln!();
        *bar_visible = false;
    }
}
