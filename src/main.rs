use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use crypte::{Crypte, KeyRequest, config, derive_key};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "crypte")]
#[command(
    version,
    about = "Derives keys and encrypts passwords with AES-256-GCM.",
    arg_required_else_help = true
)]
struct Cli {
    /// Dotenv file holding the crypting environment (default: ./.env if present)
    #[arg(long, global = true, value_name = "PATH", env = "CRYPTE_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Derives a key from a password with PBKDF2
    #[command(long_flag = "genkey", short_flag = 'g', visible_alias = "gk")]
    Genkey {
        /// Password to stretch (read from CRYPTE_PASSWORD, stdin or a prompt when omitted)
        password: Option<String>,

        /// Salt password mixed into the random salt
        salt_password: Option<String>,

        /// Key length in bytes: 16, 24 or 32
        #[arg(default_value_t = config::DEFAULT_KEYLEN)]
        keylen: usize,

        /// Digest: sha256, sha384 or sha512
        #[arg(default_value_t = config::DEFAULT_DIGEST.name().to_string())]
        digest: String,

        /// PBKDF2 iterations (minimum 10)
        #[arg(default_value_t = config::DEFAULT_ITERATIONS)]
        iterations: u32,

        /// Output encoding: binary, hex or base64
        #[arg(default_value_t = config::DEFAULT_ENCODING.name().to_string())]
        encoding: String,
    },

    /// Encrypts a secret read from CRYPTE_SECRET, stdin or a prompt
    Encrypt,

    /// Decrypts a packed ciphertext
    #[command(arg_required_else_help = true)]
    Decrypt { packed: String },

    /// Checks a secret read from CRYPTE_SECRET, stdin or a prompt against a packed ciphertext
    #[command(arg_required_else_help = true)]
    Verify { packed: String },

    /// Checks that the crypting environment is set and secure
    Check,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("crypte={level}"))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            dotenvy::from_path(p)
                .with_context(|| format!("failed to load environment file {}", p.display()))?;
        }
        None => {
            if let Err(e) = dotenvy::dotenv() {
                if !e.not_found() {
                    return Err(e).context("failed to load .env");
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);
    load_env_file(args.env_file.as_deref())?;

    match args.command {
        Commands::Genkey {
            password,
            salt_password,
            keylen,
            digest,
            iterations,
            encoding,
        } => {
            let password = match password {
                Some(pw) => zeroize::Zeroizing::new(pw),
                None => auth::read_secret("CRYPTE_PASSWORD", "Password: ")?,
            };

            let mut request = KeyRequest::new(password.as_str())
                .keylen(keylen)
                .digest(digest)
                .iterations(iterations)
                .encoding(encoding);
            if let Some(salt_password) = salt_password.filter(|s| !s.is_empty()) {
                request = request.salt_password(salt_password);
            }

            let key = derive_key(&request).context("cannot generate a key")?;
            println!("Generated key :");
            println!("encoding : {}", key.encoding());
            println!("bits : {}", key.bits());
            println!("key : {}", key.to_printable().as_str());
        }
        Commands::Encrypt => {
            let crypte = Crypte::from_env()?;
            let secret = auth::read_secret("CRYPTE_SECRET", "Secret: ")?;
            println!("{}", crypte.encrypt(&secret)?);
        }
        Commands::Decrypt { packed } => {
            let crypte = Crypte::from_env()?;
            let plaintext = crypte.decrypt(packed.trim())?;
            println!("{}", plaintext.as_str());
        }
        Commands::Verify { packed } => {
            let crypte = Crypte::from_env()?;
            let candidate = auth::read_secret("CRYPTE_SECRET", "Secret: ")?;
            if crypte.verify(&candidate, packed.trim())? {
                println!("match");
            } else {
                bail!("no match");
            }
        }
        Commands::Check => {
            let crypte = Crypte::from_env()?;
            let env = crypte.environment();
            println!("crypting environment set and secure");
            println!("cipher : {}", env.cipher_algorithm());
            println!("salt hash : {}", env.salt_hash());
            println!("iv digest : {}", env.iv_digest());
            println!("iv iterations : {}", env.iv_iterations());
        }
    }

    Ok(())
}
