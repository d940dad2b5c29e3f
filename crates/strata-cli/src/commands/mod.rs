use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

use strata_config::{Config, DEFAULT_CONFIG_FILE_NAME, DEFAULT_ENCRYPTED_SUFFIX, LoadOptions};
use strata_core::{ConfigFormat, Result};
use tracing::warn;

mod crypt;
mod watch;

/// Layered configuration loader with includes, encrypted sources and hot reload
#[derive(Parser)]
#[command(name = "strata", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Entry config file
    #[arg(short, long, global = true, env = "STRATA_CONFIG", default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Follow `include:` keys from the entry file
    #[arg(long, global = true)]
    include: bool,

    /// AES key for encrypted config files (16 or 32 bytes)
    #[arg(long, global = true, env = "STRATA_AES_KEY", hide_env_values = true)]
    aes_key: Option<String>,

    /// File name suffix marking an encrypted config file
    #[arg(long, global = true, default_value = DEFAULT_ENCRYPTED_SUFFIX)]
    encrypted_suffix: String,

    /// Bind a flag value that ranks above file content (KEY=VALUE, repeatable)
    #[arg(long = "set", global = true, value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one resolved value
    Get {
        /// Key in dot notation (e.g. server.port)
        key: String,
        /// How to read the value
        #[arg(long = "as", value_enum, default_value_t = ValueKind::String)]
        kind: ValueKind,
    },
    /// Print every resolved setting
    Dump {
        /// Output format: json, yaml or toml
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
    /// List every leaf key in dot notation
    Keys,
    /// Load with hot reload and report each reload until Ctrl-C
    Watch,
    /// Encrypt a config file with the AES key
    Encrypt {
        input: PathBuf,
        /// Output path (default: input with the encrypted suffix appended)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt a config file with the AES key
    Decrypt {
        input: PathBuf,
        /// Output path (default: input with the encrypted suffix stripped)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load settings from a Spring Cloud Config server and print them
    Remote {
        /// Config server base URL
        #[arg(long)]
        url: String,
        #[arg(long)]
        app: String,
        #[arg(long)]
        profile: String,
        #[arg(long, default_value = "master")]
        label: String,
        /// Property holding a whole YAML document instead of flat properties
        #[arg(long)]
        raw_key: Option<String>,
        /// Output format: json, yaml or toml
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ValueKind {
    String,
    Int,
    Bool,
    Duration,
    Json,
}

/// Parse "key=value" CLI arguments.
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.init_tracing();

        match &self.command {
            Commands::Get { key, kind } => {
                let cfg = self.load()?;
                Self::cmd_get(&cfg, key, *kind)
            }
            Commands::Dump { format } => {
                let cfg = self.load()?;
                Self::cmd_dump(&cfg, *format)
            }
            Commands::Keys => {
                let cfg = self.load()?;
                for key in cfg.all_keys() {
                    println!("{key}");
                }
                Ok(())
            }
            Commands::Watch => {
                let cfg = self.flagged_config()?;
                watch::cmd_watch(cfg, &self.config, self.load_options()).await
            }
            Commands::Encrypt { input, output } => crypt::cmd_encrypt(
                self.aes_key.as_deref(),
                &self.encrypted_suffix,
                input,
                output.clone(),
            ),
            Commands::Decrypt { input, output } => crypt::cmd_decrypt(
                self.aes_key.as_deref(),
                &self.encrypted_suffix,
                input,
                output.clone(),
            ),
            Commands::Remote {
                url,
                app,
                profile,
                label,
                raw_key,
                format,
            } => {
                let cfg = self.flagged_config()?;
                match raw_key {
                    Some(key) => {
                        cfg.load_from_config_server_with_raw_yaml(url, app, profile, label, key)
                            .await?
                    }
                    None => cfg.load_from_config_server(url, app, profile, label).await?,
                }
                Self::cmd_dump(&cfg, *format)
            }
        }
    }

    fn init_tracing(&self) {
        // --verbose > --quiet > --log-level > warn
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or("warn")
        };

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

        match self.log_format {
            LogFormat::Json => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .with_target(true)
                .init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init(),
        }
    }

    fn load_options(&self) -> LoadOptions {
        let mut options = LoadOptions::new().with_encrypted_suffix(self.encrypted_suffix.clone());
        if self.include {
            options = options.with_include();
        }
        if let Some(key) = &self.aes_key {
            options = options.with_aes_key(key.as_bytes());
        }
        options
    }

    /// A fresh instance with every `--set` pair bound as a flag.
    fn flagged_config(&self) -> Result<Config> {
        let cfg = Config::new();
        cfg.bind_flags(self.set.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        Ok(cfg)
    }

    fn load(&self) -> Result<Config> {
        let cfg = self.flagged_config()?;
        cfg.load_from_file(&self.config, &self.load_options())?;
        Ok(cfg)
    }

    fn cmd_get(cfg: &Config, key: &str, kind: ValueKind) -> Result<()> {
        if !cfg.is_set(key) {
            warn!(key, "key is not set, printing the zero value");
        }

        let out = match kind {
            ValueKind::String => cfg.get_string(key),
            ValueKind::Int => cfg.get_int(key).to_string(),
            ValueKind::Bool => cfg.get_bool(key).to_string(),
            ValueKind::Duration => format!("{:?}", cfg.get_duration(key)),
            ValueKind::Json => serde_json::to_string_pretty(&cfg.get(key).unwrap_or(Value::Null))?,
        };
        println!("{out}");
        Ok(())
    }

    fn cmd_dump(cfg: &Config, format: ConfigFormat) -> Result<()> {
        let rendered = format.render(&cfg.all_settings())?;
        println!("{}", rendered.trim_end());
        Ok(())
    }
}
