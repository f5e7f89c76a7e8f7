use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "murmur")]
#[command(version, about = "Murmur - anonymous message relay bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database path
    #[arg(long, global = true, env = "MURMUR_DB_PATH", default_value = "murmur.db")]
    pub db: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Provision the bot: token, administrator id, and a fresh salt
    Setup,
}
