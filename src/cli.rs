use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tidyscan")]
#[command(about = "Analyze local storage usage by category", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Human
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a full category scan")]
    Scan {
        #[arg(short = 'F', long, default_value = "human")]
        format: OutputFormat,
        #[arg(short, long)]
        out: Option<String>,
    },
    #[command(about = "Show the cached scan and access state")]
    Status {
        #[arg(short = 'F', long, default_value = "human")]
        format: OutputFormat,
    },
    #[command(about = "List the contents of one category")]
    Items {
        #[arg(short, long)]
        category: String,
        #[arg(short = 'F', long, default_value = "human")]
        format: OutputFormat,
        #[arg(short, long)]
        out: Option<String>,
    },
    #[command(about = "Sweep common directories for the largest files")]
    Largest {
        #[arg(short, long, help = "Minimum file size in MB")]
        threshold: Option<u64>,
        #[arg(short, long, help = "Keep the top N results")]
        limit: Option<usize>,
        #[arg(long, help = "Sweep deadline in seconds")]
        timeout: Option<u64>,
        #[arg(short = 'F', long, default_value = "human")]
        format: OutputFormat,
        #[arg(short, long)]
        out: Option<String>,
    },
    #[command(about = "Grant scan access to a root directory")]
    Grant { path: String },
    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
pub enum ConfigActions {
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Set a configuration value")]
    Set {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        value: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}
