use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "packer")]
#[command(version)]
#[command(about = "Inspect the zip archive embedded in a self-contained binary", long_about = None)]
#[command(after_help = "Examples:\n  \
  packer info                         is an archive appended to this binary?\n  \
  packer --file ./app ls assets -l    list a directory inside ./app\n  \
  packer --file https://example.com/app cat index.html")]
pub struct Cli {
    /// Binary to inspect: local path or HTTP URL (default: this executable)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<String>,

    /// Directory to serve when no archive is embedded
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
    pub dir: String,

    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report where the embedded archive sits
    Info,

    /// List a directory
    Ls {
        /// Directory to list
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,

        /// Long format: size, modification time, kind
        #[arg(short = 'l')]
        long: bool,
    },

    /// Write a file to stdout
    Cat {
        #[arg(value_name = "PATH")]
        path: String,

        /// Start at this byte offset
        #[arg(long, value_name = "N", default_value_t = 0)]
        offset: u64,

        /// Stop after this many bytes
        #[arg(long, value_name = "N")]
        length: Option<u64>,
    },

    /// Show the descriptor of a path
    Stat {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file
            .as_deref()
            .is_some_and(|f| f.starts_with("http://") || f.starts_with("https://"))
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
