use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use storage_toolkit_core::model::GroupSort;

#[derive(Debug, Parser)]
#[command(name = "storage-toolkit")]
#[command(about = "Find duplicate attachments and report storage usage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Override `server.bind_addr`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a duplicate scan over the catalogue and summarise it
    Scan,
    /// Scan, then list one page of duplicate groups
    Duplicates {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        size: usize,
        /// Media type prefix, e.g. `image/`
        #[arg(long)]
        media_type: Option<String>,
        #[arg(long, value_enum, default_value_t = SortKey::SavableSize)]
        sort: SortKey,
    },
    /// Scan, then delete one duplicate attachment
    Delete {
        attachment_name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print storage statistics by type, policy and group
    Stats,
    /// Register every file under a directory as an attachment
    Import {
        dir: PathBuf,
        #[arg(long, default_value = "default")]
        policy: String,
        /// Template used when the policy does not exist yet
        #[arg(long, default_value = "local")]
        template: String,
        #[arg(long)]
        group: Option<String>,
        /// Glob patterns to skip
        #[arg(long = "ignore")]
        ignore_globs: Vec<String>,
    },
    /// Create or rename an attachment group
    AddGroup {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Record (or remove) a link from `source` to an attachment
    Reference {
        attachment_name: String,
        source: String,
        #[arg(long)]
        remove: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Wipe the attachment catalogue: policies, groups, attachments and references.
    /// Files under `storage_root` are left alone
    ResetCatalogue,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    SavableSize,
    FileSize,
    FileCount,
}

impl From<SortKey> for GroupSort {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::SavableSize => GroupSort::SavableSize,
            SortKey::FileSize => GroupSort::FileSize,
            SortKey::FileCount => GroupSort::FileCount,
        }
    }
}
