#[derive(clap::Parser, Debug)]
#[clap(name = "workbench", version, about = "Run workbench commands and manage apps")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Inspect app catalogs
    Catalog {
        #[clap(subcommand)]
        command: CatalogCommands,
    },
    /// Manage installed apps
    Apps {
        #[clap(subcommand)]
        command: AppsCommands,
    },
    /// Run a declared command
    Run {
        /// Command id from the entries file
        id: String,
        /// Arguments passed to the command. Each is parsed as JSON, or taken as a string.
        args: Vec<String>,
    },
    /// Open a declared app and print its view
    Open {
        /// App script path or display name
        app: String,
    },
    /// Manage configuration
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum CatalogCommands {
    /// Fetch a catalog and print its apps
    Show {
        /// Do not follow the catalog's imports
        #[clap(long)]
        no_imports: bool,
        /// Catalog URL (defaults to the configured store)
        url: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum AppsCommands {
    /// List installed and available apps
    List,
    /// Report apps added to the catalog since the last check
    CheckNew,
    /// Install an app package from a URL or a local archive
    Install {
        /// Package URL or path to a .tar.gz file
        source: String,
    },
    /// Remove an installed app
    Uninstall {
        /// Directory name of the installed app
        name: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., store.url, apps.dir)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
}
