use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use workbench_store::{
    AppInstaller, AppOpener, AppStoreSession, CatalogLoader, DirectoryScanner, JsonSnapshotStore,
    NewAppWatcher, ReqwestFetcher,
};
use workbench_types::{AppRef, ClientMessage, MergedAppEntry, ServerMessage};

use crate::cli::AppsCommands;
use crate::config::Config;

/// Reports where an installed app lives; the CLI has no view to open it in.
struct PrintOpener {
    apps_dir: PathBuf,
}

#[async_trait]
impl AppOpener for PrintOpener {
    async fn open_app(&self, source: &str) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        println!("📂 {}", self.apps_dir.join(source).display());
        Ok(())
    }
}

struct AppsContext {
    session: AppStoreSession,
    installer: Arc<AppInstaller>,
    loader: Arc<CatalogLoader>,
}

fn build_context(config: &Config) -> AppsContext {
    let fetcher = Arc::new(ReqwestFetcher::new());
    let apps_dir = PathBuf::from(&config.apps.dir);

    let loader = Arc::new(CatalogLoader::new(fetcher.clone()));
    let installer = Arc::new(AppInstaller::new(fetcher, &apps_dir));
    let session = AppStoreSession::new(
        loader.clone(),
        Arc::new(DirectoryScanner::new(&apps_dir)),
        installer.clone(),
        Arc::new(PrintOpener { apps_dir }),
        config.store_url(),
    );

    AppsContext {
        session,
        installer,
        loader,
    }
}

pub async fn handle_apps_command(cmd: AppsCommands, config: &Config) -> Result<()> {
    let ctx = build_context(config);

    match cmd {
        AppsCommands::List => handle_list(&ctx).await,
        AppsCommands::CheckNew => handle_check_new(&ctx, config).await,
        AppsCommands::Install { source } => handle_install(&ctx, source).await,
        AppsCommands::Uninstall { name } => handle_uninstall(&ctx, name).await,
    }
}

async fn handle_list(ctx: &AppsContext) -> Result<()> {
    match ctx.session.handle(ClientMessage::ReloadApps).await {
        Some(ServerMessage::AppsLoaded {
            success: true,
            apps,
            store,
            error,
        }) => {
            let apps = apps.unwrap_or_default();
            if let Some(store) = store {
                println!("Store: {}", store);
            }
            if let Some(error) = error {
                println!("⚠️  Catalog unavailable, showing installed apps only: {}", error);
            }
            print_apps(&apps);
            Ok(())
        }
        Some(ServerMessage::AppsLoaded { error, .. }) => {
            let error = error.unwrap_or_else(|| "unknown error".to_string());
            println!("❌ Failed to list apps: {}", error);
            Err(eyre::eyre!(error))
        }
        other => Err(eyre::eyre!("Unexpected reply: {:?}", other)),
    }
}

fn print_apps(apps: &[MergedAppEntry]) {
    if apps.is_empty() {
        println!("No apps found");
        return;
    }

    for app in apps {
        let marker = if app.is_installed { "✅" } else { "📦" };
        println!("{} {} ({})", marker, app.display_name, app.source);
        if let Some(description) = &app.description {
            println!("   {}", description);
        }
        if let Some(upgrade) = &app.upgrade_source {
            println!("   ⬆️  upgrade available: {}", upgrade);
        }
    }
}

async fn handle_check_new(ctx: &AppsContext, config: &Config) -> Result<()> {
    let snapshots = Arc::new(JsonSnapshotStore::new(&config.state.path));
    let watcher = NewAppWatcher::new(ctx.loader.clone(), snapshots, config.store_url())
        .with_interval_days(config.store.check_interval_days);

    let new_apps = watcher.check_for_new_apps().await?;
    if new_apps.is_empty() {
        println!("No new apps");
    } else {
        println!("🆕 New apps in the store:");
        for name in new_apps {
            println!("  • {}", name);
        }
    }
    Ok(())
}

async fn handle_install(ctx: &AppsContext, source: String) -> Result<()> {
    let local = Path::new(&source);
    if local.is_file() {
        let bytes = tokio::fs::read(local).await?;
        let dir = ctx.installer.install_from_bytes(bytes).await?;
        println!("✅ Installed {}", dir.display());
        return Ok(());
    }

    if !source.trim().starts_with("http") {
        println!("❌ Not a package URL or archive: {}", source);
        return Err(eyre::eyre!("Cannot install from '{}'", source));
    }

    let app = AppRef {
        name: source.clone(),
        source,
    };
    match ctx.session.handle(ClientMessage::InstallApp(app)).await {
        Some(ServerMessage::AppInstalled {
            success: true, app, ..
        }) => {
            println!("✅ Installed {}", app.source);
            Ok(())
        }
        Some(ServerMessage::AppInstalled { error, .. }) => {
            let error = error.unwrap_or_else(|| "unknown error".to_string());
            println!("❌ Failed to install app: {}", error);
            Err(eyre::eyre!(error))
        }
        other => Err(eyre::eyre!("Unexpected reply: {:?}", other)),
    }
}

async fn handle_uninstall(ctx: &AppsContext, name: String) -> Result<()> {
    let app = AppRef {
        name: name.clone(),
        source: name.clone(),
    };
    match ctx.session.handle(ClientMessage::UninstallApp(app)).await {
        Some(ServerMessage::AppUninstalled { success: true, .. }) => {
            println!("✅ Uninstalled {}", name);
            Ok(())
        }
        Some(ServerMessage::AppUninstalled { .. }) => {
            println!("❌ Failed to uninstall {}", name);
            Err(eyre::eyre!("Uninstalling '{}' failed", name))
        }
        _ => {
            println!("❌ No installed app named '{}'", name);
            Err(eyre::eyre!("App '{}' is not installed", name))
        }
    }
}
