use std::sync::Arc;

use eyre::Result;
use workbench_store::{CatalogLoader, ReqwestFetcher, resolve_store_url};

use crate::cli::CatalogCommands;
use crate::config::Config;

pub async fn handle_catalog_command(cmd: CatalogCommands, config: &Config) -> Result<()> {
    match cmd {
        CatalogCommands::Show { no_imports, url } => {
            let url = match url {
                Some(url) => resolve_store_url(Some(&url)),
                None => config.store_url(),
            };
            handle_show(&url, !no_imports).await
        }
    }
}

async fn handle_show(url: &str, resolve_imports: bool) -> Result<()> {
    let loader = CatalogLoader::new(Arc::new(ReqwestFetcher::new()));
    let catalog = loader.load(url, resolve_imports).await?;

    println!(
        "📚 {} ({} apps)",
        catalog.name.as_deref().unwrap_or(url),
        catalog.apps.len()
    );

    if catalog.apps.is_empty() {
        println!("  No apps listed");
        return Ok(());
    }

    for app in &catalog.apps {
        let title = app.display_name.as_deref().unwrap_or(&app.name);
        println!("  📦 {} ({})", title, app.source);
        if let Some(description) = &app.description {
            println!("     {}", description);
        }
        if let Some(origin) = &app.origin
            && origin.url != url
        {
            println!("     from {}", origin.url);
        }
    }

    Ok(())
}
