//! Virtual try-on studio: application entry point.
//!
//! Module declarations and startup wiring only. No business logic lives
//! here.
//!
//! Domains:
//!   - catalog.rs     : the products on offer
//!   - config.rs      : layered AppConfig
//!   - credentials/   : credential gate + OS keychain host
//!   - imaging/       : photo / product image encoding
//!   - llm/           : the two AI capability calls (Gemini, dry run)
//!   - wizard/        : the three-step try-on state machine
//!   - shell.rs       : interactive terminal front end

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod imaging;
pub mod llm;
pub mod shell;
pub mod wizard;

use catalog::Catalog;
use clap::Parser;
use config::{default_config_path, AppConfig};
use credentials::{CredentialGate, CredentialHost, KeyPrompt, KeyringHost};
use imaging::ImageCodec;
use llm::{build_capability, ApiKeyResolver};
use shell::{Args, Console, Shell};
use std::sync::Arc;
use wizard::{CallOrdering, Wizard};

/// Entry point, called from `main`.
pub fn run() {
    // .env.local wins over .env; the first one found is loaded.
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let roots = [std::path::PathBuf::from("."), manifest_dir.to_path_buf()];

    'env_load: for root in &roots {
        for env_file in [".env.local", ".env"] {
            let path = root.join(env_file);
            if path.exists() {
                match dotenvy::from_path(&path) {
                    Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                    Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
                }
                break 'env_load;
            }
        }
    }

    env_logger::init();

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("tryon-studio: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(start(args)) {
        log::error!("[STARTUP] {}", e);
        eprintln!("tryon-studio: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    if args.init_config {
        let path = args.config.clone().unwrap_or_else(default_config_path);
        config.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    log::info!("[STARTUP] {} products", catalog.products().len());

    let console = Arc::new(Console::stdin());

    // Resolved on every call so a newly selected key takes effect at once.
    let (gate, resolver) = if config.provider.needs_credential() {
        let prompt: Arc<dyn KeyPrompt> = console.clone();
        let keyring =
            Arc::new(KeyringHost::new(Some(prompt)).remember_selection(config.remember_key));
        let host: Arc<dyn CredentialHost> = keyring.clone();
        let resolver: ApiKeyResolver = Arc::new(move || keyring.resolve_key());
        (CredentialGate::new(Some(host), config.credential_fallback), resolver)
    } else {
        let resolver: ApiKeyResolver = Arc::new(|| None::<String>);
        (CredentialGate::not_required(), resolver)
    };
    let capability = build_capability(config.provider, config.gemini_settings(), resolver);
    let images = Arc::new(ImageCodec::new(
        config.assets_dir.clone(),
        config.request_timeout(),
    ));

    let ordering = if config.parallel_calls {
        CallOrdering::Parallel
    } else {
        CallOrdering::Sequential
    };
    let wizard = Wizard::new(gate, capability, images).with_ordering(ordering);

    Shell::new(
        wizard,
        catalog,
        console,
        config.output_dir.clone(),
        config.storefront_url.clone(),
    )
    .run()
    .await?;
    Ok(())
}
