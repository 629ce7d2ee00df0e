//! Interactive terminal front end.
//!
//! Renders the wizard's current screen (credential splash or one of the
//! three steps) and maps typed commands onto wizard operations. The shell
//! owns stdin; the same [`Console`] answers the keychain host's key prompt.

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::credentials::{CredentialState, KeyPrompt};
use crate::imaging::InlineImage;
use crate::llm::provider::all_providers;
use crate::llm::ProviderKind;
use crate::wizard::{
    messages, FailureKind, Phase, Screen, TryOnOutcome, TryOnStage, UploadOutcome, Wizard,
    WizardEvent, WizardStep,
};
use async_trait::async_trait;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

// ── Command-line arguments ─────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "tryon-studio",
    version,
    about = "Guided virtual try-on: pick a set, upload a photo, get a composite and a size"
)]
pub struct Args {
    /// Config file (default: <config dir>/tryon-studio/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Capability provider: gemini or dryrun
    #[arg(long)]
    pub provider: Option<ProviderKind>,
    /// Where result images are written
    #[arg(long, env = "TRYON_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
    /// JSON product catalog replacing the built-in one
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Run size estimate and composite concurrently
    #[arg(long)]
    pub parallel: bool,
    /// Write the effective config file and exit
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Apply flag overrides on top of file + env config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(path) = &self.catalog {
            config.catalog_path = Some(path.clone());
        }
        if self.parallel {
            config.parallel_calls = true;
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Products,
    Select(String),
    Next,
    Back,
    Upload(PathBuf),
    Clear,
    Start,
    Retry,
    Reset,
    Key,
    Save(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

impl ShellCommand {
    /// Usable while the credential screen is showing.
    fn allowed_without_credential(&self) -> bool {
        matches!(
            self,
            ShellCommand::Key
                | ShellCommand::Status
                | ShellCommand::Help
                | ShellCommand::Quit
                | ShellCommand::Reset
                | ShellCommand::Products
        )
    }
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match verb.to_lowercase().as_str() {
            "products" | "list" | "ls" => Ok(ShellCommand::Products),
            "select" | "pick" => arg
                .map(ShellCommand::Select)
                .ok_or_else(|| "usage: select <id or number>".to_string()),
            "next" | "continue" => Ok(ShellCommand::Next),
            "back" => Ok(ShellCommand::Back),
            "upload" | "photo" => arg
                .map(|p| ShellCommand::Upload(PathBuf::from(p)))
                .ok_or_else(|| "usage: upload <path to photo>".to_string()),
            "clear" => Ok(ShellCommand::Clear),
            "start" | "go" => Ok(ShellCommand::Start),
            "retry" => Ok(ShellCommand::Retry),
            "reset" => Ok(ShellCommand::Reset),
            "key" => Ok(ShellCommand::Key),
            "save" => Ok(ShellCommand::Save(arg.map(PathBuf::from))),
            "status" => Ok(ShellCommand::Status),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
            other => Err(format!("Unknown command '{}'. Type help for commands.", other)),
        }
    }
}

const HELP: &str = "\
Commands:
  products             list the available sets
  select <id|number>   choose a set
  next                 continue to photo upload
  back                 return to set selection
  upload <path>        use a photo from disk
  clear                remove the photo
  start                generate the try-on
  retry                back to upload after a result or failure
  reset                start over
  key                  choose a Gemini API key
  save [path]          write the result image
  status               show the current screen
  quit                 leave";

// ── Console ─────────────────────────────────────────────────────────

/// Line-oriented stdin shared by the command loop and the key prompt.
pub struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    pub fn stdin() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        let mut out = tokio::io::stdout();
        out.write_all(prompt.as_bytes()).await?;
        out.flush().await?;
        self.lines.lock().await.next_line().await
    }
}

#[async_trait]
impl KeyPrompt for Console {
    async fn prompt_for_key(&self) -> io::Result<Option<String>> {
        println!("Paste a Gemini API key from a project with billing enabled.");
        println!("Billing setup: {}", messages::BILLING_INFO_URL);
        println!("Leave empty to cancel.");
        let line = self.read_line("key> ").await?;
        Ok(line.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()))
    }
}

// ── Shell ───────────────────────────────────────────────────────────

pub struct Shell {
    wizard: Wizard,
    catalog: Catalog,
    console: Arc<Console>,
    output_dir: PathBuf,
    storefront_url: String,
    last_saved: Option<PathBuf>,
}

impl Shell {
    pub fn new(
        wizard: Wizard,
        catalog: Catalog,
        console: Arc<Console>,
        output_dir: PathBuf,
        storefront_url: String,
    ) -> Self {
        Self {
            wizard,
            catalog,
            console,
            output_dir,
            storefront_url,
            last_saved: None,
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        let mut events = self.wizard.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let WizardEvent::Progress(stage) = event {
                    println!("  ... {}", stage_label(stage));
                }
            }
        });

        println!("Virtual try-on ({}). Type help for commands.", self.wizard.capability_name());
        self.render();
        self.wizard.probe_credentials().await;
        self.render();

        loop {
            let Some(line) = self.console.read_line("> ").await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<ShellCommand>() {
                Ok(command) => command,
                Err(message) => {
                    println!("{}", message);
                    continue;
                }
            };
            if command == ShellCommand::Quit {
                break;
            }
            if self.wizard.screen() == Screen::CredentialRequired
                && !command.allowed_without_credential()
            {
                println!("An API key is required first. Type key to choose one.");
                continue;
            }
            self.dispatch(command).await;
        }

        log::info!("[WIZARD] Shell closed");
        Ok(())
    }

    async fn dispatch(&mut self, command: ShellCommand) {
        match command {
            ShellCommand::Products => self.print_products(),
            ShellCommand::Select(key) => match self.catalog.resolve(&key).cloned() {
                Some(product) => {
                    let name = product.name.clone();
                    match self.wizard.select_product(product) {
                        Ok(()) => println!("Selected {}. Type next to continue.", name),
                        Err(e) => println!("{}", e),
                    }
                }
                None => println!("No set '{}'. Type products to list them.", key),
            },
            ShellCommand::Next => self.navigate(Wizard::continue_to_upload),
            ShellCommand::Back => self.navigate(Wizard::back_to_selection),
            ShellCommand::Upload(path) => match self.wizard.upload_photo(&path).await {
                Ok(UploadOutcome::Accepted) => {
                    println!("Photo ready. Type start to generate your try-on.")
                }
                Ok(UploadOutcome::Unreadable) => {
                    println!("{}", self.wizard.session().error().unwrap_or_default())
                }
                Err(e) => println!("{}", e),
            },
            ShellCommand::Clear => self.navigate(Wizard::clear_photo),
            ShellCommand::Start => self.start().await,
            ShellCommand::Retry => {
                self.last_saved = None;
                self.navigate(Wizard::retry);
            }
            ShellCommand::Reset => {
                self.last_saved = None;
                self.wizard.reset();
                self.render();
            }
            ShellCommand::Key => match self.wizard.request_credential_selection().await {
                Ok(CredentialState::Present) => {
                    println!("Key selected.");
                    self.render();
                }
                Ok(state) => println!("Credential is {}.", state),
                Err(e) => println!("Could not store the key: {}", e),
            },
            ShellCommand::Save(path) => self.save(path).await,
            ShellCommand::Status => self.print_status(),
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => {}
        }
    }

    fn navigate(&mut self, op: fn(&mut Wizard) -> Result<(), crate::wizard::WizardError>) {
        match op(&mut self.wizard) {
            Ok(()) => self.render(),
            Err(e) => println!("{}", e),
        }
    }

    async fn start(&mut self) {
        if let Err(reason) = self.wizard.can_start_try_on() {
            println!("Cannot start: {}.", reason);
            return;
        }
        println!("Generating your try-on. This can take a minute.");
        match self.wizard.start_try_on().await {
            TryOnOutcome::Succeeded(_) => {
                self.save(None).await;
                self.render();
            }
            TryOnOutcome::Failed(kind) => {
                self.render();
                if kind == FailureKind::Credential {
                    println!("Type key to choose another key.");
                }
            }
            TryOnOutcome::NotReady(reason) => println!("Cannot start: {}.", reason),
        }
    }

    async fn save(&mut self, path: Option<PathBuf>) {
        let session = self.wizard.session();
        let Some(image) = session.result_image() else {
            println!("No result to save yet.");
            return;
        };
        let product_id = session
            .selected_product()
            .map(|p| p.id.as_str())
            .unwrap_or("result");

        let written = match path {
            Some(path) => write_image(&path, image).await.map(|_| path),
            None => save_result(&self.output_dir, product_id, image).await,
        };
        match written {
            Ok(path) => {
                log::info!("[WIZARD] Result written to {}", path.display());
                println!("Saved {}", path.display());
                self.last_saved = Some(path);
            }
            Err(e) => println!("Could not save the result: {}", e),
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render(&self) {
        match self.wizard.screen() {
            Screen::Probing => println!("Checking for an API key..."),
            Screen::CredentialRequired => {
                println!();
                println!("An API key is required to use the AI try-on.");
                println!("Use a key from a Google Cloud project with billing enabled.");
                println!("Billing setup: {}", messages::BILLING_INFO_URL);
                println!("Type key to choose one.");
            }
            Screen::Step(step) => {
                println!();
                println!("{}", step_indicator(step));
                self.render_step(step);
            }
        }
    }

    fn render_step(&self, step: WizardStep) {
        let session = self.wizard.session();
        match step {
            WizardStep::SelectProduct => {
                self.print_products();
                println!("select <id|number>, then next.");
            }
            WizardStep::UploadPhoto => {
                if let Some(product) = session.selected_product() {
                    println!("Set: {}", product.name);
                }
                match session.user_image() {
                    Some(image) => println!("Photo: {} ({} bytes)", image.mime_type, image.data.len()),
                    None => println!("Photo: none. upload <path> to add one."),
                }
                if let Some(error) = session.error() {
                    println!("! {}", error);
                }
                if self.wizard.can_start_try_on().is_ok() {
                    println!("Type start to generate, or back to change the set.");
                }
            }
            WizardStep::ResultOrProgress => match self.wizard.phase() {
                Phase::Submitting => println!("Generating..."),
                Phase::ResultReady => {
                    if let Some(size) = session.recommended_size() {
                        println!("Recommended size: {}", size);
                    }
                    if let Some(path) = &self.last_saved {
                        println!("Your try-on: {}", path.display());
                    }
                    println!("Shop the set: {}", self.storefront_url);
                    println!("retry for another photo, reset to start over.");
                }
                _ => {
                    if let Some(error) = session.error() {
                        println!("! {}", error);
                    }
                    println!("retry to try again, reset to start over.");
                }
            },
        }
    }

    fn print_products(&self) {
        let selected = self.wizard.session().selected_product().map(|p| p.id.as_str());
        for (i, product) in self.catalog.products().iter().enumerate() {
            let marker = if selected == Some(product.id.as_str()) { '*' } else { ' ' };
            println!(" {} {}. {} [{}]", marker, i + 1, product.name, product.id);
        }
    }

    fn print_status(&self) {
        let session = self.wizard.session();
        println!("Provider:   {}", self.wizard.capability_name());
        for info in all_providers() {
            println!("  - {}: {}", info.id, info.name);
        }
        println!("Credential: {}", self.wizard.credential_state());
        println!("Phase:      {}", self.wizard.phase());
        println!(
            "Set:        {}",
            session.selected_product().map(|p| p.name.as_str()).unwrap_or("-")
        );
        println!("Photo:      {}", if session.user_image().is_some() { "yes" } else { "no" });
        println!("Calls:      {:?}", self.wizard.ordering());
        self.render();
    }
}

/// One-line step indicator, e.g. `(1) Choose set > (2) Upload photo >  3  Result`.
pub fn step_indicator(current: WizardStep) -> String {
    WizardStep::ALL
        .iter()
        .map(|step| {
            if step.is_reached(current) {
                format!("({}) {}", step.number(), step.label())
            } else {
                format!(" {}  {}", step.number(), step.label())
            }
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

fn stage_label(stage: TryOnStage) -> &'static str {
    match stage {
        TryOnStage::FetchingProduct => "loading the product image",
        TryOnStage::EstimatingSize => "estimating your size",
        TryOnStage::GeneratingImage => "generating the try-on image",
    }
}

/// Write `image` into `dir` under a timestamped name.
pub async fn save_result(dir: &Path, product_id: &str, image: &InlineImage) -> io::Result<PathBuf> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let path = dir.join(format!("tryon-{}-{}.{}", product_id, stamp, image.extension()));
    write_image(&path, image).await?;
    Ok(path)
}

async fn write_image(path: &Path, image: &InlineImage) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &image.data).await
}
