//! cookmate CLI: hands-free recipe narration and backend utilities.
//!
//! ```text
//! cookmate narrate <recipe-id> [--typed] [--silent]
//! cookmate narrate --file recipe.json
//! cookmate serve [--port 2004] [--listen]
//! cookmate recipes [--search Q] [--cuisine C] [--difficulty D]
//! cookmate subs <ingredient> | ask "<question>"
//! cookmate login|register <email>
//! cookmate pantry <user> list|add|remove
//! cookmate favorites <user> list|add
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use cookmate_lib::api::{ClientConfig, CookmateClient};
use cookmate_lib::console::{ConsoleRecognizer, ConsoleSynthesizer, TerminalView};
use cookmate_lib::cookmate_core::search::filter_recipes;
use cookmate_lib::cookmate_core::substitutions::{known_ingredients, substitutes_for};
use cookmate_lib::cookmate_core::types::{
    KokoroConfig, NavigatorConfig, Recipe, SpeechParams, WhisperConfig,
};
use cookmate_lib::kokoro::KokoroSynthesizer;
use cookmate_lib::server::{ControlState, router};
use cookmate_lib::session::NarrationHandle;
use cookmate_lib::speech::{ExternalRecognizer, NullView, Recognizer, StepView, Synthesizer};
use cookmate_lib::whisper::WhisperRecognizer;

/// cookmate: voice-guided cooking
#[derive(Parser)]
#[command(name = "cookmate", version, about)]
struct Cli {
    /// CookMate backend URL
    #[arg(long, global = true, env = "COOKMATE_API", default_value = "http://127.0.0.1:5000")]
    api: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a recipe's steps aloud and follow voice commands
    Narrate {
        /// Recipe id on the backend
        recipe_id: Option<String>,
        /// Read the recipe from a local JSON file instead
        #[arg(long, conflicts_with = "recipe_id")]
        file: Option<PathBuf>,
        /// Type commands instead of speaking them
        #[arg(long)]
        typed: bool,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Serve the narration control API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value = "2004")]
        port: u16,
        /// Listen on the microphone; otherwise clients push transcripts
        #[arg(long)]
        listen: bool,
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// List recipes on the backend
    Recipes {
        /// Match title or ingredients
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        cuisine: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
    },
    /// Ingredient substitutions
    Subs {
        ingredient: String,
    },
    /// Ask the backend's voice assistant
    Ask {
        text: String,
    },
    /// Check credentials against the backend
    Login {
        email: String,
        #[arg(long, env = "COOKMATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a backend account
    Register {
        email: String,
        #[arg(long, env = "COOKMATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Manage a user's pantry
    Pantry {
        user: String,
        #[command(subcommand)]
        action: PantryAction,
    },
    /// Manage a user's favorite recipes
    Favorites {
        user: String,
        #[command(subcommand)]
        action: FavoriteAction,
    },
}

#[derive(Subcommand)]
enum PantryAction {
    List,
    Add {
        name: String,
        /// Days until expiry
        #[arg(long)]
        expiry: Option<u32>,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum FavoriteAction {
    List,
    Add { recipe_id: String },
}

#[derive(Args)]
struct SpeechArgs {
    /// Print narration instead of speaking it
    #[arg(long)]
    silent: bool,
    /// Kokoro TTS server URL
    #[arg(long, env = "KOKORO_URL", default_value = "http://localhost:3001")]
    kokoro_url: String,
    /// Whisper STT server URL
    #[arg(long, env = "WHISPER_URL", default_value = "http://localhost:2022")]
    whisper_url: String,
    /// Kokoro voice
    #[arg(long, default_value = "af_heart")]
    voice: String,
    /// Whisper model size
    #[arg(long, default_value = "base")]
    whisper_model: String,
    /// Speaking rate
    #[arg(long, default_value = "0.95")]
    rate: f32,
    /// Ignore the microphone while narration plays. Use this without
    /// headphones: the introduction says "next" and the microphone hears it.
    #[arg(long)]
    ignore_while_speaking: bool,
}

impl SpeechArgs {
    fn navigator_config(&self) -> NavigatorConfig {
        NavigatorConfig {
            speech: SpeechParams {
                rate: self.rate,
                ..Default::default()
            },
            ignore_while_speaking: self.ignore_while_speaking,
            ..Default::default()
        }
    }

    async fn synthesizer(&self) -> Box<dyn Synthesizer> {
        if self.silent {
            return Box::new(ConsoleSynthesizer::new());
        }
        Box::new(
            KokoroSynthesizer::connect(KokoroConfig {
                url: self.kokoro_url.clone(),
                voice: self.voice.clone(),
            })
            .await,
        )
    }

    async fn microphone(&self) -> Box<dyn Recognizer> {
        Box::new(
            WhisperRecognizer::connect(WhisperConfig {
                url: self.whisper_url.clone(),
                model: self.whisper_model.clone(),
            })
            .await,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cookmate=info,cookmate_lib=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let backend = CookmateClient::new(ClientConfig {
        base_url: cli.api.clone(),
        ..Default::default()
    })?;

    match cli.command {
        Command::Narrate {
            recipe_id,
            file,
            typed,
            speech,
        } => {
            let recipe = match (recipe_id, file) {
                (_, Some(path)) => load_recipe(&path)?,
                (Some(id), None) => backend
                    .recipe(&id)
                    .await
                    .with_context(|| format!("fetching recipe {id}"))?,
                (None, None) => bail!("give a recipe id or --file"),
            };
            let recognizer: Box<dyn Recognizer> = if typed {
                println!("Type next, repeat, back, stop or help, then Enter.");
                Box::new(ConsoleRecognizer::stdin())
            } else {
                speech.microphone().await
            };
            narrate(recipe, &speech, recognizer).await?;
        }

        Command::Serve {
            host,
            port,
            listen,
            speech,
        } => {
            let recognizer: Box<dyn Recognizer> = if listen {
                speech.microphone().await
            } else {
                Box::new(ExternalRecognizer::new())
            };
            let narrator = NarrationHandle::spawn(
                speech.navigator_config(),
                speech.synthesizer().await,
                recognizer,
                Box::new(NullView),
            );
            let app = router(ControlState {
                narrator: narrator.clone(),
                backend,
            });

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!("cookmate control API listening on {addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    narrator.stop();
                })
                .await?;
        }

        Command::Recipes {
            search,
            cuisine,
            difficulty,
        } => {
            let all = backend.recipes().await?;
            let found = filter_recipes(
                &all,
                search.as_deref(),
                cuisine.as_deref(),
                difficulty.as_deref(),
            );
            if found.is_empty() {
                println!("No recipes match.");
            }
            for recipe in found {
                let minutes = recipe.time.map(|t| format!(" ({t} min)")).unwrap_or_default();
                println!("{:<24} {}{minutes}", recipe.id, recipe.display_name());
            }
        }

        Command::Subs { ingredient } => match substitutes_for(&ingredient) {
            Some(subs) => {
                for sub in subs {
                    println!("- {sub}");
                }
            }
            None => {
                println!("No substitutions found.");
                let known: Vec<_> = known_ingredients().collect();
                println!("Try one of: {}", known.join(", "));
            }
        },

        Command::Ask { text } => println!("{}", backend.ask(&text).await?),

        Command::Login { email, password } => {
            let user = backend.login(&email, &password).await?;
            println!("Logged in as {}.", user.email);
        }

        Command::Register { email, password } => {
            backend.register(&email, &password).await?;
            println!("Registered {email}.");
        }

        Command::Pantry { user, action } => match action {
            PantryAction::List => {
                for item in backend.pantry(&user).await? {
                    let expiry = item
                        .expiry
                        .map(|d| format!("expires in {d} days"))
                        .unwrap_or_default();
                    println!("{:<26} {:<20} {expiry}", item.id, item.name);
                }
            }
            PantryAction::Add { name, expiry } => {
                backend.add_pantry_item(&user, &name, expiry).await?;
                println!("Added {name}.");
            }
            PantryAction::Remove { id } => {
                backend.remove_pantry_item(&id).await?;
                println!("Removed {id}.");
            }
        },

        Command::Favorites { user, action } => match action {
            FavoriteAction::List => {
                for favorite in backend.favorites(&user).await? {
                    println!("{}", favorite.recipe_id);
                }
            }
            FavoriteAction::Add { recipe_id } => {
                backend.add_favorite(&user, &recipe_id).await?;
                println!("Saved {recipe_id}.");
            }
        },
    }

    Ok(())
}

fn load_recipe(path: &Path) -> Result<Recipe> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Run one narration session to the end, or until Ctrl-C.
async fn narrate(
    recipe: Recipe,
    speech: &SpeechArgs,
    recognizer: Box<dyn Recognizer>,
) -> Result<()> {
    let view: Box<dyn StepView> = Box::new(TerminalView::new());
    let narrator = NarrationHandle::spawn(
        speech.navigator_config(),
        speech.synthesizer().await,
        recognizer,
        view,
    );
    narrator.start(recipe).await?;

    let mut status = narrator.subscribe_status();
    tokio::select! {
        finished = async { status.wait_for(|s| !s.active).await.map(|_| ()) } => {
            finished.context("narration session ended unexpectedly")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            narrator.stop();
            let _ = tokio::time::timeout(
                Duration::from_secs(1),
                status.wait_for(|s| !s.active),
            )
            .await;
        }
    }
    Ok(())
}
