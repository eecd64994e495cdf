use clap::Parser;
use entelgia_core::{EntelgiaConfig, SigningKey};
use entelgia_dialogue::{LlmClient, MockProvider, OllamaClient, Session, TurnError, TurnEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "ENTELGIA_CONFIG", default_value = "entelgia.toml")]
    config: PathBuf,

    /// Number of agent turns to run (defaults to dialogue.max_turns)
    #[arg(short, long)]
    turns: Option<u32>,

    /// Seed for drive noise and speaker selection
    #[arg(long)]
    seed: Option<u64>,

    /// Use the offline mock provider instead of Ollama
    #[arg(long)]
    mock: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn describe_failure(error: &TurnError) -> String {
    match error {
        TurnError::CompletionFailed {
            agent,
            attempts,
            source,
        } => format!(
            "{} got no completion after {} attempts: {:#}",
            agent, attempts, source
        ),
        TurnError::Store(source) => format!("memory store error: {:#}", source),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = EntelgiaConfig::load_or_default(&args.config);
    if let Some(seed) = args.seed {
        config.dialogue.rng_seed = Some(seed);
    }
    let turns = args.turns.unwrap_or(config.dialogue.max_turns);

    let client: Arc<dyn LlmClient> = if args.mock {
        info!("Using the offline mock provider");
        Arc::new(MockProvider::new("mock"))
    } else {
        let ollama = OllamaClient::new(&config.llm)?;
        info!("Using Ollama model {} at {}", ollama.model(), config.llm.base_url);
        Arc::new(ollama)
    };

    let mut session = Session::new(config, client, SigningKey::from_env()).await?;
    let restored = session.restore_agents().await?;
    if restored > 0 {
        info!("Restored {} agents from the last checkpoint", restored);
    }

    println!("Entelgia online. Topic: {}\n", session.current_topic());
    let summary = session
        .run(turns, |event| match event {
            TurnEvent::Completed(outcome) => {
                let turn = &outcome.turn;
                println!("[{}] {} ({}): {}\n", turn.index, turn.speaker, turn.topic, turn.text);
                if let Some(slip) = &outcome.slip {
                    println!("  (slip) {}\n", slip.content);
                }
                if let Some(dream) = &outcome.dream {
                    println!(
                        "  (dream) promoted {}, forgotten {}\n",
                        dream.promoted, dream.forgotten
                    );
                }
                if let Some((kind, obs)) = &outcome.intervention {
                    println!("[{}] {} <{}>: {}\n", obs.index, obs.speaker, kind.as_str(), obs.text);
                }
            }
            TurnEvent::Failed { turn, error } => {
                println!("[turn {} failed: {}]\n", turn, describe_failure(error));
            }
        })
        .await?;

    println!(
        "Session over: {} turns, {} failed, {} interventions, {} dreams{}",
        summary.turns_completed,
        summary.failed_turns,
        summary.interventions,
        summary.dreams,
        if summary.stopped { " (stopped by an agent)" } else { "" }
    );
    println!(
        "circularity {:.2}, progress {:.2}, intervention utility {:.2}",
        summary.metrics.circularity_rate,
        summary.metrics.progress_rate,
        summary.metrics.intervention_utility
    );
    if summary.aborted {
        anyhow::bail!("Gave up after repeated completion failures");
    }
    Ok(())
}
