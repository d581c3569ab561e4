use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sparky_core::*;
use sparky_schema::{SuggestionType, WorkshopState, WorkshopStep};

#[derive(Parser)]
#[command(name = "sparky", version, about = "Sparky, the Buyer Breakthrough Workshop assistant")]
struct Cli {
    #[arg(long, default_value = "config/sparky.yaml", help = "Path to the workshop config file")]
    config: PathBuf,

    #[arg(long, default_value = "logs", help = "Directory for daily log files")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate the config file and list active transports")]
    Validate,
    #[command(about = "List workshop steps and their suggestion types")]
    Steps,
    #[command(about = "Generate suggestions for one step")]
    Suggest {
        #[arg(long, help = "Workshop step number (1-11)")]
        step: u8,
        #[arg(long = "type", help = "Suggestion type, e.g. big-idea or jobs")]
        suggestion_type: SuggestionType,
        #[arg(long, help = "Workshop state JSON file")]
        state: Option<PathBuf>,
    },
    #[command(about = "Print the prompt that would be sent for one step")]
    Prompt {
        #[arg(long, help = "Workshop step number (1-11)")]
        step: u8,
        #[arg(long = "type", help = "Suggestion type, e.g. big-idea or jobs")]
        suggestion_type: SuggestionType,
        #[arg(long, help = "Workshop state JSON file")]
        state: Option<PathBuf>,
    },
    #[command(about = "Parse painstorming text into pains grouped by buyer segment")]
    Painstorm {
        #[arg(long, help = "File with the painstorming text")]
        input: PathBuf,
        #[arg(long, value_delimiter = ',', help = "Canonical buyer segments, comma separated")]
        segments: Vec<String>,
        #[arg(long, help = "Workshop state JSON file to take segments from")]
        state: Option<PathBuf>,
        #[arg(long, help = "Use the line-based extractor instead of the model")]
        heuristic: bool,
    },
    #[command(about = "Summarize a website and brainstorm big ideas from it")]
    Summarize {
        #[arg(long, help = "Website URL")]
        url: String,
        #[arg(long, help = "Workshop state JSON file")]
        state: Option<PathBuf>,
    },
    #[command(about = "Talk to Sparky about one step (type 'quit' to exit)")]
    Chat {
        #[arg(long, default_value_t = 2, help = "Workshop step number (1-11)")]
        step: u8,
        #[arg(long, help = "Workshop state JSON file")]
        state: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "sparky.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    match cli.command {
        Commands::Validate => {
            let config = load_config(&cli.config)?;
            let gateway = ModelGateway::from_config(&config);
            println!(
                "Config valid. environment={:?}, transports=[{}], suggestion model={}.",
                config.environment(),
                gateway.transport_names().join(", "),
                config.model.suggestion_model()
            );
        }
        Commands::Steps => {
            println!("{:<4} {:<20} {}", "STEP", "TITLE", "SUGGESTION TYPES");
            println!("{}", "-".repeat(60));
            for step in WorkshopStep::ALL {
                let types: Vec<&str> = step.suggestion_types().iter().map(|t| t.as_str()).collect();
                println!("{:<4} {:<20} {}", step.number(), step.title(), types.join(", "));
            }
        }
        Commands::Suggest {
            step,
            suggestion_type,
            state,
        } => {
            let config = load_config(&cli.config)?;
            let state = load_state(state.as_deref())?;
            let orchestrator = SuggestionOrchestrator::from_config(&config);
            let suggestions = orchestrator
                .get_suggestions(step, suggestion_type, &state)
                .await;
            if suggestions.is_empty() {
                println!("No suggestions for {suggestion_type} on step {step}.");
            } else {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            }
        }
        Commands::Prompt {
            step,
            suggestion_type,
            state,
        } => {
            let config = load_config(&cli.config)?;
            let state = load_state(state.as_deref())?;
            let builder = PromptBuilder::new(&config);
            match builder.build_prompt(step, suggestion_type, &state) {
                Some(spec) => println!("{}", serde_json::to_string_pretty(&spec)?),
                None => println!("No prompt for {suggestion_type} on step {step}."),
            }
        }
        Commands::Painstorm {
            input,
            segments,
            state,
            heuristic,
        } => {
            let mut config = load_config(&cli.config)?;
            if heuristic {
                config.painstorming.extractor = ExtractorKind::Heuristic;
            }
            let text = std::fs::read_to_string(&input)?;
            let segments = if segments.is_empty() {
                load_state(state.as_deref())?.buyer_segment_names()
            } else {
                segments
            };
            let orchestrator = SuggestionOrchestrator::from_config(&config);
            let map = orchestrator.parse_painstorming(&text, &segments).await?;
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        Commands::Summarize { url, state } => {
            let config = load_config(&cli.config)?;
            let state = load_state(state.as_deref())?;
            let orchestrator = SuggestionOrchestrator::from_config(&config);
            let result = orchestrator.brainstorm_from_url(&url, &state).await?;
            println!("Summary: {}", result.summary);
            println!("---");
            for suggestion in &result.suggestions {
                println!("- {}", suggestion.content);
            }
        }
        Commands::Chat { step, state } => {
            let step = WorkshopStep::from_number(step)
                .ok_or_else(|| anyhow!("unknown workshop step: {step}"))?;
            run_repl(&cli.config, step, state.as_deref()).await?;
        }
    }

    Ok(())
}

fn load_state(path: Option<&Path>) -> Result<WorkshopState> {
    let Some(path) = path else {
        return Ok(WorkshopState::default());
    };
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow!("invalid workshop state {}: {e}", path.display()))
}

async fn run_repl(config_path: &Path, step: WorkshopStep, state: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let workshop = load_state(state)?;
    let orchestrator = Arc::new(SuggestionOrchestrator::from_config(&config));
    let session = ConversationSession::new(orchestrator);
    session.restore(workshop.chat_history.clone());

    println!("Sparky REPL, step {step}. Type 'quit' to exit.");
    println!("Commands: accept <n>, dismiss <n>");
    println!("---");
    if let Some(question) = session.start_step(step) {
        println!("Sparky: {}", question.content);
    }

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        if let Some((action, index)) = parse_resolution(input) {
            let pending = session.pending_suggestions();
            let Some(target) = index.checked_sub(1).and_then(|i| pending.get(i)) else {
                eprintln!("No pending suggestion #{index}");
                continue;
            };
            let resolved = match action {
                Resolution::Accept => session.accept_suggestion(&target.id),
                Resolution::Dismiss => session.dismiss_suggestion(&target.id),
            };
            if let Some(suggestion) = resolved {
                println!("{action:?}: {}", suggestion.content);
            }
            continue;
        }

        match session.send_message(input, &workshop).await {
            Ok(SessionReply::Answered(message)) | Ok(SessionReply::NextQuestion(message)) => {
                println!("Sparky: {}", message.content);
            }
            Ok(SessionReply::Suggestions {
                message,
                suggestions,
            }) => {
                println!("Sparky: {}", message.content);
                for (i, suggestion) in suggestions.iter().enumerate() {
                    println!("  {}. {}", i + 1, suggestion.content);
                }
            }
            Ok(SessionReply::Discarded) => {}
            Err(err) => eprintln!("Error: {err}"),
        }
    }

    session.close();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Accept,
    Dismiss,
}

fn parse_resolution(input: &str) -> Option<(Resolution, usize)> {
    let (command, rest) = input.split_once(' ')?;
    let action = match command {
        "accept" => Resolution::Accept,
        "dismiss" => Resolution::Dismiss,
        _ => return None,
    };
    let index = rest.trim().parse().ok()?;
    Some((action, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_suggest_subcommand() {
        let cli =
            Cli::try_parse_from(["sparky", "suggest", "--step", "5", "--type", "jobs"]).unwrap();
        match cli.command {
            Commands::Suggest {
                step,
                suggestion_type,
                state,
            } => {
                assert_eq!(step, 5);
                assert_eq!(suggestion_type, SuggestionType::Jobs);
                assert!(state.is_none());
            }
            _ => panic!("expected suggest"),
        }
    }

    #[test]
    fn rejects_unknown_suggestion_type() {
        let parsed = Cli::try_parse_from(["sparky", "suggest", "--step", "5", "--type", "nope"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_comma_separated_segments() {
        let cli = Cli::try_parse_from([
            "sparky",
            "painstorm",
            "--input",
            "pains.md",
            "--segments",
            "Freelancers,Small Agencies",
            "--heuristic",
        ])
        .unwrap();
        match cli.command {
            Commands::Painstorm {
                segments, heuristic, ..
            } => {
                assert_eq!(segments, vec!["Freelancers", "Small Agencies"]);
                assert!(heuristic);
            }
            _ => panic!("expected painstorm"),
        }
    }

    #[test]
    fn config_path_defaults_to_repo_config() {
        let cli = Cli::try_parse_from(["sparky", "validate"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config/sparky.yaml"));
        assert!(matches!(cli.command, Commands::Validate));
    }

    #[test]
    fn parses_accept_and_dismiss_commands() {
        assert_eq!(parse_resolution("accept 2"), Some((Resolution::Accept, 2)));
        assert_eq!(parse_resolution("dismiss 1"), Some((Resolution::Dismiss, 1)));
        assert_eq!(parse_resolution("accept the first"), None);
        assert_eq!(parse_resolution("what is a pain?"), None);
    }

    #[test]
    fn missing_state_is_empty_workshop() {
        assert_eq!(load_state(None).unwrap(), WorkshopState::default());
    }

    #[test]
    fn state_file_is_read_as_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"targetBuyers": [{"name": "Freelancers"}], "websiteSummary": "A studio"}"#,
        )
        .unwrap();
        let state = load_state(Some(&path)).unwrap();
        assert_eq!(state.buyer_segment_names(), vec!["Freelancers"]);
        assert_eq!(state.website_summary.as_deref(), Some("A studio"));
    }
}
