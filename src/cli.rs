//! CLI interface for reflex

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{Agent, FeedbackOutcome, RuleRepository, Sentiment};
use crate::error::AgentError;
use crate::llm::{OpenRouterClient, ProviderConfig};
use crate::security;
use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "reflex")]
#[command(about = "Answers from learned rules first, LLM fallback second; corrections teach it new rules", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default when no command given)
    Interactive,
    /// Ask a single question and exit (no feedback loop)
    Ask {
        /// The question to ask
        query: String,
        /// Show how the answer was produced
        #[arg(short, long)]
        explain: bool,
    },
    /// Inspect the learned rule collection
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Configure the agent
    Config {
        /// Set OpenRouter API key
        #[arg(long)]
        set_api_key: Option<String>,
        /// Delete the stored API key
        #[arg(long)]
        delete_api_key: bool,
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// List all rules
    List,
    /// Show aggregate rule statistics
    Stats,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Interactive) => interactive().await,
        Some(Commands::Ask { query, explain }) => ask(&query, explain).await,
        Some(Commands::Rules { command }) => rules_command(command),
        Some(Commands::Config {
            set_api_key,
            delete_api_key,
            show,
        }) => config_command(set_api_key, delete_api_key, show),
    }
}

/// Build the full agent: store, repository, model client, controller.
fn build_agent(config: &Config) -> Result<Agent> {
    let store = JsonFileStore::new(config.store.rules_path()?)
        .context("Failed to open rule store")?;
    let repository = RuleRepository::new(Box::new(store), config.engine.score.clone());

    let api_key = security::get_api_key()?;
    let provider = ProviderConfig::openrouter(api_key, config.openrouter.default_model.clone())
        .with_base_url(config.openrouter.base_url.clone())
        .with_timeout_secs(config.openrouter.timeout_secs);
    let model = OpenRouterClient::new(provider).context("Failed to build model client")?;

    let mut agent = Agent::new(repository, Arc::new(model), &config.engine);
    agent.load_rules();
    Ok(agent)
}

/// Repository only, for commands that never talk to the model.
fn build_repository(config: &Config) -> Result<RuleRepository> {
    let store = JsonFileStore::new(config.store.rules_path()?)
        .context("Failed to open rule store")?;
    let mut repository = RuleRepository::new(Box::new(store), config.engine.score.clone());
    if let Err(err) = repository.load() {
        eprintln!("Warning: {err}");
    }
    Ok(repository)
}

async fn interactive() -> Result<()> {
    let config = Config::load()?;
    let mut agent = build_agent(&config)?;

    println!("reflex: type a question, 'quit' to exit.");
    let mut rl = rustyline::DefaultEditor::new()?;

    loop {
        let line = match rl.readline("\n> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }
        let _ = rl.add_history_entry(query);

        let turn = match agent.answer(query).await {
            Ok(turn) => turn,
            Err(err) => {
                print_turn_error(&err);
                continue;
            }
        };

        println!("\n{}", turn.response);
        println!("[{}]", turn.status);

        let verdict = match rl.readline("Was this helpful? [y/n/enter to skip] ") {
            Ok(line) => line.trim().to_lowercase(),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => continue,
            Err(err) => return Err(err.into()),
        };

        match verdict.as_str() {
            "y" | "yes" => {
                report_feedback(agent.feedback(&turn, Sentiment::Positive, None).await);
            }
            "n" | "no" => {
                let correction =
                    match rl.readline("How should I have responded? (enter to skip) ") {
                        Ok(line) => line,
                        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => continue,
                        Err(err) => return Err(err.into()),
                    };
                let correction = correction.trim();
                let correction = (!correction.is_empty()).then_some(correction);
                report_feedback(agent.feedback(&turn, Sentiment::Negative, correction).await);
            }
            _ => {}
        }
    }

    Ok(())
}

async fn ask(query: &str, explain: bool) -> Result<()> {
    let config = Config::load()?;
    let mut agent = build_agent(&config)?;

    match agent.answer(query).await {
        Ok(turn) => {
            println!("{}", turn.response);
            println!("[{}]", turn.status);
            if explain {
                println!("\n{}", agent.explain(&turn));
            }
            Ok(())
        }
        Err(err) => {
            print_turn_error(&err);
            std::process::exit(1);
        }
    }
}

fn rules_command(command: RuleCommands) -> Result<()> {
    let config = Config::load()?;
    let repository = build_repository(&config)?;

    match command {
        RuleCommands::List => {
            if repository.is_empty() {
                println!("No rules learned yet.");
                return Ok(());
            }
            for rule in repository.rules() {
                println!("{}", rule.id);
                println!("  pattern:  {}", rule.pattern);
                println!("  response: {}", rule.response);
                println!(
                    "  score: {:.1}   matched: {}   +{} / -{}   last used: {}",
                    rule.score,
                    rule.stats.times_matched,
                    rule.stats.times_positive,
                    rule.stats.times_negative,
                    rule.stats.last_used.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        RuleCommands::Stats => {
            let rules = repository.rules();
            let proven = rules
                .iter()
                .filter(|r| r.stats.times_positive > r.stats.times_negative)
                .count();
            println!("Total rules:  {}", rules.len());
            println!("Proven rules: {}", proven);
            let rated: u64 = rules
                .iter()
                .map(|r| r.stats.times_positive + r.stats.times_negative)
                .sum();
            println!("Ratings received: {}", rated);
        }
    }
    Ok(())
}

fn config_command(set_api_key: Option<String>, delete_api_key: bool, show: bool) -> Result<()> {
    if let Some(key) = set_api_key {
        security::set_api_key(&key)?;
        println!("API key saved.");
        return Ok(());
    }

    if delete_api_key {
        security::delete_api_key()?;
        println!("API key deleted.");
        return Ok(());
    }

    if show {
        let config = Config::load()?;
        println!("{}", toml::to_string_pretty(&config)?);
        println!("API key set: {}", security::has_api_key());
        println!("Rules file:  {}", config.store.rules_path()?.display());
        return Ok(());
    }

    println!("Nothing to do. Try --show or --set-api-key.");
    Ok(())
}

fn print_turn_error(err: &AgentError) {
    eprintln!("This turn failed: {} [error: {}]", err, err.kind());
    eprintln!("Learned rules are unaffected; you can retry.");
}

fn report_feedback(result: Result<FeedbackOutcome, AgentError>) {
    match result {
        Ok(FeedbackOutcome::ScoreRaised(score)) => {
            println!("Thanks, rule reinforced (score {score:.1}).");
        }
        Ok(FeedbackOutcome::ScoreLowered(score)) => {
            println!("Noted, rule penalized (score {score:.1}).");
        }
        Ok(FeedbackOutcome::RuleSynthesized(id)) => {
            println!("Learned a new rule ({id}). [rule-synthesized]");
        }
        Ok(FeedbackOutcome::Noted) => {
            println!("Noted.");
        }
        Err(err) => print_turn_error(&err),
    }
}
