use crate::cli::{BudgetArgs, Cli, Command, InputArgs};
use crate::git;
use anyhow::{Context, Result};
use diffbudget_core::config::{Config, DEFAULT_PROVIDER};
use diffbudget_diff::{
    Allocation, BudgetAllocator, Estimator, Reservations, TokenEstimator, TruncationNotices,
    TruncationResult, Truncator,
};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

pub fn execute(cli: Cli) -> Result<()> {
    let config =
        Config::load_with(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Budget { budget, json } => cmd_budget(&config, &budget, json),
        Command::Truncate {
            budget,
            input,
            max_tokens,
            keep_end,
            json,
        } => cmd_truncate(&config, &budget, &input, max_tokens, keep_end, json),
        Command::Count { input, json } => cmd_count(&input, json),
        Command::Models { provider, json } => cmd_models(&config, provider.as_deref(), json),
    }
}

/// Budget settings after CLI flags are layered over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BudgetSettings {
    provider: String,
    model: String,
    prompt_style: String,
    reservations: Reservations,
}

impl BudgetSettings {
    fn resolve(config: &Config, args: &BudgetArgs) -> Self {
        let budget = config.budget();
        let provider = args.provider.clone().unwrap_or(budget.provider);
        let model = args
            .model
            .clone()
            .or_else(|| config.resolve_model(&provider))
            .unwrap_or_default();

        Self {
            provider,
            model,
            prompt_style: args.style.clone().unwrap_or(budget.prompt_style),
            reservations: Reservations {
                output_reserve: args.output_tokens.unwrap_or(budget.output_reserve),
                files_list_reserve: args.files_list_reserve.unwrap_or(budget.files_list_reserve),
                safety_margin: args.safety_margin.unwrap_or(budget.safety_margin),
            },
        }
    }

    fn allocate(&self, config: &Config) -> Allocation {
        BudgetAllocator::from_config(&self.provider, config).allocate(
            &self.model,
            &self.prompt_style,
            &self.reservations,
        )
    }
}

fn cmd_budget(config: &Config, args: &BudgetArgs, json: bool) -> Result<()> {
    let allocation = BudgetSettings::resolve(config, args).allocate(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&allocation_json(&allocation))?);
        return Ok(());
    }

    println!("provider:       {}", allocation.provider);
    println!("model:          {}", allocation.model);
    println!("context window: {}", group_thousands(allocation.model_limit));
    println!("prompt style:   {}", allocation.prompt_style);
    println!("prompt:         {}", group_thousands(allocation.prompt_tokens));
    println!(
        "output reserve: {}",
        group_thousands(allocation.reservations.output_reserve)
    );
    println!(
        "files list:     {}",
        group_thousands(allocation.reservations.files_list_reserve)
    );
    println!(
        "safety margin:  {}",
        group_thousands(allocation.reservations.safety_margin)
    );
    println!("max diff:       {}", group_thousands(allocation.max_diff_tokens));
    if allocation.is_floored() {
        eprintln!("Note: reservations exceed the context window, using the minimum diff budget");
    }
    Ok(())
}

fn cmd_truncate(
    config: &Config,
    args: &BudgetArgs,
    input: &InputArgs,
    max_tokens: Option<usize>,
    keep_end: bool,
    json: bool,
) -> Result<()> {
    let diff_text = read_input(input)?;
    let settings = BudgetSettings::resolve(config, args);

    let max_tokens = match max_tokens {
        Some(max_tokens) => max_tokens,
        None => {
            let allocation = settings.allocate(config);
            eprintln!(
                "Token allocation - Diff: {} | Output: {}",
                group_thousands(allocation.max_diff_tokens),
                group_thousands(settings.reservations.output_reserve)
            );
            allocation.max_diff_tokens
        }
    };

    let truncation = config.truncation();
    let preserve_start = truncation.preserve_start && !keep_end;

    let estimator = Estimator::detect();
    let notices = TruncationNotices::from_config(&truncation);
    let truncator = Truncator::with_notices(&estimator, notices);
    let result = truncator.truncate_intelligently(&diff_text, max_tokens, preserve_start);

    if result.original_tokens > max_tokens {
        eprintln!(
            "Diff truncated: {} → {} tokens",
            group_thousands(result.original_tokens),
            group_thousands(result.final_tokens)
        );
        if !result.dropped_files.is_empty() {
            eprintln!("Dropped files ({}):", result.dropped_files.len());
            for path in &result.dropped_files {
                eprintln!("  {}", path);
            }
        }
    } else {
        eprintln!("Diff size: {} tokens", group_thousands(result.original_tokens));
    }

    if json {
        let value = truncation_json(&result, max_tokens, estimator.name());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", result.text);
    }
    Ok(())
}

fn cmd_count(input: &InputArgs, json: bool) -> Result<()> {
    let text = read_input(input)?;
    let estimator = Estimator::detect();
    let tokens = estimator.count_tokens(&text);

    if json {
        let value = count_json(&text, tokens, &estimator);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let kind = if estimator.is_exact() { "exact" } else { "estimated" };
        println!("{} tokens ({}, {})", group_thousands(tokens), kind, estimator.name());
    }
    Ok(())
}

fn cmd_models(config: &Config, provider: Option<&str>, json: bool) -> Result<()> {
    let allocator = BudgetAllocator::from_config(DEFAULT_PROVIDER, config);
    let entries = allocator.limits().entries(provider);

    if json {
        let value: Vec<_> = entries
            .iter()
            .map(|(provider, model, limit)| {
                json!({ "provider": provider, "model": model, "context_window": limit })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No models known for provider '{}'", provider.unwrap_or_default());
        return Ok(());
    }

    let width = entries
        .iter()
        .map(|(_, model, _)| model.len())
        .max()
        .unwrap_or(0);
    let mut current_provider = "";
    for (provider, model, limit) in &entries {
        if provider != current_provider {
            println!("{}:", provider);
            current_provider = provider.as_str();
        }
        println!("  {:<width$}  {}", model, group_thousands(*limit), width = width);
    }
    Ok(())
}

fn read_input(input: &InputArgs) -> Result<String> {
    if input.git {
        return git::collect_changes(Path::new(".")).context("Could not get diff");
    }

    match &input.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read diff from stdin")?;
            Ok(buffer)
        }
    }
}

fn allocation_json(allocation: &Allocation) -> serde_json::Value {
    json!({
        "provider": allocation.provider,
        "model": allocation.model,
        "prompt_style": allocation.prompt_style,
        "model_limit": allocation.model_limit,
        "prompt_tokens": allocation.prompt_tokens,
        "output_reserve": allocation.reservations.output_reserve,
        "files_list_reserve": allocation.reservations.files_list_reserve,
        "safety_margin": allocation.reservations.safety_margin,
        "max_diff_tokens": allocation.max_diff_tokens,
    })
}

fn count_json(text: &str, tokens: usize, estimator: &Estimator) -> serde_json::Value {
    json!({
        "tokens": tokens,
        "characters": text.chars().count(),
        "estimator": estimator.name(),
        "exact": estimator.is_exact(),
    })
}

fn truncation_json(
    result: &TruncationResult,
    max_tokens: usize,
    estimator: &str,
) -> serde_json::Value {
    json!({
        "max_tokens": max_tokens,
        "original_tokens": result.original_tokens,
        "final_tokens": result.final_tokens,
        "truncated": result.was_truncated(),
        "dropped_files": result.dropped_files,
        "estimator": estimator,
        "text": result.text,
    })
}

/// `1234567` → `1,234,567`
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
