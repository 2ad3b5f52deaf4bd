use anyhow::{Context, Result};
use clap::Parser;
use protovalidate_breaking::check::registry;
use protovalidate_breaking::resolve::{ProtovalidateResolver, RuleResolver};
use protovalidate_breaking::{CheckConfig, CheckEngine, CheckResult, SchemaSet, logging};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "protovalidate-breaking")]
#[command(about = "Detect changed Protovalidate rules between two versions of a protobuf schema")]
#[command(version)]
struct Args {
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    #[command(about = "Check for changed Protovalidate rules")]
    Breaking {
        #[arg(help = "Current .proto file or directory")]
        current: PathBuf,
        #[arg(help = "Previous .proto file or directory to check against")]
        against: PathBuf,
        #[arg(short = 'I', long = "include", help = "Import path (repeatable)")]
        includes: Vec<PathBuf>,
        #[arg(long, help = "buf.yaml with a `breaking` section")]
        config: Option<PathBuf>,
        #[arg(long, help = "Output format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
    #[command(about = "Print the resolved Protovalidate rules of a .proto file or directory")]
    Rules {
        #[arg(help = "Path to a .proto file or directory")]
        path: PathBuf,
        #[arg(short = 'I', long = "include", help = "Import path (repeatable)")]
        includes: Vec<PathBuf>,
        #[arg(long, help = "Output format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
    #[command(about = "List the registered rules")]
    ListRules,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ResolvedRules {
    descriptor: String,
    kind: &'static str,
    fingerprint: String,
    rules: serde_json::Value,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.verbose)?;

    match args.command {
        Commands::Breaking {
            current,
            against,
            includes,
            config,
            format,
        } => {
            let config = match config {
                Some(path) => CheckConfig::from_yaml_file(&path)
                    .with_context(|| format!("Failed to read config '{}'", path.display()))?,
                None => CheckConfig::default(),
            };

            let current_set = load(&current, &includes)?;
            let against_set = load(&against, &includes)?;

            let engine = CheckEngine::new();
            let single_files = current_set.files.first().zip(against_set.files.first());
            let result = match single_files {
                Some((file, against_file)) if current.is_file() && against.is_file() => engine
                    .check_file_pair(&current_set, &file.path, &against_set, &against_file.path, &config)?,
                _ => engine.check(&current_set, &against_set, &config)?,
            };

            info!(
                annotations = result.annotations.len(),
                file_pairs = result.checked_file_pairs,
                "check finished"
            );
            print_result(&result, &format)?;

            if result.has_annotations {
                std::process::exit(1);
            }
        }
        Commands::Rules {
            path,
            includes,
            format,
        } => {
            let schema_set = load(&path, &includes)?;
            let resolved = resolve_all(&schema_set)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
                OutputFormat::Text => {
                    if resolved.is_empty() {
                        println!("No Protovalidate rules found.");
                    }
                    for entry in &resolved {
                        println!("{} ({}) {}", entry.descriptor, entry.kind, entry.fingerprint);
                        println!("  {}", entry.rules);
                    }
                }
            }
        }
        Commands::ListRules => {
            for rule in registry::rule_specs() {
                println!(
                    "{:<24} {:<10} {:<8} {}",
                    rule.id,
                    rule.rule_type,
                    if rule.default { "default" } else { "" },
                    rule.purpose
                );
            }
        }
    }

    Ok(())
}

/// Loads a single file or every `.proto` file beneath a directory. A
/// directory becomes the first include path. A single file is named
/// relative to the `-I` root containing it, or to its parent directory when
/// no root does.
fn load(path: &Path, includes: &[PathBuf]) -> Result<SchemaSet> {
    let inputs = if path.is_dir() {
        let mut inputs = Vec::new();
        collect_proto_files(path, &mut inputs)
            .with_context(|| format!("Failed to read directory '{}'", path.display()))?;
        inputs.sort();
        inputs
    } else {
        vec![path.to_path_buf()]
    };

    if inputs.is_empty() {
        anyhow::bail!("No .proto files found in '{}'", path.display());
    }

    SchemaSet::load(include_roots(path, path.is_dir(), includes), &inputs)
        .with_context(|| format!("Failed to load '{}'", path.display()))
}

fn include_roots(path: &Path, is_dir: bool, includes: &[PathBuf]) -> Vec<PathBuf> {
    let root = if is_dir {
        Some(path.to_path_buf())
    } else if includes.iter().any(|include| path.starts_with(include)) {
        None
    } else {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Some(parent.to_path_buf())
    };

    root.into_iter().chain(includes.iter().cloned()).collect()
}

fn collect_proto_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_proto_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "proto") {
            out.push(path);
        }
    }
    Ok(())
}

fn resolve_all(schema_set: &SchemaSet) -> Result<Vec<ResolvedRules>> {
    let resolver = ProtovalidateResolver::new(schema_set.rule_schema.clone());
    let mut resolved = Vec::new();

    for file in &schema_set.files {
        for message in file.walk_messages() {
            let rules = resolver.resolve_message_rules(message)?;
            if !rules.is_empty() {
                resolved.push(ResolvedRules {
                    descriptor: message.full_name.clone(),
                    kind: "message",
                    fingerprint: rules.fingerprint()?,
                    rules: serde_json::to_value(&rules.rules)?,
                });
            }
            for field in &message.fields {
                let rules = resolver.resolve_field_rules(field)?;
                if !rules.is_empty() {
                    resolved.push(ResolvedRules {
                        descriptor: field.full_name.clone(),
                        kind: "field",
                        fingerprint: rules.fingerprint()?,
                        rules: serde_json::to_value(&rules.rules)?,
                    });
                }
            }
        }
    }

    Ok(resolved)
}

fn print_result(result: &CheckResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if result.has_annotations {
                println!("Protovalidate rule changes detected:");
                for annotation in &result.annotations {
                    println!("  [{}] {}", annotation.rule_id, annotation.message);
                    println!("    Location: {}", annotation.location);
                    if let Some(against_loc) = &annotation.against_location {
                        println!("    Previous: {}", against_loc);
                    }
                    println!();
                }
                println!("Summary:");
                println!("  Total annotations: {}", result.annotations.len());
                println!("  File pairs checked: {}", result.checked_file_pairs);
                println!("  Rules executed: {}", result.executed_rules.join(", "));
            } else {
                println!("No Protovalidate rule changes detected.");
                println!("File pairs checked: {}", result.checked_file_pairs);
            }
        }
    }
    Ok(())
}
