mod ask;
mod serve;
mod users;

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use crate::core::config::AppConfig;
use crate::core::graph::RagGraph;
use crate::core::terminal::{self, print_error};

fn print_help() {
    terminal::print_banner();

    let commands = [
        ("serve", "Start the HTTP API"),
        ("ingest", "Ingest new documents from the data directory"),
        ("ask", "Ask a single question (--query <text> [--user <name>])"),
        ("history", "List recent questions ([--user <name>] [--limit <n>])"),
        (
            "user create",
            "Create a user (--username <name> --password <pw> [--role ADMIN|EMPLOYEE])",
        ),
        ("graph", "Print the retrieval graph as Mermaid"),
    ];
    println!(" {}", style("Commands").bold().underlined());
    for (name, about) in commands {
        println!("   {:<14} {}", style(name).green(), about);
    }

    println!("\n {}", style("Global flags").bold().underlined());
    println!("   {:<14} Path to the TOML config file", style("--config").green());
    println!("   {:<14} Enable debug logging", style("--verbose").green());

    println!(
        "\n {} {} <command> [flags]\n",
        style("Usage:").bold(),
        style("ai-sre").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalFlags {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Strip global flags out of `args`, returning them alongside the remaining arguments.
pub(crate) fn split_global_flags(args: &[String]) -> (GlobalFlags, Vec<String>) {
    let mut flags = GlobalFlags::default();
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    flags.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                flags.verbose = true;
                i += 1;
            }
            _ => {
                rest.push(args[i].clone());
                i += 1;
            }
        }
    }
    (flags, rest)
}

/// Value following the first of `names` at or after `start`.
pub(crate) fn flag_value(args: &[String], start: usize, names: &[&str]) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if names.contains(&args[i].as_str()) {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub async fn run_main() -> Result<()> {
    let _ = dotenv::dotenv();
    let args: Vec<String> = std::env::args().collect();
    let (flags, args) = split_global_flags(&args);

    let Some(cmd) = args.get(1).map(String::as_str) else {
        print_help();
        return Ok(());
    };

    match cmd {
        "graph" => {
            println!("{}", RagGraph::to_mermaid());
            return Ok(());
        }
        "help" | "--help" | "-h" => {
            print_help();
            return Ok(());
        }
        _ => {}
    }

    crate::logging::init(flags.verbose);
    let config = AppConfig::load(flags.config.as_deref())?;

    match cmd {
        "serve" => serve::run_serve(config).await,
        "ingest" => ask::run_ingest(config).await,
        "ask" => {
            let Some(query) = flag_value(&args, 2, &["--query", "-q"]) else {
                print_error("Error: --query is required for ask.");
                print_help();
                return Ok(());
            };
            let user = flag_value(&args, 2, &["--user", "-u"]);
            ask::run_ask(config, &query, user.as_deref()).await
        }
        "history" => {
            let user = flag_value(&args, 2, &["--user", "-u"]);
            let limit = flag_value(&args, 2, &["--limit", "-n"])
                .and_then(|n| n.parse().ok())
                .unwrap_or(10);
            ask::run_history(config, user.as_deref(), limit).await
        }
        "user" => {
            let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");
            match sub_cmd {
                "create" => users::run_user_create(config, &args).await,
                _ => {
                    print_error("Unknown or missing user command. Expected: create");
                    print_help();
                    Ok(())
                }
            }
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn global_flags_are_removed_wherever_they_appear() {
        let args = argv(&[
            "ai-sre",
            "--verbose",
            "ask",
            "--config",
            "/etc/ai-sre.toml",
            "--query",
            "why is checkout slow?",
        ]);
        let (flags, rest) = split_global_flags(&args);
        assert!(flags.verbose);
        assert_eq!(flags.config, Some(PathBuf::from("/etc/ai-sre.toml")));
        assert_eq!(rest, argv(&["ai-sre", "ask", "--query", "why is checkout slow?"]));
    }

    #[test]
    fn flag_value_reads_long_and_short_names() {
        let args = argv(&["ai-sre", "ask", "-q", "disk full", "--user", "oncall"]);
        assert_eq!(
            flag_value(&args, 2, &["--query", "-q"]).as_deref(),
            Some("disk full")
        );
        assert_eq!(flag_value(&args, 2, &["--user", "-u"]).as_deref(), Some("oncall"));
        assert_eq!(flag_value(&args, 2, &["--role"]), None);
    }

    #[test]
    fn trailing_flag_without_value_yields_none() {
        let args = argv(&["ai-sre", "ask", "--query"]);
        assert_eq!(flag_value(&args, 2, &["--query"]), None);
    }
}
