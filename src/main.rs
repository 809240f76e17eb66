use clap::{Arg, Command};
use log::LevelFilter;
use octet_script_milter::milter::Milter;
use octet_script_milter::{Config, MessageNode, ScanResult};
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("octet-script-milter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Milter that scores script payloads hidden in octet-stream attachments")
        .long_about(
            "Walks every level of a message's MIME tree, decodes parts declared as \
             octet-stream and scores embedded <script> blocks, VBScript and encoded \
             PowerShell commands. Hits are tagged with a score header or rejected.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/octet-script-milter.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Scan a raw email file and print the result")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print --test-email results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-part scan decisions")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logger based on verbose flag
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/octet-script-milter.yaml");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!("Testing configuration...");
        println!("Socket path: {}", config.socket_path);
        println!("Max body size: {} bytes", config.max_body_size);
        println!("Content-Type token: {}", config.scan.content_type_token);
        println!(
            "Search: recursive={} leaves_only={}",
            config.scan.recursive, config.scan.leaves_only
        );
        println!("Hit policy: {:?}", config.scan.hit_policy);
        match config.build_orchestrator() {
            Ok(_) => println!("All signature patterns compiled successfully."),
            Err(e) => {
                println!("Configuration validation failed:");
                println!("Error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        if let Err(e) = test_email_file(&config, email_file, matches.get_flag("json")) {
            eprintln!("Error scanning {email_file}: {e:#}");
            process::exit(1);
        }
        return;
    }

    let milter = match Milter::new(&config) {
        Ok(milter) => milter,
        Err(e) => {
            eprintln!("Failed to create milter: {e:#}");
            process::exit(1);
        }
    };

    if let Err(e) = milter.run(&config.socket_path).await {
        log::error!("Milter error: {e:#}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_email_file(config: &Config, email_file: &str, json: bool) -> anyhow::Result<()> {
    use anyhow::Context;

    let raw = std::fs::read(email_file).with_context(|| format!("Failed to read {email_file}"))?;
    let root = MessageNode::parse(&raw)?;
    let engine = config.build_orchestrator()?;
    let result = engine.evaluate(&root);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(email_file, &result);
    }
    Ok(())
}

fn print_report(email_file: &str, result: &ScanResult) {
    println!("Testing email file: {}", email_file);
    println!();
    println!(
        "Candidate parts: {} found, {} examined",
        result.candidates_found, result.candidates_examined
    );

    if result.hit {
        let part = result
            .triggering_part
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let categories: Vec<String> = result.categories.iter().map(|c| c.to_string()).collect();
        println!("Result: HIT");
        println!("Score: {:.2}", result.score);
        match &result.triggering_filename {
            Some(filename) => println!("Triggering part: {} ({})", part, filename),
            None => println!("Triggering part: {}", part),
        }
        println!("Categories: {}", categories.join(", "));
    } else {
        println!("Result: clean");
        println!("Score: {:.2}", result.score);
    }
}
