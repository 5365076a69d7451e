mod simulate;

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tally_config::TallyConfig;
use tally_engine::{Template, order};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "run" => {
            let options = parse_run_args(&args[2..]);
            if let Err(e) = simulate::run(options).await {
                eprintln!("❌ Error running aggregation: {:#}", e);
                std::process::exit(1);
            }
        }
        "order" => {
            let Some(path) = args.get(2) else {
                println!("Usage: order <template>");
                return;
            };
            if let Err(e) = print_ordering(path) {
                eprintln!("❌ Error ordering template: {:#}", e);
                std::process::exit(1);
            }
        }
        "sample-config" => {
            print!("{}", TallyConfig::generate_sample());
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Tally CLI - Secret-Shared Survey Aggregation");
    println!();
    println!("USAGE:");
    println!("  tally <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("  run [options]              Share submissions across a local committee and aggregate");
    println!("  order <template>           Print the slot layout derived from a template");
    println!("  sample-config              Print a sample tally.toml");
    println!("  help                       Show this help message");
    println!();
    println!("RUN OPTIONS:");
    println!("  --config <path>            Config file (default: TALLY_CONFIG, ./tally.toml, ~/.tally/tally.toml)");
    println!("  --template <path>          Survey template JSON");
    println!("  --submissions <path>       Submissions JSON: [{{party, cohort?, data}}]");
    println!("  --output <path>            Write the report here instead of stdout");
    println!("  --min-cohort <n>           Smallest cohort reported on its own");
    println!();
    println!("EXAMPLES:");
    println!("  tally run --template survey.json --submissions subs.json");
    println!("  tally order survey.json");
    println!("  tally sample-config > tally.toml");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  TALLY_CONFIG         Config file path");
    println!("  TALLY_HOLDERS        Committee size");
    println!("  TALLY_THRESHOLD      Shares needed to open");
    println!("  TALLY_ANALYST        Party receiving opened sums");
    println!("  TALLY_MIN_COHORT     Smallest cohort reported on its own");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

fn parse_run_args(args: &[String]) -> simulate::RunOptions {
    let mut options = simulate::RunOptions::default();

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(path)) => {
                options.config_path = Some(PathBuf::from(path));
                i += 1;
            }
            ("--template", Some(path)) => {
                options.template = Some(path.clone());
                i += 1;
            }
            ("--submissions", Some(path)) => {
                options.submissions = Some(path.clone());
                i += 1;
            }
            ("--output", Some(path)) => {
                options.output = Some(path.clone());
                i += 1;
            }
            ("--min-cohort", Some(size)) => {
                match size.parse() {
                    Ok(size) => options.min_cohort_size = Some(size),
                    Err(_) => log::warn!("Ignoring unparseable --min-cohort {}", size),
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    options
}

fn print_ordering(path: &str) -> anyhow::Result<()> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let template = Template::from_json(&json)?;
    let ordering = order(&template)?;
    println!("{}", serde_json::to_string_pretty(&ordering)?);
    log::info!("{} slots per submission", ordering.total_slots());
    Ok(())
}
