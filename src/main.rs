use std::sync::Arc;

use tracing::{error, warn};

use copilot_relay::console;
use copilot_relay::error::AppResult;
use copilot_relay::modules::{logger, persistence};
use copilot_relay::proxy::instance::InstanceManager;
use copilot_relay::proxy::server::{self, AppState};
use copilot_relay::proxy::upstream::UpstreamClient;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
struct CliOptions {
    web_port: u16,
    proxy_port: u16,
    verbose: bool,
    auto_start: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            web_port: 3000,
            proxy_port: 4141,
            verbose: false,
            auto_start: true,
        }
    }
}

fn print_help() {
    println!("copilot-relay v{}", VERSION);
    println!("Multi-account GitHub Copilot gateway");
    println!();
    println!("USAGE:");
    println!("    copilot-relay [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --web-port <port>      Web console port (default: 3000)");
    println!("    --proxy-port <port>    Proxy server port (default: 4141)");
    println!("    --verbose              Enable verbose logging");
    println!("    --auto-start <bool>    Auto-start enabled accounts (default: true)");
    println!("    -h, --help             Print help");
    println!("    -V, --version          Print version");
}

fn required_value(args: &[String], index: &mut usize, inline: Option<String>, flag: &str) -> String {
    if let Some(value) = inline {
        return value;
    }
    *index += 1;
    match args.get(*index) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(2);
        }
    }
}

fn parse_port(value: &str, flag: &str) -> u16 {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            eprintln!("Error: invalid port for {}: {}", flag, value);
            std::process::exit(2);
        }
    }
}

fn parse_args() -> CliOptions {
    let mut options = CliOptions::default();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut index = 0;
    while index < args.len() {
        let (flag, inline) = match args[index].split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (args[index].clone(), None),
        };

        match flag.as_str() {
            "--web-port" => {
                let value = required_value(&args, &mut index, inline, "--web-port");
                options.web_port = parse_port(&value, "--web-port");
            }
            "--proxy-port" => {
                let value = required_value(&args, &mut index, inline, "--proxy-port");
                options.proxy_port = parse_port(&value, "--proxy-port");
            }
            "--verbose" => options.verbose = true,
            "--auto-start" => {
                // Value is optional: bare --auto-start means true.
                let value = match inline {
                    Some(value) => value,
                    None => match args.get(index + 1) {
                        Some(next) if !next.starts_with('-') => {
                            index += 1;
                            next.clone()
                        }
                        _ => "true".to_string(),
                    },
                };
                options.auto_start = matches!(value.as_str(), "true" | "1" | "yes");
            }
            "--version" | "-V" => {
                println!("copilot-relay {}", VERSION);
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown option: {}", other);
                eprintln!();
                print_help();
                std::process::exit(2);
            }
        }
        index += 1;
    }

    options
}

async fn run(options: CliOptions) -> AppResult<()> {
    persistence::paths::ensure_files()?;

    let upstream = Arc::new(UpstreamClient::new()?);
    let instances = InstanceManager::new(upstream);

    if options.auto_start {
        match persistence::accounts::get_enabled_accounts() {
            Ok(accounts) => {
                for account in accounts {
                    let instances = instances.clone();
                    tokio::spawn(async move {
                        let name = account.name.clone();
                        if let Err(e) = instances.start(account).await {
                            warn!("Failed to auto-start account {}: {}", name, e);
                        }
                    });
                }
            }
            Err(e) => warn!("Failed to load accounts for auto-start: {}", e),
        }
    }

    let proxy_state = AppState {
        instances: instances.clone(),
    };
    let console_state = console::ConsoleState {
        instances,
        proxy_port: options.proxy_port,
    };

    tokio::try_join!(
        server::serve(proxy_state, options.proxy_port),
        console::serve(console_state, options.web_port),
    )?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let options = parse_args();
    logger::init_logger(options.verbose);

    if let Err(e) = run(options).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
