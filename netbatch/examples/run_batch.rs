//! Batch example
//!
//! Runs a list of commands on every device in a JSON inventory and prints
//! one JSON result per device.
//!
//! # Inventory
//!
//! ```json
//! [
//!   {"name": "r1", "address": "192.0.2.1", "vendor": "cisco", "platform": "ios"},
//!   {"name": "sw1", "address": "192.0.2.2", "vendor": "arista", "platform": "eos",
//!    "protocol": "telnet"},
//!   {"name": "fw1", "address": "192.0.2.3", "vendor": "cisco", "platform": "asa",
//!    "connection": {"insecure_host_key": false, "known_hosts": "/etc/ssh/known_hosts"}}
//! ]
//! ```
//!
//! # Usage
//!
//! ```bash
//! NETBATCH_PASSWORD=secret cargo run --example run_batch -- \
//!     --inventory devices.json --user admin \
//!     --command "show version" --command "show clock" --concurrency 16
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use netbatch::{
    Credentials, DeviceEntry, JobOptions, PlatformRegistry, Scheduler, resolve_inventory,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.commands.is_empty() {
        eprintln!("Error: at least one --command is required");
        std::process::exit(1);
    }

    let inventory: Vec<DeviceEntry> = serde_json::from_str(&fs::read_to_string(&args.inventory)?)?;

    let mut credentials = Credentials::new(&args.user);
    if let Ok(password) = env::var("NETBATCH_PASSWORD") {
        credentials = credentials.with_password(password);
    }
    if let Ok(secret) = env::var("NETBATCH_ENABLE_PASSWORD") {
        credentials = credentials.with_enable_password(secret);
    }
    if let Some(key) = &args.key {
        credentials = credentials.with_private_key(key);
    }
    let credentials = Arc::new(credentials);

    let mut options = JobOptions::default().with_max_concurrency(args.concurrency);
    if let Some(deadline) = args.deadline {
        options = options.with_deadline(Duration::from_secs(deadline));
    }

    let registry = PlatformRegistry::builtin()?;
    let resolution =
        resolve_inventory(inventory, &credentials, &registry, options.connect_timeout());
    for unsupported in &resolution.unsupported {
        eprintln!("Skipping: {unsupported}");
    }

    let scheduler = Scheduler::new(options)?;
    let (results, report) = scheduler
        .run_collect(resolution.devices, &args.commands)
        .await;

    for result in &results {
        println!("{}", serde_json::to_string(result)?);
    }

    eprintln!(
        "\n{} ok, {} failed, {} missing in {:?}",
        report.succeeded,
        report.failed,
        report.missing.len(),
        report.elapsed
    );
    if !report.is_complete() {
        eprintln!("No result from: {}", report.missing.join(", "));
    }

    Ok(())
}

/// Simple argument parser (no external deps for examples)
struct Args {
    inventory: PathBuf,
    user: String,
    key: Option<PathBuf>,
    commands: Vec<String>,
    concurrency: usize,
    deadline: Option<u64>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut inventory = PathBuf::from("devices.json");
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut key = None;
        let mut commands = Vec::new();
        let mut concurrency = 0usize;
        let mut deadline = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--inventory" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        inventory = PathBuf::from(&args[i]);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--command" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        commands.push(args[i].clone());
                    }
                }
                "--concurrency" | "-n" => {
                    i += 1;
                    if i < args.len() {
                        concurrency = args[i].parse().unwrap_or(0);
                    }
                }
                "--deadline" | "-d" => {
                    i += 1;
                    if i < args.len() {
                        deadline = args[i].parse().ok();
                    }
                }
                "--help" => {
                    println!("Usage: run_batch [OPTIONS]");
                    println!();
                    println!("Options:");
                    println!("  -i, --inventory <PATH>   JSON inventory [default: devices.json]");
                    println!("  -u, --user <USER>        Username [default: $USER]");
                    println!("  -k, --key <PATH>         Private key file");
                    println!("  -c, --command <CMD>      Command to run (repeatable)");
                    println!("  -n, --concurrency <N>    Max devices at once, 0 = unlimited");
                    println!("  -d, --deadline <SECS>    Deadline for the whole run");
                    println!();
                    println!("Passwords come from NETBATCH_PASSWORD and NETBATCH_ENABLE_PASSWORD.");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            inventory,
            user,
            key,
            commands,
            concurrency,
            deadline,
        }
    }
}
