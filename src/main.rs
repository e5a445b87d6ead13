use std::io::IsTerminal;

use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use onapp::api::{Client, Dashboard, Transaction, VirtualMachine};
use onapp::cache::VmCache;
use onapp::cli::{Cli, Command, VmCommand};
use onapp::config;
use onapp::error::OnappError;
use onapp::prompt::StdinPrompt;
use onapp::resolve::resolve;
use onapp::search;
use onapp::wait::{await_transaction, check_busy};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("onapp=debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("onapp=warn".parse().expect("valid log directive"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // clear-cache is purely local, no credentials needed
    if let Command::Vm(VmCommand::ClearCache) = &cli.command {
        let cache = VmCache::new();
        cache.clear()?;
        println!("Cache cleared.");
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;
    let client = Client::from_config(&config)?;
    let cache = VmCache::new();
    let mut prompt = StdinPrompt;

    match cli.command {
        Command::Test => {
            let profile = client.profile().await?;
            println!(
                "Successfully connected! Your profile name is {} {}.",
                profile.first_name, profile.last_name
            );
        }
        Command::Profile => {
            let p = client.profile().await?;
            println!("#{}  {} {}", p.id, p.first_name, p.last_name);
            println!("Login: {}", p.login);
            println!("Email: {}", p.email);
        }
        Command::Tx { count } => {
            let txns = client.all_transactions().await?;
            print_transactions(&txns, count);
        }
        Command::Vm(vm_command) => match vm_command {
            // Normally handled above, before config loading; kept equivalent
            // here so the match has no panic path.
            VmCommand::ClearCache => {
                cache.clear()?;
                println!("Cache cleared.");
            }
            VmCommand::List { filters } => {
                run_list(&client, &filters).await?;
            }
            VmCommand::Start { query } => {
                run_action(&client, &cache, &mut prompt, &query, Action::Start).await?;
            }
            VmCommand::Stop { query } => {
                run_action(&client, &cache, &mut prompt, &query, Action::Stop).await?;
            }
            VmCommand::Reboot { query } => {
                run_action(&client, &cache, &mut prompt, &query, Action::Reboot).await?;
            }
            VmCommand::Tx { query, count } => {
                let vm = resolve(&client, &cache, &mut prompt, &query, true).await?;
                let txns = client.transactions(vm.id).await?;
                print_transactions(&txns, count);
            }
            VmCommand::Backups { query } => {
                let vm = resolve(&client, &cache, &mut prompt, &query, true).await?;
                let backups = client.backups(vm.id).await?;
                if backups.is_empty() {
                    println!("No backups for '{}'.", vm.label);
                }
                for b in &backups {
                    println!(
                        "{:<25.25}   #{:<6}   {:<12}   {:>10}   {:<20.20}   {}",
                        b.created_at,
                        b.id,
                        b.backup_type,
                        format_size_kb(b.backup_size),
                        b.operating_system,
                        if b.built { "built" } else { "pending" },
                    );
                }
            }
            VmCommand::Disks { query } => {
                let vm = resolve(&client, &cache, &mut prompt, &query, true).await?;
                let disks = client.disks(vm.id).await?;
                if disks.is_empty() {
                    println!("No disks for '{}'.", vm.label);
                }
                for d in &disks {
                    let kind = if d.is_swap {
                        "swap"
                    } else if d.primary {
                        "primary"
                    } else {
                        "data"
                    };
                    println!(
                        "{:<20.20}   #{:<6}   {:>5} GB   {:<8}   {:<8}   DS-{}",
                        if d.label.is_empty() { &d.identifier } else { &d.label },
                        d.id,
                        d.disk_size,
                        d.file_system,
                        kind,
                        d.data_store_id,
                    );
                }
            }
        },
    }

    Ok(())
}

// ── mutating actions ──────────────────────────────────────

#[derive(Clone, Copy)]
enum Action {
    Start,
    Stop,
    Reboot,
}

impl Action {
    /// The action name the dashboard assigns to the queued transaction.
    fn transaction_name(self) -> &'static str {
        match self {
            Action::Start => "startup_virtual_machine",
            Action::Stop => "stop_virtual_machine",
            Action::Reboot => "reboot_virtual_machine",
        }
    }

    fn process_name(self) -> &'static str {
        match self {
            Action::Start => "boot",
            Action::Stop => "shutdown",
            Action::Reboot => "reboot",
        }
    }
}

/// Resolve, gate, queue, then wait for the transaction to appear.
///
/// The busy gate always runs before the POST; the waiter always after. The
/// action itself is never retried: a transport failure after the POST may
/// mean the job was queued, and double-submission is worse than a manual
/// re-check.
async fn run_action(
    client: &Client,
    cache: &VmCache,
    prompt: &mut StdinPrompt,
    query: &str,
    action: Action,
) -> Result<(), OnappError> {
    let vm = resolve(client, cache, prompt, query, true).await?;
    check_busy(client, prompt, vm.id).await?;

    match action {
        Action::Start => client.startup(vm.id).await?,
        Action::Stop => client.shutdown(vm.id).await?,
        Action::Reboot => client.reboot(vm.id).await?,
    }

    let spinner = if std::io::stderr().is_terminal() {
        let s = ProgressBar::new_spinner();
        s.set_message(format!(
            "Job successfully queued, waiting for the {} process to start...",
            action.process_name()
        ));
        s.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(s)
    } else {
        println!(
            "Job successfully queued, waiting for the {} process to start...",
            action.process_name()
        );
        None
    };

    let waited = await_transaction(client, vm.id, action.transaction_name()).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let tx = waited?;

    println!(
        "{} {} process started: #{}!",
        style("OK").green(),
        action.process_name(),
        tx.id
    );
    Ok(())
}

// ── listing ───────────────────────────────────────────────

async fn run_list(client: &Client, filters: &[String]) -> Result<(), OnappError> {
    let mut vms = client.virtual_machines().await?;
    vms.sort_by_key(|vm| vm.user_id);

    for query in search::parse_filters(filters) {
        vms = search::apply(&query, vms)?;
    }

    println!(
        "{:>35.35}   {:<5}   {:<5}   {:<9}   {:<15}   {:<8}   {:>4}   {:>8}",
        "Label", "ID", "HV", "User", "First IP", "Status", "CPUs", "RAM"
    );
    for vm in &vms {
        println!(
            "{:>35.35}   #{:<4}   HV-{:<2}   User {:<4}   {:<15}   {}   {:>4}   {:>7}M",
            vm.label,
            vm.id,
            vm.hypervisor_id,
            vm.user_id,
            vm.first_ip().unwrap_or("-"),
            colored_boot_state(vm),
            vm.cpus,
            vm.memory,
        );
    }
    Ok(())
}

fn colored_boot_state(vm: &VirtualMachine) -> String {
    // Pad before styling: ANSI escapes would throw off the column width.
    let padded = format!("{:<8}", vm.boot_state());
    match vm.boot_state() {
        "Locked" => style(padded).yellow().to_string(),
        "Booted" => style(padded).green().to_string(),
        _ => style(padded).red().to_string(),
    }
}

fn print_transactions(txns: &[Transaction], count: usize) {
    for tx in txns.iter().take(count) {
        let Some(created) = tx.created_at_time() else {
            tracing::warn!(id = tx.id, "transaction has unparseable created_at, skipping");
            continue;
        };
        println!(
            "{:<25}   #{:<6}   {:<30.30}   {}",
            created.format("%Y-%m-%d %H:%M:%S UTC"),
            tx.id,
            tx.action,
            colored_tx_status(&tx.status),
        );
    }
}

fn colored_tx_status(status: &str) -> String {
    let padded = format!("{status:<10}");
    match status {
        "complete" => style(padded).green().to_string(),
        "running" | "pending" => style(padded).yellow().to_string(),
        "failed" | "cancelled" => style(padded).red().to_string(),
        _ => padded,
    }
}

fn format_size_kb(kb: i64) -> String {
    const MB: i64 = 1024;
    const GB: i64 = 1024 * MB;
    if kb >= GB {
        format!("{:.1} GB", kb as f64 / GB as f64)
    } else if kb >= MB {
        format!("{:.1} MB", kb as f64 / MB as f64)
    } else {
        format!("{kb} KB")
    }
}
