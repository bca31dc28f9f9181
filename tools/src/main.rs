//! lead-router: operational harness for the lead assignment engine.
//!
//! Usage:
//!   lead-router seed-demo --db router.db --seed 42 --callers 6 --leads 12
//!   lead-router ingest --db router.db --file leads.jsonl
//!   cat leads.jsonl | lead-router ingest --db router.db
//!   lead-router assign-pending --db router.db
//!   lead-router reassign --db router.db --lead <id> --caller <id>
//!   lead-router purge-counters --db router.db
//!   lead-router summary --db router.db --limit 10

use anyhow::Result;
use leadroute_core::{
    caller::NewCaller,
    config::RouterConfig,
    engine::{AssignOutcome, AssignmentEngine, IntakeOutcome},
    lead::{LeadFilter, LeadStatus, NewLead},
    store::RouterStore,
    types::today_utc,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::env;
use std::io::{self, BufRead, BufReader, Write};

/// One JSON line per ingested lead, mirroring the intake contract.
#[derive(serde::Serialize)]
struct IngestLine<'a> {
    ok: bool,
    lead_id: &'a str,
    assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    if command == "help" || command == "--help" {
        print_usage();
        return Ok(());
    }

    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or("router.db");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => RouterConfig::from_json_file(&w[1])?,
        None => RouterConfig::default(),
    };

    let store = RouterStore::open(db)?;
    store.migrate()?;
    let engine = AssignmentEngine::build(store, config)?;

    match command {
        "seed-demo" => seed_demo(&engine, &args),
        "ingest" => ingest(&engine, &args),
        "assign-pending" => assign_pending(&engine, &args),
        "reassign" => reassign(&engine, &args),
        "purge-counters" => purge_counters(&engine),
        "summary" => summary(&engine, &args),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    }
}

/// Deterministic demo data: a handful of callers with overlapping
/// territories, then a batch of leads routed through the engine.
fn seed_demo(engine: &AssignmentEngine, args: &[String]) -> Result<()> {
    const FIRST_NAMES: &[&str] = &[
        "Asha", "Rohan", "Priya", "Vikram", "Meera", "Arjun", "Kavita", "Nikhil", "Divya",
        "Sanjay",
    ];
    const LAST_NAMES: &[&str] = &[
        "Sharma", "Patil", "Nair", "Rao", "Desai", "Iyer", "Kulkarni", "Menon",
    ];
    const TERRITORIES: &[&str] = &["Goa", "Maharashtra", "Karnataka", "Kerala", "Gujarat"];
    const LANGUAGES: &[&str] = &["en", "hi", "mr", "kn", "ml"];
    const SOURCES: &[&str] = &["webform", "facebook", "google_ads", "referral"];

    let seed = parse_arg(args, "--seed", 42u64);
    let caller_count = parse_arg(args, "--callers", 6usize);
    let lead_count = parse_arg(args, "--leads", 12usize);
    let mut rng = Pcg64Mcg::seed_from_u64(seed);

    println!("Seeding {caller_count} callers and {lead_count} leads (seed {seed})");

    for i in 0..caller_count {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        // Walk territories so every one is covered, plus a random second
        // so pools overlap and rotation has company.
        let home = TERRITORIES[i % TERRITORIES.len()];
        let extra = TERRITORIES[rng.gen_range(0..TERRITORIES.len())];
        let mut territories = vec![home.to_string()];
        if extra != home {
            territories.push(extra.to_string());
        }
        let caller = engine.register_caller(NewCaller {
            name: format!("{first} {last}"),
            role: None,
            phone: format!("98{:08}", rng.gen_range(0u32..100_000_000)),
            languages: vec![LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string()],
            territories,
            daily_limit: Some(rng.gen_range(3..8)),
        })?;
        println!(
            "  caller {} | {} | limit {} | [{}]",
            caller.id,
            caller.name,
            caller.daily_limit,
            caller.territories.join(", ")
        );
    }

    for i in 0..lead_count {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        let territory = TERRITORIES[rng.gen_range(0..TERRITORIES.len())];
        let outcome = engine.intake(NewLead {
            name: format!("{first} {last}"),
            phone: format!("91{:08}", 10_000_000 + i as u32),
            email: None,
            city: None,
            territory: territory.to_string(),
            source: Some(SOURCES[rng.gen_range(0..SOURCES.len())].to_string()),
        })?;
        match outcome {
            IntakeOutcome::Routed { lead, outcome } => match outcome {
                AssignOutcome::Assigned { caller, method, .. } => println!(
                    "  lead {} ({}) -> {} via {method}",
                    lead.id, lead.territory, caller.name
                ),
                AssignOutcome::Unassigned { reason } => {
                    println!("  lead {} ({}) unassigned: {reason}", lead.id, lead.territory)
                }
            },
            IntakeOutcome::Duplicate { existing } => {
                println!("  duplicate of lead {}", existing.id)
            }
        }
    }
    Ok(())
}

/// Read JSONL lead payloads from a file or stdin, intake each, and
/// emit one JSON outcome line per input line.
fn ingest(engine: &AssignmentEngine, args: &[String]) -> Result<()> {
    let file = args
        .windows(2)
        .find(|w| w[0] == "--file")
        .map(|w| w[1].clone());
    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(&path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut stdout = io::stdout();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let payload: NewLead = match serde_json::from_str(&line) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Skipping malformed lead payload: {e}");
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        let out = match engine.intake(payload) {
            Ok(IntakeOutcome::Routed { lead, outcome }) => match &outcome {
                AssignOutcome::Assigned { caller, method, .. } => {
                    serde_json::to_string(&IngestLine {
                        ok: true,
                        lead_id: &lead.id,
                        assigned: true,
                        caller_id: Some(&caller.id),
                        method: Some(method.as_str()),
                        reason: None,
                    })?
                }
                AssignOutcome::Unassigned { reason } => serde_json::to_string(&IngestLine {
                    ok: true,
                    lead_id: &lead.id,
                    assigned: false,
                    caller_id: None,
                    method: None,
                    reason: Some(reason),
                })?,
            },
            Ok(IntakeOutcome::Duplicate { existing }) => {
                serde_json::json!({ "duplicate": true, "lead_id": existing.id }).to_string()
            }
            Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
        };
        writeln!(stdout, "{out}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Route every persisted lead still in status `new`, oldest first.
/// Recovery path for leads created while no router was running.
fn assign_pending(engine: &AssignmentEngine, args: &[String]) -> Result<()> {
    let batch = parse_arg(args, "--batch", 500usize);
    let pending = engine.store().list_leads(&LeadFilter {
        status: Some(LeadStatus::New),
        territory: None,
        limit: Some(batch),
    })?;

    if pending.is_empty() {
        println!("No pending leads");
        return Ok(());
    }

    let mut assigned = 0;
    let mut unassigned = 0;
    for lead in pending.iter().rev() {
        match engine.assign(lead) {
            Ok(outcome) if outcome.assigned() => assigned += 1,
            Ok(_) => unassigned += 1,
            Err(e) => eprintln!("lead {}: {e}", lead.id),
        }
    }
    println!("Routed {assigned} leads, {unassigned} went unassigned");
    Ok(())
}

fn reassign(engine: &AssignmentEngine, args: &[String]) -> Result<()> {
    let lead_id = required_arg(args, "--lead")?;
    let caller_id = required_arg(args, "--caller")?;
    engine.reassign(&lead_id, &caller_id)?;
    println!("Lead {lead_id} reassigned to {caller_id}");
    Ok(())
}

fn purge_counters(engine: &AssignmentEngine) -> Result<()> {
    let removed = engine.purge_counters_before(today_utc())?;
    println!("Purged {removed} counters older than today");
    Ok(())
}

fn summary(engine: &AssignmentEngine, args: &[String]) -> Result<()> {
    let limit = parse_arg(args, "--limit", 10usize);
    let today = today_utc();

    println!("=== CALLERS ===");
    let callers = engine.store().callers_with_today_count(today)?;
    if callers.is_empty() {
        println!("  (no callers registered)");
    }
    for row in &callers {
        let c = &row.caller;
        let state = if c.active { "active" } else { "inactive" };
        println!(
            "  {} | {} | {}/{} today | {state} | [{}]",
            c.id,
            c.name,
            row.today_count,
            c.daily_limit,
            c.territories.join(", ")
        );
    }

    println!();
    println!("=== RECENT ASSIGNMENTS ===");
    let logs = engine.store().recent_assignment_logs(limit)?;
    if logs.is_empty() {
        println!("  (no assignments logged)");
    }
    for entry in &logs {
        println!(
            "  {} | lead {} | {} | {} | {}",
            entry.logged_at.format("%Y-%m-%d %H:%M:%S"),
            entry.lead_id,
            entry.caller_id.as_deref().unwrap_or("-"),
            entry.method,
            entry.note
        );
    }
    Ok(())
}

fn print_usage() {
    println!("lead-router: capacity-aware round-robin lead assignment");
    println!();
    println!("Commands:");
    println!("  seed-demo       --seed N --callers K --leads M   deterministic demo data");
    println!("  ingest          [--file leads.jsonl]             intake JSONL leads (stdin default)");
    println!("  assign-pending  [--batch N]                      route persisted leads still 'new'");
    println!("  reassign        --lead ID --caller ID            manual override");
    println!("  purge-counters                                   drop counters older than today");
    println!("  summary         [--limit N]                      callers and recent assignments");
    println!();
    println!("Global flags: --db PATH (default router.db), --config FILE");
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn required_arg(args: &[String], flag: &str) -> Result<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .ok_or_else(|| anyhow::anyhow!("{flag} is required"))
}
