use chrono::{DateTime, FixedOffset, Local, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use pillbox_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pillbox")]
#[command(about = "Personal medication tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pin the clock to an RFC 3339 timestamp (for testing)
    #[arg(long, global = true, hide = true)]
    now: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every medication with its supply and next dose (default)
    Status,

    /// Register a medication with its dosing schedule
    Add {
        name: String,

        /// Units currently on hand
        #[arg(long)]
        stock: f64,

        #[arg(long)]
        description: Option<String>,

        /// Unit the stock is counted in (mg, ml, nos)
        #[arg(long, default_value = "nos")]
        unit: String,

        /// Dose as HH:MM[xQTY][@DAYS], e.g. 08:00, 20:00x2, 09:00@mon,thu
        #[arg(long = "dose")]
        doses: Vec<String>,
    },

    /// Rename a medication or change its description or unit
    #[command(group(
        ArgGroup::new("changes")
            .required(true)
            .multiple(true)
            .args(["new_name", "description", "unit"])
    ))]
    Edit {
        name: String,

        #[arg(long = "name")]
        new_name: Option<String>,

        /// New description; pass an empty string to clear it
        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        unit: Option<String>,
    },

    /// Delete a medication with its schedule and history
    Remove { name: String },

    /// Take the next scheduled dose
    Take { name: String },

    /// Skip the next scheduled dose
    Skip { name: String },

    /// Report lost or dropped units
    Lost {
        name: String,

        #[arg(long, default_value_t = 1.0)]
        qty: f64,
    },

    /// Add purchased stock
    Restock {
        name: String,

        #[arg(long)]
        qty: f64,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        pharmacy: Option<String>,
    },

    /// Manage dose rules of a medication
    Dose {
        #[command(subcommand)]
        action: DoseCommand,
    },

    /// Show recent dose events, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show purchases grouped by medication
    Purchases,

    /// List medications that are running low
    Refills,
}

#[derive(Subcommand)]
enum DoseCommand {
    /// Add a dose rule, e.g. `dose add Metformin 20:00x2`
    Add { name: String, spec: String },

    /// Remove the dose rule scheduled at HH:MM
    Remove { name: String, time: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        pillbox_core::logging::init_with_level("debug");
    } else {
        pillbox_core::logging::init();
    }

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let cabinet_path = data_dir.join("cabinet.json");
    let now = resolve_now(cli.now.as_deref())?;
    tracing::debug!("Using cabinet {:?} at {}", cabinet_path, now);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cmd_status(&cabinet_path, &now, &config),
        Commands::Add {
            name,
            stock,
            description,
            unit,
            doses,
        } => cmd_add(&cabinet_path, name, stock, description, &unit, &doses),
        Commands::Edit {
            name,
            new_name,
            description,
            unit,
        } => cmd_edit(&cabinet_path, &name, new_name, description, unit),
        Commands::Remove { name } => cmd_remove(&cabinet_path, &name),
        Commands::Take { name } => cmd_take(&cabinet_path, &name, &now, &config),
        Commands::Skip { name } => cmd_skip(&cabinet_path, &name, &now, &config),
        Commands::Lost { name, qty } => cmd_lost(&cabinet_path, &name, qty, &now),
        Commands::Restock {
            name,
            qty,
            price,
            pharmacy,
        } => cmd_restock(&cabinet_path, &name, qty, price, pharmacy, &now),
        Commands::Dose { action } => cmd_dose(&cabinet_path, action),
        Commands::History { limit } => cmd_history(
            &cabinet_path,
            limit.unwrap_or(config.display.history_limit),
            &now,
        ),
        Commands::Purchases => cmd_purchases(&cabinet_path, &now),
        Commands::Refills => cmd_refills(&cabinet_path, &config),
    }
}

fn resolve_now(pinned: Option<&str>) -> Result<DateTime<FixedOffset>> {
    match pinned {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map_err(|e| Error::Config(format!("invalid --now {:?}: {}", text, e))),
        None => Ok(Local::now().fixed_offset()),
    }
}

fn cmd_status(path: &Path, now: &DateTime<FixedOffset>, config: &Config) -> Result<()> {
    let cabinet = Cabinet::load(path)?;

    if cabinet.medications.is_empty() {
        println!("No medications yet. Add one with `pillbox add`.");
        return Ok(());
    }

    let policy = config.schedule_policy();
    for med in &cabinet.medications {
        let days = project_supply_days(med.current_stock, &med.doses, now.date_naive());
        let state = resolve_next_action_with(&med.doses, &med.todays_events(now), now, &policy);
        display_medication(med, days, &state, config);
    }

    Ok(())
}

fn cmd_add(
    path: &Path,
    name: String,
    stock: f64,
    description: Option<String>,
    unit: &str,
    specs: &[String],
) -> Result<()> {
    let doses = specs
        .iter()
        .map(|spec| parse_dose_spec(spec))
        .collect::<Result<Vec<_>>>()?;
    let unit: Unit = unit.parse()?;

    let mut medication = Medication::new(name, stock, doses)?;
    medication.description = description;
    medication.unit = unit;

    let name = Cabinet::update(path, |cabinet| {
        let added = cabinet.add(medication)?;
        Ok(added.name.clone())
    })?;

    println!("✓ Added {}", name);
    Ok(())
}

fn cmd_edit(
    path: &Path,
    name: &str,
    new_name: Option<String>,
    description: Option<String>,
    unit: Option<String>,
) -> Result<()> {
    let unit = unit.map(|u| u.parse::<Unit>()).transpose()?;

    let med_name = Cabinet::update(path, |cabinet| {
        let med = match new_name {
            Some(ref new_name) => cabinet.rename(name, new_name)?,
            None => cabinet.find_mut(name)?,
        };
        med.set_details(description, unit);
        Ok(med.name.clone())
    })?;

    println!("✓ Updated {}", med_name);
    Ok(())
}

fn cmd_remove(path: &Path, name: &str) -> Result<()> {
    let removed = Cabinet::update(path, |cabinet| cabinet.remove(name))?;
    println!(
        "✓ Removed {} ({} events, {} refills)",
        removed.name,
        removed.events.len(),
        removed.refills.len()
    );
    Ok(())
}

fn cmd_take(path: &Path, name: &str, now: &DateTime<FixedOffset>, config: &Config) -> Result<()> {
    let policy = config.schedule_policy();
    let (med_name, stock) = Cabinet::update(path, |cabinet| {
        let med = cabinet.find_mut(name)?;
        med.take_next(now, &policy)?;
        Ok((med.name.clone(), med.current_stock))
    })?;

    println!("✓ Dose taken: {} ({} left)", med_name, stock);
    Ok(())
}

fn cmd_skip(path: &Path, name: &str, now: &DateTime<FixedOffset>, config: &Config) -> Result<()> {
    let policy = config.schedule_policy();
    let med_name = Cabinet::update(path, |cabinet| {
        let med = cabinet.find_mut(name)?;
        med.skip_next(now, &policy)?;
        Ok(med.name.clone())
    })?;

    println!("✓ Dose skipped: {}", med_name);
    Ok(())
}

fn cmd_lost(path: &Path, name: &str, qty: f64, now: &DateTime<FixedOffset>) -> Result<()> {
    let (med_name, stock) = Cabinet::update(path, |cabinet| {
        let med = cabinet.find_mut(name)?;
        med.report_lost(qty, now.with_timezone(&Utc))?;
        Ok((med.name.clone(), med.current_stock))
    })?;

    println!("✓ Loss recorded: {} ({} left)", med_name, stock);
    Ok(())
}

fn cmd_restock(
    path: &Path,
    name: &str,
    qty: f64,
    price: Option<f64>,
    pharmacy: Option<String>,
    now: &DateTime<FixedOffset>,
) -> Result<()> {
    let (med_name, stock) = Cabinet::update(path, |cabinet| {
        let med = cabinet.find_mut(name)?;
        med.restock(qty, price, pharmacy, now.with_timezone(&Utc))?;
        Ok((med.name.clone(), med.current_stock))
    })?;

    println!("✓ Stock updated: {} ({} on hand)", med_name, stock);
    Ok(())
}

fn cmd_dose(path: &Path, action: DoseCommand) -> Result<()> {
    match action {
        DoseCommand::Add { name, spec } => {
            let rule = parse_dose_spec(&spec)?;
            let summary = format!("{} x{} ({})", rule.time, rule.quantity, rule.recurrence);
            let med_name = Cabinet::update(path, |cabinet| {
                let med = cabinet.find_mut(&name)?;
                med.add_dose_rule(rule);
                Ok(med.name.clone())
            })?;
            println!("✓ Added dose {} to {}", summary, med_name);
        }
        DoseCommand::Remove { name, time } => {
            let time: DoseTime = time.parse()?;
            let med_name = Cabinet::update(path, |cabinet| {
                let med = cabinet.find_mut(&name)?;
                let id = med
                    .doses
                    .iter()
                    .find(|d| d.time == time)
                    .map(|d| d.id)
                    .ok_or_else(|| Error::UnknownDoseRule(format!("{} at {}", med.name, time)))?;
                med.remove_dose_rule(id)?;
                Ok(med.name.clone())
            })?;
            println!("✓ Removed {} dose from {}", time, med_name);
        }
    }
    Ok(())
}

fn cmd_history(path: &Path, limit: usize, now: &DateTime<FixedOffset>) -> Result<()> {
    let cabinet = Cabinet::load(path)?;
    let entries = recent_events(&cabinet, limit);

    if entries.is_empty() {
        println!("No dose history yet.");
        return Ok(());
    }

    for entry in entries {
        let local = entry.event.timestamp.with_timezone(&now.timezone());
        println!(
            "{}  {:<8} {}",
            local.format("%Y-%m-%d %H:%M"),
            entry.event.action.to_string(),
            entry.medication_name
        );
    }
    Ok(())
}

fn cmd_purchases(path: &Path, now: &DateTime<FixedOffset>) -> Result<()> {
    let cabinet = Cabinet::load(path)?;
    let groups = purchase_history(&cabinet);

    if groups.is_empty() {
        println!("No purchases recorded.");
        return Ok(());
    }

    for group in groups {
        println!("{}", group.medication_name);
        for entry in group.entries {
            let date = entry.refill.refilled_at.with_timezone(&now.timezone());
            let price = match (entry.refill.price, entry.unit_price) {
                (Some(price), Some(unit)) => format!("{:.2} ({:.2}/unit)", price, unit),
                _ => "no price".to_string(),
            };
            let pharmacy = entry.refill.pharmacy.as_deref().unwrap_or("-");
            let best = if entry.is_best_price { "  ★ best price" } else { "" };
            println!(
                "  {}  +{} {}  {}  {}{}",
                date.format("%Y-%m-%d"),
                entry.refill.quantity,
                group.unit,
                price,
                pharmacy,
                best
            );
        }
    }
    Ok(())
}

fn cmd_refills(path: &Path, config: &Config) -> Result<()> {
    let cabinet = Cabinet::load(path)?;
    let needed = refills_needed(&cabinet, config.display.low_stock_fraction);

    if needed.is_empty() {
        println!("No medications are critically low on stock.");
        return Ok(());
    }

    println!("Refills needed:");
    for med in needed {
        println!("  {} - {} {} left", med.name, med.current_stock, med.unit);
    }
    Ok(())
}

fn display_medication(med: &Medication, days: u32, state: &NextActionState, config: &Config) {
    let marker = if state.is_overdue {
        "!"
    } else if state.is_upcoming_tomorrow {
        "→"
    } else {
        "•"
    };

    println!("{} {}", marker, med.name);
    if let Some(ref description) = med.description {
        println!("    {}", description);
    }

    let supply = if config.display.show_days_supply {
        format!("{} supply left", describe_supply(days))
    } else {
        format!("{} {} remaining", med.current_stock, med.unit)
    };
    let low = if is_low_supply(days, config.display.refill_threshold_days) {
        "  (low)"
    } else {
        ""
    };
    println!(
        "    {}{}  [{:.0}% of stock]",
        supply,
        low,
        med.stock_fraction() * 100.0
    );
    println!("    {} · {}", state.label, state.sublabel);
}
