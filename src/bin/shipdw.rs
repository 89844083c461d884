use clap::{Parser, Subcommand};

use shipdw::report::{self, Metric};

#[derive(Parser)]
#[command(name = "shipdw", about = "Logistics delivery data warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.shipdw/shipdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a directory of CSV files, replacing the stored snapshot
    Import {
        /// Directory holding orders.csv, routes.csv, warehouses.csv,
        /// delivery_agents.csv and shipment_tracking.csv
        dir: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run data-quality checks over the stored snapshot
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute every metric
    Report {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Routes listed in top delayed routes (overrides config)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Compute a single metric
    Metric {
        /// Metric name, e.g. top-delayed-routes (see `shipdw metric list`)
        name: String,
        /// Output as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
        /// Routes listed in top delayed routes (overrides config)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show warehouse status
    Status,
    /// Manage report thresholds
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Remove a config value, restoring its default
    Unset { key: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => shipdw::Database::open_at(path).await?,
        None => shipdw::Database::open().await?,
    };
    let dw = shipdw::ShipDW::new(db);

    match cli.command {
        Commands::Import { dir, json } => {
            let imported = dw.import_dir(&dir).await?;
            if json {
                println!("{}", report::json(&imported)?);
            } else {
                print_import_report(&imported);
            }
        }
        Commands::Check { json } => {
            let quality = dw.check_quality().await?;
            if json {
                println!("{}", report::json(&quality)?);
            } else {
                print_quality(&quality);
            }
        }
        Commands::Report { json, top } => {
            let computed = compute(&dw, top).await?;
            if json {
                println!("{}", report::to_json(&computed, None)?);
            } else {
                print!("{}", report::render_text(&computed));
            }
        }
        Commands::Metric {
            name,
            json,
            csv,
            top,
        } => {
            handle_metric(&dw, &name, json, csv, top).await?;
        }
        Commands::Status => {
            print_status(&dw).await?;
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
    }

    Ok(())
}

async fn compute(dw: &shipdw::ShipDW, top: Option<usize>) -> anyhow::Result<shipdw::Report> {
    let mut options = dw.report_options().await?;
    if let Some(n) = top {
        options.top_n = n;
    }
    Ok(dw.report(&options).await?)
}

async fn handle_metric(
    dw: &shipdw::ShipDW,
    name: &str,
    json: bool,
    csv: bool,
    top: Option<usize>,
) -> anyhow::Result<()> {
    if name == "list" {
        for metric in Metric::ALL {
            println!("{}", metric.name());
        }
        return Ok(());
    }
    let metric: Metric = name.parse()?;
    let computed = compute(dw, top).await?;
    if json {
        println!("{}", report::to_json(&computed, Some(metric))?);
    } else if csv {
        print!("{}", report::to_csv(&report::table(&computed, metric))?);
    } else {
        print!("{}", report::render_table(&report::table(&computed, metric)));
    }
    Ok(())
}

async fn print_status(dw: &shipdw::ShipDW) -> anyhow::Result<()> {
    let status = dw.status().await?;
    let t = &status.tables;
    println!("Warehouse Status");
    println!("  Orders:          {}", t.orders);
    println!("  Routes:          {}", t.routes);
    println!("  Warehouses:      {}", t.warehouses);
    println!("  Delivery agents: {}", t.delivery_agents);
    println!("  Checkpoints:     {}", t.shipment_tracking);
    println!(
        "  Last import:     {}",
        status.last_import_at.unwrap_or_else(|| "never".to_string())
    );
    if let Some(dir) = status.last_import_dir {
        println!("  Imported from:   {dir}");
    }
    Ok(())
}

async fn handle_config(dw: &shipdw::ShipDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::Unset { key } => {
            if dw.config_unset(&key).await? {
                println!("Removed {key}.");
            } else {
                println!("{key} is not set");
            }
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
            println!();
            println!("Report keys:");
            for (key, description) in shipdw::config::REPORT_KEYS {
                println!("  {key:<24} {description}");
            }
        }
    }
    Ok(())
}

fn print_import_report(imported: &shipdw::ImportReport) {
    println!("Imported from {}", imported.source);
    let tables = [
        ("orders", &imported.orders),
        ("routes", &imported.routes),
        ("warehouses", &imported.warehouses),
        ("delivery_agents", &imported.delivery_agents),
        ("shipment_tracking", &imported.shipment_tracking),
    ];
    for (name, t) in tables {
        println!(
            "  {name:<18} {:>6} rows  {:>4} skipped  {:>4} values rejected",
            t.rows_loaded, t.rows_skipped, t.values_rejected
        );
    }
    println!(
        "  Total: {} rows, {} values stored as NULL",
        imported.rows_loaded(),
        imported.values_rejected()
    );
}

fn print_quality(q: &shipdw::QualityReport) {
    if q.is_clean() {
        println!("No data-quality issues found.");
        return;
    }
    println!("{} data-quality issues", q.issue_count());
    let duplicate_sets = [
        ("order", &q.duplicate_order_ids),
        ("route", &q.duplicate_route_ids),
        ("warehouse", &q.duplicate_warehouse_ids),
        ("agent", &q.duplicate_agent_ids),
    ];
    for (kind, dups) in duplicate_sets {
        for d in dups {
            println!("  Duplicate {kind} id {} ({} rows)", d.id, d.occurrences);
        }
    }
    for route_id in &q.missing_traffic_delay {
        println!("  Route {route_id} has no traffic delay");
    }
    for order_id in &q.orders_missing_dates {
        println!("  Order {order_id} is missing a date");
    }
    for a in &q.delivered_before_ordered {
        println!(
            "  Order {} delivered {} before it was ordered {}",
            a.order_id, a.actual_delivery_date, a.order_date
        );
    }
    for d in &q.dangling_references {
        println!(
            "  {} {}: {} {} does not exist",
            d.table, d.row_id, d.column, d.missing_id
        );
    }
}
