//! Ecclesia operator console

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use ecclesia_api::{Collection, RestBackend};
use ecclesia_config::{Config, ConfigError};
use ecclesia_core::{
    pledge_kpis, tithe_kpis, welfare_kpis, AllowAll, CoreError, DirectorySink, ExportFormat, FilterCriteria,
    KpiBoard, KpiDomain, KpiTile, ReportBackend, ReportDefinition, ReportGenerator, ReportParams,
    ReportWorkspace,
};
use ecclesia_utils::{format_amount, format_number};
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "ecclesia")]
#[command(version = "0.1.0")]
#[command(about = "Reports and KPIs for the church back office", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Walk a collection and print its KPIs
    Kpi {
        #[arg(value_enum)]
        domain: KpiTarget,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Print the server-side KPI summary
    Summary,
    /// Print the monthly analytics series
    Analytics {
        /// Defaults to the current year
        #[arg(long)]
        year: Option<i32>,
    },
    /// Generate a report, optionally exporting it
    Report {
        module: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// pdf or excel
        #[arg(long)]
        export: Option<ExportFormat>,
        /// Columns to export, comma separated, or `all`
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KpiTarget {
    Pledges,
    Welfare,
    Tithe,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Command::Init { force } = &args.command {
        return init_config(&args.config, *force);
    }

    let config = load_config(&args.config)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();

    let rt = Runtime::new()?;
    if let Err(e) = rt.block_on(run(args.command, config)) {
        match e.downcast_ref::<CoreError>() {
            Some(core) => eprintln!("Error: {}", core.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    std::fs::write(path, Config::generate_default())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound { .. }) => Ok(Config::default()),
        Err(e) => {
            eprintln!("{}", e);
            for suggestion in e.suggestions() {
                eprintln!("  - {}", suggestion);
            }
            Err(e.into())
        }
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let backend = RestBackend::new(&config.backend)?;
    info!("using back office at {}", backend.base_url());

    match command {
        Command::Init { .. } => Ok(()),
        Command::Kpi {
            domain,
            search,
            status,
            category,
            from,
            to,
        } => {
            let mut criteria = FilterCriteria::default().with_date_range(from, to);
            if let Some(search) = search {
                criteria = criteria.with_search(search);
            }
            if let Some(status) = status {
                criteria = criteria.with_status(status);
            }
            if let Some(category) = category {
                criteria = criteria.with_category(category);
            }
            run_kpis(&backend, domain, &criteria, config.pagination.page_size).await
        }
        Command::Summary => {
            let kpis = backend.fetch_kpis().await?;
            for (key, value) in &kpis {
                println!("{:<24} {}", key, display_value(value));
            }
            Ok(())
        }
        Command::Analytics { year } => {
            let year = year.unwrap_or_else(|| chrono::Local::now().year());
            let rows = backend.fetch_analytics(year).await?;
            println!("Analytics {}", year);
            for row in &rows {
                let figures: Vec<String> = row
                    .values
                    .iter()
                    .filter(|(k, _)| k.as_str() != "month" && k.as_str() != "label")
                    .map(|(k, v)| format!("{}={}", k, display_value(v)))
                    .collect();
                println!("  {:<10} {}", row.month(), figures.join("  "));
            }
            Ok(())
        }
        Command::Report {
            module,
            from,
            to,
            export,
            fields,
        } => {
            let backend = Arc::new(backend);
            let mut workspace = ReportWorkspace::new(
                ReportGenerator::new(backend.clone(), Arc::new(AllowAll)),
                ReportParams::new(&module, from, to),
            );
            print_report(workspace.generate().await?);

            if let Some(format) = export {
                let mut session = workspace.begin_export()?;
                if fields.iter().any(|f| f.eq_ignore_ascii_case("all")) {
                    session.select_all()?;
                } else if !fields.is_empty() {
                    session.clear_selection()?;
                    for field in &fields {
                        session.toggle_field(field.trim())?;
                    }
                }
                session.advance()?;

                let sink = DirectorySink::from_config(&config);
                let saved = session
                    .choose_format(format, backend.as_ref(), &sink, &AllowAll)
                    .await?;
                println!(
                    "Saved {} ({} bytes) to {}",
                    saved.filename,
                    format_number(saved.size),
                    saved.path.display()
                );
            }
            Ok(())
        }
    }
}

async fn run_kpis(
    backend: &RestBackend,
    target: KpiTarget,
    criteria: &FilterCriteria,
    page_size: u32,
) -> anyhow::Result<()> {
    let board = KpiBoard::new();

    match target {
        KpiTarget::Pledges => {
            let generation = board.begin(KpiDomain::Pledges);
            let fetcher = backend.collection(Collection::PLEDGES);
            let outcome = pledge_kpis(&fetcher, criteria, page_size).await;
            board.record(KpiDomain::Pledges, generation, &outcome);
            print_tile("Pledges", board.tile(KpiDomain::Pledges));
        }
        KpiTarget::Tithe => {
            let generation = board.begin(KpiDomain::Tithe);
            let fetcher = backend.collection(Collection::TITHES);
            let outcome = tithe_kpis(&fetcher, criteria, page_size).await;
            board.record(KpiDomain::Tithe, generation, &outcome);
            print_tile("Tithe", board.tile(KpiDomain::Tithe));
        }
        KpiTarget::Welfare => {
            let contributions_gen = board.begin(KpiDomain::WelfareContributions);
            let disbursements_gen = board.begin(KpiDomain::WelfareDisbursements);
            let welfare = welfare_kpis(
                &backend.collection(Collection::WELFARE_CONTRIBUTIONS),
                &backend.collection(Collection::WELFARE_DISBURSEMENTS),
                criteria,
                page_size,
            )
            .await;
            board.record(KpiDomain::WelfareContributions, contributions_gen, &welfare.contributions);
            board.record(KpiDomain::WelfareDisbursements, disbursements_gen, &welfare.disbursements);
            print_tile("Contributions", board.tile(KpiDomain::WelfareContributions));
            print_tile("Disbursements", board.tile(KpiDomain::WelfareDisbursements));
            match welfare.balance() {
                Some(balance) => println!("Balance        {}", format_amount(balance)),
                None => warn!("welfare balance unavailable: one of the walks failed"),
            }
        }
    }
    Ok(())
}

fn print_tile(label: &str, tile: Option<KpiTile>) {
    let Some(tile) = tile else {
        return;
    };
    match &tile {
        KpiTile::Ready { .. } => println!("{}", label),
        KpiTile::Unavailable { message, previous } => {
            println!("{}: unavailable ({})", label, message);
            if previous.is_some() {
                println!("  last known figures:");
            }
        }
    }
    if let Some(kpis) = tile.figures() {
        for (field, value) in kpis.values() {
            let shown = if field == "count" {
                format_number(*value as u64)
            } else {
                format_amount(*value)
            };
            println!("  {:<12} {:>16}", field, shown);
        }
    }
}

fn print_report(report: &ReportDefinition) {
    println!("{} ({} to {})", report.title, report.date_from, report.date_to);
    let header: Vec<&str> = report.columns.iter().map(|c| c.label.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in &report.rows {
        let cells: Vec<String> = report
            .columns
            .iter()
            .map(|c| row.get(&c.key).map(display_value).unwrap_or_default())
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("{} row(s)", format_number(report.rows.len()));
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n.as_f64().map(format_amount).unwrap_or_else(|| n.to_string()),
        Value::Number(n) => format_number(n),
        other => other.to_string(),
    }
}
