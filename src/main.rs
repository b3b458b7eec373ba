//! Gentle GIX
//!
//! Command-line front end for the simulated trading desk.

use clap::{Parser, Subcommand, ValueEnum};
use gentle_gix::{
    analysis::{AnalysisDesk, AnalysisOutcome, AnalysisReport, LlmAnalyst},
    config::Config,
    desk::{self, Desk},
    market::{catalog, RandomWalkFeed},
    notify::NotificationLog,
    paper::{Position, PositionUpdate},
    storage::open_store,
    types::{AssetClass, Side, SignalOrder},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gentle-gix")]
#[command(about = "Simulated multi-broker trading desk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Seed for prices and broker metrics
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the desk until Ctrl-C
    Run {
        /// Turn automation on at start
        #[arg(long)]
        automation: bool,
        /// Seconds between metrics lines
        #[arg(long, default_value = "30")]
        report_secs: u64,
    },
    /// Show metrics, risk settings and open positions
    Status,
    /// List brokers and their connection state
    Brokers,
    /// Authorize a broker
    Connect {
        broker: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        secret: String,
    },
    /// Disconnect a broker
    Disconnect { broker: String },
    /// Open a position through the execution rule
    Trade {
        side: Side,
        symbol: String,
        /// Entry price; a mock quote is used when omitted
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long)]
        sl: Option<Decimal>,
        #[arg(long)]
        tp: Option<Decimal>,
        /// Asset class for symbols outside the catalog
        #[arg(long)]
        class: Option<AssetClass>,
    },
    /// Close an open position at its current P&L
    Close { id: String },
    /// Edit leverage or thresholds of an open position
    Update {
        id: String,
        #[arg(long)]
        leverage: Option<u32>,
        #[arg(long)]
        sl: Option<Decimal>,
        #[arg(long)]
        tp: Option<Decimal>,
    },
    /// Turn the risk engine and scanner on or off
    Automation { state: Switch },
    /// Change risk settings
    Risk {
        #[arg(long)]
        max_leverage: Option<u32>,
        #[arg(long)]
        stop_loss: Option<Decimal>,
        #[arg(long)]
        take_profit: Option<Decimal>,
        #[arg(long)]
        mode: Option<Mode>,
    },
    /// Ask the LLM for a market analysis
    Analyze {
        symbol: String,
        #[arg(long)]
        class: Option<AssetClass>,
        /// Open a position from the report
        #[arg(long)]
        execute: bool,
        /// Trade this side regardless of the report's signal
        #[arg(long)]
        side: Option<Side>,
    },
    /// Show closed positions
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
    Toggle,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Percentage,
    Price,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;
    let mut desk = open_desk(&config, cli.seed).await?;
    let before = desk.notifications().len();

    match cli.command {
        Commands::Run { automation, report_secs } => {
            return run_desk(desk, automation, report_secs).await;
        }
        Commands::Status => show_status(&desk),
        Commands::Brokers => show_brokers(&desk),
        Commands::Connect { broker, key, secret } => {
            println!("🔐 Handshaking with {}...", broker);
            let broker = desk.connect_broker(&broker, &key, &secret).await?;
            match &broker.error_message {
                None => println!("✅ {} {} (balance ${:.2})", broker.name, broker.status, broker.metrics.balance),
                Some(reason) => println!("❌ {} {}: {}", broker.name, broker.status, reason),
            }
        }
        Commands::Disconnect { broker } => {
            let broker = desk.disconnect_broker(&broker).await?;
            println!("{} {}", broker.name, broker.status);
        }
        Commands::Trade { side, symbol, price, sl, tp, class } => {
            let price = match price {
                Some(price) => price,
                None => desk.quote(resolve_class(&symbol, class)?),
            };
            let order = SignalOrder::new(side, symbol, price).with_thresholds(sl, tp);
            if let Some(position) = desk.execute_signal(&order, chrono::Utc::now()).await? {
                print_position(&position);
            }
        }
        Commands::Close { id } => match desk.close_position(&id, chrono::Utc::now()).await? {
            Some(position) => print_position(&position),
            None => println!("No open position {}", id),
        },
        Commands::Update { id, leverage, sl, tp } => {
            let update = PositionUpdate { leverage, stop_loss: sl, take_profit: tp };
            if update.is_empty() {
                anyhow::bail!("nothing to update: pass --leverage, --sl or --tp");
            }
            match desk.update_position(&id, &update).await {
                Ok(position) => print_position(&position),
                Err(e) => {
                    print_new_notes(desk.notifications(), before);
                    return Err(e.into());
                }
            }
        }
        Commands::Automation { state } => {
            let enabled = match state {
                Switch::On => desk.set_automation(true).await.map(|_| true)?,
                Switch::Off => desk.set_automation(false).await.map(|_| false)?,
                Switch::Toggle => desk.toggle_automation().await?,
            };
            println!("Automation {}", if enabled { "ON" } else { "OFF" });
        }
        Commands::Risk { max_leverage, stop_loss, take_profit, mode } => {
            let mut risk = desk.risk().clone();
            if let Some(v) = max_leverage {
                risk.max_leverage = v;
            }
            if let Some(v) = stop_loss {
                risk.default_stop_loss = v;
            }
            if let Some(v) = take_profit {
                risk.default_take_profit = v;
            }
            if let Some(mode) = mode {
                risk.is_percentage = matches!(mode, Mode::Percentage);
            }
            let risk = desk.update_risk(risk).await?;
            println!(
                "Risk: max leverage {}x, SL {} / TP {} ({})",
                risk.max_leverage,
                risk.default_stop_loss,
                risk.default_take_profit,
                if risk.is_percentage { "percent" } else { "price" }
            );
        }
        Commands::Analyze { symbol, class, execute, side } => {
            let class = resolve_class(&symbol, class)?;
            let llm = config
                .llm
                .clone()
                .ok_or_else(|| anyhow::anyhow!("No LLM configured: add [llm] to the config or set GEMINI_API_KEY"))?;
            let analysis = AnalysisDesk::new(Arc::new(LlmAnalyst::new(llm)?));

            println!("\n🤖 GIX analyzing {} ({}) via {}...\n", symbol, class, analysis.provider_name());
            match analysis.request(&symbol, class).await {
                AnalysisOutcome::Ready(report) => {
                    print_report(&report);
                    if execute {
                        match desk.execute_report(&report, &symbol, class, side, chrono::Utc::now()).await? {
                            Some(position) => print_position(&position),
                            None => println!("\nSignal is HOLD; nothing executed"),
                        }
                    }
                }
                AnalysisOutcome::Unavailable => println!("Analysis unavailable; see log for details"),
                AnalysisOutcome::Busy => println!("Analysis for {} already running", symbol),
            }
        }
        Commands::History { limit } => show_history(&desk, limit),
    }

    print_new_notes(desk.notifications(), before);
    Ok(())
}

async fn open_desk(config: &Config, seed: Option<u64>) -> anyhow::Result<Desk> {
    let store = open_store(&config.storage).await?;
    let feed = RandomWalkFeed::from_config(&config.engine, seed);
    Ok(Desk::open(config, store, Box::new(feed), seed).await?)
}

fn resolve_class(symbol: &str, class: Option<AssetClass>) -> anyhow::Result<AssetClass> {
    class
        .or_else(|| catalog::asset_class_of(symbol))
        .ok_or_else(|| anyhow::anyhow!("{} is not in the catalog; pass --class", symbol))
}

async fn run_desk(desk: Desk, automation: bool, report_secs: u64) -> anyhow::Result<()> {
    tracing::info!("Starting Gentle GIX desk");
    let poll = Duration::from_millis(desk.engine().tick_interval_ms);
    let (handle, task) = desk::spawn(desk);

    if automation {
        handle.set_automation(true).await?;
    }

    let mut poll_timer = tokio::time::interval(poll);
    let mut report_timer = tokio::time::interval(Duration::from_secs(report_secs.max(1)));
    let mut last_seen: Option<String> = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break;
            }
            _ = poll_timer.tick() => {
                let snapshot = handle.snapshot().await?;
                let fresh: Vec<_> = snapshot
                    .notifications
                    .iter()
                    .take_while(|n| Some(&n.id) != last_seen.as_ref())
                    .collect();
                for note in fresh.iter().rev() {
                    println!("[{}] {}: {}", note.severity.as_str(), note.title, note.message);
                }
                if let Some(newest) = snapshot.notifications.first() {
                    last_seen = Some(newest.id.clone());
                }
            }
            _ = report_timer.tick() => {
                handle.snapshot().await?.metrics.log();
            }
        }
    }

    handle.shutdown().await?;
    let desk = task.await?;
    desk.metrics().log();
    Ok(())
}

fn show_status(desk: &Desk) {
    let m = desk.metrics();
    let risk = desk.risk();

    println!("\n📊 Desk Status\n");
    println!("Automation: {}", if risk.trading_enabled { "ON" } else { "OFF" });
    println!("Brokers: {} connected, ${:.2} total balance", m.connected_brokers, m.total_balance);
    println!(
        "Risk: max {}x, SL {} / TP {} ({})",
        risk.max_leverage,
        risk.default_stop_loss,
        risk.default_take_profit,
        if risk.is_percentage { "percent" } else { "price" }
    );
    println!("Open: {} positions, ${:.2} exposure, {:+.2} floating", m.open_positions, m.open_exposure, m.unrealized_pnl);
    println!(
        "Closed: {} ({} won / {} lost, {:.1}% win rate, {} auto)",
        m.closed_positions,
        m.winning_trades,
        m.losing_trades,
        m.win_rate * Decimal::ONE_HUNDRED,
        m.auto_closed
    );
    println!("Realized: {:+.2}", m.realized_profit);

    let open: Vec<_> = desk.ledger().open_positions().collect();
    if !open.is_empty() {
        println!("\nOpen Positions:");
        for position in open {
            print_position(position);
        }
    }
}

fn show_brokers(desk: &Desk) {
    println!("\n🏦 Brokers\n");
    println!("{:<14} {:<22} {:<8} {:<13} {:>12}", "ID", "Name", "Class", "Status", "Balance");
    println!("{}", "-".repeat(72));
    for broker in desk.brokers().iter() {
        println!(
            "{:<14} {:<22} {:<8} {:<13} {:>12.2}",
            broker.id,
            broker.name,
            broker.asset_class.as_str(),
            broker.status.to_string(),
            broker.metrics.balance
        );
        if let Some(reason) = &broker.error_message {
            println!("  ↳ {}", reason);
        }
    }
}

fn show_history(desk: &Desk, limit: usize) {
    println!("\n📜 Closed Positions\n");
    for position in desk.ledger().closed_positions().take(limit) {
        print_position(position);
    }
    println!("\nRealized: {:+.2}", desk.ledger().realized_profit());
}

fn print_position(p: &Position) {
    let reason = p.close_reason.map(|r| format!(" {}", r)).unwrap_or_default();
    println!(
        "  {} {} {} @ {} → {} | {} x{} | SL {}{} TP {}{} | P&L {:+.2} | {}{}",
        &p.id[..p.id.len().min(8)],
        p.side,
        p.symbol,
        p.entry_price.round_dp(4),
        p.current_price.round_dp(4),
        p.amount.round_dp(2),
        p.leverage,
        p.stop_loss.round_dp(4),
        p.threshold_mode,
        p.take_profit.round_dp(4),
        p.threshold_mode,
        p.pnl,
        if p.is_open() { "OPEN" } else { "CLOSED" },
        reason
    );
}

fn print_report(report: &AnalysisReport) {
    println!("Signal: {:?}  Sentiment: {:?}  Confidence: {:.0}%", report.signal, report.sentiment, report.confidence);
    if let Some(indicators) = &report.indicators {
        if let Some(rsi) = indicators.rsi {
            println!("RSI: {:.1}", rsi);
        }
        if let Some(macd) = &indicators.macd {
            println!("MACD: {}", macd);
        }
    }
    if let (Some(sl), Some(tp)) = (report.suggested_sl, report.suggested_tp) {
        println!("Suggested SL {}% / TP {}%", sl, tp);
    }
    println!("\n{}", report.summary);
    if !report.headlines.is_empty() {
        println!("\nHeadlines:");
        for headline in &report.headlines {
            println!("  • {}", headline);
        }
    }
    if !report.sources.is_empty() {
        println!("\nSources:");
        for source in &report.sources {
            println!("  {} {}", source.uri, source.title);
        }
    }
}

fn print_new_notes(log: &NotificationLog, before: usize) {
    let fresh = log.len().saturating_sub(before);
    for note in log.iter().take(fresh).collect::<Vec<_>>().into_iter().rev() {
        println!("[{}] {}: {}", note.severity.as_str(), note.title, note.message);
    }
}
