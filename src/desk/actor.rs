//! Desk actor
//!
//! One task owns the `Desk`. Commands arrive over a bounded channel and each
//! carries a oneshot for its reply. The risk-engine tick shares the same
//! `select!` loop, so a tick never interleaves with a command.

use super::{Desk, DeskSnapshot, TickReport};
use crate::analysis::AnalysisReport;
use crate::broker::Broker;
use crate::config::RiskConfig;
use crate::error::{BotError, Result};
use crate::paper::{Position, PositionUpdate};
use crate::types::{AssetClass, Side, SignalOrder};
use chrono::Utc;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Snapshot(oneshot::Sender<DeskSnapshot>),
    Quote {
        class: AssetClass,
        reply: oneshot::Sender<Decimal>,
    },
    Execute {
        order: SignalOrder,
        reply: Reply<Option<Position>>,
    },
    ExecuteReport {
        report: Box<AnalysisReport>,
        symbol: String,
        class: AssetClass,
        side: Option<Side>,
        reply: Reply<Option<Position>>,
    },
    Close {
        id: String,
        reply: Reply<Option<Position>>,
    },
    Update {
        id: String,
        update: PositionUpdate,
        reply: Reply<Position>,
    },
    SetAutomation {
        enabled: bool,
        reply: Reply<bool>,
    },
    ToggleAutomation(Reply<bool>),
    UpdateRisk {
        risk: RiskConfig,
        reply: Reply<RiskConfig>,
    },
    Authorize {
        id: String,
        api_key: String,
        api_secret: String,
        reply: Reply<Broker>,
    },
    Disconnect {
        id: String,
        reply: Reply<Broker>,
    },
    Shutdown,
}

/// Cloneable front for a running desk actor
#[derive(Clone)]
pub struct DeskHandle {
    tx: mpsc::Sender<Command>,
    handshake_latency: Duration,
}

/// Move `desk` into its own task. The task ends when every handle is
/// dropped or `shutdown` is called, and yields the desk back.
pub fn spawn(desk: Desk) -> (DeskHandle, JoinHandle<Desk>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = DeskHandle {
        tx,
        handshake_latency: Duration::from_millis(desk.engine().handshake_latency_ms),
    };
    (handle, tokio::spawn(run(desk, rx)))
}

async fn run(mut desk: Desk, mut rx: mpsc::Receiver<Command>) -> Desk {
    let mut ticker = tokio::time::interval(Duration::from_millis(desk.engine().tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick lands one full period after start
    ticker.reset();

    info!("Desk actor started (automation {})", if desk.automation_enabled() { "on" } else { "off" });

    loop {
        let automation = desk.automation_enabled();
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                if matches!(command, Command::Shutdown) {
                    break;
                }
                dispatch(&mut desk, command).await;
                if !automation && desk.automation_enabled() {
                    ticker.reset();
                }
            }
            _ = ticker.tick(), if automation => {
                match desk.tick(Utc::now()).await {
                    Ok(report) => log_tick(&report),
                    Err(e) => error!("Tick failed: {}", e),
                }
            }
        }
    }

    info!("Desk actor stopped");
    desk
}

fn log_tick(report: &TickReport) {
    if report.is_idle() {
        return;
    }
    debug!(
        "Tick: {} marked, {} closed{}",
        report.marked,
        report.closed.len(),
        report
            .scanned
            .as_ref()
            .map(|p| format!(", scanner opened {} {}", p.side, p.symbol))
            .unwrap_or_default()
    );
}

async fn dispatch(desk: &mut Desk, command: Command) {
    let now = Utc::now();
    // A dropped reply means the caller stopped waiting; nothing to do.
    match command {
        Command::Snapshot(reply) => {
            let _ = reply.send(desk.snapshot());
        }
        Command::Quote { class, reply } => {
            let _ = reply.send(desk.quote(class));
        }
        Command::Execute { order, reply } => {
            let _ = reply.send(desk.execute_signal(&order, now).await);
        }
        Command::ExecuteReport { report, symbol, class, side, reply } => {
            let _ = reply.send(desk.execute_report(&report, &symbol, class, side, now).await);
        }
        Command::Close { id, reply } => {
            let _ = reply.send(desk.close_position(&id, now).await);
        }
        Command::Update { id, update, reply } => {
            let _ = reply.send(desk.update_position(&id, &update).await);
        }
        Command::SetAutomation { enabled, reply } => {
            let _ = reply.send(desk.set_automation(enabled).await);
        }
        Command::ToggleAutomation(reply) => {
            let _ = reply.send(desk.toggle_automation().await);
        }
        Command::UpdateRisk { risk, reply } => {
            let _ = reply.send(desk.update_risk(risk).await.cloned());
        }
        Command::Authorize { id, api_key, api_secret, reply } => {
            let _ = reply.send(desk.apply_authorization(&id, &api_key, &api_secret).await);
        }
        Command::Disconnect { id, reply } => {
            let _ = reply.send(desk.disconnect_broker(&id).await);
        }
        Command::Shutdown => {}
    }
}

impl DeskHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| BotError::Shutdown)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| BotError::Shutdown)?
    }

    pub async fn snapshot(&self) -> Result<DeskSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| BotError::Shutdown)
    }

    pub async fn quote(&self, class: AssetClass) -> Result<Decimal> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Quote { class, reply }).await?;
        rx.await.map_err(|_| BotError::Shutdown)
    }

    pub async fn execute(&self, order: SignalOrder) -> Result<Option<Position>> {
        self.request(|reply| Command::Execute { order, reply }).await
    }

    pub async fn execute_report(
        &self,
        report: AnalysisReport,
        symbol: &str,
        class: AssetClass,
        side: Option<Side>,
    ) -> Result<Option<Position>> {
        self.request(|reply| Command::ExecuteReport {
            report: Box::new(report),
            symbol: symbol.to_string(),
            class,
            side,
            reply,
        })
        .await
    }

    pub async fn close(&self, id: &str) -> Result<Option<Position>> {
        self.request(|reply| Command::Close { id: id.to_string(), reply }).await
    }

    pub async fn update(&self, id: &str, update: PositionUpdate) -> Result<Position> {
        self.request(|reply| Command::Update {
            id: id.to_string(),
            update,
            reply,
        })
        .await
    }

    pub async fn set_automation(&self, enabled: bool) -> Result<bool> {
        self.request(|reply| Command::SetAutomation { enabled, reply }).await
    }

    pub async fn toggle_automation(&self) -> Result<bool> {
        self.request(Command::ToggleAutomation).await
    }

    pub async fn update_risk(&self, risk: RiskConfig) -> Result<RiskConfig> {
        self.request(|reply| Command::UpdateRisk { risk, reply }).await
    }

    /// Simulated handshake. The latency is waited out here, so the actor
    /// keeps ticking while a connection is pending.
    pub async fn connect_broker(&self, id: &str, api_key: &str, api_secret: &str) -> Result<Broker> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(BotError::InvalidInput("API key and secret are required".into()));
        }
        debug!("Handshaking with {} ({:?})", id, self.handshake_latency);
        tokio::time::sleep(self.handshake_latency).await;
        self.request(|reply| Command::Authorize {
            id: id.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            reply,
        })
        .await
    }

    pub async fn disconnect_broker(&self, id: &str) -> Result<Broker> {
        self.request(|reply| Command::Disconnect { id: id.to_string(), reply }).await
    }

    /// Ask the actor to stop after the commands already queued
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}
