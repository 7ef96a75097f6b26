//! Client event loops
//!
//! Solo and session play share one loop state, [`PlayerLoop`]. The async
//! drivers own a `select!` over frames, timers, control input and, for a
//! session, the coordinator socket, and hand every event to it. The loop
//! state is the only owner of the simulation.

use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::adapter::{ClientError, Directive, SessionClient};
use super::autopilot::Autopilot;
use super::highscore::{load_or_zero, record_if_higher, HighScoreStore};
use super::scheduler::FrameScheduler;
use super::timer::{CountdownTimer, TimerEvent, TimerKind, TimerSlot};
use crate::config::ClientConfig;
use crate::game::{RunState, SimEvent, Simulation, TraceRenderer, COUNTDOWN_STEPS};
use crate::util::time::{frame_period, COUNTDOWN_INTERVAL};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Steps in the countdown between a finished game and the next one
pub const RESTART_STEPS: u32 = 3;

/// High-score key for games played without a coordinator
pub const SOLO_ORIGIN: &str = "solo";

/// Player input besides the autopilot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientControl {
    Impulse,
    /// Toggle pause while running. After a solo game over, play again.
    PauseOrReset,
}

/// What a client did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientSummary {
    pub runs: u32,
    pub sessions: u32,
    pub high_score: u32,
}

struct SessionLink {
    client: SessionClient,
    name: String,
    awaiting_restart: bool,
    ready_requested: bool,
}

/// Everything one player's loop owns, independent of the transport
pub struct PlayerLoop<'a> {
    sim: Simulation,
    renderer: TraceRenderer,
    pilot: Option<Autopilot>,
    scheduler: FrameScheduler,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    countdown: TimerSlot,
    restart: TimerSlot,
    store: &'a dyn HighScoreStore,
    origin: String,
    session: Option<SessionLink>,
    summary: ClientSummary,
}

impl<'a> PlayerLoop<'a> {
    /// Build a solo loop; high scores are kept under `origin`
    pub fn new(
        config: &ClientConfig,
        store: &'a dyn HighScoreStore,
        origin: &str,
        timer_tx: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let high_score = load_or_zero(store, origin);
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut sim = Simulation::new(config.tuning, high_score, seed);
        sim.resize(config.viewport);
        debug!(seed, high_score, origin, "Simulation ready");

        Self {
            sim,
            renderer: TraceRenderer::new(config.frame_rate),
            pilot: Autopilot::for_mode(config.pilot),
            scheduler: FrameScheduler::new(frame_period(config.frame_rate)),
            timer_tx,
            countdown: TimerSlot::new(),
            restart: TimerSlot::new(),
            store,
            origin: origin.to_string(),
            session: None,
            summary: ClientSummary {
                high_score,
                ..ClientSummary::default()
            },
        }
    }

    /// Play through a coordinator session instead of alone
    pub fn with_session(mut self, client: SessionClient, name: &str) -> Self {
        self.session = Some(SessionLink {
            client,
            name: name.to_string(),
            awaiting_restart: false,
            ready_requested: false,
        });
        self
    }

    /// Start ticking. Solo play also starts the first countdown.
    pub fn begin(&mut self) {
        self.scheduler.start();
        if self.session.is_none() {
            self.start_run();
        }
    }

    pub async fn next_frame(&mut self) {
        self.scheduler.next_frame().await;
    }

    pub fn on_frame(&mut self) -> Result<(), ClientError> {
        if let Some(pilot) = self.pilot {
            if pilot.wants_impulse(&self.sim) {
                self.sim.trigger_impulse();
            }
        }

        let events = self.sim.tick(&mut self.renderer);
        for event in &events {
            if let SimEvent::Terminal { score, .. } = *event {
                self.summary.runs += 1;
                self.summary.high_score = record_if_higher(self.store, &self.origin, score);
                if self.session.is_none() {
                    self.arm_restart();
                }
            }
        }

        match self.session.as_mut() {
            Some(link) => link.client.forward(&events),
            None => Ok(()),
        }
    }

    pub fn on_server_msg(&mut self, msg: ServerMsg) -> Result<(), ClientError> {
        let Some(link) = self.session.as_mut() else {
            warn!("Coordinator message in solo play, ignoring");
            return Ok(());
        };

        let welcomed = matches!(msg, ServerMsg::Welcome { .. });
        let directive = link.client.handle(msg, &mut self.sim);
        if welcomed {
            link.client.join(&link.name)?;
        }

        match directive {
            Some(Directive::StartCountdown) => self.arm_countdown(),
            Some(Directive::ShowResults(standings)) => {
                self.summary.sessions += 1;
                self.countdown.clear();
                for (place, p) in standings.iter().enumerate() {
                    info!(place = place + 1, name = %p.name, score = p.score, "Standing");
                }
                if let Some(link) = self.session.as_mut() {
                    link.awaiting_restart = true;
                }
                self.arm_restart();
            }
            None => {}
        }

        let Some(link) = self.session.as_mut() else {
            return Ok(());
        };
        let needs_ready = link.client.me().is_some_and(|me| !me.ready);
        if needs_ready && !link.awaiting_restart && !link.ready_requested {
            link.ready_requested = true;
            link.client.set_ready()?;
        }
        Ok(())
    }

    pub fn on_timer(&mut self, event: TimerEvent) -> Result<(), ClientError> {
        match event.kind {
            TimerKind::RunStart => {
                self.sim.countdown_step();
            }
            TimerKind::Restart if event.remaining == 0 => match self.session.as_mut() {
                Some(link) => {
                    link.awaiting_restart = false;
                    link.ready_requested = false;
                    link.client.rejoin()?;
                }
                None => {
                    if self.sim.reset() {
                        self.start_run();
                    }
                }
            },
            TimerKind::Restart => {
                debug!(remaining = event.remaining, "Restarting soon");
            }
        }
        Ok(())
    }

    pub fn on_control(&mut self, control: ClientControl) {
        match control {
            ClientControl::Impulse => {
                self.sim.trigger_impulse();
            }
            ClientControl::PauseOrReset => match self.sim.state() {
                RunState::Over { .. } if self.session.is_none() => {
                    self.restart.clear();
                    self.sim.reset();
                    self.scheduler.start();
                    self.start_run();
                }
                RunState::Running => {
                    if self.sim.toggle_pause() {
                        // Leave the paused frame on screen, then stop ticking
                        self.sim.tick(&mut self.renderer);
                        self.scheduler.stop();
                        info!(score = self.sim.score(), "Paused");
                    } else {
                        self.scheduler.start();
                        info!("Resumed");
                    }
                }
                state => {
                    debug!(?state, "Pause ignored");
                }
            },
        }
    }

    /// Whether a countdown or restart timer is still pending
    pub fn timers_armed(&self) -> bool {
        self.countdown.is_armed() || self.restart.is_armed()
    }

    /// Stop ticking and cancel every timer
    pub fn teardown(&mut self) -> ClientSummary {
        self.scheduler.stop();
        self.countdown.clear();
        self.restart.clear();
        info!(
            runs = self.summary.runs,
            sessions = self.summary.sessions,
            high_score = self.summary.high_score,
            "Client stopped"
        );
        self.summary
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn summary(&self) -> ClientSummary {
        self.summary
    }

    fn start_run(&mut self) {
        if self.sim.start() {
            self.arm_countdown();
        }
    }

    fn arm_countdown(&mut self) {
        self.countdown.set(CountdownTimer::start(
            TimerKind::RunStart,
            COUNTDOWN_STEPS,
            COUNTDOWN_INTERVAL,
            self.timer_tx.clone(),
        ));
    }

    fn arm_restart(&mut self) {
        self.restart.set(CountdownTimer::start(
            TimerKind::Restart,
            RESTART_STEPS,
            COUNTDOWN_INTERVAL,
            self.timer_tx.clone(),
        ));
    }
}

/// Play alone until `shutdown` resolves
pub async fn run_solo<F>(
    config: ClientConfig,
    store: &dyn HighScoreStore,
    mut controls: mpsc::UnboundedReceiver<ClientControl>,
    shutdown: F,
) -> ClientSummary
where
    F: Future<Output = ()>,
{
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let mut player = PlayerLoop::new(&config, store, SOLO_ORIGIN, timer_tx);
    player.begin();
    info!("Solo game started");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = player.next_frame() => {
                // Only a session link can fail a frame
                let _ = player.on_frame();
            }
            Some(event) = timer_rx.recv() => {
                let _ = player.on_timer(event);
            }
            Some(control) = controls.recv() => {
                player.on_control(control);
            }
        }
    }

    player.teardown()
}

/// Connect to the coordinator and play until `shutdown` resolves or the
/// connection closes
pub async fn run_client<F>(
    config: ClientConfig,
    store: &dyn HighScoreStore,
    mut controls: mpsc::UnboundedReceiver<ClientControl>,
    shutdown: F,
) -> Result<ClientSummary, ClientError>
where
    F: Future<Output = ()>,
{
    let origin = config.coordinator_url.as_str();
    let (ws, _) = connect_async(origin).await?;
    info!(url = origin, "Connected to coordinator");
    let (mut sink, mut stream) = ws.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientMsg>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize client message");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let mut player = PlayerLoop::new(&config, store, origin, timer_tx)
        .with_session(SessionClient::new(outbound_tx), &config.player_name);
    player.begin();

    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }

            _ = player.next_frame() => {
                if let Err(e) = player.on_frame() {
                    break Err(e);
                }
            }

            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Coordinator closed the connection");
                        break Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e.into()),
                };
                let msg = match serde_json::from_str::<ServerMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "Dropping unparseable coordinator message");
                        continue;
                    }
                };
                if let Err(e) = player.on_server_msg(msg) {
                    break Err(e);
                }
            }

            Some(event) = timer_rx.recv() => {
                if let Err(e) = player.on_timer(event) {
                    break Err(e);
                }
            }

            Some(control) = controls.recv() => {
                player.on_control(control);
            }
        }
    };

    let summary = player.teardown();
    // Dropping the loop drops the outbound sender, which ends the writer
    drop(player);
    if let Err(e) = writer.await {
        debug!(error = %e, "Writer task ended abnormally");
    }

    result.map(|()| summary)
}
