//! Per-session supervisor and event-drive loop.
//!
//! One supervisor task is spawned per `start` call. It owns the backoff
//! state and loops generations: drive the current protocol client until it
//! dies, classify the outcome, sleep out the backoff, advance the
//! generation fence, connect a fresh client. The QR-refresh deadline and
//! the heartbeat interval are locals of the drive future, so retiring a
//! generation cancels its timers with it; the fence catches anything that
//! was already in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use chatwire_core::{
    ArtifactSink, ClientEvent, CloseReason, ConnectionUpdate, CredentialStore, Error, Generation,
    PresenceUpdate, ProtocolClient, ProtocolConnector, Result, SessionState,
};
use chatwire_router::{Action, CommandRouter};

use crate::backoff::Backoff;
use crate::manager::SessionManagerConfig;
use crate::shared::SessionShared;

/// Everything a supervisor task needs, cloned out of the manager at spawn.
pub(crate) struct SessionRuntime<N, S, A> {
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) connector: Arc<N>,
    pub(crate) store: Arc<S>,
    pub(crate) artifacts: Arc<A>,
    pub(crate) router: CommandRouter,
    pub(crate) config: SessionManagerConfig,
}

/// Why one generation's drive loop ended.
enum DriveOutcome {
    /// A newer generation took over; do nothing further
    Retired,
    /// Terminal logout; credentials purged, no reconnect
    LoggedOut,
    /// The QR challenge went unscanned; start a fresh client immediately
    QrExpired,
    /// The socket closed for a recoverable reason
    Closed(CloseReason),
    /// The generation failed locally (persistence, dead event stream)
    Failed(String),
}

pub(crate) async fn supervise<N, S, A>(
    rt: SessionRuntime<N, S, A>,
    mut gen: Generation,
    mut client: Arc<N::Client>,
    mut events: mpsc::Receiver<ClientEvent>,
    initial_state: SessionState,
) where
    N: ProtocolConnector,
    S: CredentialStore,
    A: ArtifactSink,
{
    let mut backoff = Backoff::new(rt.config.backoff.clone());
    let mut state = initial_state;

    'generation: loop {
        let outcome = drive(&rt, gen, Arc::clone(&client), &mut events, &mut backoff, state).await;

        match outcome {
            DriveOutcome::Retired | DriveOutcome::LoggedOut => return,
            DriveOutcome::QrExpired => {
                info!(
                    session = %rt.shared.id(),
                    %gen,
                    "QR challenge expired, starting a fresh client"
                );
            }
            DriveOutcome::Closed(reason) => {
                let err = reason.to_error(rt.shared.id());
                if !rt
                    .shared
                    .publish(gen, SessionState::Reconnecting, Some(err.to_string()))
                {
                    return;
                }
                let delay = backoff.next_delay(&reason);
                info!(
                    session = %rt.shared.id(),
                    %gen,
                    %reason,
                    ?delay,
                    attempt = backoff.attempts(),
                    "scheduling reconnect"
                );
                time::sleep(delay).await;
            }
            DriveOutcome::Failed(detail) => {
                if !rt
                    .shared
                    .publish(gen, SessionState::Reconnecting, Some(detail.clone()))
                {
                    return;
                }
                let delay = backoff.next_delay(&CloseReason::ConnectionLost);
                warn!(
                    session = %rt.shared.id(),
                    %gen,
                    detail = %detail,
                    ?delay,
                    "generation failed, scheduling reconnect"
                );
                time::sleep(delay).await;
            }
        }

        // Roll to a fresh generation. The CAS fails if start/stop superseded
        // this supervisor while it slept, in which case it is a no-op.
        loop {
            let Some(next) = rt.shared.advance(gen) else {
                return;
            };
            gen = next;
            if !rt.shared.publish(gen, SessionState::Connecting, None) {
                return;
            }

            match open_client(&rt).await {
                Ok((new_client, new_events)) => {
                    client = Arc::new(new_client);
                    events = new_events;
                    state = SessionState::Connecting;
                    continue 'generation;
                }
                Err(e) => {
                    if !rt
                        .shared
                        .publish(gen, SessionState::Reconnecting, Some(e.to_string()))
                    {
                        return;
                    }
                    let delay = backoff.next_delay(&CloseReason::ConnectionLost);
                    warn!(
                        session = %rt.shared.id(),
                        %gen,
                        error = %e,
                        ?delay,
                        "reconnect attempt failed"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }
}

/// Load persisted credentials and open a fresh protocol client.
async fn open_client<N, S, A>(
    rt: &SessionRuntime<N, S, A>,
) -> Result<(N::Client, mpsc::Receiver<ClientEvent>)>
where
    N: ProtocolConnector,
    S: CredentialStore,
    A: ArtifactSink,
{
    let credentials = rt.store.load(rt.shared.id()).await?;
    rt.connector.connect(credentials).await
}

/// Drive one generation's protocol client until it dies or is retired.
async fn drive<N, S, A>(
    rt: &SessionRuntime<N, S, A>,
    gen: Generation,
    client: Arc<N::Client>,
    events: &mut mpsc::Receiver<ClientEvent>,
    backoff: &mut Backoff,
    mut state: SessionState,
) -> DriveOutcome
where
    N: ProtocolConnector,
    S: CredentialStore,
    A: ArtifactSink,
{
    // Armed only while AwaitingQr; parked far in the future otherwise.
    let parked = Instant::now() + Duration::from_secs(86400 * 365);
    let qr_deadline = time::sleep_until(parked);
    tokio::pin!(qr_deadline);

    let mut heartbeat = time::interval(rt.config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut opened_at: Option<Instant> = None;

    loop {
        if !rt.shared.is_active(gen) {
            return DriveOutcome::Retired;
        }

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return DriveOutcome::Failed("protocol event stream closed".to_string());
                };
                match event {
                    ClientEvent::Connection(ConnectionUpdate::QrChallenge { code }) => {
                        if state == SessionState::AwaitingPairing {
                            debug!(session = %rt.shared.id(), "ignoring QR challenge during pairing login");
                            continue;
                        }
                        match rt.artifacts.write_qr(rt.shared.id(), &code).await {
                            Ok(()) => {
                                state = SessionState::AwaitingQr;
                                if !rt.shared.publish(gen, state, None) {
                                    return DriveOutcome::Retired;
                                }
                                qr_deadline.as_mut().reset(Instant::now() + rt.config.qr_refresh);
                            }
                            Err(e) => {
                                // Handshake failure: state stays, error surfaced.
                                warn!(session = %rt.shared.id(), error = %e, "failed to publish QR challenge");
                                if !rt.shared.publish(gen, state, Some(format!("QR publish failed: {e}"))) {
                                    return DriveOutcome::Retired;
                                }
                            }
                        }
                    }
                    ClientEvent::Connection(ConnectionUpdate::Open) => {
                        if let Err(e) = rt.artifacts.clear_qr(rt.shared.id()).await {
                            warn!(session = %rt.shared.id(), error = %e, "failed to clear QR artifact");
                        }
                        if let Err(e) = rt.artifacts.clear_pairing_code(rt.shared.id()).await {
                            warn!(session = %rt.shared.id(), error = %e, "failed to clear pairing artifact");
                        }
                        qr_deadline.as_mut().reset(parked);
                        state = SessionState::Open;
                        opened_at = Some(Instant::now());
                        if !rt.shared.publish(gen, state, None) {
                            return DriveOutcome::Retired;
                        }
                        heartbeat.reset();
                        info!(session = %rt.shared.id(), %gen, "session open");
                    }
                    ClientEvent::Connection(ConnectionUpdate::Closed { reason }) => {
                        if let Some(t) = opened_at.take() {
                            backoff.note_open_duration(t.elapsed());
                        }
                        let err = reason.to_error(rt.shared.id());
                        // Transient marker before the follow-up state.
                        if !rt.shared.publish(gen, SessionState::Disconnected, Some(err.to_string())) {
                            return DriveOutcome::Retired;
                        }
                        if reason.is_logged_out() {
                            info!(session = %rt.shared.id(), %gen, "logged out, purging credentials");
                            if let Err(e) = rt.store.delete(rt.shared.id()).await {
                                error!(session = %rt.shared.id(), error = %e, "failed to delete credentials after logout");
                            }
                            let _ = rt.artifacts.clear_qr(rt.shared.id()).await;
                            let _ = rt.artifacts.clear_pairing_code(rt.shared.id()).await;
                            rt.shared.publish(gen, SessionState::LoggedOut, Some(err.to_string()));
                            return DriveOutcome::LoggedOut;
                        }
                        return DriveOutcome::Closed(reason);
                    }
                    ClientEvent::CredentialsUpdate(bundle) => {
                        // Awaited before the next event is taken, so saves
                        // stay ordered and the latest bundle is never lost.
                        if let Err(e) = rt.store.save(rt.shared.id(), &bundle).await {
                            error!(session = %rt.shared.id(), error = %e, "credential save failed, retiring generation");
                            if !rt.shared.publish(gen, SessionState::Disconnected, Some(e.to_string())) {
                                return DriveOutcome::Retired;
                            }
                            return DriveOutcome::Failed(format!("credential save failed: {e}"));
                        }
                        debug!(session = %rt.shared.id(), len = bundle.len(), "credential bundle persisted");
                    }
                    ClientEvent::Message(message) => {
                        let actions = rt.router.route(&message);
                        if !actions.is_empty() {
                            spawn_actions(
                                Arc::clone(&rt.shared),
                                gen,
                                Arc::clone(&client),
                                actions,
                                rt.config.clone(),
                            );
                        }
                    }
                }
            }
            () = &mut qr_deadline, if state == SessionState::AwaitingQr => {
                if !rt.shared.is_active(gen) {
                    return DriveOutcome::Retired;
                }
                return DriveOutcome::QrExpired;
            }
            _ = heartbeat.tick(), if state == SessionState::Open => {
                if !rt.shared.is_active(gen) {
                    return DriveOutcome::Retired;
                }
                match timeout(
                    rt.config.send_timeout,
                    client.send_presence(None, PresenceUpdate::Available),
                )
                .await
                {
                    Ok(Ok(())) => debug!(session = %rt.shared.id(), "heartbeat presence sent"),
                    Ok(Err(e)) => warn!(session = %rt.shared.id(), error = %e, "heartbeat presence failed"),
                    Err(_) => warn!(session = %rt.shared.id(), "heartbeat presence timed out"),
                }
            }
        }
    }
}

/// Execute one message's actions as a fire-and-forget task.
///
/// Actions for one message run in order; distinct messages interleave
/// freely. Each client call is bounded by the send timeout, and the fence
/// is re-checked before every action so a retired generation produces no
/// further side effects.
fn spawn_actions<C: ProtocolClient>(
    shared: Arc<SessionShared>,
    gen: Generation,
    client: Arc<C>,
    actions: Vec<Action>,
    config: SessionManagerConfig,
) {
    tokio::spawn(async move {
        for action in actions {
            if !shared.is_active(gen) {
                debug!(session = %shared.id(), %gen, "dropping outbound actions for retired generation");
                return;
            }
            if let Err(e) = run_action(&shared, gen, client.as_ref(), &action, &config).await {
                // Isolated per message: log and move on.
                warn!(session = %shared.id(), error = %e, ?action, "outbound action failed");
            }
        }
    });
}

async fn run_action<C: ProtocolClient>(
    shared: &SessionShared,
    gen: Generation,
    client: &C,
    action: &Action,
    config: &SessionManagerConfig,
) -> Result<()> {
    match action {
        Action::Reply { to, text } => bounded(config, client.send_message(to, text)).await,
        Action::SimulateTyping { to } => {
            bounded(config, client.send_presence(Some(to), PresenceUpdate::Typing)).await?;
            time::sleep(config.typing_duration).await;
            if !shared.is_active(gen) {
                return Ok(());
            }
            bounded(config, client.send_presence(Some(to), PresenceUpdate::Paused)).await
        }
        Action::MarkRead { ids } => bounded(config, client.read_messages(ids)).await,
    }
}

async fn bounded<T>(
    config: &SessionManagerConfig,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    timeout(config.send_timeout, fut)
        .await
        .map_err(|_| Error::Protocol("outbound call timed out".to_string()))?
}
