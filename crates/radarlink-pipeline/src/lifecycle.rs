use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use radarlink_frame::FrameSynchronizer;
use radarlink_transport::{DeviceStream, PortOpener, TransportError};
use tracing::{debug, error, info, warn};

use crate::command::send_config;
use crate::config::ModuleConfig;
use crate::error::{PipelineError, Result};
use crate::event::{ModuleEvent, PortState};
use crate::handoff::HandoffBuffer;
use crate::pairing::PairerStats;
use crate::reader::{FrameReader, ReleasablePort};
use crate::worker::DecodeWorker;

/// Interval between checks while `stop` waits for the session threads.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Shared, lock-free view of the lifecycle state.
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub(crate) fn new(state: PortState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub(crate) fn get(&self) -> PortState {
        PortState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `state`, returning the previous one.
    fn replace(&self, state: PortState) -> PortState {
        PortState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}

/// Control surface for one sensor module.
///
/// Owns the data and command ports and the two background threads of a
/// reading session. Cloning yields another handle to the same module.
/// All transitions are serialized; status reads never block.
///
/// ```text
/// AwaitingPortInit --initialize_ports--> Paused --run--> Running
///        ^                                 ^ <--pause--    |
///        +------------- stop / fault ------+---------------+
/// ```
#[derive(Clone)]
pub struct ModuleIo {
    shared: Arc<Shared>,
}

struct Shared {
    config: ModuleConfig,
    opener: Arc<dyn PortOpener>,
    state: StateCell,
    control: Mutex<Control>,
    events: Sender<ModuleEvent>,
}

#[derive(Default)]
struct Control {
    data_port: Option<DeviceStream>,
    cli_port: Option<DeviceStream>,
    session: Option<Session>,
    sessions_started: u64,
}

/// Threads and buffer of one `run` after `initialize_ports`.
struct Session {
    id: u64,
    cancel: Arc<AtomicBool>,
    buffer: Arc<HandoffBuffer>,
    port: ReleasablePort,
    reader: JoinHandle<()>,
    worker: JoinHandle<PairerStats>,
}

impl Session {
    fn signal(&self) {
        self.cancel.store(true, Ordering::Release);
        self.buffer.close();
    }

    /// Cancel and wait up to `timeout` for both threads.
    ///
    /// Threads still running at the deadline are detached. The reader's data
    /// port handle is released in both cases.
    fn shutdown(self, timeout: Duration) {
        self.signal();

        let deadline = Instant::now() + timeout;
        while !(self.reader.is_finished() && self.worker.is_finished()) {
            if Instant::now() >= deadline {
                warn!(
                    session = self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "session threads did not stop in time, detaching"
                );
                self.port.release();
                return;
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }
        self.port.release();

        let _ = self.reader.join();
        if let Ok(stats) = self.worker.join() {
            debug!(
                session = self.id,
                emitted = stats.emitted,
                discarded = stats.discarded,
                overflows = self.buffer.overflow_count(),
                "session stopped"
            );
        }
    }
}

impl ModuleIo {
    /// Create a module handle and the receiver for its events.
    ///
    /// No ports are opened until [`initialize_ports`](Self::initialize_ports).
    pub fn new(config: ModuleConfig, opener: Arc<dyn PortOpener>) -> (Self, Receiver<ModuleEvent>) {
        let (events, receiver) = unbounded();
        let shared = Arc::new(Shared {
            config,
            opener,
            state: StateCell::new(PortState::AwaitingPortInit),
            control: Mutex::new(Control::default()),
            events,
        });
        (Self { shared }, receiver)
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PortState {
        self.shared.state.get()
    }

    /// Open both ports, stopping any existing session first.
    ///
    /// On success the module is `Paused`. On failure every port is closed,
    /// the module is back in `AwaitingPortInit`, and the open error is
    /// returned.
    pub fn initialize_ports(&self) -> Result<PortState> {
        let shared = &self.shared;
        let mut control = shared.lock();
        if shared.state.get() != PortState::AwaitingPortInit {
            shared.stop_locked(&mut control);
        }

        match shared.open_ports() {
            Ok((data, cli)) => {
                info!(
                    module = %shared.config.identifier,
                    data_port = data.name(),
                    cli_port = cli.name(),
                    "ports initialized"
                );
                control.data_port = Some(data);
                control.cli_port = Some(cli);
                shared.set_state(PortState::Paused);
                Ok(PortState::Paused)
            }
            Err(err) => {
                warn!(module = %shared.config.identifier, error = %err, "port initialization failed");
                shared.stop_locked(&mut control);
                Err(err.into())
            }
        }
    }

    /// Start or resume reading.
    ///
    /// Does nothing while awaiting port initialization. Resuming a paused
    /// session reuses its threads and ports.
    pub fn run(&self) -> Result<PortState> {
        let shared = &self.shared;
        let mut control = shared.lock();

        match shared.state.get() {
            PortState::AwaitingPortInit => {
                debug!("run ignored, ports not initialized");
                return Ok(PortState::AwaitingPortInit);
            }
            PortState::Running => return Ok(PortState::Running),
            PortState::Paused => {}
        }

        if control.session.is_none() {
            let session = match Shared::start_session(&self.shared, &mut control) {
                Ok(session) => session,
                Err(err) => {
                    error!(error = %err, "failed to start reading session");
                    shared.stop_locked(&mut control);
                    return Err(err);
                }
            };
            control.session = Some(session);
        }

        shared.set_state(PortState::Running);
        Ok(PortState::Running)
    }

    /// Stop consuming frames while keeping ports and threads alive.
    ///
    /// Does nothing unless a session is running.
    pub fn pause(&self) -> PortState {
        let shared = &self.shared;
        let control = shared.lock();
        if control.session.is_some() && shared.state.get() == PortState::Running {
            shared.set_state(PortState::Paused);
        }
        shared.state.get()
    }

    /// End the session and release both ports.
    ///
    /// Waits at most `stop_timeout` for the background threads; the ports
    /// are released either way.
    pub fn stop(&self) {
        let mut control = self.shared.lock();
        self.shared.stop_locked(&mut control);
    }

    /// Send configuration text to the command port.
    ///
    /// Returns the number of lines written. A missing command port or a write
    /// fault stops the module.
    pub fn write_config(&self, text: &str) -> Result<usize> {
        let shared = &self.shared;
        let mut control = shared.lock();

        let result = match control.cli_port.as_mut() {
            Some(port) => send_config(port, text, shared.config.config_line_delay())
                .map_err(PipelineError::Command),
            None => Err(PipelineError::PortNotOpen("command")),
        };

        match &result {
            Ok(lines) => info!(lines, "configuration sent"),
            Err(err) => {
                warn!(error = %err, "configuration failed, stopping module");
                shared.stop_locked(&mut control);
            }
        }
        result
    }

    /// Read a configuration file and send it with [`write_config`](Self::write_config).
    pub fn write_config_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_config(&text)
    }

    /// Frames dropped to handoff overflow in the current session.
    pub fn dropped_frames(&self) -> u64 {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(0, |session| session.buffer.overflow_count())
    }
}

impl std::fmt::Debug for ModuleIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleIo")
            .field("identifier", &self.shared.config.identifier)
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_ports(&self) -> radarlink_transport::Result<(DeviceStream, DeviceStream)> {
        if self.config.data_port.is_empty() {
            return Err(TransportError::Unconfigured("data"));
        }
        if self.config.cli_port.is_empty() {
            return Err(TransportError::Unconfigured("command"));
        }
        let data = self.opener.open(&self.config.data_settings())?;
        let cli = self.opener.open(&self.config.cli_settings())?;
        Ok((data, cli))
    }

    fn set_state(&self, state: PortState) {
        let previous = self.state.replace(state);
        if previous != state {
            info!(module = %self.config.identifier, from = %previous, to = %state, "port state changed");
            let _ = self.events.send(ModuleEvent::StateChanged(state));
        }
    }

    fn stop_locked(&self, control: &mut Control) {
        if let Some(session) = control.session.take() {
            session.shutdown(self.config.stop_timeout());
        }
        control.data_port = None;
        control.cli_port = None;
        self.set_state(PortState::AwaitingPortInit);
    }

    fn start_session(this: &Arc<Self>, control: &mut Control) -> Result<Session> {
        let data = control
            .data_port
            .as_ref()
            .ok_or(PipelineError::PortNotOpen("data"))?
            .try_clone()?;
        let port = ReleasablePort::new(data);

        control.sessions_started += 1;
        let id = control.sessions_started;
        let cancel = Arc::new(AtomicBool::new(false));
        let buffer = Arc::new(HandoffBuffer::new(this.config.handoff_capacity));

        let worker = DecodeWorker::new(Arc::clone(&buffer), this.events.clone(), Arc::clone(&cancel))
            .spawn()?;

        let reader = FrameReader::new(
            FrameSynchronizer::with_config(port.clone(), this.config.sync_config()),
            Arc::clone(&buffer),
            Arc::clone(&cancel),
            this.state.clone(),
            Duration::from_millis(this.config.read_timeout_ms),
        );
        let owner = Arc::downgrade(this);
        let reader_cancel = Arc::clone(&cancel);
        let reader = thread::Builder::new()
            .name("radarlink-sync".to_string())
            .spawn(move || match reader.run() {
                Ok(stats) => debug!(
                    frames = stats.frames,
                    rejected = stats.rejected,
                    "synchronizer stopped"
                ),
                Err(err) if reader_cancel.load(Ordering::Acquire) => {
                    debug!(error = %err, "synchronizer stopped during shutdown")
                }
                Err(err) => Shared::connection_lost(&owner, id, err.to_string()),
            });

        let reader = match reader {
            Ok(handle) => handle,
            Err(source) => {
                cancel.store(true, Ordering::Release);
                buffer.close();
                port.release();
                return Err(PipelineError::Spawn {
                    name: "sync",
                    source,
                });
            }
        };

        info!(module = %this.config.identifier, session = id, "reading session started");
        Ok(Session {
            id,
            cancel,
            buffer,
            port,
            reader,
            worker,
        })
    }

    /// Tear down after a data port fault reported by session `id`.
    fn connection_lost(owner: &Weak<Self>, id: u64, reason: String) {
        let Some(shared) = owner.upgrade() else {
            return;
        };
        let mut control = shared.lock();
        if control.session.as_ref().map(|session| session.id) != Some(id) {
            return;
        }

        if let Some(session) = control.session.take() {
            session.signal();
            session.port.release();
        }
        control.data_port = None;
        control.cli_port = None;

        error!(module = %shared.config.identifier, reason = %reason, "connection lost");
        shared.set_state(PortState::AwaitingPortInit);
        let _ = shared.events.send(ModuleEvent::ConnectionLost { reason });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = control.session.take() {
            session.signal();
            session.port.release();
        }
    }
}
