use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEvent};

#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
}

/// An event together with the instant it was read off the terminal.
///
/// Reactions are judged against `at`, not against when the loop gets around
/// to handling them, so a press read before green stays a false start.
#[derive(Clone, Debug)]
pub struct TimedEvent {
    pub event: GameEvent,
    pub at: Instant,
}

impl TimedEvent {
    pub fn new(event: GameEvent, at: Instant) -> Self {
        Self { event, at }
    }

    pub fn now(event: GameEvent) -> Self {
        Self::new(event, Instant::now())
    }
}

/// Where keyboard, mouse and resize events come from
pub trait GameEventSource: Send + 'static {
    /// Wait up to `timeout` for the next stamped event
    fn recv_timeout(&self, timeout: Duration) -> Result<TimedEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread and stamps them on arrival
pub struct CrosstermEventSource {
    rx: Receiver<TimedEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let read = event::read();
            let at = Instant::now();
            let event = match read {
                Ok(CtEvent::Key(key)) => GameEvent::Key(key),
                Ok(CtEvent::Mouse(mouse)) => GameEvent::Mouse(mouse),
                Ok(CtEvent::Resize(_, _)) => GameEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("terminal input closed: {}", e);
                    break;
                }
            };
            if tx.send(TimedEvent::new(event, at)).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimedEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source; tests choose the stamps
pub struct TestEventSource {
    rx: Receiver<TimedEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TimedEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimedEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Waits for the next input, waking for ticks and light deadlines
pub struct Runner<E: GameEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: GameEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Next event, or a Tick stamped at wake-up after one tick interval
    pub fn step(&self) -> TimedEvent {
        self.wait(self.ticker.interval())
    }

    /// Like `step`, but wakes no later than `deadline`
    pub fn step_until(&self, deadline: Option<Instant>) -> TimedEvent {
        let mut timeout = self.ticker.interval();
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }
        self.wait(timeout)
    }

    fn wait(&self, timeout: Duration) -> TimedEvent {
        self.event_source
            .recv_timeout(timeout)
            .unwrap_or_else(|_| TimedEvent::now(GameEvent::Tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn runner(rx: Receiver<TimedEvent>, tick_ms: u64) -> Runner<TestEventSource, FixedTicker> {
        Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(tick_ms)),
        )
    }

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let before = Instant::now();

        let ev = runner(rx, 1).step();

        assert_matches!(ev.event, GameEvent::Tick);
        assert!(ev.at >= before);
    }

    #[test]
    fn step_keeps_the_read_instant() {
        let (tx, rx) = mpsc::channel();
        let read_at = Instant::now();
        tx.send(TimedEvent::new(GameEvent::Resize, read_at)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let ev = runner(rx, 10).step();

        assert_matches!(ev.event, GameEvent::Resize);
        assert_eq!(ev.at, read_at);
    }

    #[test]
    fn step_until_wakes_at_deadline() {
        let (_tx, rx) = mpsc::channel();
        let started = Instant::now();

        let ev = runner(rx, 5_000).step_until(Some(started + Duration::from_millis(10)));

        assert_matches!(ev.event, GameEvent::Tick);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn disconnected_source_ticks() {
        let (tx, rx) = mpsc::channel::<TimedEvent>();
        drop(tx);

        assert_matches!(runner(rx, 1).step().event, GameEvent::Tick);
    }
}
