use crate::lights::{pre_delay, Lights, Phase};
use crate::records::{RecordKey, RecordStore, RecordUpdate, Records};
use crate::scheduler::{Scheduler, TimerQueue, TransitionToken};
use crate::session::{Session, SessionSummary, Verdict};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;

pub const READY_STATUS: &str = "Prêt ?";
pub const FALSE_START_STATUS: &str = "Faux départ !";
pub const NEXT_TRIAL_HINT: &str = "Appuie sur “Armer” pour l’essai suivant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TrialState {
    Idle,
    Armed,
    FalseStart,
    Go,
    Recorded,
}

/// Which player controls are currently usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub arm: bool,
    pub reset: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            arm: true,
            reset: false,
        }
    }
}

/// What a single player activation did
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Ignored,
    FalseStart,
    Recorded { ms: u64 },
    Finished(SessionSummary),
}

/// Reaction game controller: light sequence, false start detection and session records
#[derive(Debug)]
pub struct LaunchControl<R: RecordStore, S: Scheduler = TimerQueue> {
    session: Session,
    state: TrialState,
    lights: Lights,
    started_at: Option<Instant>,
    generation: u64,
    status: String,
    result: String,
    controls: Controls,
    records: Records,
    summary: Option<SessionSummary>,
    store: R,
    scheduler: S,
    rng: StdRng,
}

impl<R: RecordStore> LaunchControl<R, TimerQueue> {
    pub fn new(store: R) -> Self {
        Self::with_scheduler(store, TimerQueue::new(), StdRng::from_entropy())
    }

    /// Reproducible pre-delays
    pub fn with_seed(store: R, seed: u64) -> Self {
        Self::with_scheduler(store, TimerQueue::new(), StdRng::seed_from_u64(seed))
    }
}

impl<R: RecordStore, S: Scheduler> LaunchControl<R, S> {
    pub fn with_scheduler(store: R, scheduler: S, rng: StdRng) -> Self {
        let records = Records::load(&store);
        log::debug!(
            "loaded records: single={:?} average={:?}",
            records.best_single,
            records.best_average
        );
        Self {
            session: Session::new(),
            state: TrialState::Idle,
            lights: Lights::default(),
            started_at: None,
            generation: 0,
            status: READY_STATUS.to_string(),
            result: String::new(),
            controls: Controls::default(),
            records,
            summary: None,
            store,
            scheduler,
            rng,
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn lights(&self) -> Lights {
        self.lights
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn records(&self) -> Records {
        self.records
    }

    /// Summary of the last completed session, until the next reset
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn is_go(&self) -> bool {
        self.state == TrialState::Go
    }

    /// When the lights turned green for the pending reaction
    pub fn green_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Start the light sequence. Refused while a sequence is running or the session is full.
    pub fn arm(&mut self, now: Instant) -> bool {
        if matches!(self.state, TrialState::Armed | TrialState::Go) || self.session.is_complete() {
            log::debug!("arm ignored in state {}", self.state);
            return false;
        }

        self.cancel_pending();
        self.state = TrialState::Armed;
        self.started_at = None;
        self.status = "Ready…".to_string();
        self.controls = Controls {
            arm: false,
            reset: false,
        };
        self.lights.reset();

        let delay = pre_delay(&mut self.rng);
        log::debug!(
            "armed trial {} with pre-delay {} ms",
            self.session.tries() + 1,
            delay.as_millis()
        );
        self.scheduler.schedule(TransitionToken {
            generation: self.generation,
            phase: Phase::Ready,
            due: now + delay,
        });
        true
    }

    /// Apply a scheduled transition. Stale tokens are ignored.
    pub fn on_transition(&mut self, token: TransitionToken, now: Instant) {
        if token.generation != self.generation || self.state != TrialState::Armed {
            log::debug!("dropping stale transition to {}", token.phase);
            return;
        }

        token.phase.apply(&mut self.lights);
        if let Some(status) = token.phase.status() {
            self.status = status.to_string();
        }

        match token.phase.next() {
            Some((phase, delay)) => self.scheduler.schedule(TransitionToken {
                generation: self.generation,
                phase,
                due: token.due + delay,
            }),
            None => {
                self.state = TrialState::Go;
                self.started_at = Some(now);
                log::debug!("lights green");
            }
        }
    }

    /// Fire every transition that is due by `now`
    pub fn poll_timers(&mut self, now: Instant) {
        while let Some(token) = self.scheduler.pop_due(now) {
            self.on_transition(token, now);
        }
    }

    /// Fire transitions one by one at their own due time, up to `target`
    pub fn advance_to(&mut self, target: Instant) {
        while let Some(due) = self.scheduler.next_deadline() {
            if due > target {
                break;
            }
            match self.scheduler.pop_due(due) {
                Some(token) => self.on_transition(token, due),
                None => break,
            }
        }
    }

    /// Single entry point for every player activation (click or key), stamped
    /// with when the input was read. Input read before green is a false start.
    pub fn handle_reaction(&mut self, now: Instant) -> Reaction {
        match (self.state, self.started_at) {
            (TrialState::Armed, _) => self.false_start(),
            (TrialState::Go, Some(green)) if now < green => {
                log::debug!("input read {:?} before green", green - now);
                self.false_start()
            }
            (TrialState::Go, green) => {
                let green = green.unwrap_or(now);
                self.started_at = None;
                let elapsed = now.saturating_duration_since(green);
                self.record((elapsed.as_secs_f64() * 1000.0).round() as u64)
            }
            (TrialState::Idle | TrialState::FalseStart | TrialState::Recorded, _) => {
                Reaction::Ignored
            }
        }
    }

    fn false_start(&mut self) -> Reaction {
        self.cancel_pending();
        self.state = TrialState::FalseStart;
        self.started_at = None;
        self.status = FALSE_START_STATUS.to_string();
        self.lights.reset();
        let open = !self.session.is_complete();
        self.controls = Controls {
            arm: open,
            reset: open,
        };
        log::info!("false start on trial {}", self.session.tries() + 1);
        Reaction::FalseStart
    }

    fn record(&mut self, ms: u64) -> Reaction {
        self.session.record(ms);
        self.state = TrialState::Recorded;
        self.status = format!("Réaction : {} ms", ms);
        self.lights.reset();
        self.controls.arm = !self.session.is_complete();
        log::info!("trial {} reaction {} ms", self.session.tries(), ms);

        if self.session.is_complete() {
            let summary = self.finalize();
            self.controls.reset = true;
            self.result = summary.to_string();
            self.summary = Some(summary.clone());
            Reaction::Finished(summary)
        } else {
            self.result = NEXT_TRIAL_HINT.to_string();
            Reaction::Recorded { ms }
        }
    }

    /// Clear the session and return to idle. Stored records are kept.
    pub fn reset(&mut self) {
        self.cancel_pending();
        self.session.reset();
        self.state = TrialState::Idle;
        self.started_at = None;
        self.lights.reset();
        self.status = READY_STATUS.to_string();
        self.result.clear();
        self.controls = Controls::default();
        self.summary = None;
    }

    fn cancel_pending(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.scheduler.cancel_all();
    }

    fn finalize(&mut self) -> SessionSummary {
        let times = self.session.reaction_times().to_vec();
        let average = self.session.average().unwrap_or_default();
        let best = self.session.best().unwrap_or_default();

        let update = self.records.improve(average, best);
        self.persist(update);

        let verdict = Verdict::from_average(average);
        log::info!("session finished: avg {} ms, best {} ms, {}", average, best, verdict);

        SessionSummary {
            times,
            average,
            best,
            verdict,
            record_average: self.records.best_average,
            record_single: self.records.best_single,
            new_average_record: update.average,
            new_single_record: update.single,
        }
    }

    fn persist(&mut self, update: RecordUpdate) {
        let writes = [
            (update.single, RecordKey::BestSingle, self.records.best_single),
            (update.average, RecordKey::BestAverage, self.records.best_average),
        ];
        for (improved, key, value) in writes {
            if let (true, Some(ms)) = (improved, value) {
                if let Err(e) = self.store.write(key, ms) {
                    log::warn!("could not persist {}: {}", key.as_str(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use crate::session::MAX_TRIES;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn game() -> LaunchControl<MemoryRecordStore> {
        LaunchControl::with_seed(MemoryRecordStore::new(), 42)
    }

    /// Arm at `now` and run the light sequence until green; returns the go instant
    fn arm_until_go<R: RecordStore>(lc: &mut LaunchControl<R>, now: Instant) -> Instant {
        assert!(lc.arm(now));
        lc.advance_to(now + ms(5_000));
        assert_eq!(lc.state(), TrialState::Go);
        lc.started_at.unwrap()
    }

    fn play_session<R: RecordStore>(
        lc: &mut LaunchControl<R>,
        times: &[u64],
        mut now: Instant,
    ) -> Reaction {
        let mut last = Reaction::Ignored;
        for &t in times {
            let go = arm_until_go(lc, now);
            now = go + ms(t);
            last = lc.handle_reaction(now);
            now += ms(1_000);
        }
        last
    }

    #[test]
    fn test_new_game_is_idle() {
        let lc = game();
        assert_eq!(lc.state(), TrialState::Idle);
        assert_eq!(lc.status(), READY_STATUS);
        assert_eq!(lc.result(), "");
        assert!(lc.lights().is_dark());
        assert_eq!(lc.controls(), Controls::default());
        assert_eq!(lc.next_deadline(), None);
    }

    #[test]
    fn test_light_sequence_timing() {
        let mut lc = game();
        let t0 = Instant::now();
        assert!(lc.arm(t0));
        assert_eq!(lc.state(), TrialState::Armed);
        assert_eq!(lc.status(), "Ready…");
        assert_eq!(
            lc.controls(),
            Controls {
                arm: false,
                reset: false
            }
        );

        let red_at = lc.next_deadline().unwrap();
        let pre = red_at - t0;
        assert!(pre >= ms(400) && pre < ms(900));

        lc.advance_to(red_at);
        assert!(lc.lights().red);
        assert!(!lc.is_go());

        lc.advance_to(red_at + ms(500));
        assert!(lc.lights().amber && !lc.lights().red);
        assert_eq!(lc.status(), "Set…");

        lc.advance_to(red_at + ms(900));
        assert!(lc.lights().amber);
        assert_eq!(lc.status(), "Set…");
        assert!(!lc.is_go());

        lc.advance_to(red_at + ms(1_299));
        assert!(!lc.is_go());

        lc.advance_to(red_at + ms(1_300));
        assert!(lc.is_go());
        assert!(lc.lights().green && !lc.lights().amber);
        assert_eq!(lc.status(), "GO !");
        assert_eq!(lc.next_deadline(), None);
    }

    #[test]
    fn test_poll_timers_catches_up() {
        let mut lc = game();
        let t0 = Instant::now();
        lc.arm(t0);
        lc.poll_timers(t0 + ms(3_000));
        assert!(lc.is_go());
        assert_eq!(lc.started_at, Some(t0 + ms(3_000)));
    }

    #[test]
    fn test_false_start_keeps_trial_count() {
        let mut lc = game();
        let t0 = Instant::now();
        lc.arm(t0);
        lc.advance_to(t0 + ms(1_000));

        let reaction = lc.handle_reaction(t0 + ms(1_000));

        assert_eq!(reaction, Reaction::FalseStart);
        assert_eq!(lc.state(), TrialState::FalseStart);
        assert_eq!(lc.status(), FALSE_START_STATUS);
        assert_eq!(lc.session().tries(), 0);
        assert!(lc.lights().is_dark());
        assert!(lc.controls().arm);
        assert_eq!(lc.next_deadline(), None);

        // nothing resurrects go after the false start
        lc.advance_to(t0 + ms(10_000));
        assert_eq!(lc.state(), TrialState::FalseStart);
    }

    #[test]
    fn test_input_read_before_green_is_false_start_after_catch_up() {
        let mut lc = game();
        let t0 = Instant::now();
        lc.arm(t0);
        let red_at = lc.next_deadline().unwrap();
        let green_due = red_at + ms(1_300);

        // the loop caught up past green before it got to the key
        lc.poll_timers(green_due + ms(5));
        assert!(lc.is_go());
        let reaction = lc.handle_reaction(green_due - ms(2));

        assert_eq!(reaction, Reaction::FalseStart);
        assert_eq!(lc.state(), TrialState::FalseStart);
        assert_eq!(lc.session().tries(), 0);
        assert!(lc.lights().is_dark());
        assert_eq!(lc.green_at(), None);
        assert!(lc.controls().arm && lc.controls().reset);
    }

    #[test]
    fn test_input_at_green_instant_counts_as_zero() {
        let mut lc = game();
        let go = arm_until_go(&mut lc, Instant::now());
        assert_eq!(lc.handle_reaction(go), Reaction::Recorded { ms: 0 });
    }

    #[test]
    fn test_repeated_false_starts_never_count() {
        let mut lc = game();
        let mut now = Instant::now();
        for _ in 0..20 {
            assert!(lc.arm(now));
            now += ms(100);
            assert_eq!(lc.handle_reaction(now), Reaction::FalseStart);
            now += ms(100);
        }
        assert_eq!(lc.session().tries(), 0);
        assert!(lc.session().reaction_times().is_empty());
    }

    #[test]
    fn test_stale_token_is_ignored() {
        let mut lc = game();
        let t0 = Instant::now();
        lc.arm(t0);
        let stale = TransitionToken {
            generation: lc.generation,
            phase: Phase::Go,
            due: t0,
        };
        lc.handle_reaction(t0 + ms(10));
        lc.arm(t0 + ms(20));

        lc.on_transition(stale, t0 + ms(30));

        assert_eq!(lc.state(), TrialState::Armed);
        assert!(!lc.is_go());
        assert!(lc.lights().is_dark());
    }

    #[test]
    fn test_reaction_recorded_once() {
        let mut lc = game();
        let go = arm_until_go(&mut lc, Instant::now());

        assert_eq!(
            lc.handle_reaction(go + ms(230)),
            Reaction::Recorded { ms: 230 }
        );
        assert_eq!(lc.handle_reaction(go + ms(231)), Reaction::Ignored);

        assert_eq!(lc.session().tries(), 1);
        assert_eq!(lc.session().reaction_times(), &[230]);
        assert_eq!(lc.state(), TrialState::Recorded);
        assert_eq!(lc.status(), "Réaction : 230 ms");
        assert_eq!(lc.result(), NEXT_TRIAL_HINT);
        assert!(lc.lights().is_dark());
        assert!(lc.controls().arm);
    }

    #[test]
    fn test_reaction_rounds_to_millis() {
        let mut lc = game();
        let go = arm_until_go(&mut lc, Instant::now());
        let reaction = lc.handle_reaction(go + Duration::from_micros(250_600));
        assert_eq!(reaction, Reaction::Recorded { ms: 251 });
    }

    #[test]
    fn test_input_ignored_when_idle() {
        let mut lc = game();
        assert_eq!(lc.handle_reaction(Instant::now()), Reaction::Ignored);
        assert_eq!(lc.state(), TrialState::Idle);
    }

    #[test]
    fn test_arm_refused_while_running() {
        let mut lc = game();
        let t0 = Instant::now();
        assert!(lc.arm(t0));
        assert!(!lc.arm(t0 + ms(1)));
        lc.advance_to(t0 + ms(5_000));
        assert!(lc.is_go());
        assert!(!lc.arm(t0 + ms(5_001)));
    }

    #[test]
    fn test_first_session_sets_records() {
        let mut lc = game();
        let reaction = play_session(&mut lc, &[300, 310, 290, 305, 295], Instant::now());

        assert_matches!(reaction, Reaction::Finished(summary) => {
            assert_eq!(summary.average, 300);
            assert_eq!(summary.best, 290);
            assert_eq!(summary.verdict, Verdict::VerySolid);
            assert!(summary.new_average_record && summary.new_single_record);
        });
        assert_eq!(lc.session().tries(), MAX_TRIES);
        assert_eq!(lc.records().best_average, Some(300));
        assert_eq!(lc.records().best_single, Some(290));
        assert_eq!(lc.store().read(RecordKey::BestAverage), Some(300));
        assert_eq!(lc.store().read(RecordKey::BestSingle), Some(290));
        assert_eq!(
            lc.controls(),
            Controls {
                arm: false,
                reset: true
            }
        );
        assert!(lc.result().ends_with("Très solide 🔥"));
    }

    #[test]
    fn test_second_session_improves_records() {
        let mut lc = game();
        let now = Instant::now();
        play_session(&mut lc, &[300, 310, 290, 305, 295], now);
        lc.reset();
        let reaction = play_session(&mut lc, &[250, 260, 255, 245, 265], now + ms(60_000));

        assert_matches!(reaction, Reaction::Finished(summary) => {
            assert_eq!(summary.average, 255);
            assert_eq!(summary.best, 245);
            assert_eq!(summary.verdict, Verdict::PilotReflexes);
            assert_eq!(summary.record_average, Some(255));
            assert_eq!(summary.record_single, Some(245));
        });
        assert_eq!(lc.store().read(RecordKey::BestAverage), Some(255));
        assert_eq!(lc.store().read(RecordKey::BestSingle), Some(245));
    }

    #[test]
    fn test_worse_session_keeps_records() {
        let store = MemoryRecordStore::new()
            .with_raw(RecordKey::BestSingle, "200")
            .with_raw(RecordKey::BestAverage, "220");
        let mut lc = LaunchControl::with_seed(store, 3);
        let reaction = play_session(&mut lc, &[400, 410, 390, 405, 395], Instant::now());

        assert_matches!(reaction, Reaction::Finished(summary) => {
            assert_eq!(summary.verdict, Verdict::NeedsPolish);
            assert!(!summary.new_average_record && !summary.new_single_record);
            assert_eq!(summary.record_single, Some(200));
        });
        assert_eq!(lc.store().read(RecordKey::BestSingle), Some(200));
        assert_eq!(lc.store().read(RecordKey::BestAverage), Some(220));
    }

    #[test]
    fn test_full_session_blocks_arming_and_input() {
        let mut lc = game();
        let now = Instant::now();
        play_session(&mut lc, &[300, 300, 300, 300, 300], now);

        assert!(!lc.arm(now + ms(60_000)));
        assert_eq!(lc.handle_reaction(now + ms(60_001)), Reaction::Ignored);
        assert_eq!(lc.session().tries(), MAX_TRIES);
        assert!(lc.summary().is_some());
    }

    #[test]
    fn test_reset_clears_session_not_records() {
        let mut lc = game();
        let now = Instant::now();
        play_session(&mut lc, &[300, 300, 300, 300, 300], now);
        lc.arm(now);

        lc.reset();

        assert_eq!(lc.state(), TrialState::Idle);
        assert_eq!(lc.session().tries(), 0);
        assert_eq!(lc.status(), READY_STATUS);
        assert_eq!(lc.result(), "");
        assert_eq!(lc.controls(), Controls::default());
        assert!(lc.summary().is_none());
        assert_eq!(lc.records().best_average, Some(300));
        assert_eq!(lc.store().read(RecordKey::BestSingle), Some(300));
    }

    #[test]
    fn test_reset_mid_sequence_cancels_timers() {
        let mut lc = game();
        let t0 = Instant::now();
        lc.arm(t0);
        lc.advance_to(t0 + ms(1_000));

        lc.reset();
        lc.advance_to(t0 + ms(10_000));

        assert_eq!(lc.state(), TrialState::Idle);
        assert!(lc.lights().is_dark());
        assert_eq!(lc.next_deadline(), None);
    }
}
