use std::fmt;

/// Number of trials in a session
pub const MAX_TRIES: usize = 5;

/// Rounded mean of the reaction times, None when there are none
pub fn average(times: &[u64]) -> Option<u64> {
    if times.is_empty() {
        return None;
    }
    let len = times.len() as u64;
    let sum: u64 = times.iter().sum();
    // half rounds up
    Some((sum * 2 + len) / (len * 2))
}

pub fn best(times: &[u64]) -> Option<u64> {
    times.iter().copied().min()
}

/// Trials recorded so far in the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    reaction_times: Vec<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tries(&self) -> usize {
        self.reaction_times.len()
    }

    pub fn reaction_times(&self) -> &[u64] {
        &self.reaction_times
    }

    pub fn is_complete(&self) -> bool {
        self.tries() >= MAX_TRIES
    }

    /// Append a reaction time. Returns false once the session is full.
    pub fn record(&mut self, ms: u64) -> bool {
        if self.is_complete() {
            return false;
        }
        self.reaction_times.push(ms);
        true
    }

    pub fn last(&self) -> Option<u64> {
        self.reaction_times.last().copied()
    }

    pub fn average(&self) -> Option<u64> {
        average(&self.reaction_times)
    }

    pub fn best(&self) -> Option<u64> {
        best(&self.reaction_times)
    }

    pub fn reset(&mut self) {
        self.reaction_times.clear();
    }
}

/// Rating of a finished session, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
pub enum Verdict {
    PilotReflexes,
    VerySolid,
    Decent,
    NeedsPolish,
}

impl Verdict {
    /// Tier for a session average; upper bounds are inclusive
    pub fn from_average(avg: u64) -> Self {
        if avg <= 260 {
            Verdict::PilotReflexes
        } else if avg <= 320 {
            Verdict::VerySolid
        } else if avg <= 380 {
            Verdict::Decent
        } else {
            Verdict::NeedsPolish
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::PilotReflexes => "Réflexes de pilote !",
            Verdict::VerySolid => "Très solide",
            Verdict::Decent => "Correct",
            Verdict::NeedsPolish => "À polir",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Verdict::PilotReflexes => "🏁",
            Verdict::VerySolid => "🔥",
            Verdict::Decent => "👌",
            Verdict::NeedsPolish => "✨",
        }
    }
}

/// Outcome of a completed session, after the records were checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub times: Vec<u64>,
    pub average: u64,
    pub best: u64,
    pub verdict: Verdict,
    pub record_average: Option<u64>,
    pub record_single: Option<u64>,
    pub new_average_record: bool,
    pub new_single_record: bool,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Moyenne: {} ms • Meilleur: {} ms", self.average, self.best)?;
        if let Some(avg) = self.record_average {
            write!(f, " • Record moy.: {} ms", avg)?;
        }
        if let Some(single) = self.record_single {
            write!(f, " • Record single: {} ms", single)?;
        }
        write!(f, " — {} {}", self.verdict.label(), self.verdict.emoji())
    }
}
