//! Removal of the trailing "stop recording" gesture from action events.
//!
//! The recorder is stopped by the operator typing a key gesture, which is
//! captured like any other input. Two gestures are recognised, in order:
//!
//! 1. Ctrl+C: the last two events are a held `ctrl` followed by `c`. The keys
//!    are held together, so no release of `c` is recorded.
//! 2. A configured stop sequence, matched backwards from the tail with a
//!    [`SequenceMatcher`]. Release events of any key in the sequence may be
//!    interleaved anywhere.
//!
//! Only the in-memory list is trimmed; stored rows are untouched.

use tapedeck_types::{ActionEvent, ActionName};

/// Backward-match progress of one candidate stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Still consuming; `cursor` is the index of the next token to find.
    Scanning { cursor: usize, consumed: usize },
    /// Every token was found; `consumed` counts presses and releases.
    Matched { consumed: usize },
    /// An event fit neither rule.
    Halted { consumed: usize },
}

/// State machine matching one stop sequence against events fed newest first.
#[derive(Debug, Clone)]
pub struct SequenceMatcher<'a> {
    sequence: &'a [String],
    state: MatchState,
}

impl<'a> SequenceMatcher<'a> {
    pub fn new(sequence: &'a [String]) -> Self {
        let state = match sequence.len() {
            // nothing to match against
            0 => MatchState::Halted { consumed: 0 },
            n => MatchState::Scanning {
                cursor: n - 1,
                consumed: 0,
            },
        };
        Self { sequence, state }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Feed the next (older) event. Terminal states ignore further input.
    pub fn feed(&mut self, event: &ActionEvent) -> MatchState {
        let MatchState::Scanning { cursor, consumed } = self.state else {
            return self.state;
        };

        self.state = if event.name == ActionName::Press && event.matches_key(&self.sequence[cursor])
        {
            match cursor {
                0 => MatchState::Matched {
                    consumed: consumed + 1,
                },
                _ => MatchState::Scanning {
                    cursor: cursor - 1,
                    consumed: consumed + 1,
                },
            }
        } else if event.name == ActionName::Release
            && self.sequence.iter().any(|token| event.matches_key(token))
        {
            MatchState::Scanning {
                cursor,
                consumed: consumed + 1,
            }
        } else {
            MatchState::Halted { consumed }
        };
        self.state
    }

    /// Run the matcher over `events` from the newest backwards.
    pub fn match_tail(sequence: &'a [String], events: &[ActionEvent]) -> MatchState {
        let mut matcher = Self::new(sequence);
        for event in events.iter().rev() {
            if !matches!(matcher.feed(event), MatchState::Scanning { .. }) {
                break;
            }
        }
        matcher.state()
    }
}

/// What [`filter_stop_sequences`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    /// The trailing Ctrl+C pair was removed.
    CtrlC,
    /// Configured sequence `index` matched and `removed` events were dropped.
    Sequence { index: usize, removed: usize },
    Untouched,
}

impl TrimOutcome {
    pub fn removed(&self) -> usize {
        match self {
            TrimOutcome::CtrlC => 2,
            TrimOutcome::Sequence { removed, .. } => *removed,
            TrimOutcome::Untouched => 0,
        }
    }
}

fn ends_with_ctrl_c(events: &[ActionEvent]) -> bool {
    let [.., second_last, last] = events else {
        return false;
    };
    last.canonical_key_char
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case("c"))
        && second_last.canonical_key_name.as_deref() == Some("ctrl")
}

/// Strip a trailing stop gesture from `events` in place.
///
/// Ctrl+C is checked first and wins outright. Otherwise `stop_sequences` are
/// tried in order and the first full match is removed.
pub fn filter_stop_sequences(
    events: &mut Vec<ActionEvent>,
    stop_sequences: &[Vec<String>],
) -> TrimOutcome {
    if ends_with_ctrl_c(events) {
        events.truncate(events.len() - 2);
        tracing::debug!(target: "tapedeck::trim", "Removed trailing ctrl+c");
        return TrimOutcome::CtrlC;
    }

    for (index, sequence) in stop_sequences.iter().enumerate() {
        if let MatchState::Matched { consumed } = SequenceMatcher::match_tail(sequence, events) {
            events.truncate(events.len() - consumed);
            tracing::debug!(
                target: "tapedeck::trim",
                "Removed stop sequence {:?} ({} events)",
                sequence,
                consumed
            );
            return TrimOutcome::Sequence {
                index,
                removed: consumed,
            };
        }
    }

    TrimOutcome::Untouched
}
