//! Temporal smoothing of the per-frame label stream.
//!
//! The classifier output flickers from frame to frame. The debouncer keeps a
//! fixed window of the most recent labels and only speaks when
//!
//! - no label in the window says the way is clear, and
//! - more than `cooldown` has passed since the previous announcement.
//!
//! The announced category is the majority label of the window. Ties go to
//! the lowest label code so the outcome never depends on hash order.
//!
//! An older policy (10 labels, announce when the bitwise AND of the whole
//! window equals 1, one generic phrase, 3 s cooldown) is not supported.
use std::{cmp::Reverse, collections::VecDeque, time::Duration};

use common::{Error, Label, Result};
use itertools::Itertools;

use crate::labels::{AlertMessage, CLEAR_LABELS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Number of labels in the voting window.
    pub history_len: usize,
    /// Minimum time between two announcements.
    pub cooldown: Duration,
    /// Any of these in the window forces the safe state.
    pub clear_labels: Vec<Label>,
    /// Label the window is filled with at start.
    pub initial_label: Label,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            cooldown: Duration::from_millis(1500),
            clear_labels: CLEAR_LABELS.to_vec(),
            initial_label: Label(0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SafetyState {
    #[default]
    Safe,
    Unsafe,
}

/// Majority-vote alert debouncer.
#[derive(Debug)]
pub struct AlertDebouncer {
    history: VecDeque<Label>,
    clear_labels: Vec<Label>,
    cooldown: Duration,
    /// Time accumulated since the last announcement.
    elapsed: Duration,
    state: SafetyState,
}

impl AlertDebouncer {
    pub fn new(config: &DebounceConfig) -> Result<Self> {
        if config.history_len == 0 {
            return Err(Error::invalid_config(
                "alert history length must be at least 1",
            ));
        }

        Ok(Self {
            history: std::iter::repeat(config.initial_label)
                .take(config.history_len)
                .collect(),
            clear_labels: config.clear_labels.clone(),
            cooldown: config.cooldown,
            elapsed: Duration::ZERO,
            state: SafetyState::Safe,
        })
    }

    /// Push the label of the latest frame.
    ///
    /// `elapsed` is the time since the previous call and advances the
    /// cooldown accumulator. Returns the message to speak, if any.
    pub fn update(&mut self, label: Label, elapsed: Duration) -> Option<AlertMessage> {
        self.history.pop_front();
        self.history.push_back(label);
        self.elapsed = self.elapsed.saturating_add(elapsed);

        if self.history.iter().any(|l| self.clear_labels.contains(l)) {
            self.state = SafetyState::Safe;
            return None;
        }

        if self.elapsed <= self.cooldown {
            return None;
        }

        let alert = AlertMessage::for_label(self.majority_label());
        self.elapsed = Duration::ZERO;
        self.state = if alert.category.is_safe() {
            SafetyState::Safe
        } else {
            SafetyState::Unsafe
        };

        log::debug!(
            "Alert for label {} ({:?}), state now {:?}",
            alert.label,
            alert.category,
            self.state
        );

        Some(alert)
    }

    /// Most frequent label in the window, lowest code on ties.
    pub fn majority_label(&self) -> Label {
        self.history
            .iter()
            .counts()
            .into_iter()
            .max_by_key(|&(label, count)| (count, Reverse(*label)))
            .map(|(label, _)| *label)
            .unwrap_or_default()
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Window contents, oldest first.
    pub fn history(&self) -> impl Iterator<Item = Label> + '_ {
        self.history.iter().copied()
    }
}
