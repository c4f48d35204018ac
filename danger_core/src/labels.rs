//! Danger categories and their spoken phrases.
//!
use std::fmt;

use common::Label;

/// Labels meaning "nothing in the way".
pub const CLEAR_LABELS: [Label; 3] = [Label(0), Label(8), Label(9)];

/// Label of a pedestrian crossing directly ahead.
pub const CROSSWALK_LABEL: Label = Label(91);

/// Category an alert is announced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DangerCategory {
    Tree,
    Person,
    Pillar,
    Vehicle,
    Wall,
    Door,
    Crosswalk,
    /// Any other non-clear label.
    Obstacle,
}

impl DangerCategory {
    pub fn from_label(label: Label) -> Self {
        match label {
            Label(2) => DangerCategory::Tree,
            Label(3) => DangerCategory::Person,
            Label(4) => DangerCategory::Pillar,
            Label(5) => DangerCategory::Vehicle,
            Label(6) => DangerCategory::Wall,
            Label(7) => DangerCategory::Door,
            CROSSWALK_LABEL => DangerCategory::Crosswalk,
            _ => DangerCategory::Obstacle,
        }
    }

    /// Phrase forwarded to the speech layer.
    pub fn phrase(self) -> &'static str {
        match self {
            DangerCategory::Tree => "There is a tree ahead",
            DangerCategory::Person => "There is a person ahead",
            DangerCategory::Pillar => "There is a pillar ahead",
            DangerCategory::Vehicle => "There is a vehicle ahead",
            DangerCategory::Wall => "There is a wall ahead",
            DangerCategory::Door => "There is a door ahead",
            DangerCategory::Crosswalk => "There is a crosswalk ahead",
            DangerCategory::Obstacle => "There is an obstacle ahead",
        }
    }

    /// A crosswalk is announced but leaves the walker in the safe state.
    pub fn is_safe(self) -> bool {
        self == DangerCategory::Crosswalk
    }
}

/// An announcement chosen by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertMessage {
    /// Majority label the alert was derived from.
    pub label: Label,
    pub category: DangerCategory,
}

impl AlertMessage {
    pub fn for_label(label: Label) -> Self {
        Self {
            label,
            category: DangerCategory::from_label(label),
        }
    }

    pub fn text(&self) -> &'static str {
        self.category.phrase()
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
