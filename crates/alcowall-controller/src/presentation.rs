//! What the kiosk screen should show.
//!
//! The controller owns a [`PresentationPublisher`] and updates it as the
//! workflow progresses. Renderers hold a `watch::Receiver<Presentation>` and
//! redraw whenever the value changes. Updates that leave the value unchanged
//! do not wake receivers.

use crate::state_machine::KioskPhase;
use alcowall_core::constants::PROXIMITY_CLOSE_RANGE_CM;
use alcowall_storage::HighscoreRecord;
use serde::Serialize;
use tokio::sync::watch;

/// Hint shown while the user stands outside the measuring range.
pub const COME_CLOSER_HINT: &str = "come closer";

/// Snapshot of everything the screen displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presentation {
    pub phase: KioskPhase,
    /// Credit in cents.
    pub credit: i64,
    /// Countdown steps left while Measuring.
    pub countdown: Option<u32>,
    /// Result of the current cycle while Displaying.
    pub shown_level: Option<f64>,
    /// [`COME_CLOSER_HINT`] when the user is out of range.
    pub proximity_hint: Option<&'static str>,
    pub highscores: Option<HighscoreRecord>,
    pub fun_fact: Option<String>,
    pub ad_url: Option<String>,
    /// Currently active hardware fault.
    pub fault: Option<&'static str>,
    /// Reason the last cycle was cut short.
    pub last_abort: Option<String>,
}

/// Proximity hint for a distance reading in centimeters.
///
/// Unread sensors report a negative distance and therefore also get the hint.
pub fn proximity_hint(distance_cm: i32) -> Option<&'static str> {
    (!PROXIMITY_CLOSE_RANGE_CM.contains(&distance_cm)).then_some(COME_CLOSER_HINT)
}

/// Sending half of the presentation channel.
#[derive(Debug)]
pub struct PresentationPublisher {
    tx: watch::Sender<Presentation>,
}

impl PresentationPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Presentation::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Presentation> {
        self.tx.subscribe()
    }

    /// Current value.
    pub fn current(&self) -> Presentation {
        self.tx.borrow().clone()
    }

    /// Modify the presentation in place, notifying receivers only on change.
    pub fn update(&self, modify: impl FnOnce(&mut Presentation)) {
        self.tx.send_if_modified(|presentation| {
            let before = presentation.clone();
            modify(presentation);
            *presentation != before
        });
    }
}

impl Default for PresentationPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unread(-1, Some(COME_CLOSER_HINT))]
    #[case::touching(0, None)]
    #[case::close(19, None)]
    #[case::edge(20, Some(COME_CLOSER_HINT))]
    #[case::far(150, Some(COME_CLOSER_HINT))]
    fn test_proximity_hint(#[case] distance: i32, #[case] expected: Option<&'static str>) {
        assert_eq!(proximity_hint(distance), expected);
    }

    #[tokio::test]
    async fn test_update_notifies_on_change_only() {
        let publisher = PresentationPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.update(|p| p.credit = 0);
        assert!(!rx.has_changed().unwrap());

        publisher.update(|p| {
            p.credit = 150;
            p.phase = KioskPhase::Measuring;
        });
        assert!(rx.has_changed().unwrap());

        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.credit, 150);
        assert_eq!(seen.phase, KioskPhase::Measuring);
        assert_eq!(publisher.current(), seen);
    }

    #[test]
    fn test_serializes_for_renderers() {
        let presentation = Presentation {
            phase: KioskPhase::Displaying,
            shown_level: Some(0.42),
            ..Presentation::default()
        };
        let json = serde_json::to_value(&presentation).unwrap();

        assert_eq!(json["phase"], "displaying");
        assert_eq!(json["shown_level"], 0.42);
        assert!(json["fun_fact"].is_null());
    }
}
