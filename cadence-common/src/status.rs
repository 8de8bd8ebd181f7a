//! Status channel message grammar.
//!
//! One message per "line", each carrying a display priority. The
//! Supervisor's status multiplexer keeps whichever message has the
//! highest priority not yet superseded.

use std::fmt;

/// A status message emitted by the Scheduler, Player, or Supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// `playing:song_id:title`
    Playing { song_id: String, title: String },
    /// `buffering:song_id:percent`
    Buffering { song_id: String, percent: f32 },
    /// `processing:song_id`
    Processing { song_id: String },
    /// `download:song_id:percent`
    Download { song_id: String, percent: f32 },
    /// `audio:free-form text`
    Audio { message: String },
    /// `error:song_id:message`
    Error { song_id: String, message: String },
    /// `loader:complete`
    LoaderComplete,
    /// `playback:complete`
    PlaybackComplete,
}

impl StatusEvent {
    /// Display priority. `Error` is always the maximum ("always wins").
    pub fn priority(&self) -> u16 {
        match self {
            StatusEvent::Error { .. } => u16::MAX,
            StatusEvent::Playing { .. } => 6,
            StatusEvent::Buffering { .. } => 5,
            StatusEvent::Processing { .. } => 4,
            StatusEvent::Download { .. } => 4,
            StatusEvent::Audio { .. } => 2,
            // Control messages aren't ranked for display superseding;
            // they drive state machine transitions instead.
            StatusEvent::LoaderComplete | StatusEvent::PlaybackComplete => 0,
        }
    }

    /// True for the two control messages that drive lifecycle rather
    /// than being displayed.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            StatusEvent::LoaderComplete | StatusEvent::PlaybackComplete
        )
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Playing { song_id, title } => write!(f, "playing:{song_id}:{title}"),
            StatusEvent::Buffering { song_id, percent } => {
                write!(f, "buffering:{song_id}:{percent}")
            }
            StatusEvent::Processing { song_id } => write!(f, "processing:{song_id}"),
            StatusEvent::Download { song_id, percent } => write!(f, "download:{song_id}:{percent}"),
            StatusEvent::Audio { message } => write!(f, "audio:{message}"),
            StatusEvent::Error { song_id, message } => write!(f, "error:{song_id}:{message}"),
            StatusEvent::LoaderComplete => write!(f, "loader:complete"),
            StatusEvent::PlaybackComplete => write!(f, "playback:complete"),
        }
    }
}

/// Tracks the latest message whose priority is at least the currently
/// displayed one's, with two exceptions: `playing` while paused may be
/// superseded by any message, and `error` always displays.
#[derive(Debug, Default)]
pub struct StatusDisplay {
    current: Option<StatusEvent>,
    paused: bool,
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Offer a new event; returns true if it became the displayed event.
    pub fn offer(&mut self, event: StatusEvent) -> bool {
        if matches!(event, StatusEvent::Error { .. }) {
            self.current = Some(event);
            return true;
        }
        let supersede = match &self.current {
            None => true,
            Some(StatusEvent::Error { .. }) => false,
            Some(StatusEvent::Playing { .. }) if self.paused => true,
            Some(current) => event.priority() >= current.priority(),
        };
        if supersede {
            self.current = Some(event);
        }
        supersede
    }

    pub fn current(&self) -> Option<&StatusEvent> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_always_wins() {
        let mut d = StatusDisplay::new();
        d.offer(StatusEvent::Playing {
            song_id: "A".into(),
            title: "Song A".into(),
        });
        let superseded = d.offer(StatusEvent::Audio {
            message: "noop".into(),
        });
        assert!(!superseded);
        let took = d.offer(StatusEvent::Error {
            song_id: "A".into(),
            message: "boom".into(),
        });
        assert!(took);
        assert!(matches!(d.current(), Some(StatusEvent::Error { .. })));
    }

    #[test]
    fn lower_priority_does_not_supersede() {
        let mut d = StatusDisplay::new();
        d.offer(StatusEvent::Playing {
            song_id: "A".into(),
            title: "Song A".into(),
        });
        let superseded = d.offer(StatusEvent::Processing {
            song_id: "B".into(),
        });
        assert!(!superseded);
        assert!(matches!(d.current(), Some(StatusEvent::Playing { .. })));
    }

    #[test]
    fn playing_while_paused_is_superseded_by_anything() {
        let mut d = StatusDisplay::new();
        d.offer(StatusEvent::Playing {
            song_id: "A".into(),
            title: "Song A".into(),
        });
        d.set_paused(true);
        let superseded = d.offer(StatusEvent::Audio {
            message: "paused".into(),
        });
        assert!(superseded);
    }

    #[test]
    fn display_format_matches_grammar() {
        let e = StatusEvent::Buffering {
            song_id: "A".into(),
            percent: 42.5,
        };
        assert_eq!(e.to_string(), "buffering:A:42.5");
    }
}
