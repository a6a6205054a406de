//! Sliding window over an agent's history, with adaptive shrinking.

use parley_config::ContextConfig;
use parley_core::message::Message;
use tracing::info;

/// The system message(s) plus the last `limit` non-system messages, in
/// original order. The system message never counts toward `limit`.
pub fn windowed_messages(messages: &[Message], limit: usize) -> Vec<Message> {
    let non_system = messages.iter().filter(|m| !m.is_system()).count();
    let skip = non_system.saturating_sub(limit);

    let mut seen = 0;
    messages
        .iter()
        .filter(|m| {
            if m.is_system() {
                return true;
            }
            seen += 1;
            seen > skip
        })
        .cloned()
        .collect()
}

/// `max(minimum, floor(current * 0.6))`, plus whether anything changed.
pub fn reduce_limit(current: usize, minimum: usize) -> (usize, bool) {
    if current <= minimum {
        return (current, false);
    }
    (minimum.max(current * 3 / 5), true)
}

/// Outcome of one shrink request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Reduced { from: usize, to: usize },
    AtMinimum,
}

/// Per-agent window size, bounded by `[minimum, maximum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimit {
    current: usize,
    minimum: usize,
    maximum: usize,
}

impl ContextLimit {
    /// Starts at `maximum`.
    pub fn new(maximum: usize, minimum: usize) -> Self {
        let minimum = minimum.min(maximum);
        Self {
            current: maximum,
            minimum,
            maximum,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn minimum(&self) -> usize {
        self.minimum
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn can_reduce(&self) -> bool {
        self.current > self.minimum
    }

    pub fn reduce(&mut self) -> Reduction {
        let from = self.current;
        match reduce_limit(from, self.minimum) {
            (to, true) => {
                self.current = to;
                Reduction::Reduced { from, to }
            }
            _ => Reduction::AtMinimum,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.maximum;
    }
}

/// The context policy one agent applies to every call.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    enabled: bool,
    adaptive: bool,
    limit: ContextLimit,
}

impl ContextWindow {
    pub fn new(enabled: bool, adaptive: bool, limit: ContextLimit) -> Self {
        Self {
            enabled,
            adaptive,
            limit,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(
            config.enabled,
            config.adaptive_reduction,
            ContextLimit::new(config.max_messages, config.min_messages),
        )
    }

    /// The messages to send; the full history when windowing is off.
    pub fn window(&self, messages: &[Message]) -> Vec<Message> {
        if self.enabled {
            windowed_messages(messages, self.limit.current())
        } else {
            messages.to_vec()
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.current()
    }

    /// Shrinking needs windowing, adaptive reduction, and headroom above the floor.
    pub fn can_shrink(&self) -> bool {
        self.enabled && self.adaptive && self.limit.can_reduce()
    }

    pub fn shrink(&mut self) -> Reduction {
        if !self.enabled || !self.adaptive {
            return Reduction::AtMinimum;
        }
        let reduction = self.limit.reduce();
        if let Reduction::Reduced { from, to } = reduction {
            info!(from, to, "Reduced context window");
        }
        reduction
    }

    pub fn reset(&mut self) {
        self.limit.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(pairs: usize) -> Vec<Message> {
        let mut msgs = vec![Message::system("persona")];
        for i in 0..pairs {
            msgs.push(Message::user(format!("u{i}")));
            msgs.push(Message::assistant(format!("a{i}")));
        }
        msgs
    }

    #[test]
    fn window_keeps_system_and_last_n() {
        let msgs = history(5);
        let out = windowed_messages(&msgs, 3);
        let contents: Vec<&str> = out.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["persona", "a3", "u4", "a4"]);
    }

    #[test]
    fn window_larger_than_history_returns_everything() {
        let msgs = history(2);
        assert_eq!(windowed_messages(&msgs, 50), msgs);
    }

    #[test]
    fn window_without_system_message() {
        let msgs = vec![Message::user("u0"), Message::assistant("a0"), Message::user("u1")];
        let out = windowed_messages(&msgs, 2);
        assert_eq!(out, vec![Message::assistant("a0"), Message::user("u1")]);
    }

    #[test]
    fn window_zero_keeps_only_system() {
        assert_eq!(windowed_messages(&history(3), 0), vec![Message::system("persona")]);
    }

    #[test]
    fn reduction_sequence_stops_at_minimum() {
        let mut limit = ContextLimit::new(20, 4);
        let mut seen = vec![limit.current()];
        let mut last = Reduction::AtMinimum;
        for _ in 0..4 {
            last = limit.reduce();
            seen.push(limit.current());
        }
        assert_eq!(seen, vec![20, 12, 7, 4, 4]);
        assert_eq!(last, Reduction::AtMinimum);
        assert!(!limit.can_reduce());
    }

    #[test]
    fn reduce_limit_is_pure() {
        assert_eq!(reduce_limit(20, 4), (12, true));
        assert_eq!(reduce_limit(5, 4), (4, true));
        assert_eq!(reduce_limit(4, 4), (4, false));
    }

    #[test]
    fn reset_restores_maximum() {
        let mut limit = ContextLimit::new(20, 4);
        limit.reduce();
        limit.reduce();
        limit.reset();
        assert_eq!(limit.current(), 20);
    }

    #[test]
    fn disabled_window_sends_everything_and_never_shrinks() {
        let mut window = ContextWindow::new(false, true, ContextLimit::new(2, 1));
        let msgs = history(4);
        assert_eq!(window.window(&msgs).len(), msgs.len());
        assert!(!window.can_shrink());
        assert_eq!(window.shrink(), Reduction::AtMinimum);
        assert_eq!(window.limit(), 2);
    }

    #[test]
    fn non_adaptive_window_never_shrinks() {
        let window = ContextWindow::new(true, false, ContextLimit::new(20, 4));
        assert!(!window.can_shrink());
    }

    #[test]
    fn from_config_uses_maximum() {
        let window = ContextWindow::from_config(&ContextConfig::default());
        assert_eq!(window.limit(), 20);
        assert!(window.can_shrink());
    }
}
