//! Debounced, keyed, single-shot actions driven by the frame clock.
//!
//! Times are seconds on the same clock the caller reads from
//! `egui::InputState::time`, so nothing here owns a thread or a timer.

use std::collections::HashMap;
use std::hash::Hash;

/// The debounced jobs the editor schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    AutoRun,
    AutoHint,
}

struct Pending<A> {
    deadline: f64,
    action: A,
}

pub struct Debouncer<K, A> {
    pending: HashMap<K, Pending<A>>,
}

impl<K, A> Default for Debouncer<K, A> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq + Copy + std::fmt::Debug, A> Debouncer<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever is pending under `key` with `action`, due `delay`
    /// seconds after `now`.
    pub fn schedule(&mut self, key: K, delay: f64, action: A, now: f64) {
        let deadline = now + delay.max(0.0);
        tracing::trace!(?key, deadline, "debounce armed");
        self.pending.insert(key, Pending { deadline, action });
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.pending.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Removes and returns the actions that are due, earliest first.
    pub fn poll(&mut self, now: f64) -> Vec<(K, A)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| *k)
            .collect();
        let mut fired: Vec<(f64, K, A)> = due
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (p.deadline, k, p.action)))
            .collect();
        fired.sort_by(|a, b| a.0.total_cmp(&b.0));
        fired.into_iter().map(|(_, k, a)| (k, a)).collect()
    }

    /// Earliest pending deadline, for scheduling the next repaint.
    pub fn next_deadline(&self) -> Option<f64> {
        self.pending.values().map(|p| p.deadline).min_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_calls_collapse_into_one_firing() {
        let mut d = Debouncer::new();
        let delay = 1.0;
        let calls = [0.0, 0.25, 0.5, 0.75, 1.25];
        for (i, t) in calls.iter().enumerate() {
            d.schedule(Trigger::AutoRun, delay, i, *t);
            assert!(d.poll(*t).is_empty());
        }
        assert_eq!(d.next_deadline(), Some(2.25));
        assert!(d.poll(2.0).is_empty());
        assert_eq!(d.poll(2.25), vec![(Trigger::AutoRun, 4)]);
        assert!(d.poll(10.0).is_empty());
        assert_eq!(d.next_deadline(), None);
    }

    #[test]
    fn keys_are_independent() {
        let mut d = Debouncer::new();
        d.schedule(Trigger::AutoRun, 1.0, "run", 0.0);
        d.schedule(Trigger::AutoHint, 0.3, "hint", 0.0);
        assert_eq!(d.poll(0.5), vec![(Trigger::AutoHint, "hint")]);
        assert!(d.is_pending(Trigger::AutoRun));
        assert_eq!(d.poll(1.5), vec![(Trigger::AutoRun, "run")]);
    }

    #[test]
    fn cancel_clears_the_pending_action() {
        let mut d = Debouncer::new();
        d.schedule(Trigger::AutoRun, 1.0, (), 0.0);
        assert!(d.cancel(Trigger::AutoRun));
        assert!(!d.cancel(Trigger::AutoRun));
        assert!(d.poll(5.0).is_empty());
    }

    #[test]
    fn due_actions_come_out_earliest_first() {
        let mut d = Debouncer::new();
        d.schedule(Trigger::AutoRun, 0.2, 'r', 0.0);
        d.schedule(Trigger::AutoHint, 0.1, 'h', 0.0);
        assert_eq!(d.poll(1.0), vec![(Trigger::AutoHint, 'h'), (Trigger::AutoRun, 'r')]);
    }
}
