//! Priority queue whose order is recomputed on every consultation.
//!
//! Scores depend on the clock (urgency, aging), so a heap keyed at insert
//! time would go stale. The queue keeps items in insertion order and ranks
//! them through a [`RuleEngine`] when asked. Ties that survive every rule
//! resolve by insertion sequence, which makes the order total.

use std::cmp::Ordering;

use super::{DispatchContext, Dispatchable, RuleEngine};

#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    item: T,
}

/// Re-evaluated priority queue.
#[derive(Debug, Clone)]
pub struct DispatchQueue<T> {
    entries: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> DispatchQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an item. Returns its sequence number.
    pub fn push(&mut self, item: T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { seq, item });
        seq
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    /// Mutable items in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|e| &mut e.item)
    }

    /// Looks up an item by sequence number.
    pub fn get(&self, seq: u64) -> Option<&T> {
        self.entries.iter().find(|e| e.seq == seq).map(|e| &e.item)
    }

    /// Removes an item by sequence number.
    pub fn remove(&mut self, seq: u64) -> Option<T> {
        let pos = self.entries.iter().position(|e| e.seq == seq)?;
        Some(self.entries.remove(pos).item)
    }

    /// Whether any queued item satisfies `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.entries.iter().any(|e| pred(&e.item))
    }

    /// Keeps only items satisfying `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|e| keep(&e.item));
    }

    /// Removes and returns every item in insertion order.
    pub fn drain(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|e| e.item).collect()
    }
}

impl<T: Dispatchable> DispatchQueue<T> {
    fn order(&self, engine: &RuleEngine<T>, ctx: &DispatchContext, a: &Entry<T>, b: &Entry<T>) -> Ordering {
        engine
            .compare(&a.item, &b.item, ctx)
            .then_with(|| a.seq.cmp(&b.seq))
    }

    /// Sequence numbers ranked best first.
    pub fn ranked(&self, engine: &RuleEngine<T>, ctx: &DispatchContext) -> Vec<u64> {
        let mut refs: Vec<&Entry<T>> = self.entries.iter().collect();
        refs.sort_by(|a, b| self.order(engine, ctx, a, b));
        refs.into_iter().map(|e| e.seq).collect()
    }

    /// The best item without removing it.
    pub fn peek_best(&self, engine: &RuleEngine<T>, ctx: &DispatchContext) -> Option<&T> {
        self.entries
            .iter()
            .min_by(|a, b| self.order(engine, ctx, a, b))
            .map(|e| &e.item)
    }

    /// Removes and returns the best item.
    pub fn pop_best(&mut self, engine: &RuleEngine<T>, ctx: &DispatchContext) -> Option<T> {
        let seq = self
            .entries
            .iter()
            .min_by(|a, b| self.order(engine, ctx, a, b))
            .map(|e| e.seq)?;
        self.remove(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::{rules, DispatchingRule, EvaluationMode, RuleScore};
    use crate::sim::SimTime;

    #[derive(Debug, Clone, PartialEq)]
    struct Job {
        id: String,
        queued: f64,
        priority: f64,
    }

    impl Dispatchable for Job {
        fn dispatch_id(&self) -> &str {
            &self.id
        }

        fn queued_at(&self) -> SimTime {
            SimTime(self.queued)
        }
    }

    #[derive(Debug)]
    struct ByPriority;

    impl DispatchingRule<Job> for ByPriority {
        fn name(&self) -> &'static str {
            "PRIORITY"
        }

        fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
            job.priority
        }
    }

    fn job(id: &str, queued: f64, priority: f64) -> Job {
        Job {
            id: id.into(),
            queued,
            priority,
        }
    }

    #[test]
    fn test_equal_scores_pop_in_insertion_order() {
        let engine = RuleEngine::new().with_rule(ByPriority);
        let ctx = DispatchContext::at(SimTime::ZERO);
        let mut q = DispatchQueue::new();
        for id in ["x", "y", "z"] {
            q.push(job(id, 0.0, 1.0));
        }
        let order: Vec<String> = std::iter::from_fn(|| q.pop_best(&engine, &ctx).map(|j| j.id)).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_aging_overtakes_better_priority() {
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_rule(ByPriority)
            .with_rule(rules::Aging);
        let mut q = DispatchQueue::new();
        q.push(job("old", 0.0, 5.0));
        q.push(job("fresh", 40.0, 1.0));

        let early = DispatchContext::at(SimTime(40.0)).with_aging_rate(0.05);
        assert_eq!(q.peek_best(&engine, &early).unwrap().id, "fresh");

        let late = DispatchContext::at(SimTime(40.0)).with_aging_rate(0.5);
        assert_eq!(q.peek_best(&engine, &late).unwrap().id, "old");
    }

    #[test]
    fn test_ranked_and_remove() {
        let engine = RuleEngine::new().with_rule(ByPriority);
        let ctx = DispatchContext::at(SimTime::ZERO);
        let mut q = DispatchQueue::new();
        let a = q.push(job("a", 0.0, 3.0));
        let b = q.push(job("b", 0.0, 1.0));
        let c = q.push(job("c", 0.0, 2.0));

        assert_eq!(q.ranked(&engine, &ctx), vec![b, c, a]);
        assert_eq!(q.remove(c).map(|j| j.id), Some("c".to_string()));
        assert!(q.remove(c).is_none());
        assert_eq!(q.len(), 2);
        assert!(q.any(|j| j.id == "a"));
        q.retain(|j| j.id != "a");
        assert_eq!(q.drain().len(), 1);
        assert!(q.is_empty());
    }
}
