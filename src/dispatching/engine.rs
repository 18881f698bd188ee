//! Ordering of queued work by stacked or weighted rules.
//!
//! Maintenance tasks, truck jobs and berth candidates all rank through a
//! [`RuleEngine`]; only the rule set differs.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::cmp::Ordering;
use std::sync::Arc;

use super::{DispatchContext, Dispatchable, DispatchingRule, RuleScore};

/// How the rule scores of one item are folded together.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Rules in order; a later rule only decides ties of the earlier ones.
    #[default]
    Sequential,
    /// Compute weighted sum of all weighted rules; zero-weight rules break ties.
    Weighted,
}

/// What decides a tie left after every rule.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Leave tied items in their current order.
    #[default]
    NextRule,
    /// Deterministic by item id (lexicographic).
    ById,
}

struct WeightedRule<T> {
    rule: Arc<dyn DispatchingRule<T>>,
    weight: f64,
}

impl<T> Clone for WeightedRule<T> {
    fn clone(&self) -> Self {
        Self {
            rule: Arc::clone(&self.rule),
            weight: self.weight,
        }
    }
}

/// A composable rule engine for item prioritization.
///
/// Supports sequential multi-layer evaluation (primary rule → tie-breaker)
/// and weighted combination modes.
pub struct RuleEngine<T> {
    rules: Vec<WeightedRule<T>>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl<T> Clone for RuleEngine<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            mode: self.mode.clone(),
            tie_breaker: self.tie_breaker.clone(),
            epsilon: self.epsilon,
        }
    }
}

impl<T> RuleEngine<T> {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: DispatchingRule<T> + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: DispatchingRule<T> + 'static>(
        mut self,
        rule: R,
        weight: f64,
    ) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Adds a tie-breaking rule (weight 0.0).
    pub fn with_tie_breaker<R: DispatchingRule<T> + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 0.0,
        });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Evaluates a single item and returns the weighted score of each rule.
    pub fn evaluate(&self, item: &T, context: &DispatchContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(item, context) * wr.weight)
            .collect()
    }

    /// Combined score: weighted sum in `Weighted` mode, first rule otherwise.
    pub fn score(&self, item: &T, context: &DispatchContext) -> RuleScore {
        match self.mode {
            EvaluationMode::Weighted => self.weighted_score(item, context),
            EvaluationMode::Sequential => self
                .rules
                .first()
                .map(|wr| wr.rule.evaluate(item, context))
                .unwrap_or(0.0),
        }
    }

    fn weighted_score(&self, item: &T, context: &DispatchContext) -> f64 {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(item, context) * wr.weight)
            .sum()
    }

    fn compare_rules<'r>(
        &self,
        rules: impl Iterator<Item = &'r WeightedRule<T>>,
        a: &T,
        b: &T,
        context: &DispatchContext,
    ) -> Ordering
    where
        T: 'r,
    {
        for wr in rules {
            let score_a = wr.rule.evaluate(a, context);
            let score_b = wr.rule.evaluate(b, context);
            if (score_a - score_b).abs() > self.epsilon {
                return score_a.total_cmp(&score_b);
            }
        }
        Ordering::Equal
    }
}

impl<T: Dispatchable> RuleEngine<T> {
    /// Total order between two items (`Less` = `a` goes first).
    pub fn compare(&self, a: &T, b: &T, context: &DispatchContext) -> Ordering {
        let by_rules = match self.mode {
            EvaluationMode::Sequential => self.compare_rules(self.rules.iter(), a, b, context),
            EvaluationMode::Weighted => {
                let score_a = self.weighted_score(a, context);
                let score_b = self.weighted_score(b, context);
                if (score_a - score_b).abs() > self.epsilon {
                    score_a.total_cmp(&score_b)
                } else {
                    self.compare_rules(
                        self.rules.iter().filter(|wr| wr.weight == 0.0),
                        a,
                        b,
                        context,
                    )
                }
            }
        };

        by_rules.then_with(|| match self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.dispatch_id().cmp(b.dispatch_id()),
        })
    }

    /// Sorts items by priority (highest priority first).
    ///
    /// Returns indices into the original slice. The sort is stable.
    pub fn sort_indices(&self, items: &[T], context: &DispatchContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..items.len()).collect();
        indices.sort_by(|&a, &b| self.compare(&items[a], &items[b], context));
        indices
    }

    /// Returns the index of the highest-priority item.
    pub fn select_best(&self, items: &[T], context: &DispatchContext) -> Option<usize> {
        (0..items.len()).min_by(|&a, &b| {
            self.compare(&items[a], &items[b], context)
                .then_with(|| a.cmp(&b))
        })
    }
}

impl<T> Default for RuleEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RuleEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::rules;
    use crate::sim::SimTime;

    #[derive(Debug, Clone)]
    struct Item {
        id: String,
        queued: f64,
        weight: f64,
    }

    impl Dispatchable for Item {
        fn dispatch_id(&self) -> &str {
            &self.id
        }

        fn queued_at(&self) -> SimTime {
            SimTime(self.queued)
        }
    }

    /// Lower weight first.
    #[derive(Debug)]
    struct Light;

    impl DispatchingRule<Item> for Light {
        fn name(&self) -> &'static str {
            "LIGHT"
        }

        fn evaluate(&self, item: &Item, _context: &DispatchContext) -> RuleScore {
            item.weight
        }
    }

    fn item(id: &str, queued: f64, weight: f64) -> Item {
        Item {
            id: id.into(),
            queued,
            weight,
        }
    }

    #[test]
    fn test_fifo_ordering() {
        let items = vec![item("c", 3.0, 0.0), item("a", 1.0, 0.0), item("b", 2.0, 0.0)];
        let ctx = DispatchContext::at(SimTime(5.0));
        let engine = RuleEngine::new().with_rule(rules::Fifo);

        let indices = engine.sort_indices(&items, &ctx);
        let ids: Vec<&str> = indices.iter().map(|&i| items[i].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sequential_with_tie_breaker() {
        let items = vec![item("A", 2.0, 1.0), item("B", 1.0, 1.0)];
        let ctx = DispatchContext::at(SimTime(5.0));
        let engine = RuleEngine::new()
            .with_rule(Light)
            .with_tie_breaker(rules::Fifo);

        // LIGHT ties → FIFO breaks it → B (queued earlier) first
        assert_eq!(engine.select_best(&items, &ctx), Some(1));
    }

    #[test]
    fn test_weighted_mode() {
        let items = vec![item("A", 0.0, 3.0), item("B", 4.0, 1.0)];
        let ctx = DispatchContext::at(SimTime(10.0)).with_aging_rate(1.0);
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_rule(Light)
            .with_rule(rules::Aging);

        // A: 3 - 10 = -7; B: 1 - 6 = -5 → A wins through aging
        assert_eq!(engine.select_best(&items, &ctx), Some(0));
        assert!((engine.score(&items[1], &ctx) + 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_weighted_ties_use_zero_weight_rules() {
        let items = vec![item("A", 3.0, 1.0), item("B", 1.0, 1.0)];
        let ctx = DispatchContext::at(SimTime(5.0));
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_rule(Light)
            .with_tie_breaker(rules::Fifo);

        assert_eq!(engine.select_best(&items, &ctx), Some(1));
    }

    #[test]
    fn test_by_id_tie_breaker() {
        let items = vec![item("B", 1.0, 1.0), item("A", 1.0, 1.0)];
        let ctx = DispatchContext::at(SimTime(2.0));
        let engine = RuleEngine::new()
            .with_rule(Light)
            .with_final_tie_breaker(TieBreaker::ById);

        assert_eq!(engine.sort_indices(&items, &ctx), vec![1, 0]);
    }

    #[test]
    fn test_empty_items() {
        let ctx = DispatchContext::at(SimTime::ZERO);
        let engine: RuleEngine<Item> = RuleEngine::new().with_rule(Light);
        assert!(engine.sort_indices(&[], &ctx).is_empty());
        assert!(engine.select_best(&[], &ctx).is_none());
    }

    #[test]
    fn test_evaluate_scores() {
        let it = item("T1", 2.0, 3.0);
        let ctx = DispatchContext::at(SimTime(6.0)).with_aging_rate(0.5);
        let engine = RuleEngine::new()
            .with_weighted_rule(Light, 2.0)
            .with_rule(rules::Aging);

        let scores = engine.evaluate(&it, &ctx);
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 6.0).abs() < 1e-10);
        assert!((scores[1] + 2.0).abs() < 1e-10);
    }
}
