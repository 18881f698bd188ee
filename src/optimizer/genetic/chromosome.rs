//! Ship → berth assignment chromosome.
//!
//! # Encoding
//!
//! `genes[i]` is the index of the berth assigned to ship `i`. Service order
//! on each berth is not encoded; the decoder derives it from arrival,
//! priority and id.
//!
//! Genes are drawn from the ship's suitable berths. A ship with no
//! suitable berth carries gene 0 and is reported as infeasible.

use rand::prelude::IndexedRandom;
use rand::seq::SliceRandom;
use rand::Rng;

use super::problem::ShipInfo;
use super::runner::Individual;

/// Berth-assignment chromosome (lower fitness = better).
#[derive(Debug, Clone, PartialEq)]
pub struct BerthChromosome {
    /// Berth index per ship.
    pub genes: Vec<usize>,
    pub fitness: f64,
}

impl Individual for BerthChromosome {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }
}

impl BerthChromosome {
    pub fn from_genes(genes: Vec<usize>) -> Self {
        Self {
            genes,
            fitness: f64::INFINITY,
        }
    }

    /// Each ship on a random suitable berth.
    pub fn random<R: Rng>(ships: &[ShipInfo], rng: &mut R) -> Self {
        let genes = ships.iter().map(|s| random_gene(s, rng)).collect();
        Self::from_genes(genes)
    }

    /// Ships, in random order, each on the least-loaded suitable berth.
    ///
    /// Load is the sum of service hours already placed on a berth.
    pub fn load_balanced<R: Rng>(
        ships: &[ShipInfo],
        berth_count: usize,
        service_hours: impl Fn(usize, usize) -> f64,
        rng: &mut R,
    ) -> Self {
        let mut order: Vec<usize> = (0..ships.len()).collect();
        order.shuffle(rng);
        let mut load = vec![0.0f64; berth_count];
        let mut genes = vec![0usize; ships.len()];

        for i in order {
            let Some(&berth) = ships[i]
                .suitable
                .iter()
                .min_by(|a, b| load[**a].total_cmp(&load[**b]).then_with(|| a.cmp(b)))
            else {
                continue;
            };
            load[berth] += service_hours(i, berth);
            genes[i] = berth;
        }
        Self::from_genes(genes)
    }

    /// Number of genes pointing at an unsuitable berth.
    pub fn infeasible_genes(&self, ships: &[ShipInfo]) -> usize {
        self.genes
            .iter()
            .zip(ships)
            .filter(|(g, s)| !s.suitable.contains(g))
            .count()
    }
}

fn random_gene<R: Rng>(ship: &ShipInfo, rng: &mut R) -> usize {
    ship.suitable.choose(rng).copied().unwrap_or(0)
}

// ======================== Operators ========================

/// Single-point crossover.
///
/// Children swap tails after a random cut in `1..len`.
pub fn single_point_crossover<R: Rng>(
    p1: &BerthChromosome,
    p2: &BerthChromosome,
    rng: &mut R,
) -> (BerthChromosome, BerthChromosome) {
    let len = p1.genes.len().min(p2.genes.len());
    if len < 2 {
        return (
            BerthChromosome::from_genes(p1.genes.clone()),
            BerthChromosome::from_genes(p2.genes.clone()),
        );
    }
    let cut = rng.random_range(1..len);
    let mut c1 = p1.genes.clone();
    let mut c2 = p2.genes.clone();
    c1[cut..len].copy_from_slice(&p2.genes[cut..len]);
    c2[cut..len].copy_from_slice(&p1.genes[cut..len]);
    (BerthChromosome::from_genes(c1), BerthChromosome::from_genes(c2))
}

/// Per-gene mutation: with probability `rate`, redraw from suitable berths.
pub fn redraw_mutation<R: Rng>(chromosome: &mut BerthChromosome, ships: &[ShipInfo], rate: f64, rng: &mut R) {
    let rate = rate.clamp(0.0, 1.0);
    for (gene, ship) in chromosome.genes.iter_mut().zip(ships) {
        if rng.random_bool(rate) {
            *gene = random_gene(ship, rng);
        }
    }
    chromosome.fitness = f64::INFINITY;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ships() -> Vec<ShipInfo> {
        vec![
            ShipInfo::test("S0", vec![0, 1]),
            ShipInfo::test("S1", vec![1]),
            ShipInfo::test("S2", vec![]),
            ShipInfo::test("S3", vec![0, 1, 2]),
        ]
    }

    #[test]
    fn test_random_uses_suitable_berths() {
        let ships = ships();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let c = BerthChromosome::random(&ships, &mut rng);
            assert_eq!(c.genes.len(), 4);
            assert_eq!(c.genes[1], 1);
            assert_eq!(c.infeasible_genes(&ships), 1);
        }
    }

    #[test]
    fn test_load_balanced_spreads() {
        let ships = vec![
            ShipInfo::test("A", vec![0, 1]),
            ShipInfo::test("B", vec![0, 1]),
        ];
        let mut rng = SmallRng::seed_from_u64(1);
        let c = BerthChromosome::load_balanced(&ships, 2, |_, _| 10.0, &mut rng);
        assert_ne!(c.genes[0], c.genes[1]);
    }

    #[test]
    fn test_crossover_preserves_genes_per_position() {
        let p1 = BerthChromosome::from_genes(vec![0, 0, 0, 0]);
        let p2 = BerthChromosome::from_genes(vec![1, 1, 1, 1]);
        let mut rng = SmallRng::seed_from_u64(7);
        let (c1, c2) = single_point_crossover(&p1, &p2, &mut rng);
        assert_eq!(c1.genes[0], 0);
        assert_eq!(c2.genes[0], 1);
        for i in 0..4 {
            assert_eq!(c1.genes[i] + c2.genes[i], 1);
        }
    }

    #[test]
    fn test_full_rate_mutation_stays_suitable() {
        let ships = ships();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut c = BerthChromosome::from_genes(vec![0, 1, 0, 2]);
        redraw_mutation(&mut c, &ships, 1.0, &mut rng);
        assert!(ships[0].suitable.contains(&c.genes[0]));
        assert_eq!(c.genes[1], 1);
        assert_eq!(c.genes[2], 0);
    }
}
