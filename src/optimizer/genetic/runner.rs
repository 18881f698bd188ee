//! Generational GA driver.
//!
//! Problem-agnostic: a [`GaProblem`] supplies individuals, fitness and
//! operators; [`GaRunner`] runs elitist generational replacement with
//! tournament selection.
//!
//! # Convention
//! Fitness is minimized (lower = better).
//!
//! # Determinism
//! One `SmallRng` seeded from [`GaConfig::seed`] drives everything. The
//! random stream of generation `g` does not depend on `max_generations`,
//! so a longer run replays a shorter one before continuing. Together with
//! best-ever tracking this makes the result monotone in `max_generations`.
//!
//! # Reference
//! Goldberg (1989), "Genetic Algorithms in Search, Optimization, and Machine Learning"

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A member of the population.
pub trait Individual: Clone {
    /// Current fitness (lower = better).
    fn fitness(&self) -> f64;

    fn set_fitness(&mut self, fitness: f64);
}

/// A problem the GA can optimize.
pub trait GaProblem {
    type Individual: Individual;

    /// Creates one individual of the initial population.
    fn create_individual<R: Rng>(&self, rng: &mut R) -> Self::Individual;

    /// Fitness of an individual (lower = better).
    fn evaluate(&self, individual: &Self::Individual) -> f64;

    /// Produces offspring from two parents.
    fn crossover<R: Rng>(
        &self,
        parent1: &Self::Individual,
        parent2: &Self::Individual,
        rng: &mut R,
    ) -> Vec<Self::Individual>;

    /// Mutates an individual in place.
    fn mutate<R: Rng>(&self, individual: &mut Self::Individual, rng: &mut R);
}

/// GA parameters.
#[derive(Debug, Clone)]
pub struct GaConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// Share of the population copied unchanged into the next generation.
    pub elitism_rate: f64,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    /// `|mean − best|` at or below which a generation counts as stalled.
    pub convergence_threshold: f64,
    /// Stop once more than this many consecutive generations stall.
    pub stall_generations: usize,
    pub seed: u64,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            elitism_rate: 0.1,
            tournament_size: 3,
            crossover_rate: 0.8,
            convergence_threshold: 1e-3,
            stall_generations: 10,
            seed: 42,
        }
    }
}

impl GaConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = generations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of elite individuals (at least one).
    pub fn elite_count(&self) -> usize {
        ((self.population_size as f64 * self.elitism_rate).round() as usize)
            .clamp(1, self.population_size.max(1))
    }
}

/// Outcome of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult<I> {
    /// Best individual ever seen.
    pub best: I,
    pub best_fitness: f64,
    /// Generations actually run.
    pub generations: usize,
    /// Best-ever fitness after initialisation and after each generation.
    pub history: Vec<f64>,
}

/// Runs a [`GaProblem`].
pub struct GaRunner;

impl GaRunner {
    /// Runs the GA. Returns `None` only for an empty population.
    pub fn run<P: GaProblem>(problem: &P, config: &GaConfig) -> Option<GaResult<P::Individual>> {
        let size = config.population_size;
        if size == 0 {
            return None;
        }
        let mut rng = SmallRng::seed_from_u64(config.seed);

        let mut population: Vec<P::Individual> = (0..size)
            .map(|_| {
                let mut ind = problem.create_individual(&mut rng);
                ind.set_fitness(problem.evaluate(&ind));
                ind
            })
            .collect();
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut history = vec![best.fitness()];
        let mut stalled = 0usize;
        let mut generations = 0usize;
        let elite = config.elite_count();

        while generations < config.max_generations {
            let mut next: Vec<P::Individual> = population.iter().take(elite).cloned().collect();
            while next.len() < size {
                let p1 = tournament(&population, config.tournament_size, &mut rng);
                let p2 = tournament(&population, config.tournament_size, &mut rng);
                let children = if rng.random_bool(config.crossover_rate.clamp(0.0, 1.0)) {
                    problem.crossover(p1, p2, &mut rng)
                } else {
                    vec![p1.clone(), p2.clone()]
                };
                for mut child in children {
                    if next.len() >= size {
                        break;
                    }
                    problem.mutate(&mut child, &mut rng);
                    child.set_fitness(problem.evaluate(&child));
                    next.push(child);
                }
            }
            population = next;
            sort_by_fitness(&mut population);
            generations += 1;

            if population[0].fitness() < best.fitness() {
                best = population[0].clone();
            }
            history.push(best.fitness());

            let mean = population.iter().map(|i| i.fitness()).sum::<f64>() / size as f64;
            if (mean - population[0].fitness()).abs() <= config.convergence_threshold {
                stalled += 1;
                if stalled > config.stall_generations {
                    break;
                }
            } else {
                stalled = 0;
            }
        }

        Some(GaResult {
            best_fitness: best.fitness(),
            best,
            generations,
            history,
        })
    }
}

fn sort_by_fitness<I: Individual>(population: &mut [I]) {
    population.sort_by(|a, b| a.fitness().total_cmp(&b.fitness()));
}

fn tournament<'a, I: Individual, R: Rng>(population: &'a [I], size: usize, rng: &mut R) -> &'a I {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..size.max(1) {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.fitness() < winner.fitness() {
            winner = challenger;
        }
    }
    winner
}
