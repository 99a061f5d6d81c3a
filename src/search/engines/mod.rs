//! The search engines and the dispatch from CLI algorithm selection to a
//! concrete, monomorphised engine run.

mod aees;
mod bead;
mod beam;
mod bugsy;
mod greedy;
mod min_test;
mod mono_bead;
mod mono_beam;
mod mono_floor;
mod phc;
mod phcd;
mod rectangle_bead;
mod ring;
mod triangle_bead;
mod ucs;

pub use aees::AnytimeEes;
pub use bead::BeadSearch;
pub use beam::BeamSearch;
pub use bugsy::Bugsy;
pub use greedy::Greedy;
pub use min_test::MinTest;
pub use mono_bead::MonoBeadSearch;
pub use mono_beam::MonoBeamSearch;
pub use mono_floor::MonoFloorSearch;
pub use phc::ParallelHillClimbing;
pub use phcd::ParallelHillClimbingD;
pub use rectangle_bead::RectangleBeadSearch;
pub use triangle_bead::TriangleBeadSearch;
pub use ucs::UniformCost;

use crate::search::{metrics, Domain, Limit, SearchResult, SearchStats};
use std::io;
use thiserror::Error;

/// The contract every engine satisfies: run to completion or to a limit,
/// be resettable for a fresh search, and account for itself in the
/// metrics trailer.
pub trait SearchEngine<D: Domain> {
    fn search(&mut self, d: &D, s0: D::State) -> SearchResult<D>;
    fn reset(&mut self);
    fn stats(&self) -> &SearchStats;
    fn report(&self, out: &mut dyn io::Write) -> io::Result<()>;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("beam width must be positive")]
    Width,
    #[error("the trailing slot count must be positive")]
    TrailingSlots,
    #[error("the starting weight must be at least 1")]
    StartingWeight,
    #[error("utility weights must be non-negative")]
    UtilityWeights,
    #[error("growth steps must be at least 1")]
    GrowthSteps,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write metrics: {0}")]
    Io(#[from] io::Error),
}

/// Algorithm selection plus the flags each algorithm consumes.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Algorithm {
    /// Uniform-cost search; optimal for non-negative edge costs.
    Ucs,
    /// Greedy best-first search on the heuristic.
    Greedy,
    /// Greedy best-first search on the distance estimate.
    Speedy,
    /// Utility-guided best-first search trading cost against time.
    Bugsy {
        #[arg(long, help = "Weight on solution cost")]
        wf: f64,
        #[arg(long, help = "Weight on remaining search time")]
        wt: f64,
    },
    /// Anytime explicit-estimation search with online error correction.
    Aees {
        #[arg(long, help = "Initial suboptimality bound, at least 1")]
        wt0: f64,
        #[arg(long, help = "Never reopen duplicates")]
        dropdups: bool,
    },
    /// Beam search ordered by f.
    Beam {
        #[arg(long)]
        width: usize,
        #[arg(long, help = "Never reopen duplicates")]
        dropdups: bool,
        #[arg(long, help = "Dump layer contents to stderr")]
        dump: bool,
    },
    /// Beam search ordered by the distance estimate.
    Bead {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        dropdups: bool,
    },
    /// Monotonic beam search with slot stamps.
    Monobeam {
        #[arg(long)]
        width: usize,
    },
    /// Monotonic bead search; anytime.
    Monobead {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        dropdups: bool,
        #[arg(long)]
        dump: bool,
    },
    /// Monotonic beam search with floor-stamped trailing slots.
    Monofloor {
        #[arg(long)]
        width: usize,
        #[arg(long, help = "Trailing slot count")]
        n: usize,
        #[arg(long)]
        dropdups: bool,
        #[arg(long)]
        dump: bool,
    },
    /// Parallel hill climbing.
    Phc {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        dropdups: bool,
        #[arg(long)]
        dump: bool,
    },
    /// Parallel hill climbing on the distance estimate.
    Phcd {
        #[arg(long)]
        width: usize,
        #[arg(long)]
        dropdups: bool,
        #[arg(long)]
        dump: bool,
    },
    /// Triangle bead search over a ring of per-depth open lists.
    Trianglebead {
        #[arg(long)]
        dropdups: bool,
    },
    /// Rectangle bead search with widening sweeps.
    Rectanglebead {
        #[arg(long, alias = "dh", default_value_t = 1.0, help = "Height step per sweep")]
        aspect: f64,
        #[arg(long = "db", default_value_t = 1.0, help = "Base expansion step")]
        db: f64,
        #[arg(long, help = "Double the height step every sweep")]
        expo: bool,
        #[arg(long)]
        dropdups: bool,
        #[arg(long)]
        dump: bool,
    },
    /// Local-minimum basin instrumentation.
    Mintest {
        #[arg(long)]
        dump: bool,
    },
}

impl Algorithm {
    /// Validate the flags, build the engine, run it on the domain's
    /// initial state, and account for the run on `out`.
    pub fn run<D: Domain>(
        &self,
        d: &D,
        limit: Limit,
        out: &mut dyn io::Write,
    ) -> Result<SearchResult<D>, EngineError> {
        let result = match *self {
            Algorithm::Ucs => run_engine(UniformCost::new(limit), d, out),
            Algorithm::Greedy => run_engine(Greedy::new(limit, false), d, out),
            Algorithm::Speedy => run_engine(Greedy::new(limit, true), d, out),
            Algorithm::Bugsy { wf, wt } => {
                if wf < 0.0 || wt < 0.0 {
                    return Err(ConfigError::UtilityWeights.into());
                }
                run_engine(Bugsy::new(limit, wf, wt), d, out)
            }
            Algorithm::Aees { wt0, dropdups } => {
                if wt0 < 1.0 {
                    return Err(ConfigError::StartingWeight.into());
                }
                run_engine(AnytimeEes::new(limit, wt0, dropdups), d, out)
            }
            Algorithm::Beam {
                width,
                dropdups,
                dump,
            } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(BeamSearch::new(limit, width, dropdups, dump), d, out)
            }
            Algorithm::Bead { width, dropdups } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(BeadSearch::new(limit, width, dropdups), d, out)
            }
            Algorithm::Monobeam { width } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(MonoBeamSearch::new(limit, width), d, out)
            }
            Algorithm::Monobead {
                width,
                dropdups,
                dump,
            } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(MonoBeadSearch::new(limit, width, dropdups, dump), d, out)
            }
            Algorithm::Monofloor {
                width,
                n,
                dropdups,
                dump,
            } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                if n == 0 {
                    return Err(ConfigError::TrailingSlots.into());
                }
                run_engine(MonoFloorSearch::new(limit, width, n, dropdups, dump), d, out)
            }
            Algorithm::Phc {
                width,
                dropdups,
                dump,
            } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(ParallelHillClimbing::new(limit, width, dropdups, dump), d, out)
            }
            Algorithm::Phcd {
                width,
                dropdups,
                dump,
            } => {
                if width == 0 {
                    return Err(ConfigError::Width.into());
                }
                run_engine(
                    ParallelHillClimbingD::new(limit, width, dropdups, dump),
                    d,
                    out,
                )
            }
            Algorithm::Trianglebead { dropdups } => {
                run_engine(TriangleBeadSearch::new(limit, dropdups), d, out)
            }
            Algorithm::Rectanglebead {
                aspect,
                db,
                expo,
                dropdups,
                dump,
            } => {
                if aspect < 1.0 || db < 1.0 {
                    return Err(ConfigError::GrowthSteps.into());
                }
                run_engine(
                    RectangleBeadSearch::new(limit, aspect, db, expo, dropdups, dump),
                    d,
                    out,
                )
            }
            Algorithm::Mintest { dump } => run_engine(MinTest::new(limit, dump), d, out),
        }?;
        Ok(result)
    }
}

fn run_engine<D, E>(
    mut engine: E,
    d: &D,
    out: &mut dyn io::Write,
) -> Result<SearchResult<D>, EngineError>
where
    D: Domain,
    E: SearchEngine<D>,
{
    let result = engine.search(d, d.initial_state());

    let stats = engine.stats();
    metrics::pair(out, "total nodes expanded", &stats.expanded)?;
    metrics::pair(out, "total nodes generated", &stats.generated)?;
    metrics::pair(out, "total nodes duplicated", &stats.duplicates)?;
    metrics::pair(out, "total nodes reopened", &stats.reopened)?;
    match &result {
        SearchResult::Solved(solution) => {
            metrics::pair(out, "found solution", &"yes")?;
            metrics::pair(out, "final sol cost", &solution.cost)?;
            metrics::pair(out, "final sol length", &solution.length())?;
        }
        SearchResult::Exhausted | SearchResult::LimitReached => {
            metrics::pair(out, "found solution", &"no")?;
        }
    }
    engine.report(out)?;
    Ok(result)
}
