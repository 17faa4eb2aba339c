//! The per-run engine object: owns the grid, both arenas, and the
//! reverse cell graph. Replaces the original's process-wide globals —
//! nothing here outlives a single `Engine::new`..`Engine` drop.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::arena::{Arena, DEFAULT_ARENA_CAPACITY};
use crate::bitmap;
use crate::cli::{Command, RunConfig};
use crate::fixed_point::Number;
use crate::geometry::Geometry;
use crate::grid::Grid;
use crate::periodicity::{self, PeriodicityReport};
use crate::polynomial::Polynomial;
use crate::propagation;
use crate::raw_codec;
use crate::reverse_graph::RevCellGraph;

use crate::error::EngineResult;

/// Evaluations between wall-clock checkpoint writes, matching the
/// original's periodic save cadence during long runs.
const CHECKPOINT_INTERVAL_SECS: u64 = 3600;

pub struct Engine<T> {
    grid: Grid,
    geometry: Geometry<T>,
    polynomial: Polynomial<T>,
    graph: RevCellGraph,
    row_arena: Arena,
    stem: PathBuf,
}

/// Mark every cell whose working-square image already lies in the
/// special exterior as WHITE before propagation starts — the "find
/// special exterior" step of the data-flow overview.
fn find_special_exterior<T: Number>(grid: &mut Grid, geometry: &Geometry<T>, polynomial: &Polynomial<T>) -> EngineResult<()> {
    for y in 0..grid.width() {
        for x in 0..grid.width() {
            let a = geometry.rect_for_cells(x, y, 1)?;
            let fa = polynomial.bbox(&a)?;
            if fa.lies_in_special_exterior(geometry.r0, geometry.r1) {
                grid.set(x, y, crate::grid::Color::White)?;
            }
        }
    }
    grid.shrink_bands();
    Ok(())
}

impl Engine<f64> {
    /// Build a fresh engine for this run, attempting to resume from a
    /// saved `_in.raw`/`_in.def.tovisit`/`_in.potw.tovisit` family first.
    pub fn new(config: &RunConfig) -> EngineResult<Self> {
        let n = 1i32 << config.len_bits;
        let geometry: Geometry<f64> = Geometry::new(n, config.range_log2);
        let polynomial = config.polynomial;
        let stem = PathBuf::from(&config.stem);

        let mut row_arena = Arena::new("rows", DEFAULT_ARENA_CAPACITY);
        let in_raw = PathBuf::from(format!("{}_in.raw", config.stem));
        let grid = match raw_codec::load_raw(&in_raw, n)? {
            Some(grid) => {
                info!(path = %in_raw.display(), "resumed grid from saved raw state");
                grid
            }
            None => {
                let mut grid = Grid::new(n, &mut row_arena)?;
                find_special_exterior(&mut grid, &geometry, &polynomial)?;
                grid
            }
        };

        let mut graph = RevCellGraph::build(&geometry, &polynomial, config.revcg_bits)?;
        let def_tovisit = PathBuf::from(format!("{}_in.def.tovisit", config.stem));
        if raw_codec::load_tovisit(&mut graph, &def_tovisit)? {
            info!(path = %def_tovisit.display(), "resumed definite-phase worklist");
        }

        Ok(Engine {
            grid,
            geometry,
            polynomial,
            graph,
            row_arena,
            stem,
        })
    }

    fn checkpoint_path(&self, suffix: &str) -> PathBuf {
        let name = format!("{}_temp{}", self.stem.display(), suffix);
        PathBuf::from(name)
    }

    /// Run both propagation phases to their fixed points, reclassifying
    /// residual gray to BLACK afterward. Writes a checkpoint raw file
    /// once per hour of wall-clock time, matching the original's
    /// periodic-save cadence.
    pub fn compute(&mut self) -> EngineResult<()> {
        info!(n = self.grid.width(), "starting definite-color propagation");
        let mut last_checkpoint = std::time::Instant::now();
        let raw_path = self.checkpoint_path(".raw");
        let def_tovisit_path = self.checkpoint_path(".def.tovisit");
        propagation::propagate_definite(&mut self.grid, &mut self.graph, &self.geometry, &self.polynomial, |grid, graph| {
            grid.shrink_bands();
            if last_checkpoint.elapsed().as_secs() >= CHECKPOINT_INTERVAL_SECS {
                info!(path = %raw_path.display(), "writing periodic checkpoint");
                raw_codec::save_raw(grid, &raw_path)?;
                raw_codec::save_tovisit(graph, &def_tovisit_path)?;
                last_checkpoint = std::time::Instant::now();
            }
            Ok(())
        })?;
        raw_codec::save_raw(&self.grid, &raw_path)?;

        info!("starting potentially-white propagation");
        let mut last_checkpoint = std::time::Instant::now();
        let potw_tovisit_path = self.checkpoint_path(".potw.tovisit");
        propagation::propagate_potw(&mut self.grid, &mut self.graph, &self.geometry, &self.polynomial, |grid, graph| {
            grid.shrink_bands();
            if last_checkpoint.elapsed().as_secs() >= CHECKPOINT_INTERVAL_SECS {
                info!(path = %raw_path.display(), "writing periodic checkpoint");
                raw_codec::save_raw(grid, &raw_path)?;
                raw_codec::save_tovisit(graph, &potw_tovisit_path)?;
                last_checkpoint = std::time::Instant::now();
            }
            Ok(())
        })?;

        let any_black = propagation::reclassify_residual_gray(&mut self.grid)?;
        if !any_black {
            warn!("no interior cells found after residual-gray reclassification");
        }

        info!(black = self.grid.count_black(), "propagation reached fixed point");
        debug!(
            used = self.row_arena.used(),
            capacity = self.row_arena.capacity(),
            "row arena usage"
        );

        // The reverse graph's parent lists have done their job; release
        // them before periodicity analysis needs the headroom.
        self.graph.release_parents();
        Ok(())
    }

    /// Run the periodicity analyzer over the current grid. Requires
    /// `compute` to already have run to a fixed point.
    pub fn periodicity(&self) -> EngineResult<PeriodicityReport> {
        periodicity::analyze(&self.grid, &self.geometry, &self.polynomial)
    }

    pub fn save_raw(&self, path: &Path) -> EngineResult<()> {
        raw_codec::save_raw(&self.grid, path)
    }

    pub fn load_raw(&mut self, path: &Path) -> EngineResult<bool> {
        match raw_codec::load_raw(path, self.grid.width())? {
            Some(grid) => {
                self.grid = grid;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Save the classified grid as one or more bitmap files, choosing
    /// the tiled 4-bit path or the trustworthy-downsample 8-bit path
    /// by resolution.
    pub fn save_bitmap(&self) -> EngineResult<Vec<PathBuf>> {
        let n = self.grid.width();
        match bitmap::needs_downsampling(n) {
            Some(exponent) => Ok(vec![bitmap::save_bitmap4_twd(&self.grid, &self.stem, exponent)?]),
            None => bitmap::save_bitmap4(&self.grid, &self.stem),
        }
    }

    pub fn save_periodicity_bitmap(&self, report: &PeriodicityReport) -> EngineResult<PathBuf> {
        bitmap::save_bitmap_periodicity(&self.grid, report, &self.stem)
    }

    /// Run the periodic-point region search (`CMD=PERIOD,PP`) and save
    /// its result as a bitmap. Requires `periodicity` to already have run.
    pub fn find_periodic_points(&self, report: &PeriodicityReport) -> EngineResult<(Vec<periodicity::PeriodicPointRegion>, PathBuf)> {
        let regions = periodicity::find_periodic_points(&self.grid, &self.geometry, &self.polynomial, report)?;
        let path = bitmap::save_bitmap_periodic_points(&self.grid, report.cycles.len(), &regions, &self.stem)?;
        Ok((regions, path))
    }

    pub fn grid_width(&self) -> i32 {
        self.grid.width()
    }
}

/// Drive a full `CMD=CALC` or `CMD=PERIOD` run end to end: build the
/// engine, compute, save outputs, and optionally run periodicity.
pub fn run(config: &RunConfig) -> EngineResult<()> {
    let mut engine = Engine::new(config)?;

    match config.command {
        Command::Calc => {
            engine.compute()?;
            engine.save_raw(&PathBuf::from(format!("{}.raw", config.stem)))?;
            let paths = engine.save_bitmap()?;
            for path in paths {
                info!(path = %path.display(), "wrote bitmap");
            }
        }
        Command::Period { periodic_points } => {
            engine.compute()?;
            engine.save_raw(&PathBuf::from(format!("{}.raw", config.stem)))?;
            let report = engine.periodicity()?;
            info!(cycles = report.cycles.len(), components = report.components.len(), "periodicity resolved");
            let path = engine.save_periodicity_bitmap(&report)?;
            info!(path = %path.display(), "wrote periodicity bitmap");
            if periodic_points {
                let (regions, path) = engine.find_periodic_points(&report)?;
                info!(regions = regions.len(), path = %path.display(), "wrote periodic-point bitmap");
            }
        }
        Command::Convert => {
            unreachable!("CMD=CONVERT is intercepted by main before an Engine is ever constructed")
        }
    }

    Ok(())
}
