use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::sim::crystal::Branch;
use crate::sim::engine::sensors::SensorGeometry;
use crate::sim::engine::walls::WallBox;
use crate::sim::engine::{ParticleBatch, SensorEvent, Transport};
use crate::sim::sampling::FrequencySampler;
use crate::sim::velocity::GroupVelocityField;

use super::config::SimulationConfig;

#[derive(Debug, Clone, Copy)]
pub struct SimulationProgress {
    /// Number of completed frames (0..=num_frames).
    pub frames_done: usize,
    /// Target number of frames from the configuration (may stop early).
    pub num_frames: usize,
    /// Frame duration (seconds).
    pub dt_s: f64,
    /// Simulated time elapsed (seconds).
    pub sim_time_s: f64,
    /// Total number of particles at the start.
    pub num_particles: usize,
    /// Particles still propagating.
    pub live_particles: usize,
    /// Particles absorbed so far.
    pub absorbed: usize,
}

/// Per-frame (x, y) projection of the live ensemble, the entire contract
/// the external animation collaborator relies on.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Global time at the end of the frame (s).
    pub time: f64,
    /// Projected positions of live particles.
    pub points: Vec<(f64, f64)>,
    /// Branch label per live particle, parallel to `points`.
    pub branches: Vec<Branch>,
}

/// Result of a phonon transport simulation.
pub struct SimulationResult {
    /// Append-only absorption log, finalized once all frames complete.
    pub events: Vec<SensorEvent>,
    /// Per-frame snapshots (only when `store_history` is set).
    pub frames: Vec<FrameSnapshot>,
    /// Particles still live when the run ended.
    pub live_remaining: usize,
    /// Configuration used for this simulation.
    pub config: SimulationConfig,
}

impl SimulationResult {
    /// Absorption counts per sensor index.
    pub fn hits_per_sensor(&self) -> Vec<usize> {
        let mut hits = vec![0usize; self.config.sensors.len()];
        for event in &self.events {
            hits[event.sensor] += 1;
        }
        hits
    }

    /// Mean absorption time, optionally restricted to one branch.
    pub fn mean_arrival_time(&self, branch: Option<Branch>) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for event in &self.events {
            if branch.is_none_or(|b| b == event.branch) {
                sum += event.time;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }
}

trait ProgressReporter {
    fn every_frames(&self) -> usize;
    fn report(&mut self, progress: &SimulationProgress);
}

struct NoProgress;
impl ProgressReporter for NoProgress {
    fn every_frames(&self) -> usize {
        0
    }
    fn report(&mut self, _progress: &SimulationProgress) {}
}

struct FnProgress<F> {
    every_frames: usize,
    f: F,
}
impl<F> ProgressReporter for FnProgress<F>
where
    F: FnMut(&SimulationProgress),
{
    fn every_frames(&self) -> usize {
        self.every_frames
    }
    fn report(&mut self, progress: &SimulationProgress) {
        (self.f)(progress);
    }
}

/// The top-level simulation: builds the velocity field, seeds the ensemble
/// and drives the transport engine frame by frame.
pub struct Simulation {
    config: SimulationConfig,
    field: GroupVelocityField,
    samplers: [FrequencySampler; 3],
    engine: Transport,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        // Validated above
        let temperature = config.temperature.unwrap_or_default();

        let field = GroupVelocityField::build(&config.crystal, &config.field)?;

        let edge = config.edge_length();
        let mut samplers = Vec::with_capacity(3);
        for branch in Branch::ALL {
            let speed = field.average_speed(branch);
            samplers.push(FrequencySampler::new(
                temperature,
                speed,
                edge,
                &config.spectrum,
            )?);
        }
        let samplers: [FrequencySampler; 3] = samplers
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected one frequency sampler per branch"))?;

        let sensors = SensorGeometry::new(config.sensors.clone(), config.half_extents)?;
        let engine = Transport::new(
            WallBox::new(config.half_extents),
            sensors,
            config.max_reflection_iters,
        );

        Ok(Self {
            config,
            field,
            samplers,
            engine,
        })
    }

    pub fn run(self) -> Result<SimulationResult> {
        self.run_inner(NoProgress)
    }

    /// Runs the simulation while periodically reporting progress.
    ///
    /// - `every_frames=0` disables progress reporting.
    /// - The reporter is called once at start (`frames_done=0`), then every
    ///   `every_frames`, plus once at the end (or early-termination frame).
    pub fn run_with_progress<F>(self, every_frames: usize, report: F) -> Result<SimulationResult>
    where
        F: FnMut(&SimulationProgress),
    {
        self.run_inner(FnProgress {
            every_frames,
            f: report,
        })
    }

    fn run_inner<R: ProgressReporter>(self, mut reporter: R) -> Result<SimulationResult> {
        let num_frames = self.config.num_frames;
        let num_particles = self.config.num_particles;
        let dt = self.config.dt;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut batch = ParticleBatch::new(
            self.config.source,
            self.config.branch_counts(),
            &self.field,
            &self.samplers,
            &mut rng,
        );

        let mut events: Vec<SensorEvent> = Vec::new();
        let mut frames: Vec<FrameSnapshot> =
            Vec::with_capacity(if self.config.store_history { num_frames } else { 0 });

        let report_every = reporter.every_frames();
        if report_every > 0 {
            reporter.report(&SimulationProgress {
                frames_done: 0,
                num_frames,
                dt_s: dt,
                sim_time_s: 0.0,
                num_particles,
                live_particles: batch.live_count(),
                absorbed: 0,
            });
        }

        for frame in 0..num_frames {
            let frame_start = frame as f64 * dt;
            self.engine
                .advance_frame(&mut batch, frame_start, dt, &mut events)?;

            if self.config.store_history {
                frames.push(snapshot(&batch, frame_start + dt));
            }

            let frames_done = frame + 1;
            let finished = batch.is_empty() || frames_done == num_frames;
            if report_every > 0 && (frames_done.is_multiple_of(report_every) || finished) {
                reporter.report(&SimulationProgress {
                    frames_done,
                    num_frames,
                    dt_s: dt,
                    sim_time_s: frames_done as f64 * dt,
                    num_particles,
                    live_particles: batch.live_count(),
                    absorbed: events.len(),
                });
            }
            if batch.is_empty() {
                break;
            }
        }

        Ok(SimulationResult {
            events,
            frames,
            live_remaining: batch.live_count(),
            config: self.config,
        })
    }
}

fn snapshot(batch: &ParticleBatch, time: f64) -> FrameSnapshot {
    FrameSnapshot {
        time,
        points: batch
            .particles
            .iter()
            .map(|p| (p.position.x, p.position.y))
            .collect(),
        branches: batch.particles.iter().map(|p| p.branch).collect(),
    }
}
