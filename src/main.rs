use anyhow::Result;
use phonon3d::{Branch, Point, SensorPanel, Simulation, SimulationConfig};

fn main() -> Result<()> {
    // Phonon pulse in a silicon cube at 2 K, with one detector strip
    // covering part of the +y face.
    let mut config = SimulationConfig::new();
    config.temperature = Some(2.0);
    config.num_particles = 10_000;
    config.num_frames = 2000;
    config.sensors = vec![SensorPanel::new(
        Point::new(0.0, 0.05, 0.0),
        [0.02, 0.0, 0.02],
    )];

    println!("Building velocity field and seeding {} phonons", config.num_particles);
    let simulation = Simulation::new(config)?;

    let result = simulation.run_with_progress(200, |p| {
        println!(
            "frame {:>5}/{} t={:.2e}s live={} absorbed={}",
            p.frames_done, p.num_frames, p.sim_time_s, p.live_particles, p.absorbed
        );
    })?;

    println!();
    println!("Sensor hits: {:?}", result.hits_per_sensor());
    for branch in Branch::ALL {
        let count = result.events.iter().filter(|e| e.branch == branch).count();
        match result.mean_arrival_time(Some(branch)) {
            Some(mean) => println!("{:>2}: {count} events, mean arrival {mean:.3e} s", branch.label()),
            None => println!("{:>2}: no events", branch.label()),
        }
    }
    println!("Still live: {}", result.live_remaining);

    Ok(())
}
