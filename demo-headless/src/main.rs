use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wind_viz_core::{
    CellCache, Degrees, FetchError, FnWindSource, GeoBounds, MetersPerSecond, RecordingSurface,
    SimulationDriver, ViewportProjection, WindDataSource, WindSample, WindVizConfig,
};

/// Headless wind visualization run with a scripted pan and zoom
#[derive(Parser, Debug)]
#[command(name = "wind-viz-demo")]
#[command(about = "Animate wind particles over a map view without a window", long_about = None)]
struct Args {
    /// JSON file with configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run duration in seconds
    #[arg(short, long, default_value_t = 12.0)]
    duration: f64,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Latitude of the initial view centre
    #[arg(long, default_value_t = -31.95, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the initial view centre
    #[arg(long, default_value_t = 115.86, allow_hyphen_values = true)]
    lon: f64,

    /// Height of the initial view in degrees of latitude
    #[arg(long, default_value_t = 4.0)]
    span: f64,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Initial zoom level
    #[arg(short, long, default_value_t = 7.0)]
    zoom: f64,

    /// Report interval in seconds
    #[arg(short, long, default_value_t = 1.0)]
    report_interval: f64,

    /// Fetch wind from Open-Meteo (needs the `http` feature)
    #[arg(long)]
    live: bool,
}

/// Where the scripted camera is at a given point of the run
#[derive(Debug, Clone, Copy)]
struct Camera {
    lat: f64,
    lon: f64,
    span: f64,
    zoom: f64,
}

impl Camera {
    fn view(&self, width: u32, height: u32) -> ViewportProjection {
        let half_lat = self.span / 2.0;
        let half_lon = half_lat * f64::from(width) / f64::from(height);
        let bounds = GeoBounds::new(
            self.lat - half_lat,
            self.lon - half_lon,
            self.lat + half_lat,
            self.lon + half_lon,
        );
        ViewportProjection::new(bounds, width, height, self.zoom)
    }
}

/// Counter-clockwise vortex around `(lat, lon)`, calmer at the eye
fn vortex_source(centre_lat: f64, centre_lon: f64) -> Arc<dyn WindDataSource> {
    Arc::new(FnWindSource::new("vortex", move |lat: f64, lon: f64| {
        let dy = lat - centre_lat;
        let dx = lon - centre_lon;
        let radius = dx.hypot(dy);
        let speed = 12.0 * (1.0 - (-radius).exp());
        // Tangent of the circle, reported as the direction the wind blows from
        let towards = dx.atan2(-dy).to_degrees() + 90.0;
        Ok::<_, FetchError>(WindSample::new(
            MetersPerSecond::new(speed),
            Degrees::new(towards + 180.0).normalized(),
        ))
    }))
}

fn wind_source(args: &Args) -> Result<Arc<dyn WindDataSource>, Box<dyn Error>> {
    if !args.live {
        return Ok(vortex_source(args.lat, args.lon));
    }
    #[cfg(feature = "http")]
    {
        Ok(Arc::new(wind_viz_core::OpenMeteoSource::new()))
    }
    #[cfg(not(feature = "http"))]
    {
        Err("--live needs the `http` feature".into())
    }
}

fn load_config(args: &Args) -> Result<WindVizConfig, Box<dyn Error>> {
    let config: WindVizConfig = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => WindVizConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let source = wind_source(&args)?;

    println!("=== Wind Visualization Demo ===\n");
    println!(
        "Source: {}, grid {:.2} deg, TTL {}s, cooldown {}s",
        source.name(),
        config.grid_resolution_deg,
        config.ttl().as_secs(),
        config.cooldown().as_secs()
    );

    let cache = CellCache::new(&config, source, tokio::runtime::Handle::current());
    let sweep = cache.spawn_eviction_sweep(config.eviction_interval());
    let mut driver = SimulationDriver::new(config, cache.clone());
    let mut surface = RecordingSurface::new();

    let mut camera = Camera {
        lat: args.lat,
        lon: args.lon,
        span: args.span,
        zoom: args.zoom,
    };
    let started = Instant::now();
    driver.start(&camera.view(args.width, args.height), started);

    // Pan east at one third of the run, zoom in at two thirds
    let pan_at = Duration::from_secs_f64(args.duration / 3.0);
    let zoom_at = Duration::from_secs_f64(args.duration * 2.0 / 3.0);
    let (mut panned, mut zoomed) = (false, false);

    let mut ticker = time::interval(Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1))));
    let run_for = Duration::from_secs_f64(args.duration);
    let report_every = Duration::from_secs_f64(args.report_interval);
    let mut next_report = Duration::ZERO;
    let mut frames = 0u64;

    println!("\nTime(s) | Particles | Drawn | Respawned | Cells | In-flight | Hit rate");
    println!("--------|-----------|-------|-----------|-------|-----------|---------");

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed = now - started;
        if elapsed >= run_for {
            break;
        }

        if !panned && elapsed >= pan_at {
            camera.lon += camera.span / 2.0;
            driver.viewport_changed(now);
            panned = true;
            info!(lon = camera.lon, "Panned east");
        }
        if !zoomed && elapsed >= zoom_at {
            camera.span /= 2.0;
            camera.zoom += 1.0;
            driver.viewport_changed(now);
            zoomed = true;
            info!(zoom = camera.zoom, "Zoomed in");
        }

        surface.reset();
        let Some(report) = driver.frame(&camera.view(args.width, args.height), &mut surface, now)
        else {
            break;
        };
        frames += 1;

        if report.viewport_refreshed {
            println!("        | viewport applied, re-priming");
        }
        if elapsed >= next_report {
            let stats = cache.stats();
            println!(
                "{:7.1} | {:9} | {:5} | {:9} | {:5} | {:9} | {:7.1}%",
                elapsed.as_secs_f64(),
                report.particle_count,
                report.drawn,
                report.counts.respawned(),
                stats.size,
                stats.in_flight_count,
                stats.hit_rate * 100.0
            );
            next_report += report_every;
        }
    }

    driver.stop(&mut surface);
    sweep.abort();

    println!("\n=== Run Complete ===");
    println!("Frames rendered: {}", frames);
    println!("Cache: {}", cache.stats());
    Ok(())
}
