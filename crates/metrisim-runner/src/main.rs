//! metrisim runner
//!
//! - Loads a YAML config (first argument) or the built-in dashboard
//! - Ticks the simulator on a fixed period until `max_ticks` or Ctrl-C
//! - Prints run metrics in Prometheus text format on exit

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{fmt, EnvFilter};

use metrisim_core::error::Result;
use metrisim_core::RngSource;
use metrisim_runner::{app::SimulationApp, config, driver};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.code().as_str(), "metrisim-runner failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)?,
        None => config::builtin_dashboard()?,
    };

    let rng = match cfg.driver.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut source = RngSource::new(rng);
    let mut app = SimulationApp::from_config(cfg)?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = driver::run(&mut app, &mut source, shutdown).await?;

    tracing::info!(ticks = summary.ticks, stopped = ?summary.stopped, "simulation finished");
    print!("{}", app.metrics().render());
    Ok(())
}
