//! Life View - runs a pattern on the configured backend
//!
//! Headless by default: ticks the configured number of generations and
//! logs timing. With `--visual` the grid is drawn in the terminal and can
//! be panned with the mouse.

mod input;
mod visualizer;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use life_compute::{SimulationContext, SimulationEngine};
use life_core::config::{ComputeBackendType, LifeConfig};
use life_core::error::{LifeError, LifeResult};
use life_core::pattern::Pattern;
use life_core::traits::CellSource;
use life_core::viewport::Viewport;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::Level;

use input::{InputAction, PointerState};
use visualizer::{grid_view_size, LifeVisualizer};

const LOG_FILE: &str = "life-view.log";

const USAGE: &str =
    "usage: life-view [PATTERN] [--visual|-v] [--cpu|--gpu] [--generations N] [--config FILE]";

/// Command line, hand-parsed
#[derive(Debug, Default, PartialEq)]
struct Args {
    pattern: Option<PathBuf>,
    visual: bool,
    backend: Option<ComputeBackendType>,
    generations: Option<u64>,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> LifeResult<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--visual" | "-v" => parsed.visual = true,
                "--cpu" => parsed.backend = Some(ComputeBackendType::Cpu),
                "--gpu" => parsed.backend = Some(ComputeBackendType::Gpu),
                "--generations" => {
                    let value = args
                        .next()
                        .ok_or_else(|| LifeError::config("--generations needs a value"))?;
                    let n = value
                        .parse()
                        .map_err(|_| LifeError::config(format!("invalid generation count '{}'", value)))?;
                    parsed.generations = Some(n);
                }
                "--config" => {
                    let value = args
                        .next()
                        .ok_or_else(|| LifeError::config("--config needs a file"))?;
                    parsed.config = Some(PathBuf::from(value));
                }
                flag if flag.starts_with('-') => {
                    return Err(LifeError::config(format!("unknown option '{}'\n{}", flag, USAGE)));
                }
                path => {
                    if parsed.pattern.is_some() {
                        return Err(LifeError::config(format!("unexpected argument '{}'\n{}", path, USAGE)));
                    }
                    parsed.pattern = Some(PathBuf::from(path));
                }
            }
        }

        Ok(parsed)
    }

    /// File or environment config with the command line applied on top
    fn resolve_config(&self) -> LifeResult<LifeConfig> {
        self.resolve_config_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> LifeResult<LifeConfig> {
        let mut config = match &self.config {
            Some(path) => LifeConfig::load(path)?,
            None => {
                let mut config = LifeConfig::default();
                // The viewer runs until quit unless a cap is asked for
                if self.visual {
                    config.simulation.generations = None;
                }
                config
            }
        }
        .with_env(lookup);
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut LifeConfig) {
        if let Some(pattern) = &self.pattern {
            config.pattern.path = pattern.clone();
        }
        if let Some(backend) = self.backend {
            config.compute.backend = backend;
        }
        if let Some(n) = self.generations {
            config.simulation.generations = Some(n);
        }
    }
}

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = init_logging(args.visual) {
        eprintln!("could not open {}: {}", LOG_FILE, e);
        return ExitCode::from(1);
    }

    let result = if args.visual {
        run_visual_mode(&args)
    } else {
        run_headless_mode(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("life-view: {}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(visual: bool) -> io::Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(Level::INFO);
    if visual {
        // The terminal belongs to the UI
        let file = File::create(LOG_FILE)?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Load the pattern and bring up backend, program and buffers
fn start(config: &LifeConfig) -> LifeResult<(SimulationContext, SimulationEngine)> {
    let pattern = Pattern::load(&config.pattern.path)?;
    let mut ctx = SimulationContext::from_config(config)?;
    let engine = SimulationEngine::new(&mut ctx, pattern.into_grid())?;
    Ok((ctx, engine))
}

fn within_cap(engine: &SimulationEngine, config: &LifeConfig) -> bool {
    config
        .simulation
        .generations
        .map_or(true, |cap| engine.generation() < cap)
}

fn run_headless_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve_config()?;
    let (mut ctx, mut engine) = start(&config)?;

    let viewport = Viewport::new(config.view.width, config.view.height, engine.width(), engine.height());
    tracing::info!(
        "Running {}x{} grid on {}, view {}x{}",
        engine.width(),
        engine.height(),
        ctx.backend().name(),
        config.view.width,
        config.view.height
    );

    let started = Instant::now();
    while within_cap(&engine, &config) {
        let report = engine.tick(&mut ctx)?;
        tracing::info!(
            "generation {}: {} cells visible",
            report.generation,
            viewport.visible_population(&engine)
        );
    }

    let stats = ctx.backend().stats();
    tracing::info!(
        "{} generations in {:.1} ms ({} dispatches, {} bytes up, {} bytes down)",
        engine.generation(),
        started.elapsed().as_secs_f64() * 1000.0,
        stats.dispatches,
        stats.bytes_uploaded,
        stats.bytes_downloaded
    );

    engine.release(&mut ctx)?;
    Ok(())
}

fn run_visual_mode(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve_config()?;
    let (mut ctx, mut engine) = start(&config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Hide)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = visual_loop(&mut terminal, &config, &mut ctx, &mut engine);

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture, Show)?;

    result?;
    engine.release(&mut ctx)?;
    Ok(())
}

fn visual_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &LifeConfig,
    ctx: &mut SimulationContext,
    engine: &mut SimulationEngine,
) -> Result<(), Box<dyn std::error::Error>> {
    let (cols, rows) = terminal::size()?;
    let (view_w, view_h) = grid_view_size(cols, rows);
    let mut viewport = Viewport::new(view_w, view_h, engine.width(), engine.height());
    let mut pointer = PointerState::default();
    let mut visualizer = LifeVisualizer::new(ctx.backend().name());
    let frame = Duration::from_millis(config.view.frame_interval_ms);

    loop {
        let frame_start = Instant::now();
        while event::poll(frame.saturating_sub(frame_start.elapsed()))? {
            match pointer.handle(event::read()?) {
                InputAction::Quit => return Ok(()),
                InputAction::Resize(cols, rows) => {
                    let (w, h) = grid_view_size(cols, rows);
                    viewport.set_view_size(w, h);
                }
                InputAction::Continue => {}
            }
        }

        pointer.apply(&mut viewport);

        if within_cap(engine, config) {
            let report = engine.tick(ctx)?;
            visualizer.record_tick(report.generation, report.elapsed);
        } else {
            visualizer.mark_finished();
        }

        terminal.draw(|f| visualizer.draw(f, &*engine, &viewport))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> LifeResult<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_args() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&["gun.rle", "-v", "--cpu", "--generations", "7", "--config", "life.json"]).unwrap();
        assert_eq!(args.pattern, Some(PathBuf::from("gun.rle")));
        assert!(args.visual);
        assert_eq!(args.backend, Some(ComputeBackendType::Cpu));
        assert_eq!(args.generations, Some(7));
        assert_eq!(args.config, Some(PathBuf::from("life.json")));
    }

    #[test]
    fn test_bad_args() {
        assert!(parse(&["--generations"]).is_err());
        assert!(parse(&["--generations", "many"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["a.rle", "b.rle"]).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let args = parse(&["p.rle", "--gpu", "--generations", "3"]).unwrap();
        let mut config = LifeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.pattern.path, PathBuf::from("p.rle"));
        assert_eq!(config.compute.backend, ComputeBackendType::Gpu);
        assert_eq!(config.simulation.generations, Some(3));
    }

    #[test]
    fn test_visual_mode_runs_until_quit() {
        let no_env = |_: &str| None;

        let visual = parse(&["-v"]).unwrap().resolve_config_with(no_env).unwrap();
        assert_eq!(visual.simulation.generations, None);

        let headless = parse(&[]).unwrap().resolve_config_with(no_env).unwrap();
        assert_eq!(headless.simulation.generations, Some(100));

        let capped = parse(&["-v", "--generations", "5"]).unwrap().resolve_config_with(no_env).unwrap();
        assert_eq!(capped.simulation.generations, Some(5));

        let from_env = parse(&["-v"])
            .unwrap()
            .resolve_config_with(|key| (key == "LIFE_GENERATIONS").then(|| "7".to_string()))
            .unwrap();
        assert_eq!(from_env.simulation.generations, Some(7));
    }

    #[test]
    fn test_headless_run_on_cpu() {
        let path = std::env::temp_dir().join(format!("life-view-{}.rle", std::process::id()));
        std::fs::write(&path, "x = 3, y = 1\n3o!\n").unwrap();

        let mut config = LifeConfig::default();
        config.pattern.path = path.clone();
        config.compute.backend = ComputeBackendType::Cpu;
        config.simulation.generations = Some(2);

        let (mut ctx, mut engine) = start(&config).unwrap();
        std::fs::remove_file(&path).ok();
        while within_cap(&engine, &config) {
            engine.tick(&mut ctx).unwrap();
        }
        assert_eq!(engine.generation(), 2);
        // a one-row blinker dies out after two generations
        let viewport = Viewport::new(32, 2, engine.width(), engine.height());
        assert_eq!(viewport.visible_population(&engine), 0);
        engine.release(&mut ctx).unwrap();
    }
}
