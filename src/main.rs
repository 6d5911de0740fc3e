use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{debug, info};
use std::time::Duration;

use gifscrub::cli::Args;
use gifscrub::{AnimationClock, Engine, LoadState, Settings};

fn init_logger(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| "gifscrub.log".into());
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {}", log_path.display());
    } else {
        // Respects RUST_LOG if set
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let path = match (&args.settings, Settings::default_path()) {
        (Some(path), _) => return Ok(Settings::load(path)?),
        (None, Some(path)) => path,
        (None, None) => return Ok(Settings::default()),
    };
    Ok(Settings::load_or_default(&path)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args)?;
    debug!("Command-line args: {:?}", args);

    let settings = load_settings(&args)?;
    let source = args.descriptor().map_err(|e| anyhow!(e))?;

    let engine = Engine::from_settings(&settings);
    let selector = engine.selector();
    let clock = AnimationClock::new();
    selector.attach(&clock);

    info!("Binding {:?}", source);
    selector.bind(source);

    match selector.wait(Duration::from_secs(args.timeout_secs)) {
        LoadState::Ready => {}
        LoadState::Failed(err) => bail!("{}", err),
        LoadState::Fetching => bail!("Timed out after {}s", args.timeout_secs),
        other => bail!("Unexpected state {:?}", other),
    }

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let count = selector.frame_count();
    println!("{}: {} frames", args.source, count);

    for p in args.progress_steps() {
        clock.set_progress(p);
        let idx = selector.frame_index();
        let frame = selector
            .current_frame()
            .ok_or_else(|| anyhow!("No frame at progress {:.3}", p))?;

        println!(
            "progress {:.3} -> frame {}/{} ({}x{}, native delay {:?})",
            p,
            idx,
            count,
            frame.width(),
            frame.height(),
            frame.delay()
        );

        if let Some(dir) = &args.out_dir {
            let path = dir.join(format!("frame_{:04}_{:.3}.png", idx, p));
            frame
                .image()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    let stats = engine.cache().stats();
    info!(
        "Cache: {} entries, {} KB, hit rate {:.0}%",
        engine.cache().len(),
        engine.cache().mem() / 1024,
        stats.hit_rate() * 100.0
    );

    selector.dispose();
    Ok(())
}
