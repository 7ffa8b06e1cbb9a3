// MORAT v1.2.0 -- ADAPTIVE RESOURCE CONTROL LOOPS
// IRQ BALANCING, THERMAL CEILING RESTORE, SERVICE PINNING, APP BOOST, CACHE RECLAIM
//
// EVERY DOMAIN IS A SAMPLE -> DECIDE -> GUARD -> ACT LOOP ON ITS OWN THREAD.
// ONE CTRL+C STOPS THEM ALL; NO ACTUATION HAPPENS AFTER THE STOP IS SEEN.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use morat::config::SCREEN_POLL_MS;
use morat::control::{self, Domain, LoopHandle, StopSignal};
use morat::domains::{Balancer, Booster, DomainKind, Pinner, Reclaimer, Restorer};
use morat::event::{self, SharedLog};
use morat::platform::{ScreenListener, Telemetry};
use morat::screen::{BacklightListener, ScreenCell, ScreenWatcher};
use morat::sysfs::SysfsPlatform;

use cli::{Cli, Command};

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        level,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn build_domain(
    kind: DomainKind,
    cli: &Cli,
    platform: &Arc<SysfsPlatform>,
    screen: &ScreenCell,
    log: &SharedLog,
) -> morat::Result<Box<dyn Domain>> {
    let t = &cli.tunables;
    let p = platform.clone();
    let log = log.clone();
    let domain: Box<dyn Domain> = match kind {
        DomainKind::Balancer => Box::new(Balancer::new(p, t.balancer(), log)?),
        DomainKind::Restorer => Box::new(Restorer::new(p, t.restorer(), log)?),
        DomainKind::Pinner => Box::new(Pinner::new(p, t.affinity(), log)?),
        DomainKind::Booster => Box::new(Booster::new(p, t.boost(), log)?),
        DomainKind::Reclaimer => Box::new(Reclaimer::new(p, t.reclaim(), screen.clone(), log)?),
    };
    Ok(domain)
}

fn start(handles: &mut Vec<LoopHandle>, domain: Box<dyn Domain>, stop: &Arc<StopSignal>) {
    let name = domain.name();
    match control::spawn(domain, stop.clone()) {
        Ok(h) => handles.push(h),
        Err(e) => warn!("{}: failed to spawn loop thread: {}", name, e),
    }
}

fn run(cli: &Cli, platform: Arc<SysfsPlatform>, stop: Arc<StopSignal>) -> Result<()> {
    let enabled = cli.enabled_domains();
    let log = event::shared();
    let screen = ScreenCell::new();
    let mut handles: Vec<LoopHandle> = Vec::new();

    let cores = platform.enumerate_online_cores();
    println!("MORAT v1.2.0");
    println!("ROOT:            {}", cli.root.display());
    println!("ONLINE CORES:    {}", cores.len());
    println!(
        "DOMAINS:         {}",
        enabled.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    );
    println!("VERBOSE:         {}", cli.verbose);
    println!();

    // THE RECLAIMER ONLY SEES THE SCREEN THROUGH THIS WATCHER
    if enabled.contains(&DomainKind::Reclaimer) {
        match BacklightListener::discover(&cli.root) {
            Some(listener) => {
                let listener = Arc::new(listener);
                listener.register_screen_state_listener(screen.updater());
                let watcher = ScreenWatcher::new(listener, Duration::from_millis(SCREEN_POLL_MS));
                start(&mut handles, Box::new(watcher), &stop);
            }
            None => warn!("no backlight bl_power found, reclaimer will never fire"),
        }
    }

    for kind in enabled {
        match build_domain(kind, cli, &platform, &screen, &log) {
            Ok(domain) => start(&mut handles, domain, &stop),
            Err(e) => warn!("{}: not started: {}", kind.name(), e),
        }
    }

    if handles.is_empty() {
        println!("NO DOMAIN COULD START");
        return Ok(());
    }

    println!("MORAT IS ACTIVE (CTRL+C TO EXIT)");
    stop.wait();
    println!("MORAT IS SHUTTING DOWN");

    for h in handles {
        h.join();
    }

    let log = log.lock().unwrap_or_else(|e| e.into_inner());
    if cli.dump_log {
        log.dump();
    }
    log.summary();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let platform = Arc::new(
        SysfsPlatform::new(&cli.root)
            .with_context(|| format!("Error opening platform under {}", cli.root.display()))?,
    );

    if cli.command == Some(Command::Check) {
        return cli::check::run_check(&platform);
    }

    let stop = Arc::new(StopSignal::new());
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.request_stop();
    })
    .context("Error setting Ctrl-C handler")?;

    match cli.command {
        Some(Command::Probe) => cli::probe::run_probe(&*platform, &stop),
        _ => run(&cli, platform, stop)?,
    }

    println!("MORAT OUT.");
    Ok(())
}
