use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use fanout_core::{Event, EventBus, EventConfig};

fn load_config() -> Result<EventConfig> {
    match std::env::args().nth(1) {
        Some(path) => EventConfig::from_file(&path)
            .with_context(|| format!("loading sandbox config from '{path}'")),
        None => Ok(EventConfig::default()),
    }
}

fn run_single_channel(config: &EventConfig) -> Result<()> {
    let ev = Arc::new(Event::<i32>::from_config(config));

    let mut a = ev.subscribe(|v: &i32| log::info!("A: {v}"));
    let _b = ev.subscribe(|v: &i32| log::info!("B: {v}"));

    let publishers = [(0, 4), (4, 8)].map(|(from, to)| {
        let ev = Arc::clone(&ev);
        thread::spawn(move || {
            for i in from..to {
                ev.publish(&i);
            }
        })
    });
    for publisher in publishers {
        publisher
            .join()
            .map_err(|_| anyhow::anyhow!("event publisher thread panicked"))?;
    }

    a.unsubscribe();
    // Only B receives this.
    ev.publish(&42);
    Ok(())
}

fn run_bus(config: &EventConfig) -> Result<()> {
    let bus = Arc::new(EventBus::<(String, i32)>::from_config(config));

    let _ea = bus.subscribe("cpu", |(s, v): &(String, i32)| {
        log::info!("[cpu] EA: {s} and number: {v}")
    });
    let _eb = bus.subscribe("cpu", |(s, v): &(String, i32)| {
        log::info!("[cpu] EB: {s} and number: {v}")
    });
    let _ec = bus.subscribe("gpu", |(s, v): &(String, i32)| {
        log::info!("[gpu] EC: {s} and number: {v}")
    });

    let first = {
        let bus = Arc::clone(&bus);
        thread::spawn(move || {
            for i in 0..4 {
                bus.publish("cpu", &("Hello World".to_string(), i));
                bus.publish("gpu", &("XXXX".to_string(), i));
            }
        })
    };
    let second = {
        let bus = Arc::clone(&bus);
        thread::spawn(move || {
            for i in 4..8 {
                bus.publish("cpu", &("oOoOoO".to_string(), i));
            }
        })
    };
    first
        .join()
        .map_err(|_| anyhow::anyhow!("bus publisher thread panicked"))?;
    second
        .join()
        .map_err(|_| anyhow::anyhow!("bus publisher thread panicked"))?;

    log::info!(
        "Topics {:?}: cpu={} gpu={} unknown={}",
        bus.topics(),
        bus.subscriber_count("cpu"),
        bus.subscriber_count("gpu"),
        bus.subscriber_count("unknown"),
    );
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    run_single_channel(&config)?;
    run_bus(&config)?;
    Ok(())
}
