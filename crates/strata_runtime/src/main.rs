//! Strata Runtime
//!
//! Small driver that boots a store and walks entities through a few
//! archetype transitions, logging what happens.
//!
//! Usage: `strata [config.json]`

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use strata_core::{Component, Store, StoreConfig};
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    const NAME: &'static str = "Position";
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
}

impl Component for Velocity {
    const NAME: &'static str = "Velocity";
}

fn load_config(path: &Path) -> Result<StoreConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: StoreConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Strata v{}", strata_core::VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => StoreConfig::default(),
    };
    tracing::info!(?config, "creating store");
    let mut store = Store::with_config(config)?;

    store.register::<Position>()?;
    store.register::<Velocity>()?;
    let tag = store.register_component("Marker", 0)?;

    // Spawn a small population across three archetypes.
    let mut movers = Vec::new();
    for i in 0..8 {
        let e = store.create_entity()?;
        store.insert(e, Position { x: i as f32, y: 0.0 })?;
        if i % 2 == 0 {
            store.insert(e, Velocity { x: 1.0, y: 0.5 })?;
            movers.push(e);
        }
        if i % 3 == 0 {
            store.add_component(e, tag)?;
        }
    }

    for &e in &movers {
        let velocity = *store.get::<Velocity>(e)?;
        let position = store.get_mut::<Position>(e)?;
        position.x += velocity.x;
        position.y += velocity.y;
    }

    // Stop the first mover and destroy the last.
    if let Some(&first) = movers.first() {
        let velocity = store
            .id_of::<Velocity>()
            .context("Velocity was registered above")?;
        store.remove_component(first, velocity)?;
        let position = store.get::<Position>(first)?;
        tracing::info!(entity = %first, ?position, "stopped");
    }
    if let Some(&last) = movers.last() {
        store.destroy_entity(last)?;
        tracing::info!(entity = %last, alive = store.is_alive(last), "destroyed");
    }

    for archetype in store.archetypes() {
        let names: Vec<&str> = archetype
            .components()
            .iter()
            .map(|&c| store.component_name(c).unwrap_or("?"))
            .collect();
        tracing::info!(id = %archetype.id(), rows = archetype.len(), components = ?names, "archetype");
    }

    let swept = store.compact();
    tracing::info!(swept, stats = ?store.stats(), entities = store.entity_count(), "done");
    Ok(())
}
