//! Topology session driver
//!
//! Runs a short editing session against the kernel and prints the result:
//! a quad is built, split, meshed, undone and redone. An optional argument
//! names a RON manager configuration file.

use std::error::Error;

use glam::DVec3;
use topo_command::{
    Command, CommandManager, CommandStatus, ManagerConfig, MeshCoFacesCommand, NewQuadCommand,
    Notification, Play, SplitCoFaceCommand,
};
use topo_core::{CoFaceId, EntityId};

fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topo_cli=debug,topo_command=info,topo_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting topology session");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path);
            ManagerConfig::load(path)?
        }
        None => ManagerConfig::default(),
    };
    let manager = CommandManager::new(config);
    manager.subscribe(|n: &Notification| {
        tracing::debug!("{} {} -> {}", n.name, n.play.name(), n.status);
    });

    let corners = [
        DVec3::ZERO,
        DVec3::new(2.0, 0.0, 0.0),
        DVec3::new(2.0, 1.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
    ];
    run(&manager, Command::new(NewQuadCommand::new(corners, 8, 4)))?;

    let coface = manager
        .with_store(|store| store.ids::<CoFaceId>().first().copied())
        .ok_or("the quad was not created")?;
    let edge = manager.with_store(|store| store.coface(coface).map(|f| f.edge(1)))?;
    let edge = edge.ok_or("the quad has no second side")?;
    run(&manager, Command::new(SplitCoFaceCommand::new(coface, edge, 0.5)))?;

    let pieces = manager.with_store(|store| store.ids::<CoFaceId>());
    run(&manager, Command::new(MeshCoFacesCommand::new(pieces.clone())))?;
    manager.undo()?;
    manager.redo()?;
    manager.dispatch_notifications();

    for piece in &pieces {
        let description = manager.describe(EntityId::from(*piece))?;
        println!("{}", serde_json::to_string_pretty(&description)?);
    }
    let report = manager.check()?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    println!("# session script");
    for line in manager.transcript() {
        println!("{line}");
    }
    Ok(())
}

/// Submit a command and wait for it
fn run(manager: &CommandManager, command: Command) -> Result<(), Box<dyn Error>> {
    let handle = manager.add_command(command, Play::Do)?;
    manager.wait_idle();
    if handle.status() != CommandStatus::Done {
        let message = handle.message().unwrap_or_default();
        return Err(format!("{} ended {}: {}", handle.name(), handle.status(), message).into());
    }
    Ok(())
}
