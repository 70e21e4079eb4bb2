//! dingcad CLI - build solids from scene scripts

mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dingcad_engine::{Engine, ReloadOutcome, Scene, load_settings};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dingcad")]
#[command(about = "Script-driven solid modeling", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scene and write it as binary STL
    Export {
        /// Scene file (defaults to scene.rhai in the working or home directory)
        scene: Option<PathBuf>,

        /// Output file (defaults to the configured export path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a scene and print its measurements
    Info {
        /// Scene file
        scene: Option<PathBuf>,
    },

    /// Load a scene and report whether it succeeded
    Check {
        /// Scene file
        scene: Option<PathBuf>,
    },

    /// Reload a scene whenever one of its files changes
    Watch {
        /// Scene file
        scene: Option<PathBuf>,

        /// Re-export to this file after every successful load
        #[arg(long)]
        export: Option<PathBuf>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Interactive REPL with every geometry binding
    Repl,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut engine = Engine::with_settings(load_settings());

    match cli.command {
        Commands::Export { scene, output } => {
            run_export(&mut engine, scene.as_deref(), output.as_deref())?;
        }
        Commands::Info { scene } => {
            run_info(&mut engine, scene.as_deref())?;
        }
        Commands::Check { scene } => {
            if !run_check(&mut engine, scene.as_deref())? {
                std::process::exit(1);
            }
        }
        Commands::Watch {
            scene,
            export,
            interval,
        } => {
            run_watch(&mut engine, scene.as_deref(), export.as_deref(), interval)?;
        }
        Commands::Repl => {
            repl::run_repl(engine)?;
        }
    }

    Ok(())
}

fn run_export(engine: &mut Engine, scene: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let scene = engine.load_scene_or_default(scene)?;
    println!("Loaded {} ({} triangles)", display_source(scene), scene.solid.num_tri());
    let result = engine.export_to(output)?;
    println!("{result}");
    Ok(())
}

fn run_info(engine: &mut Engine, scene: Option<&Path>) -> Result<()> {
    let scene = engine.load_scene_or_default(scene)?;
    print_info(scene);
    Ok(())
}

fn run_check(engine: &mut Engine, scene: Option<&Path>) -> Result<bool> {
    let ok = match engine.load_scene_or_default(scene) {
        Ok(scene) => {
            println!("OK - Loaded {}", display_source(scene));
            true
        }
        Err(e) => {
            eprintln!("ERROR:\n{e}");
            false
        }
    };
    print_dependencies(&engine.dependencies());
    Ok(ok)
}

fn run_watch(engine: &mut Engine, scene: Option<&Path>, export: Option<&Path>, interval: Option<u64>) -> Result<()> {
    let path = engine.resolve_scene_path(scene)?;
    let interval = interval.map_or_else(|| engine.poll_interval(), Duration::from_millis);

    println!("\n--- Loading: {} ---", path.display());
    match engine.load_scene(&path) {
        Ok(scene) => {
            println!("OK - {} triangles", scene.solid.num_tri());
            export_after_load(engine, export);
        }
        Err(e) => eprintln!("ERROR:\n{e}"),
    }

    #[cfg(feature = "file-watcher")]
    {
        if let Err(e) = engine.watch_dependencies() {
            tracing::warn!("File notifications unavailable, polling only: {e}");
        }
    }

    println!("Watching {} file(s)", engine.dependencies().len());
    println!("Press Ctrl+C to stop\n");

    loop {
        engine.wait_for_change(interval);
        let Some(reload) = engine.poll()? else {
            continue;
        };
        for change in &reload.changed {
            println!("\n--- Changed: {} ---", change.path.display());
        }
        match &reload.outcome {
            ReloadOutcome::Reloaded { triangles, .. } => {
                println!("OK - {triangles} triangles");
                export_after_load(engine, export);
            }
            ReloadOutcome::Failed { message } => {
                eprintln!("ERROR:\n{message}");
                if engine.has_scene() {
                    println!("Keeping previous scene");
                }
            }
        }
    }
}

fn export_after_load(engine: &Engine, export: Option<&Path>) {
    let Some(path) = export else {
        return;
    };
    match engine.export_to(Some(path)) {
        Ok(result) => println!("{result}"),
        Err(e) => eprintln!("Export failed: {e}"),
    }
}

fn display_source(scene: &Scene) -> String {
    scene
        .source_path
        .as_ref()
        .map_or_else(|| "<script>".to_string(), |p| p.display().to_string())
}

fn print_info(scene: &Scene) {
    let solid = &scene.solid;
    let bounds = solid.bounding_box();
    println!("Scene:        {}", display_source(scene));
    println!("Status:       {}", solid.status().as_str());
    println!("Volume:       {:.6}", solid.volume());
    println!("Surface area: {:.6}", solid.surface_area());
    println!("Triangles:    {}", solid.num_tri());
    println!("Vertices:     {}", solid.num_vert());
    println!("Genus:        {}", solid.genus());
    if solid.is_empty() {
        println!("Bounds:       (empty)");
    } else {
        println!(
            "Bounds:       [{:.4}, {:.4}, {:.4}] .. [{:.4}, {:.4}, {:.4}]",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }
    print_dependencies(&scene.dependencies);
}

fn print_dependencies(dependencies: &[PathBuf]) {
    println!("Dependencies:");
    for path in dependencies {
        println!("  {}", path.display());
    }
}
