use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pathos_app::{BatchRun, HeadlessHost, RunOverrides};
use pathos_core::{AgentProfile, CUSTOM_PROFILE, Heuristic, HeuristicSampler};
use pathos_storage::{
    SettingsStore, is_heuristics_file, load_heuristics, load_profiles, write_heuristics,
};
use rand::{SeedableRng, rngs::SmallRng};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "pathos-batch",
    version,
    about = "Configure and run batches of PathOS playtesting agents"
)]
struct Cli {
    /// Settings document shared by every subcommand.
    #[arg(long, env = "PATHOS_SETTINGS", default_value = "pathos-batch.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a headless batch and write a JSON report of every assignment.
    Run {
        /// Scene whose start location is used for spawned agents.
        #[arg(long, default_value = "default")]
        scene: String,
        /// Override the number of agents to simulate for this run only.
        #[arg(long)]
        agents: Option<usize>,
        /// Override the RNG seed for this run only.
        #[arg(long)]
        seed: Option<u64>,
        /// Profile library used to resolve the selected profile.
        #[arg(long)]
        profiles: Option<PathBuf>,
        /// Profile to apply instead of the stored selection.
        #[arg(long, requires = "profiles")]
        profile: Option<String>,
        /// Report destination; printed to stdout when omitted.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Names of agents already placed in the scene.
        #[arg(long = "scene-agent")]
        scene_agents: Vec<String>,
    },
    /// Validate a heuristics CSV against the known heuristics.
    Check {
        file: PathBuf,
    },
    /// Sample records in range mode and write them as a heuristics CSV.
    Export {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        count: usize,
        /// Profile library used to resolve the selected profile.
        #[arg(long)]
        profiles: Option<PathBuf>,
        /// Profile to apply instead of the stored selection.
        #[arg(long, requires = "profiles")]
        profile: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List a profile library, marking the stored selection.
    Profiles {
        file: PathBuf,
        /// Store this entry as the selected profile.
        #[arg(long)]
        select: Option<String>,
    },
    /// Show or change the stored settings of one scene.
    Scene {
        name: String,
        /// Where spawned agents are placed.
        #[arg(
            long,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_negative_numbers = true
        )]
        start_location: Option<Vec<f32>>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scene,
            agents,
            seed,
            profiles,
            profile,
            report,
            scene_agents,
        } => run_command(
            &cli.settings,
            &scene,
            agents,
            seed,
            profiles.as_deref().map(|path| (path, profile)),
            report,
            scene_agents,
        ),
        Command::Check { file } => check_command(&cli.settings, &file),
        Command::Export {
            out,
            count,
            profiles,
            profile,
            seed,
        } => export_command(&cli.settings, &out, count, profiles, profile, seed),
        Command::Profiles { file, select } => profiles_command(&cli.settings, &file, select),
        Command::Scene {
            name,
            start_location,
        } => scene_command(&cli.settings, &name, start_location),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Look up the selected entry of a profile library. The custom entry yields
/// `None`; an unknown name is an error.
fn selected_profile(library_path: &Path, selected: &str) -> Result<Option<AgentProfile>> {
    let library = load_profiles(library_path)
        .with_context(|| format!("failed to load profiles from {}", library_path.display()))?;
    match library.resolve(selected) {
        Some(profile) => {
            info!(profile = %profile.name, "using profile ranges");
            Ok(Some(profile.clone()))
        }
        None if selected == CUSTOM_PROFILE => Ok(None),
        None => bail!("no profile named {selected:?} in {}", library_path.display()),
    }
}

fn run_command(
    settings_path: &Path,
    scene: &str,
    agents: Option<usize>,
    seed: Option<u64>,
    profile: Option<(&Path, Option<String>)>,
    report_path: Option<PathBuf>,
    scene_agents: Vec<String>,
) -> Result<()> {
    let store = SettingsStore::load(settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    let profile = match profile {
        Some((library_path, name)) => {
            let name = name.as_deref().unwrap_or(&store.batch.selected_profile);
            selected_profile(library_path, name)?
        }
        None => None,
    };
    let overrides = RunOverrides {
        num_agents: agents,
        rng_seed: seed,
        profile,
    };
    let settings = overrides.apply(&store.batch);

    let batch = BatchRun::from_settings(&settings).context("cannot start batch run")?;
    let scene_settings = store.scene(scene);
    let mut host = HeadlessHost::new(scene_settings.start_location).with_scene_agents(scene_agents);
    let report = batch.run_to_completion(&mut host);

    match report_path {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create report {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &report)
                .context("failed to serialize batch report")?;
            info!(path = %path.display(), "wrote batch report");
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize batch report")?
        ),
    }

    store
        .save(settings_path)
        .with_context(|| format!("failed to save settings to {}", settings_path.display()))?;

    if report.aborted {
        warn!("batch run ended early");
    }
    Ok(())
}

fn check_command(settings_path: &Path, file: &Path) -> Result<()> {
    if !is_heuristics_file(file) {
        bail!("{} is not a .csv file on this computer", file.display());
    }
    let store = SettingsStore::load(settings_path)?;
    let loaded = load_heuristics(file, &Heuristic::ALL, store.batch.load_combat)
        .with_context(|| format!("failed to load heuristics from {}", file.display()))?;

    println!(
        "{}: {} agent profiles, {} malformed lines skipped",
        file.display(),
        loaded.records.len(),
        loaded.skipped_lines.len()
    );
    for line in &loaded.skipped_lines {
        println!("  skipped line {line}");
    }
    Ok(())
}

fn export_command(
    settings_path: &Path,
    out: &Path,
    count: usize,
    profiles: Option<PathBuf>,
    profile: Option<String>,
    seed: Option<u64>,
) -> Result<()> {
    let store = SettingsStore::load(settings_path)?;
    let mut ranges = store.batch.ranges.clone();
    if let Some(library_path) = &profiles {
        let selected = profile.as_deref().unwrap_or(&store.batch.selected_profile);
        if let Some(profile) = selected_profile(library_path, selected)? {
            ranges.apply_profile(&profile);
        }
    }
    ranges.validate().context("cannot sample from these ranges")?;

    let mut rng = match seed.or(store.batch.rng_seed) {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let mut sampler = HeuristicSampler::range(ranges);
    let records: Vec<_> = (0..count).map(|_| sampler.sample(&mut rng)).collect();

    write_heuristics(out, &records, &Heuristic::ALL)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {count} agent profiles to {}", out.display());
    Ok(())
}

fn profiles_command(settings_path: &Path, file: &Path, select: Option<String>) -> Result<()> {
    let library = load_profiles(file)
        .with_context(|| format!("failed to load profiles from {}", file.display()))?;
    let mut store = SettingsStore::load(settings_path)?;

    if let Some(name) = select {
        if name != CUSTOM_PROFILE && library.resolve(&name).is_none() {
            bail!("no profile named {name:?} in {}", file.display());
        }
        store.batch.selected_profile = name;
        store
            .save(settings_path)
            .with_context(|| format!("failed to save settings to {}", settings_path.display()))?;
    }

    let selected = library.selector_index(&store.batch.selected_profile);
    for (idx, name) in library.selector_names().into_iter().enumerate() {
        let marker = if idx == selected { '*' } else { ' ' };
        match library.resolve(name) {
            Some(profile) => println!(
                "{marker}{idx:>3}  {name:<24} experience {:.2}-{:.2}, {} heuristic ranges",
                profile.experience.min,
                profile.experience.max,
                profile.heuristic_ranges.len()
            ),
            None => println!("{marker}{idx:>3}  {name}"),
        }
    }
    Ok(())
}

fn scene_command(
    settings_path: &Path,
    name: &str,
    start_location: Option<Vec<f32>>,
) -> Result<()> {
    let mut store = SettingsStore::load(settings_path)?;

    if let Some(location) = start_location {
        let Ok(location) = <[f32; 3]>::try_from(location) else {
            bail!("start location needs exactly three coordinates");
        };
        store.scene_mut(name).start_location = location;
        store
            .save(settings_path)
            .with_context(|| format!("failed to save settings to {}", settings_path.display()))?;
    }

    let [x, y, z] = store.scene(name).start_location;
    println!("{name}: start location ({x}, {y}, {z})");
    Ok(())
}
