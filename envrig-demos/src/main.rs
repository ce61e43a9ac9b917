use clap::{Args, Parser, Subcommand};
use envrig_core::recorder::gif::GifConfig;
use envrig_demos::{EnvConfig, ExperimentConfig, PolicyConfig, RunnerConfig, run_experiment};
use envrig_sim::{GridWorldConfig, SwarmConfig};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(about = "Drive an environment with a random policy and optionally record it")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Single agent walking to the corner of a grid.
    GridWorld {
        #[arg(long, default_value_t = 5)]
        width: usize,
        #[arg(long, default_value_t = 5)]
        height: usize,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Vectorized multi agent navigation.
    Swarm {
        #[arg(long, default_value_t = 1)]
        num_envs: usize,
        #[arg(long, default_value_t = 5)]
        num_agents: usize,
        #[command(flatten)]
        run: RunArgs,
    },
    /// A gymnasium environment by id.
    #[cfg(feature = "python")]
    Gym {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// A vmas scenario with continuous actions.
    #[cfg(feature = "python")]
    Vmas {
        #[arg(long, default_value = "discovery")]
        scenario: String,
        #[arg(long, default_value_t = 1)]
        num_envs: usize,
        #[arg(long, default_value_t = 5)]
        num_agents: i64,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Everything from a JSON experiment file.
    Config { path: PathBuf },
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[arg(long, default_value_t = 1)]
    episodes: usize,
    #[arg(long)]
    max_steps: Option<usize>,
    /// Write every episode to this GIF.
    #[arg(long)]
    gif: Option<PathBuf>,
    #[arg(long, default_value_t = 10.)]
    fps: f32,
    #[arg(long)]
    seed: Option<u64>,
}

impl RunArgs {
    fn into_experiment(self, mut env: EnvConfig) -> ExperimentConfig {
        env.set_render(self.gif.is_some());
        ExperimentConfig {
            env,
            runner: RunnerConfig {
                episodes: self.episodes,
                max_steps: self.max_steps,
            },
            recorder: self.gif.map(|filename| GifConfig {
                filename,
                fps: self.fps,
                max_frames: None,
            }),
            policy: PolicyConfig::Random { seed: self.seed },
        }
    }
}

impl Command {
    fn into_experiment(self) -> anyhow::Result<ExperimentConfig> {
        Ok(match self {
            Command::GridWorld { width, height, run } => {
                let env = GridWorldConfig {
                    width,
                    height,
                    seed: run.seed,
                    ..Default::default()
                };
                run.into_experiment(EnvConfig::GridWorld(env))
            }
            Command::Swarm {
                num_envs,
                num_agents,
                run,
            } => {
                let env = SwarmConfig {
                    num_envs,
                    num_agents,
                    seed: run.seed,
                    ..Default::default()
                };
                run.into_experiment(EnvConfig::Swarm(env))
            }
            #[cfg(feature = "python")]
            Command::Gym { name, run } => {
                let env = envrig_gym::GymConfig {
                    seed: run.seed,
                    ..envrig_gym::GymConfig::new(name)
                };
                run.into_experiment(EnvConfig::Gym(env))
            }
            #[cfg(feature = "python")]
            Command::Vmas {
                scenario,
                num_envs,
                num_agents,
                run,
            } => {
                let mut env = envrig_vmas::VmasConfig::new(scenario);
                env.num_envs = num_envs;
                env.seed = run.seed;
                env.scenario_args.insert(
                    "n_agents".to_owned(),
                    envrig_vmas::ScenarioArg::Int(num_agents),
                );
                run.into_experiment(EnvConfig::Vmas(env))
            }
            Command::Config { path } => ExperimentConfig::from_file(path)?,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let config = cli.command.into_experiment()?;
    let summaries = run_experiment(&config)?;
    let total: f32 = summaries.iter().map(|s| s.total_reward).sum();
    tracing::info!(
        episodes = summaries.len(),
        mean_reward = total / summaries.len().max(1) as f32,
        "experiment finished"
    );
    Ok(())
}
