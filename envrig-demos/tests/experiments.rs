use envrig_core::recorder::gif::GifConfig;
use envrig_demos::{EnvConfig, ExperimentConfig, PolicyConfig, RunnerConfig, run_experiment};
use envrig_sim::{GridWorldConfig, SwarmConfig};
use std::path::Path;

fn shipped_config(name: &str) -> anyhow::Result<ExperimentConfig> {
    ExperimentConfig::from_file(Path::new(env!("CARGO_MANIFEST_DIR")).join("configs").join(name))
}

#[test]
fn native_sample_configs_parse() -> anyhow::Result<()> {
    let grid = shipped_config("grid_world.json")?;
    assert!(matches!(grid.env, EnvConfig::GridWorld(_)));
    assert_eq!(grid.runner.episodes, 2);

    let swarm = shipped_config("swarm.json")?;
    let EnvConfig::Swarm(env) = &swarm.env else {
        panic!("expected a swarm config");
    };
    assert_eq!(env.num_agents, 5);
    assert_eq!(swarm.recorder.map(|r| r.max_frames), Some(Some(100)));
    Ok(())
}

#[test]
fn missing_config_file_is_reported() {
    let err = ExperimentConfig::from_file("does/not/exist.json").unwrap_err();
    assert!(err.to_string().contains("does/not/exist.json"));
}

#[test]
fn every_episode_gets_its_own_gif() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = ExperimentConfig {
        env: EnvConfig::GridWorld(GridWorldConfig {
            width: 3,
            height: 3,
            max_steps: Some(15),
            render: true,
            cell_size: 4,
            seed: Some(1),
            ..Default::default()
        }),
        runner: RunnerConfig {
            episodes: 3,
            max_steps: None,
        },
        recorder: Some(GifConfig {
            filename: dir.path().join("grid.gif"),
            fps: 10.,
            max_frames: None,
        }),
        policy: PolicyConfig::Random { seed: Some(1) },
    };
    let summaries = run_experiment(&config)?;
    assert_eq!(summaries.len(), 3);
    for (episode, summary) in summaries.iter().enumerate() {
        let expected = dir.path().join(format!("grid-{episode}.gif"));
        assert_eq!(summary.artifact.as_deref(), Some(expected.as_path()));
        assert!(expected.exists());
    }
    assert!(!dir.path().join("grid.gif").exists());
    Ok(())
}

#[test]
fn swarm_runs_under_the_runner_step_limit() -> anyhow::Result<()> {
    let config = ExperimentConfig {
        env: EnvConfig::Swarm(SwarmConfig {
            num_envs: 2,
            max_steps: None,
            seed: Some(4),
            ..Default::default()
        }),
        runner: RunnerConfig {
            episodes: 1,
            max_steps: Some(25),
        },
        recorder: None,
        policy: PolicyConfig::Zeros,
    };
    let summaries = run_experiment(&config)?;
    // zero velocities never reach the goals
    assert_eq!(summaries[0].steps, 25);
    assert!(summaries[0].truncated);
    assert_eq!(summaries[0].total_reward, 0.);
    Ok(())
}
