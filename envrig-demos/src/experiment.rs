use crate::config::ExperimentConfig;
use envrig_core::{
    Result,
    env::{Action, Env, EnvBuilder, Observation, SnapShot},
    recorder::{RecorderKind, gif::GifRecorder},
    runner::{EpisodeSummary, Runner, RunnerHooks},
};
use std::path::{Path, PathBuf};

/// Logs every transition at `debug`.
#[derive(Debug, Default)]
pub struct LoggingHooks {
    episode: usize,
}

impl RunnerHooks for LoggingHooks {
    fn on_reset(&mut self, observation: &Observation) -> Result<()> {
        tracing::debug!(episode = self.episode, shape = ?observation.shape, "reset");
        Ok(())
    }

    fn on_step(
        &mut self,
        step: usize,
        observation: &Observation,
        action: &Action,
        snapshot: &SnapShot,
    ) -> Result<()> {
        tracing::debug!(
            episode = self.episode,
            step,
            observation = ?observation.data,
            action = ?action.data,
            reward = snapshot.reward.sum(),
            done = ?snapshot.done,
            "step"
        );
        Ok(())
    }

    fn on_episode_end(&mut self, _summary: &EpisodeSummary) {
        self.episode += 1;
    }
}

/// `runs/swarm.gif` becomes `runs/swarm-3.gif` for episode 3.
pub fn episode_path(base: &Path, episode: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}-{episode}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{episode}"),
    };
    base.with_file_name(name)
}

/// Builds the environment, policy and recorder described by `config` and runs every episode.
///
/// With more than one episode each recording gets its own file, see [`episode_path`].
pub fn run_experiment(config: &ExperimentConfig) -> anyhow::Result<Vec<EpisodeSummary>> {
    let env = config.env.build_env()?;
    let policy = config.policy.build(env.get_parameters())?;
    let mut runner = Runner::new(env, policy).with_hooks(LoggingHooks::default());
    if let Some(max_steps) = config.runner.max_steps {
        runner = runner.with_max_steps(max_steps)?;
    }
    if let Some(recorder) = &config.recorder {
        if !config.env.renders() {
            tracing::warn!("a recorder is configured but the environment does not render");
        }
        runner = runner.with_recorder(RecorderKind::from(GifRecorder::from_config(
            recorder.clone(),
        )?));
    }

    let episodes = config.runner.episodes;
    let mut summaries = Vec::with_capacity(episodes);
    for episode in 0..episodes {
        if let (Some(RecorderKind::Gif(gif)), Some(base)) = (
            runner.recorder_mut(),
            config.recorder.as_ref().map(|r| &r.filename),
        ) {
            if episodes > 1 {
                gif.set_filename(episode_path(base, episode));
            }
        }
        let summary = runner.run()?;
        tracing::info!(
            episode,
            steps = summary.steps,
            total_reward = summary.total_reward,
            truncated = summary.truncated,
            artifact = ?summary.artifact,
            "episode complete"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_paths_keep_directory_and_extension() {
        assert_eq!(
            episode_path(Path::new("runs/swarm.gif"), 3),
            PathBuf::from("runs/swarm-3.gif")
        );
        assert_eq!(episode_path(Path::new("trace"), 0), PathBuf::from("trace-0"));
    }
}
