//! CLI command implementations.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use engine::agents::Agent;
use engine::agents::qlearn::{QLearnConfig, QLearningAgent};
use engine::agents::random::RandomAgent;
use engine::episode::Episode;
use engine::io::config::EngineConfig;
use engine::io::sandbox::Dispatcher;

use crate::AgentKind;

/// Run one episode and print a per-step trace.
pub fn run_episode(
    tasks_root: &Path,
    runner: &Path,
    config: EngineConfig,
    task: &str,
    agent_kind: AgentKind,
    seed: u64,
) -> Result<()> {
    let dispatcher = Dispatcher::probe(runner);
    let mut episode = Episode::new(dispatcher, config, tasks_root, task);

    let mut obs = episode.reset()?;
    let mut agent: Box<dyn Agent> = match agent_kind {
        AgentKind::Random => Box::new(RandomAgent::new(seed)),
        AgentKind::Qlearn => Box::new(QLearningAgent::new(
            obs.action_size,
            QLearnConfig {
                epsilon: 0.05,
                seed,
                ..QLearnConfig::default()
            },
        )),
    };

    let mut total = 0.0;
    loop {
        let action = agent.act(&obs);
        let (next_obs, reward, done, info) = episode.step(action)?;
        agent.observe(&obs, action, reward, &next_obs, done);
        total += reward;
        obs = next_obs;
        println!(
            "step={:2} action={:2} tool={:11} pass={:.2} r={:+.3} msg={:?}",
            obs.step,
            action,
            info.tool.as_str(),
            info.pass_rate,
            reward,
            truncate(&info.message, 120),
        );
        if done {
            break;
        }
    }
    println!("total reward: {total:.3}");
    episode.close();
    Ok(())
}

/// Train the Q-learning agent over many episodes of one task.
pub fn train(
    tasks_root: &Path,
    runner: &Path,
    config: EngineConfig,
    task: &str,
    episodes: u32,
    seed: u64,
) -> Result<()> {
    let dispatcher = Dispatcher::probe(runner);
    let mut episode = Episode::new(dispatcher, config, tasks_root, task);

    let obs = episode.reset()?;
    let mut agent = QLearningAgent::new(
        obs.action_size,
        QLearnConfig {
            seed,
            ..QLearnConfig::default()
        },
    );

    let mut successes = 0u32;
    for ep in 1..=episodes {
        let mut obs = episode.reset()?;
        let mut solved = false;
        loop {
            let action = agent.act(&obs);
            let (next_obs, reward, done, info) = episode.step(action)?;
            agent.observe(&obs, action, reward, &next_obs, done);
            obs = next_obs;
            if done {
                solved = info.pass_rate >= 1.0;
                break;
            }
        }
        if solved {
            successes += 1;
        }
        if ep % 200 == 0 {
            info!(ep, "training checkpoint");
            println!(
                "ep={ep} success_rate={:.3} best_pass={:.2}",
                f64::from(successes) / f64::from(ep),
                obs.best_pass_rate,
            );
        }
    }
    println!(
        "trained {episodes} episodes, success_rate={:.3}",
        f64::from(successes) / f64::from(episodes.max(1)),
    );
    episode.close();
    Ok(())
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}
