use std::collections::VecDeque;

/// Result of a single finished episode.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeResult {
    pub score: u32,
    pub steps: usize,
    pub best_tile: u32,
}

/// Rolling-window tracker over episode results and training losses.
pub struct TrainingMetrics {
    episode_results: VecDeque<EpisodeResult>,
    losses: VecDeque<f32>,
    capacity: usize,
    total_episodes: usize, // lifetime count, never capped
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        TrainingMetrics {
            episode_results: VecDeque::with_capacity(capacity),
            losses: VecDeque::with_capacity(capacity),
            capacity,
            total_episodes: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record_episode(&mut self, result: EpisodeResult) {
        self.total_episodes += 1;
        self.episode_results.push_back(result);
        if self.episode_results.len() > self.capacity {
            self.episode_results.pop_front();
        }
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.losses.push_back(loss);
        if self.losses.len() > self.capacity {
            self.losses.pop_front();
        }
    }

    /// Average episode score over the last N episodes.
    pub fn average_score(&self, last_n: usize) -> f32 {
        let n = self.episode_results.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: u64 = self
            .episode_results
            .iter()
            .rev()
            .take(n)
            .map(|r| r.score as u64)
            .sum();
        sum as f32 / n as f32
    }

    /// Highest episode score in the window.
    pub fn best_score(&self) -> u32 {
        self.episode_results.iter().map(|r| r.score).max().unwrap_or(0)
    }

    /// Highest tile reached in the window.
    pub fn best_tile(&self) -> u32 {
        self.episode_results
            .iter()
            .map(|r| r.best_tile)
            .max()
            .unwrap_or(0)
    }

    /// Average training loss over the last N updates.
    pub fn average_loss(&self, last_n: usize) -> f32 {
        let n = self.losses.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.losses.iter().rev().take(n).sum();
        sum / n as f32
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}
