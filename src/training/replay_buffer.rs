use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// A single transition, immutable once created. States are stored as flat
/// one-hot board encodings so the batch tensors can be assembled without
/// re-encoding.
#[derive(Debug, Clone)]
pub struct Experience {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

/// Fixed-capacity ring buffer of experiences. Overwrites the oldest entry
/// once full.
pub struct ReplayMemory {
    buffer: Vec<Experience>,
    capacity: usize,
    position: usize,
    rng: StdRng,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory {
            buffer: Vec::with_capacity(capacity),
            capacity,
            position: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Add an experience. Overwrites the oldest entry when full.
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(experience);
        } else {
            self.buffer[self.position] = experience;
        }
        self.position = (self.position + 1) % self.capacity;
    }

    /// Sample a uniformly random batch without replacement.
    pub fn sample(&mut self, batch_size: usize) -> Vec<Experience> {
        assert!(
            batch_size <= self.buffer.len(),
            "not enough experiences to sample"
        );
        let indices = index::sample(&mut self.rng, self.buffer.len(), batch_size);
        indices.iter().map(|i| self.buffer[i].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience_with_reward(reward: f32) -> Experience {
        Experience {
            state: vec![0.0; 4],
            action: 0,
            reward,
            next_state: vec![0.0; 4],
            done: false,
        }
    }

    #[test]
    fn test_push_and_len() {
        let mut memory = ReplayMemory::new(10);
        assert!(memory.is_empty());

        memory.push(experience_with_reward(0.0));
        assert_eq!(memory.len(), 1);

        for _ in 0..9 {
            memory.push(experience_with_reward(0.0));
        }
        assert_eq!(memory.len(), 10);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut memory = ReplayMemory::new(5);
        for i in 0..20 {
            memory.push(experience_with_reward(i as f32));
        }
        assert_eq!(memory.len(), 5);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let capacity = 5;
        let mut memory = ReplayMemory::new(capacity);
        for i in 0..capacity + 1 {
            memory.push(experience_with_reward(i as f32));
        }
        // The first push (reward 0.0) must no longer be retrievable.
        let all = memory.sample(capacity);
        assert!(all.iter().all(|e| e.reward != 0.0));
        assert!(all.iter().any(|e| e.reward == capacity as f32));
    }

    #[test]
    fn test_sample_size() {
        let mut memory = ReplayMemory::new(100);
        for i in 0..50 {
            memory.push(experience_with_reward(i as f32));
        }
        let batch = memory.sample(10);
        assert_eq!(batch.len(), 10);
    }

    #[test]
    #[should_panic(expected = "not enough experiences")]
    fn test_sample_too_many_panics() {
        let mut memory = ReplayMemory::new(10);
        memory.push(experience_with_reward(0.0));
        memory.sample(5);
    }
}
