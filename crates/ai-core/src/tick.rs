use crate::{rng, ActorId, SplitMix64};

/// Slack allowed when an accumulated sum of `dt_seconds` is compared against an authored
/// duration. Repeated `f32` additions of steps like `0.02` land a hair below the exact total.
pub const TIME_EPSILON: f32 = 1e-4;

/// One fixed simulation step as delivered by the host.
///
/// `tick` must advance between consecutive steps. Schedulers treat a step carrying the same
/// `tick` as the one a node yielded on as the same step, so that node is not resumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    pub seed: u64,
}

impl TickContext {
    pub fn new(tick: u64, dt_seconds: f32) -> Self {
        Self {
            tick,
            dt_seconds,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The following step with the same delta and seed.
    pub fn next(&self) -> Self {
        Self {
            tick: self.tick.wrapping_add(1),
            ..*self
        }
    }

    pub fn rng_for_actor<A: ActorId>(&self, actor: A, stream: u64) -> SplitMix64 {
        let seed = rng::derive_seed(self.seed ^ self.tick, actor.stable_id(), stream);
        SplitMix64::new(seed)
    }
}
