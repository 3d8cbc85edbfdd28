/// Deterministic PRNG for scripted order streams.
///
/// Both lockstep clients must draw the exact same orders and map layout from a seed, on any
/// platform and across crate upgrades. `xoshiro256**` seeded via SplitMix64 is a fixed, published
/// algorithm that fits in a few lines, so it lives here rather than behind a `rand` version whose
/// stream could change.
#[derive(Clone, Copy, Debug)]
pub struct SimRng {
    state: [u64; 4],
}

impl SimRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        let mut sm = SplitMix64 { state: seed };
        Self {
            state: [sm.next(), sm.next(), sm.next(), sm.next()],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = self.state[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);

        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];

        self.state[2] ^= t;

        self.state[3] = self.state[3].rotate_left(45);

        result
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `range`, rejection-sampled to avoid modulo bias.
    pub fn gen_range_i32(&mut self, range: std::ops::Range<i32>) -> i32 {
        let start = range.start;
        let end = range.end;
        assert!(start < end, "empty range");

        let span = (end as i64 - start as i64) as u32;
        let threshold = u32::MAX - (u32::MAX % span);
        loop {
            let x = self.next_u32();
            if x < threshold {
                return start + (x % span) as i32;
            }
        }
    }

    /// True with probability `1 / n`.
    pub fn one_in(&mut self, n: u32) -> bool {
        n <= 1 || self.next_u32() % n == 0
    }
}

/// Stable identity hash for a player slot, standing in for the engine's player sync hash.
pub fn player_identity_hash(seed: u64, player: u8) -> i32 {
    let mut sm = SplitMix64 {
        state: seed ^ (u64::from(player) << 56),
    };
    sm.next() as i32
}

struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimRng::seed_from_u64(42);
        let mut b = SimRng::seed_from_u64(42);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn gen_range_stays_in_range() {
        let mut rng = SimRng::seed_from_u64(5);
        for _ in 0..1000 {
            let x = rng.gen_range_i32(-3..4);
            assert!((-3..4).contains(&x));
        }
    }

    #[test]
    fn identity_hash_differs_per_player() {
        assert_ne!(player_identity_hash(1, 0), player_identity_hash(1, 1));
        assert_eq!(player_identity_hash(9, 3), player_identity_hash(9, 3));
    }
}
