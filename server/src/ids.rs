use std::time::{SystemTime, UNIX_EPOCH};

use plaza_shared::protocol::ConnectionId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Salt values per millisecond. Ids are `millis * SALT_RANGE + salt`.
const SALT_RANGE: u64 = 1000;

/// Hands out connection ids: a millisecond timestamp combined with a random
/// salt.
///
/// The timestamp part never repeats or goes backwards within one generator,
/// so ids from the same process are distinct. They are not meant to be
/// unguessable.
pub struct IdGenerator {
    rng: ChaCha8Rng,
    last_millis: u64,
}

impl IdGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_millis: 0,
        }
    }

    pub fn next_id(&mut self) -> ConnectionId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_id_at(now)
    }

    fn next_id_at(&mut self, now_millis: u64) -> ConnectionId {
        let millis = now_millis.max(self.last_millis + 1);
        self.last_millis = millis;
        let salt = self.rng.gen_range(0..SALT_RANGE);
        ConnectionId::from(millis * SALT_RANGE + salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_within_same_millisecond() {
        let mut ids = IdGenerator::new(Some(7));
        let seen: HashSet<_> = (0..10_000).map(|_| ids.next_id_at(1_000)).collect();
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn clock_going_backwards_still_yields_fresh_ids() {
        let mut ids = IdGenerator::new(Some(7));
        let a = ids.next_id_at(5_000);
        let b = ids.next_id_at(4_000);
        assert_ne!(a, b);
        let a: u64 = a.as_str().parse().unwrap();
        let b: u64 = b.as_str().parse().unwrap();
        assert!(b > a);
    }

    #[test]
    fn id_embeds_timestamp() {
        let mut ids = IdGenerator::new(Some(1));
        let id: u64 = ids.next_id_at(1_700_000_000_000).as_str().parse().unwrap();
        assert_eq!(id / SALT_RANGE, 1_700_000_000_000);
    }

    #[test]
    fn same_seed_same_salts() {
        let mut a = IdGenerator::new(Some(99));
        let mut b = IdGenerator::new(Some(99));
        for t in 1..50 {
            assert_eq!(a.next_id_at(t), b.next_id_at(t));
        }
    }

    #[test]
    fn ids_are_decimal_strings() {
        let mut ids = IdGenerator::new(None);
        let id = ids.next_id();
        assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
    }
}
