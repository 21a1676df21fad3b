/// Jump consistent hashing, used to choose the owning peer of a key
/// inside a region.
/// Based on:
/// https://arxiv.org/ftp/arxiv/papers/1406/1406.2294.pdf
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const MAGIC_CONSTANT: u64 = 2862933555777941757;

/// Map `key` to a bucket in `0..number_of_buckets`.
/// `number_of_buckets` must be non-zero.
pub fn jump_consistent_hash(key: &str, number_of_buckets: u32) -> u32 {
    let mut hasher: DefaultHasher = Default::default();
    key.hash(&mut hasher);
    let mut key_as_u64: u64 = hasher.finish();

    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < i64::from(number_of_buckets) {
        b = j;
        key_as_u64 = key_as_u64.wrapping_mul(MAGIC_CONSTANT).wrapping_add(1);
        let shifted = ((key_as_u64 >> 33) + 1) as f64;
        j = ((b + 1) as f64 * ((1u64 << 31) as f64 / shifted)) as i64;
    }
    b.max(0) as u32
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Alphanumeric, DistString};

    use super::*;

    #[test]
    fn check_consistency() {
        // same key; same count
        let key = "rule_client".to_string();
        let expected = jump_consistent_hash(&key, 10);
        assert_eq!(expected, jump_consistent_hash(&key, 10));

        // 1 bucket is uninteresting because the answer is always 0
        assert_eq!(jump_consistent_hash(&key, 1), 0);

        for word_size in 2..50 {
            let string = Alphanumeric.sample_string(&mut rand::thread_rng(), word_size);
            for bucket_count in 1..50 {
                let jmp_hash = jump_consistent_hash(&string, bucket_count);
                assert!(jmp_hash < bucket_count);
            }
        }
    }

    #[test]
    fn check_spread() {
        let mut seen = [0usize; 4];
        for i in 0..1000 {
            let bucket = jump_consistent_hash(&format!("key-{}", i), 4);
            seen[bucket as usize] += 1;
        }
        assert!(seen.iter().all(|count| *count > 0));
    }
}
