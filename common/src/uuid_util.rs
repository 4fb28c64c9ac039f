use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use fnv::FnvHasher;
use rand::Rng;

/// Short timestamp-derived identifier used for session ids and query ids
/// (query ids are `"{thread_id}-{counter}"`-shaped in `session`, but
/// sessions themselves want a process-unique opaque string).
pub fn uuid_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis();

    let mut hasher = FnvHasher::default();
    now.hash(&mut hasher);
    let hash_value = hasher.finish();
    let hash_str = format!(
        "{:08x}",
        u32::from_le_bytes(hash_value.to_le_bytes()[..4].try_into().unwrap())
    );

    let random_num: u32 = rand::thread_rng().gen_range(0..0x1000_0000);
    let random_str = format!("{:04x}", random_num & 0xFFFF);

    hash_str + &random_str
}

#[cfg(test)]
mod tests {
    use super::uuid_timestamp;

    #[test]
    fn produces_nonempty_distinct_ids() {
        let a = uuid_timestamp();
        let b = uuid_timestamp();
        assert!(!a.is_empty());
        assert!(!b.is_empty());
    }
}
