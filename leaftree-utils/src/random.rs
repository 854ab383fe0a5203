//! random leaves, for testing and benchmarking
use rand::RngCore;

/// `size` random bytes from the thread local rng
pub fn random_data(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// `count` leaves of `size` random bytes each
pub fn random_leaves(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(size)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(random_data(16).len(), 16);
        assert!(random_data(0).is_empty());
        let leaves = random_leaves(3, 8);
        assert_eq!(leaves.len(), 3);
        assert!(leaves.iter().all(|x| x.len() == 8));
        // 64 random bits colliding would be quite something
        assert_ne!(leaves[0], leaves[1]);
    }
}
