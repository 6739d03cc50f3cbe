/// Largest power of two that is still a checkpoint.
const LAST_POWER_OF_TWO: u64 = 512;

/// Spacing of checkpoints in the steady-state tail.
pub const TAIL_INTERVAL: u64 = 1000;

/// Whether the `n`th occurrence is a checkpoint: a power of two up to 512,
/// or a multiple of 1000.
pub fn is_checkpoint(n: u64) -> bool {
    if n == 0 {
        return false;
    }
    (n <= LAST_POWER_OF_TWO && n.is_power_of_two()) || n % TAIL_INTERVAL == 0
}

/// Next checkpoint strictly after `n`.
pub fn next_checkpoint(n: u64) -> u64 {
    if n < LAST_POWER_OF_TWO {
        (n + 1).next_power_of_two()
    } else {
        (n / TAIL_INTERVAL + 1) * TAIL_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_thousand() {
        let expected = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1000];
        let hits: Vec<u64> = (1..=1000).filter(|&n| is_checkpoint(n)).collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn tail_is_every_thousand() {
        for n in 1001..=5000 {
            assert_eq!(is_checkpoint(n), n % 1000 == 0, "n = {n}");
        }
        assert!(!is_checkpoint(1024));
        assert!(!is_checkpoint(2048));
    }

    #[test]
    fn zero_is_not_a_checkpoint() {
        assert!(!is_checkpoint(0));
    }

    #[test]
    fn next_checkpoint_walks_the_sequence() {
        let mut n = 0;
        let mut seen = Vec::new();
        while n < 3000 {
            n = next_checkpoint(n);
            seen.push(n);
        }
        assert_eq!(
            seen,
            [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1000, 2000, 3000]
        );
        assert_eq!(next_checkpoint(700), 1000);
    }
}
