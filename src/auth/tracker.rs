/// Tracker Generation
///
/// A tracker is a short, statistically unique, human-quotable id naming an
/// agent lineage. It is not a secret: it travels as the `sub` claim.

use rand::Rng;

const TRACKER_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const TRACKER_LENGTH: usize = 8;

/// Generate a new tracker from the thread-local CSPRNG
pub fn generate_tracker() -> String {
    let mut rng = rand::thread_rng();
    (0..TRACKER_LENGTH)
        .map(|_| TRACKER_ALPHABET[rng.gen_range(0..TRACKER_ALPHABET.len())] as char)
        .collect()
}
