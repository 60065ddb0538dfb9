// Atlas — naming.rs
// Default dataset names.
// Author: d65v <https://github.com/d65v>

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "autumn", "billowing", "bold", "brave", "bright", "calm", "cobalt",
    "crimson", "curious", "dawn", "divine", "dry", "eager", "falling", "floral", "fragrant",
    "gentle", "golden", "hidden", "icy", "jolly", "lively", "lucky", "misty", "morning",
    "nimble", "quiet", "rapid", "restless", "silent", "snowy", "solitary", "sparkling",
    "spring", "still", "swift", "twilight", "wandering", "weathered", "wild", "winter",
];

const NOUNS: &[&str] = &[
    "bird", "breeze", "brook", "butterfly", "cloud", "dew", "dream", "dust", "feather",
    "field", "fire", "firefly", "flower", "fog", "forest", "frog", "glade", "glitter",
    "grass", "haze", "hill", "lake", "leaf", "meadow", "moon", "mountain", "night", "paper",
    "pine", "pond", "rain", "resonance", "river", "sea", "shadow", "sky", "smoke", "snow",
    "sound", "star", "sun", "sunset", "surf", "thunder", "tree", "violet", "voice", "water",
    "waterfall", "wave", "wildflower", "wind", "wood",
];

/// Strategy used to name a dataset when the caller gives no name.
pub type NameGenerator = fn() -> String;

/// Build an `adjective-noun` name from the given source of randomness.
///
/// Deterministic for a seeded `rng`.
pub fn random_name_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(rng).copied().unwrap_or("meadow");
    format!("{}-{}", adjective, noun)
}

/// Default [`NameGenerator`], drawing from the thread-local RNG.
pub fn random_name() -> String {
    random_name_with(&mut rand::thread_rng())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
