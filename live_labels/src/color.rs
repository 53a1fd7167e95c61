use crate::detection::Rgb;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn next_u8(&mut self) -> u8 {
        (self.next_u64() >> 56) as u8
    }
}

/// Color for a class name, stable across calls, processes and platforms.
///
/// The name is hashed with FNV-1a and the hash seeds a SplitMix64 generator,
/// whose next three outputs give the red, green and blue components. Distinct
/// names can still collide.
pub fn color_for(name: &str) -> Rgb {
    let mut rng = SplitMix64::new(fnv1a(name));
    Rgb {
        red: rng.next_u8(),
        green: rng.next_u8(),
        blue: rng.next_u8(),
    }
}
