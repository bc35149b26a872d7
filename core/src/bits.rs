//! Byte/bit conversion and the whole-payload checksum

/// Expand bytes to bits, most significant bit first
pub fn bytes_to_bits(data: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Pack bits into bytes; an incomplete trailing group is zero-padded on the right
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|group| {
            group
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| if bit { byte | 1 << (7 - i) } else { byte })
        })
        .collect()
}

/// Append `value` as a `width`-bit unsigned big-endian field
pub fn push_uint(bits: &mut Vec<bool>, value: u64, width: usize) {
    for i in (0..width).rev() {
        bits.push(i < 64 && (value >> i) & 1 == 1);
    }
}

/// Read a big-endian unsigned field
pub fn read_uint(bits: &[bool]) -> u64 {
    bits.iter().fold(0u64, |acc, &bit| (acc << 1) | bit as u64)
}

/// Adler-32 over the exact byte buffer
pub fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    // Largest block that cannot overflow `b` before reduction
    const NMAX: usize = 5552;

    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for block in data.chunks(NMAX) {
        for &byte in block {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    (b << 16) | a
}
