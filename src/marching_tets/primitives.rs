//! Scan and sort primitives for the extraction pipeline.
//!
//! The pipeline treats these as black-box operations with fixed contracts:
//! exclusive prefix scans (scalar and componentwise pair) that append the
//! total, and a stable radix sort of (u64 key, 4-float value) pairs. Scratch
//! space comes from the engine's pre-allocated pool, never from the primitive.

/// Exclusive prefix scan over `buf[..n]` where `n = buf.len() - 1`.
///
/// On return, `buf[i]` holds the sum of the original `buf[..i]` and the final
/// slot holds the total. The final slot's input value is ignored.
pub fn exclusive_scan(buf: &mut [u32]) {
    let mut sum = 0u32;
    for v in buf.iter_mut() {
        let x = *v;
        *v = sum;
        sum += x;
    }
}

/// Componentwise exclusive prefix scan over pairs, same contract as
/// [`exclusive_scan`].
pub fn exclusive_scan_pairs(buf: &mut [[u32; 2]]) {
    let mut sum = [0u32; 2];
    for v in buf.iter_mut() {
        let x = *v;
        *v = sum;
        sum[0] += x[0];
        sum[1] += x[1];
    }
}

const RADIX_BITS: u32 = 8;
const RADIX: usize = 1 << RADIX_BITS;

/// Stable least-significant-digit radix sort of `keys[..n]` carrying
/// `values[..n]` as payload.
///
/// Only the low `key_bits` bits participate in the ordering; ties beyond them
/// keep their input order. `tmp_keys` and `tmp_values` must be at least `n`
/// long. Elements past `n` are untouched.
pub fn sort_pairs(
    keys: &mut [u64],
    values: &mut [[f32; 4]],
    n: usize,
    key_bits: u32,
    tmp_keys: &mut [u64],
    tmp_values: &mut [[f32; 4]],
) {
    debug_assert!(tmp_keys.len() >= n && tmp_values.len() >= n);
    let key_bits = key_bits.clamp(1, 64);
    let passes = key_bits.div_ceil(RADIX_BITS);

    // Ping-pong between the primary and scratch buffers one digit at a time.
    let mut in_scratch = false;
    for pass in 0..passes {
        let shift = pass * RADIX_BITS;
        let (src_k, src_v, dst_k, dst_v): (&[u64], &[[f32; 4]], &mut [u64], &mut [[f32; 4]]) =
            if in_scratch {
                (tmp_keys, tmp_values, &mut *keys, &mut *values)
            } else {
                (keys, values, &mut *tmp_keys, &mut *tmp_values)
            };

        let mut histogram = [0u32; RADIX];
        for &k in &src_k[..n] {
            histogram[((k >> shift) as usize) & (RADIX - 1)] += 1;
        }
        let mut offset = 0u32;
        for h in &mut histogram {
            let count = *h;
            *h = offset;
            offset += count;
        }
        for i in 0..n {
            let digit = ((src_k[i] >> shift) as usize) & (RADIX - 1);
            let dst = histogram[digit] as usize;
            histogram[digit] += 1;
            dst_k[dst] = src_k[i];
            dst_v[dst] = src_v[i];
        }
        in_scratch = !in_scratch;
    }

    if in_scratch {
        keys[..n].copy_from_slice(&tmp_keys[..n]);
        values[..n].copy_from_slice(&tmp_values[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_scan_appends_total() {
        let mut buf = [1, 0, 2, 3, 99];
        exclusive_scan(&mut buf);
        assert_eq!(buf, [0, 1, 1, 3, 6]);
    }

    #[test]
    fn exclusive_scan_pairs_is_componentwise() {
        let mut buf = [[1, 3], [2, 0], [0, 0]];
        exclusive_scan_pairs(&mut buf);
        assert_eq!(buf, [[0, 0], [1, 3], [3, 3]]);
    }

    #[test]
    fn sort_pairs_orders_keys_and_carries_values() {
        let mut keys = vec![5u64, 1, 4, 1, 3, u64::MAX];
        let mut values: Vec<[f32; 4]> = (0..6).map(|i| [i as f32, 0.0, 0.0, 0.0]).collect();
        let mut tmp_k = vec![0u64; 6];
        let mut tmp_v = vec![[0.0f32; 4]; 6];
        // Sort only the first five; the sentinel at the end stays put.
        sort_pairs(&mut keys, &mut values, 5, 64, &mut tmp_k, &mut tmp_v);
        assert_eq!(&keys[..5], &[1, 1, 3, 4, 5]);
        assert_eq!(keys[5], u64::MAX);
        // Stability: the two key-1 values keep their input order.
        assert_eq!(values[0][0], 1.0);
        assert_eq!(values[1][0], 3.0);
        assert_eq!(values[2][0], 4.0);
    }

    #[test]
    fn sort_pairs_handles_high_bits() {
        let a = 7u64 << 56;
        let b = 3u64 << 56;
        let mut keys = vec![a, b];
        let mut values = vec![[1.0, 0.0, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0]];
        let mut tmp_k = vec![0u64; 2];
        let mut tmp_v = vec![[0.0f32; 4]; 2];
        sort_pairs(&mut keys, &mut values, 2, 64, &mut tmp_k, &mut tmp_v);
        assert_eq!(keys, vec![b, a]);
        assert_eq!(values[0][0], 2.0);
    }
}
