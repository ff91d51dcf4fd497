//! Match kernels (§4.4, C4): `batch[i] op cmp` over up to 64 elements,
//! packed into a `u64` mask. Grounded on `original_source/lib/match.c`,
//! which dispatches per-type scalar loops keyed on `enum cx_column_type`;
//! this crate adds the SIMD path the spec calls for in §4.4/§9, gated on
//! the `simd128`/`simd256`/`simd512` features (at most one is meant to be
//! active at a time — a deployment decision, not a runtime one).
//!
//! `#![deny(unsafe_code)]` at the crate root is relaxed to an
//! `#[allow(unsafe_code)]` on just this module: there is no safe stable
//! API for the SSE4.2/AVX2/AVX-512 compare intrinsics the dispatch rule
//! requires, and zero-copy batches (`column.rs`) are the whole point of
//! the kernel/cursor split. See `DESIGN.md`.

#![allow(unsafe_code)]

/// The three leaf comparison operators (§3: `CMP(column, op, literal)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Gt,
}

/// Is a SIMD match path compiled into this build at all? The dispatch
/// rule (§4.4) only reaches for SIMD when `size == 64`; otherwise, or
/// when no width feature is enabled, everything runs through the scalar
/// path below, which is defined to agree with SIMD bit-for-bit (§8
/// invariant 7).
const fn simd_compiled() -> bool {
    cfg!(any(feature = "simd128", feature = "simd256", feature = "simd512"))
        && cfg!(target_arch = "x86_64")
}

/// Scalar reference implementation for any numeric type. `PartialOrd`'s
/// behavior for `NaN` (every comparison is `false`) already gives the
/// IEEE-754 unordered semantics §4.4 requires for `eq`/`lt`/`gt`, so a
/// single generic body covers both integers and floats.
fn scalar_match<T: PartialOrd + Copy>(batch: &[T], size: usize, op: Cmp, cmp: T) -> u64 {
    debug_assert!(size <= 64 && size <= batch.len());
    let mut mask = 0u64;
    for (i, &v) in batch[..size].iter().enumerate() {
        let hit = match op {
            Cmp::Eq => v == cmp,
            Cmp::Lt => v < cmp,
            Cmp::Gt => v > cmp,
        };
        if hit {
            mask |= 1 << i;
        }
    }
    mask
}

macro_rules! define_numeric_kernel {
    ($fn_name:ident, $ty:ty, $simd_fn:path) => {
        /// Dispatches to the compiled-in SIMD kernel when `size == 64` and
        /// the CPU actually supports it; otherwise scalar (§4.4 dispatch
        /// rule). An empty batch always yields 0.
        pub fn $fn_name(batch: &[$ty], size: usize, op: Cmp, cmp: $ty) -> u64 {
            if size == 0 {
                return 0;
            }
            if size == 64 && simd_compiled() {
                if let Some(mask) = $simd_fn(batch, op, cmp) {
                    return mask;
                }
            }
            scalar_match(batch, size, op, cmp)
        }
    };
}

define_numeric_kernel!(match_i32, i32, simd::try_match_i32);
define_numeric_kernel!(match_i64, i64, simd::try_match_i64);
define_numeric_kernel!(match_f32, f32, simd::try_match_f32);
define_numeric_kernel!(match_f64, f64, simd::try_match_f64);

/// SIMD variants. Each `try_match_*` returns `None` when the running CPU
/// lacks the required feature (checked at runtime via
/// `is_x86_feature_detected!`) or no `simd*` feature was compiled in, in
/// which case the caller falls back to `scalar_match`. Every variant
/// partitions the 64-element batch into `64 / lanes` chunks, computes a
/// per-chunk lane mask, and OR-shifts it into the result at the chunk's
/// lane offset — the "64 / (W/sizeof(T)) chunks...shifted by lane index"
/// rule in §4.4.
mod simd {
    use super::Cmp;

    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    pub fn try_match_i32(batch: &[i32], op: Cmp, cmp: i32) -> Option<u64> {
        #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
        {
            if is_x86_feature_detected!("sse4.2") {
                return Some(unsafe { match_i32_sse42(batch, op, cmp) });
            }
        }
        #[cfg(all(target_arch = "x86_64", feature = "simd256"))]
        {
            if is_x86_feature_detected!("avx2") {
                return Some(unsafe { match_i32_avx2(batch, op, cmp) });
            }
        }
        #[cfg(all(target_arch = "x86_64", feature = "simd512"))]
        {
            if is_x86_feature_detected!("avx512f") {
                return Some(unsafe { match_i32_avx512(batch, op, cmp) });
            }
        }
        let _ = (batch, op, cmp);
        None
    }

    pub fn try_match_i64(batch: &[i64], op: Cmp, cmp: i64) -> Option<u64> {
        #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
        {
            if is_x86_feature_detected!("sse4.2") {
                return Some(unsafe { match_i64_sse42(batch, op, cmp) });
            }
        }
        let _ = (batch, op, cmp);
        None
    }

    pub fn try_match_f32(batch: &[f32], op: Cmp, cmp: f32) -> Option<u64> {
        #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
        {
            if is_x86_feature_detected!("sse2") {
                return Some(unsafe { match_f32_sse2(batch, op, cmp) });
            }
        }
        #[cfg(all(target_arch = "x86_64", feature = "simd256"))]
        {
            if is_x86_feature_detected!("avx") {
                return Some(unsafe { match_f32_avx(batch, op, cmp) });
            }
        }
        let _ = (batch, op, cmp);
        None
    }

    pub fn try_match_f64(batch: &[f64], op: Cmp, cmp: f64) -> Option<u64> {
        #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
        {
            if is_x86_feature_detected!("sse2") {
                return Some(unsafe { match_f64_sse2(batch, op, cmp) });
            }
        }
        let _ = (batch, op, cmp);
        None
    }

    /// 4 lanes/chunk, 16 chunks of 4 i32 = 64. Requires SSE4.2 for
    /// `_mm_cmpgt_epi32`'s sign-aware siblings to stay correct across the
    /// full `i32` range (SSE2 alone suffices for `eq`/`gt`, but SSE4.2 is
    /// what `original_source` compiled against, `CX_SSE42`).
    #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
    #[target_feature(enable = "sse4.2")]
    unsafe fn match_i32_sse42(batch: &[i32], op: Cmp, cmp: i32) -> u64 {
        let needle = _mm_set1_epi32(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(4).enumerate() {
            let hay = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
            let cmp_vec = match op {
                Cmp::Eq => _mm_cmpeq_epi32(hay, needle),
                Cmp::Lt => _mm_cmpgt_epi32(needle, hay),
                Cmp::Gt => _mm_cmpgt_epi32(hay, needle),
            };
            let lane_mask = _mm_movemask_ps(_mm_castsi128_ps(cmp_vec)) as u64;
            mask |= lane_mask << (chunk_idx * 4);
        }
        mask
    }

    /// 4 lanes/chunk, 16 chunks of 4 i32 = 64; AVX2 doubles the lane width
    /// per load so this is 8 lanes/chunk, 8 chunks of 8 = 64.
    #[cfg(all(target_arch = "x86_64", feature = "simd256"))]
    #[target_feature(enable = "avx2")]
    unsafe fn match_i32_avx2(batch: &[i32], op: Cmp, cmp: i32) -> u64 {
        let needle = _mm256_set1_epi32(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(8).enumerate() {
            let hay = _mm256_loadu_si256(chunk.as_ptr() as *const __m256i);
            let cmp_vec = match op {
                Cmp::Eq => _mm256_cmpeq_epi32(hay, needle),
                Cmp::Lt => _mm256_cmpgt_epi32(needle, hay),
                Cmp::Gt => _mm256_cmpgt_epi32(hay, needle),
            };
            let lane_mask = _mm256_movemask_ps(_mm256_castsi256_ps(cmp_vec)) as u64;
            mask |= lane_mask << (chunk_idx * 8);
        }
        mask
    }

    /// 16 lanes/chunk, 4 chunks of 16 i32 = 64. AVX-512 mask compares
    /// return the lane mask directly — no `movemask` needed.
    #[cfg(all(target_arch = "x86_64", feature = "simd512"))]
    #[target_feature(enable = "avx512f")]
    unsafe fn match_i32_avx512(batch: &[i32], op: Cmp, cmp: i32) -> u64 {
        let needle = _mm512_set1_epi32(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(16).enumerate() {
            let hay = _mm512_loadu_si512(chunk.as_ptr() as *const _);
            let lane_mask: u16 = match op {
                Cmp::Eq => _mm512_cmpeq_epi32_mask(hay, needle),
                Cmp::Lt => _mm512_cmplt_epi32_mask(hay, needle),
                Cmp::Gt => _mm512_cmpgt_epi32_mask(hay, needle),
            };
            mask |= (lane_mask as u64) << (chunk_idx * 16);
        }
        mask
    }

    /// 2 lanes/chunk, 32 chunks of 2 i64 = 64.
    #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
    #[target_feature(enable = "sse4.2")]
    unsafe fn match_i64_sse42(batch: &[i64], op: Cmp, cmp: i64) -> u64 {
        let needle = _mm_set1_epi64x(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(2).enumerate() {
            let hay = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
            let cmp_vec = match op {
                Cmp::Eq => _mm_cmpeq_epi64(hay, needle),
                Cmp::Lt => _mm_cmpgt_epi64(needle, hay),
                Cmp::Gt => _mm_cmpgt_epi64(hay, needle),
            };
            // Each 64-bit lane's compare result occupies both halves of a
            // `movemask_pd` double; one bit per lane is what we want.
            let lane_mask = _mm_movemask_pd(_mm_castsi128_pd(cmp_vec)) as u64;
            mask |= lane_mask << (chunk_idx * 2);
        }
        mask
    }

    /// 4 lanes/chunk, 16 chunks of 4 f32 = 64.
    #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
    #[target_feature(enable = "sse2")]
    unsafe fn match_f32_sse2(batch: &[f32], op: Cmp, cmp: f32) -> u64 {
        let needle = _mm_set1_ps(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(4).enumerate() {
            let hay = _mm_loadu_ps(chunk.as_ptr());
            // Ordered compares: any NaN operand yields all-zero lanes,
            // matching `PartialOrd`'s scalar behavior (§4.4 edge case).
            let cmp_vec = match op {
                Cmp::Eq => _mm_cmpeq_ps(hay, needle),
                Cmp::Lt => _mm_cmplt_ps(hay, needle),
                Cmp::Gt => _mm_cmpgt_ps(hay, needle),
            };
            let lane_mask = _mm_movemask_ps(cmp_vec) as u64;
            mask |= lane_mask << (chunk_idx * 4);
        }
        mask
    }

    /// 8 lanes/chunk, 8 chunks of 8 f32 = 64.
    #[cfg(all(target_arch = "x86_64", feature = "simd256"))]
    #[target_feature(enable = "avx")]
    unsafe fn match_f32_avx(batch: &[f32], op: Cmp, cmp: f32) -> u64 {
        let needle = _mm256_set1_ps(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(8).enumerate() {
            let hay = _mm256_loadu_ps(chunk.as_ptr());
            let cmp_vec = match op {
                Cmp::Eq => _mm256_cmp_ps(hay, needle, _CMP_EQ_OQ),
                Cmp::Lt => _mm256_cmp_ps(hay, needle, _CMP_LT_OQ),
                Cmp::Gt => _mm256_cmp_ps(hay, needle, _CMP_GT_OQ),
            };
            let lane_mask = _mm256_movemask_ps(cmp_vec) as u64;
            mask |= lane_mask << (chunk_idx * 8);
        }
        mask
    }

    /// 2 lanes/chunk, 32 chunks of 2 f64 = 64.
    #[cfg(all(target_arch = "x86_64", feature = "simd128"))]
    #[target_feature(enable = "sse2")]
    unsafe fn match_f64_sse2(batch: &[f64], op: Cmp, cmp: f64) -> u64 {
        let needle = _mm_set1_pd(cmp);
        let mut mask = 0u64;
        for (chunk_idx, chunk) in batch.chunks_exact(2).enumerate() {
            let hay = _mm_loadu_pd(chunk.as_ptr());
            let cmp_vec = match op {
                Cmp::Eq => _mm_cmpeq_pd(hay, needle),
                Cmp::Lt => _mm_cmplt_pd(hay, needle),
                Cmp::Gt => _mm_cmpgt_pd(hay, needle),
            };
            let lane_mask = _mm_movemask_pd(cmp_vec) as u64;
            mask |= lane_mask << (chunk_idx * 2);
        }
        mask
    }
}

/// Case-sensitivity mode for string kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrCase {
    Sensitive,
    /// ASCII-only folding, not locale-aware Unicode (§4.4 edge case).
    Insensitive,
}

fn fold<'a>(s: &'a [u8], case: StrCase, scratch: &'a mut Vec<u8>) -> &'a [u8] {
    match case {
        StrCase::Sensitive => s,
        StrCase::Insensitive => {
            scratch.clear();
            scratch.extend(s.iter().map(|b| b.to_ascii_lowercase()));
            scratch.as_slice()
        }
    }
}

/// String batch match: `eq`/`lt`/`gt` against a fixed needle, per value in
/// `batch` (§4.4 "String matching", six operations). This crate keeps the
/// string kernels scalar: §4.4 only *permits* a 16-byte-compare fast path
/// for short strings, it does not require one, and correctness (not
/// throughput) is what §8 invariant 7 tests.
pub fn match_str_cmp(batch: &[&[u8]], size: usize, op: Cmp, needle: &[u8], case: StrCase) -> u64 {
    debug_assert!(size <= 64 && size <= batch.len());
    let mut scratch_a = Vec::new();
    let mut scratch_b = Vec::new();
    let folded_needle = fold(needle, case, &mut scratch_b).to_vec();
    let mut mask = 0u64;
    for (i, s) in batch[..size].iter().enumerate() {
        let folded = fold(s, case, &mut scratch_a);
        let hit = match op {
            Cmp::Eq => folded == folded_needle.as_slice(),
            Cmp::Lt => folded < folded_needle.as_slice(),
            Cmp::Gt => folded > folded_needle.as_slice(),
        };
        if hit {
            mask |= 1 << i;
        }
    }
    mask
}

/// Where a `STR_CONTAINS` needle is anchored (§3 `location`).
pub use crate::value::StrLocation;

/// `contains_start`/`contains_end`/`contains_any`, case (in)sensitive.
pub fn match_str_contains(
    batch: &[&[u8]],
    size: usize,
    needle: &[u8],
    case: StrCase,
    location: StrLocation,
) -> u64 {
    debug_assert!(size <= 64 && size <= batch.len());
    let mut scratch_a = Vec::new();
    let mut scratch_b = Vec::new();
    let folded_needle = fold(needle, case, &mut scratch_b).to_vec();
    let mut mask = 0u64;
    for (i, s) in batch[..size].iter().enumerate() {
        let folded = fold(s, case, &mut scratch_a);
        let hit = match location {
            StrLocation::Start => folded.starts_with(folded_needle.as_slice()),
            StrLocation::End => folded.ends_with(folded_needle.as_slice()),
            StrLocation::Any => contains_subslice(folded, &folded_needle),
        };
        if hit {
            mask |= 1 << i;
        }
    }
    mask
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
