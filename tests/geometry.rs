//! Property-based test for the geometry identity in `spec.md` §8:
//!
//! > `partsize = headers_size + 4·chunks_total + first + last +
//! > (chunks_total − 2)·chunksize` (with the one/two-chunk special cases).

use partfile::container::geometry::calculate;
use proptest::prelude::*;

const HEADERS_SIZE: u64 = 64;

proptest! {
    #[test]
    fn partsize_matches_closed_form_for_many_chunk_files(
        chunksize in 1u32..64,
        middle_chunks in 1i64..20,
        first in 1i64..64,
        last in 1i64..64,
    ) {
        prop_assume!(first <= chunksize as i64);
        prop_assume!(last <= chunksize as i64);

        let size = first + last + middle_chunks * chunksize as i64;
        let g = calculate(size, chunksize, first, last, HEADERS_SIZE).unwrap();

        prop_assert_eq!(g.chunks_total, 2 + middle_chunks);
        let expected = HEADERS_SIZE as i64
            + 4 * g.chunks_total
            + g.first_chunksize
            + g.last_chunksize
            + (g.chunks_total - 2) * chunksize as i64;
        prop_assert_eq!(g.partsize, expected);
    }

    #[test]
    fn single_chunk_identity(chunksize in 1u32..64, size in 1i64..64) {
        prop_assume!(size <= chunksize as i64);
        let g = calculate(size, chunksize, size, -1, HEADERS_SIZE).unwrap();
        prop_assert_eq!(g.chunks_total, 1);
        prop_assert_eq!(g.partsize, HEADERS_SIZE as i64 + 4 + size);
    }

    #[test]
    fn two_chunk_identity(chunksize in 1u32..64, first in 1i64..64, last in 1i64..64) {
        prop_assume!(first <= chunksize as i64);
        prop_assume!(last <= chunksize as i64);
        let size = first + last;
        let g = calculate(size, chunksize, first, last, HEADERS_SIZE).unwrap();
        prop_assert_eq!(g.chunks_total, 2);
        prop_assert_eq!(g.partsize, HEADERS_SIZE as i64 + 8 + first + last);
    }

    #[test]
    fn derives_missing_boundary_then_matches_identity(
        chunksize in 1u32..64,
        middle_chunks in 0i64..10,
        first in 1i64..64,
    ) {
        prop_assume!(first <= chunksize as i64);
        // Choose a size for which `last` derives out to something <= chunksize:
        // size = first + middle_chunks*chunksize + last, with last in 1..=chunksize.
        let last_target = (chunksize as i64 - 1) % chunksize as i64 + 1;
        let size = first + middle_chunks * chunksize as i64 + last_target;
        let g = calculate(size, chunksize, first, -1, HEADERS_SIZE).unwrap();
        prop_assert_eq!(g.last_chunksize, last_target);

        let g2 = calculate(size, chunksize, g.first_chunksize, g.last_chunksize, HEADERS_SIZE).unwrap();
        prop_assert_eq!(g.partsize, g2.partsize);
        prop_assert_eq!(g.chunks_total, g2.chunks_total);
    }
}
