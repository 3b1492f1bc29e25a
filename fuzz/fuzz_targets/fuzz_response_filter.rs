//! Fuzz target for the startup response filter.
//!
//! The filter must never lose user bytes: everything that is not part of an
//! OSC 11 or DSR response must come out of `filter` or remain recoverable
//! via `take_pending`, regardless of how reads are chunked.

#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;

use secretty::pty::response_filter::ResponseFilter;

fuzz_target!(|data: &[u8]| {
    let Some((&chunk_hint, stream)) = data.split_first() else {
        return;
    };
    let chunk_size = usize::from(chunk_hint).max(1);

    let mut filter = ResponseFilter::new(Duration::from_secs(600));
    let mut emitted = Vec::new();
    for chunk in stream.chunks(chunk_size) {
        emitted.extend(filter.filter(chunk));
    }
    emitted.extend(filter.take_pending());

    // Dropped bytes must only ever be complete response sequences; the
    // filter can never emit more than it was fed.
    assert!(emitted.len() <= stream.len());
    // Every non-ESC byte that went in either came out or was part of a
    // dropped response, which always starts with ESC.
    if !stream.contains(&0x1b) {
        assert_eq!(emitted, stream);
    }
});
