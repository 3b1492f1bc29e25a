//! Tokenizer round-trip: for every byte sequence and every chunking of it,
//! the emitted segments concatenate back to the input.

use proptest::prelude::*;

use secretty::ansi::{Segment, Tokenizer};

/// Byte soup biased toward escape-sequence structure.
fn ansi_ish_bytes() -> impl Strategy<Value = Vec<u8>> {
    let atom = prop_oneof![
        4 => proptest::collection::vec(any::<u8>(), 0..12),
        3 => Just(b"\x1b[31m".to_vec()),
        2 => Just(b"\x1b]0;title\x07".to_vec()),
        2 => Just(b"\x1b]8;;http://x\x1b\\".to_vec()),
        1 => Just(b"\x1bP+q\x1b\\".to_vec()),
        1 => Just(b"\x1b".to_vec()),
        1 => Just(b"\x1b[".to_vec()),
    ];
    proptest::collection::vec(atom, 0..16).prop_map(|parts| parts.concat())
}

fn chunkings(bytes: Vec<u8>) -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    let len = bytes.len();
    proptest::collection::vec(1..8usize, 0..24).prop_map(move |sizes| {
        let mut cuts = Vec::new();
        let mut at = 0;
        for size in sizes {
            at += size;
            if at >= len {
                break;
            }
            cuts.push(at);
        }
        (bytes.clone(), cuts)
    })
}

fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut prev = 0;
    for &cut in cuts {
        chunks.push(bytes[prev..cut].to_vec());
        prev = cut;
    }
    chunks.push(bytes[prev..].to_vec());
    chunks
}

proptest! {
    #[test]
    fn segments_reassemble_to_input((bytes, cuts) in ansi_ish_bytes().prop_flat_map(chunkings)) {
        let mut tokenizer = Tokenizer::new();
        let mut reassembled = Vec::new();
        for chunk in split_at_cuts(&bytes, &cuts) {
            for seg in tokenizer.push(&chunk) {
                reassembled.extend_from_slice(seg.bytes());
            }
        }
        for seg in tokenizer.flush() {
            reassembled.extend_from_slice(seg.bytes());
        }
        prop_assert_eq!(reassembled, bytes);
    }

    #[test]
    fn text_segments_never_contain_esc((bytes, cuts) in ansi_ish_bytes().prop_flat_map(chunkings)) {
        let mut tokenizer = Tokenizer::new();
        for chunk in split_at_cuts(&bytes, &cuts) {
            for seg in tokenizer.push(&chunk) {
                if let Segment::Text(text) = &seg {
                    prop_assert!(!text.contains(&0x1b));
                }
            }
        }
    }

    #[test]
    fn chunking_does_not_change_segmentation(bytes in ansi_ish_bytes(), cut in 0..64usize) {
        // Whole-input segmentation equals split-input segmentation once
        // segments are reassembled per kind.
        let mut whole = Tokenizer::new();
        let mut whole_segs = whole.push(&bytes);
        whole_segs.extend(whole.flush());

        let cut = cut.min(bytes.len());
        let mut split = Tokenizer::new();
        let mut split_segs = split.push(&bytes[..cut]);
        split_segs.extend(split.push(&bytes[cut..]));
        split_segs.extend(split.flush());

        let concat = |segs: &[Segment]| -> Vec<u8> {
            segs.iter().flat_map(|s| s.bytes().to_vec()).collect()
        };
        prop_assert_eq!(concat(&whole_segs), concat(&split_segs));

        let escapes = |segs: &[Segment]| -> Vec<Vec<u8>> {
            segs.iter()
                .filter_map(|s| match s {
                    Segment::Escape(b) => Some(b.clone()),
                    Segment::Text(_) => None,
                })
                .collect()
        };
        prop_assert_eq!(escapes(&whole_segs), escapes(&split_segs));
    }
}
