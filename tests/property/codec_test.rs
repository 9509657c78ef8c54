// tests/property/codec_test.rs

//! Property-based tests for the framing codec
//! Tests that how bytes are split across receives never changes what is decoded

use bytes::BytesMut;
use linewire::core::protocol::{CommandCodec, FramingPolicy, Message, parse_buffer};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

/// Feeds `input` to `codec` in pieces cut at `cuts`, then signals end of stream.
fn decode_in_pieces(codec: &mut CommandCodec, input: &[u8], cuts: &[usize]) -> Vec<Message> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
    points.push(input.len());
    points.sort_unstable();

    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    let mut start = 0;
    for end in points {
        buf.extend_from_slice(&input[start..end]);
        start = end;
        while let Some(batch) = codec.decode(&mut buf).unwrap() {
            out.extend(batch);
        }
    }
    while let Some(batch) = codec.decode_eof(&mut buf).unwrap() {
        out.extend(batch);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_lines_are_independent_of_receive_boundaries(
        text in "([A-Za-z0-9é€ ]{0,20}\n){0,8}[A-Za-z0-9 ]{0,10}",
        cuts in prop::collection::vec(any::<usize>(), 0..6),
    ) {
        let mut codec = CommandCodec::new(FramingPolicy::Lines, 512, 4096);
        let decoded = decode_in_pieces(&mut codec, text.as_bytes(), &cuts);
        prop_assert_eq!(decoded, parse_buffer(&text, FramingPolicy::Lines));
    }

    #[test]
    fn test_whole_buffer_never_splits_a_character(
        word in "[a-zé€😀]{1,48}",
        chunk in 1usize..=8,
        cuts in prop::collection::vec(any::<usize>(), 0..6),
    ) {
        let mut codec = CommandCodec::new(FramingPolicy::WholeBuffer, chunk, 4096);
        let decoded = decode_in_pieces(&mut codec, word.as_bytes(), &cuts);

        // Without whitespace every chunk is a single bare command.
        let mut rebuilt = String::new();
        for message in &decoded {
            prop_assert!(message.args.is_empty());
            prop_assert!(message.command.len() <= chunk.max(4));
            rebuilt.push_str(&message.command);
        }
        prop_assert_eq!(rebuilt, word);
    }
}
