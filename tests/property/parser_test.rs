// tests/property/parser_test.rs

//! Property-based tests for message tokenization

use linewire::core::protocol::{FramingPolicy, parse_buffer, parse_message};
use proptest::prelude::*;

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.:é€-]{1,12}"
}

fn separator() -> impl Strategy<Value = String> {
    "[ \t]{1,4}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_tokens_survive_arbitrary_spacing(
        tokens in prop::collection::vec(token(), 1..10),
        seps in prop::collection::vec(separator(), 10),
        lead in "[ \t]{0,3}",
        trail in "[ \t\r\n]{0,3}",
    ) {
        let mut text = lead.clone();
        for (i, tok) in tokens.iter().enumerate() {
            if i > 0 {
                text.push_str(&seps[i]);
            }
            text.push_str(tok);
        }
        text.push_str(&trail);

        let message = parse_message(&text).unwrap();
        prop_assert_eq!(&message.command, &tokens[0]);
        prop_assert_eq!(&message.args[..], &tokens[1..]);
        prop_assert_eq!(message.arity(), tokens.len() - 1);
    }

    #[test]
    fn test_lines_policy_yields_one_message_per_non_blank_line(
        lines in prop::collection::vec(prop::collection::vec(token(), 0..4), 0..8),
    ) {
        let text: String = lines.iter().map(|l| format!("{}\n", l.join(" "))).collect();
        let batch = parse_buffer(&text, FramingPolicy::Lines);

        let expected: Vec<&Vec<String>> = lines.iter().filter(|l| !l.is_empty()).collect();
        prop_assert_eq!(batch.len(), expected.len());
        for (message, tokens) in batch.iter().zip(expected) {
            prop_assert_eq!(&message.command, &tokens[0]);
            prop_assert_eq!(&message.args[..], &tokens[1..]);
        }
    }

    #[test]
    fn test_whole_buffer_yields_at_most_one_message(text in "[ -~\n]{0,64}") {
        prop_assert!(parse_buffer(&text, FramingPolicy::WholeBuffer).len() <= 1);
    }
}
