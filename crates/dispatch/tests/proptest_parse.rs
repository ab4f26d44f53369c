//! Property tests for the parser and completion engine.
//!
//! Arbitrary input must never panic, fully consumed input on an executable
//! node must validate, and completions must stay inside the input.

use mdcommand_dispatch::arguments::{get_integer, integer_range, word};
use mdcommand_dispatch::{argument, literal, CommandDispatcher, ContextChain, NodeId};
use proptest::prelude::*;

fn grammar() -> CommandDispatcher<i32> {
    let mut dispatcher = CommandDispatcher::<i32>::new();
    dispatcher
        .register(literal("say").then(argument("word", word()).executes(|_| Ok(1))))
        .unwrap();
    dispatcher
        .register(
            literal("time").then(
                literal("set").then(
                    argument("value", integer_range(0, 24000)).executes(|ctx| get_integer(ctx, "value")),
                ),
            ),
        )
        .unwrap();
    dispatcher
        .register(literal("op").requires(|level: &i32| *level >= 3).executes(|_| Ok(1)))
        .unwrap();
    let execute = dispatcher.register(literal("execute")).unwrap();
    dispatcher
        .register(
            literal("execute")
                .then(literal("run").redirect(NodeId::ROOT))
                .then(literal("twice").fork(execute, |ctx| Ok(vec![*ctx.source(); 2]))),
        )
        .unwrap();
    dispatcher
}

proptest! {
    /// Property: arbitrary input parses and completes without panicking.
    #[test]
    fn arbitrary_input_never_panics(input in "\\PC{0,40}", level in 0i32..5) {
        let dispatcher = grammar();
        let parse = dispatcher.parse(&input, level);
        let _ = parse.validate();
        let _ = dispatcher.get_completion_suggestions(&parse);
    }

    /// Property: a fully consumed parse ending on an executable node validates
    /// and flattens.
    #[test]
    fn consumed_executable_input_validates(word in "[a-zA-Z0-9_.+-]{1,16}", prefix in 0usize..3) {
        let dispatcher = grammar();
        let input = format!("{}say {word}", "execute run ".repeat(prefix));
        let parse = dispatcher.parse(&input, 0);
        prop_assert!(parse.fully_consumed());
        prop_assert!(parse.validate().is_ok());
        let chain = ContextChain::try_flatten(&parse.context.build(&input));
        prop_assert!(chain.is_some());
        prop_assert_eq!(chain.map(|c| c.len()), Some(prefix + 1));
    }

    /// Property: in-range integers parse to themselves; out-of-range ones fail.
    #[test]
    fn integer_bounds_hold(value in -100_000i64..100_000) {
        let dispatcher = grammar();
        let input = format!("time set {value}");
        let parse = dispatcher.parse(&input, 0);
        prop_assert_eq!(parse.validate().is_ok(), (0..=24000).contains(&value));
    }

    /// Property: completion ranges stay within the input.
    #[test]
    fn suggestion_ranges_stay_in_bounds(input in "[a-z ]{0,24}", level in 0i32..5) {
        let dispatcher = grammar();
        let parse = dispatcher.parse(&input, level);
        let suggestions = dispatcher.get_completion_suggestions(&parse);
        prop_assert!(suggestions.range.end <= input.len());
        for suggestion in &suggestions.list {
            prop_assert!(suggestion.range.start <= suggestion.range.end);
            prop_assert!(suggestion.range.end <= input.len());
        }
    }

    /// Property: restricted commands are invisible below their level.
    #[test]
    fn restricted_commands_are_hidden(level in 0i32..5) {
        let dispatcher = grammar();
        let parse = dispatcher.parse("op", level);
        prop_assert_eq!(parse.validate().is_ok(), level >= 3);
        let parse = dispatcher.parse("o", level);
        let suggestions = dispatcher.get_completion_suggestions(&parse);
        prop_assert_eq!(suggestions.texts().contains(&"op"), level >= 3);
    }
}
