//! Parsing input against the grammar, and completion on top of partial parses.

use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::arguments::ParsedArgument;
use crate::context::CommandContextBuilder;
use crate::dispatcher::CommandDispatcher;
use crate::error::{CommandSyntaxError, SyntaxErrorKind};
use crate::node::{literal_end, NodeId, NodeKind};
use crate::reader::StringReader;
use crate::suggestion::{StringRange, Suggestions, SuggestionsBuilder};
use crate::ARGUMENT_SEPARATOR;

/// Outcome of parsing one line: how far the grammar matched, where the
/// reader stopped, and the errors raised by nodes that did not match.
pub struct ParseResults<S> {
    pub context: CommandContextBuilder<S>,
    pub reader: StringReader,
    pub exceptions: IndexMap<NodeId, CommandSyntaxError>,
}

impl<S: Clone> Clone for ParseResults<S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            reader: self.reader.clone(),
            exceptions: self.exceptions.clone(),
        }
    }
}

impl<S> ParseResults<S> {
    pub fn fully_consumed(&self) -> bool {
        !self.reader.can_read()
    }

    /// The error that makes this parse unusable, if any.
    ///
    /// A single collected exception is returned as-is. With several, a
    /// non-empty match means the command name itself was recognised, so an
    /// argument error is reported instead of an unknown command.
    pub fn parse_exception(&self) -> Option<CommandSyntaxError> {
        if self.fully_consumed() {
            return None;
        }
        if self.exceptions.len() == 1 {
            return self.exceptions.values().next().cloned();
        }
        let kind = if self.context.range().is_empty() {
            SyntaxErrorKind::UnknownCommand
        } else {
            SyntaxErrorKind::UnknownArgument
        };
        Some(CommandSyntaxError::with_context(kind, &self.reader))
    }

    pub fn validate(&self) -> Result<(), CommandSyntaxError> {
        match self.parse_exception() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn compare_potentials<S>(a: &ParseResults<S>, b: &ParseResults<S>) -> Ordering {
    // Fully consumed parses first, then parses without errors.
    a.reader
        .can_read()
        .cmp(&b.reader.can_read())
        .then_with(|| (!a.exceptions.is_empty()).cmp(&!b.exceptions.is_empty()))
}

impl<S: Clone + 'static> CommandDispatcher<S> {
    pub fn parse(&self, input: &str, source: S) -> ParseResults<S> {
        self.parse_reader(StringReader::new(input), source)
    }

    pub fn parse_reader(&self, reader: StringReader, source: S) -> ParseResults<S> {
        let context = CommandContextBuilder::new(source, NodeId::ROOT, reader.cursor());
        let result = self.parse_nodes(NodeId::ROOT, &reader, &context);
        debug!(
            input = reader.string(),
            consumed = result.reader.cursor(),
            errors = result.exceptions.len(),
            "parsed command"
        );
        result
    }

    /// Children worth trying at the reader position: an exact literal match
    /// wins outright, otherwise every argument child.
    fn relevant_nodes(&self, node: NodeId, reader: &StringReader) -> Vec<NodeId> {
        let n = self.node_ref(node);
        if !n.literals.is_empty() {
            let text = reader
                .remaining()
                .split(ARGUMENT_SEPARATOR)
                .next()
                .unwrap_or_default();
            if let Some(&literal) = n.literals.get(text) {
                return vec![literal];
            }
        }
        n.arguments.values().copied().collect()
    }

    fn parse_nodes(
        &self,
        node: NodeId,
        original: &StringReader,
        context_so_far: &CommandContextBuilder<S>,
    ) -> ParseResults<S> {
        let source = context_so_far.source();
        let mut errors = IndexMap::new();
        let mut potentials: Vec<ParseResults<S>> = Vec::new();

        for child in self.relevant_nodes(node, original) {
            if !self.can_use(child, source) {
                continue;
            }
            let mut context = context_so_far.clone();
            let mut reader = original.clone();
            if let Err(err) = self.parse_node(child, &mut reader, &mut context) {
                errors.insert(child, err);
                continue;
            }
            if reader.can_read() && reader.peek() != Some(ARGUMENT_SEPARATOR) {
                let err = CommandSyntaxError::with_context(
                    SyntaxErrorKind::ExpectedArgumentSeparator,
                    &reader,
                );
                errors.insert(child, err);
                continue;
            }

            context.with_command(self.command_of(child).cloned());
            let redirect = self.node_ref(child).redirect;
            if reader.can_read_n(if redirect.is_none() { 2 } else { 1 }) {
                reader.skip();
                if let Some(target) = redirect {
                    let child_context =
                        CommandContextBuilder::new(context.source().clone(), target, reader.cursor());
                    let parse = self.parse_nodes(target, &reader, &child_context);
                    context.with_child(parse.context);
                    return ParseResults {
                        context,
                        reader: parse.reader,
                        exceptions: parse.exceptions,
                    };
                }
                potentials.push(self.parse_nodes(child, &reader, &context));
            } else {
                potentials.push(ParseResults {
                    context,
                    reader,
                    exceptions: IndexMap::new(),
                });
            }
        }

        if potentials.is_empty() {
            return ParseResults {
                context: context_so_far.clone(),
                reader: original.clone(),
                exceptions: errors,
            };
        }
        potentials.sort_by(compare_potentials);
        potentials.swap_remove(0)
    }

    fn parse_node(
        &self,
        id: NodeId,
        reader: &mut StringReader,
        context: &mut CommandContextBuilder<S>,
    ) -> Result<(), CommandSyntaxError> {
        let node = self.node_ref(id);
        let start = reader.cursor();
        match &node.kind {
            NodeKind::Root => Ok(()),
            NodeKind::Literal { literal } => match literal_end(literal, reader.remaining()) {
                Some(len) => {
                    reader.set_cursor(start + len);
                    context.with_node(id, node, StringRange::between(start, start + len));
                    Ok(())
                }
                None => Err(CommandSyntaxError::with_context(
                    SyntaxErrorKind::LiteralIncorrect(literal.clone()),
                    reader,
                )),
            },
            NodeKind::Argument { name, ty, .. } => {
                let parsed =
                    catch_unwind(AssertUnwindSafe(|| ty.parse_with_source(reader, context.source())));
                let value = match parsed {
                    Ok(result) => result?,
                    Err(_) => {
                        error!(argument = %name, "argument parser panicked");
                        reader.set_cursor(start);
                        return Err(CommandSyntaxError::with_context(
                            SyntaxErrorKind::ParseFailure(format!("argument '{name}' could not be read")),
                            reader,
                        ));
                    }
                };
                let range = StringRange::between(start, reader.cursor());
                if let Some(source) = ty.contextualize(&value, context.source()) {
                    context.with_source(source);
                }
                context.with_argument(name.clone(), ParsedArgument { range, value });
                context.with_node(id, node, range);
                Ok(())
            }
        }
    }

    /// Completions for the end of the parsed input.
    pub fn get_completion_suggestions(&self, parse: &ParseResults<S>) -> Suggestions {
        self.get_completion_suggestions_at(parse, parse.reader.total_length())
    }

    /// Completions for the input up to `cursor`. Nodes the parse's source
    /// cannot use contribute nothing.
    pub fn get_completion_suggestions_at(&self, parse: &ParseResults<S>, cursor: usize) -> Suggestions {
        let full_input = parse.reader.string();
        if cursor > full_input.len() || !full_input.is_char_boundary(cursor) {
            return Suggestions::empty();
        }
        let context = &parse.context;
        let Some(found) = context.find_suggestion_context(cursor) else {
            return Suggestions::empty();
        };
        let start = found.start_pos.min(cursor);
        let truncated = &full_input[..cursor];
        let built = context.build(truncated);
        let source = context.source();

        let mut collected = Vec::new();
        for child in self.node_ref(found.parent).children() {
            if !self.can_use(child, source) {
                continue;
            }
            let mut builder = SuggestionsBuilder::new(truncated, start);
            match &self.node_ref(child).kind {
                NodeKind::Root => {}
                NodeKind::Literal { literal } => {
                    if literal.to_lowercase().starts_with(builder.remaining_lowercase()) {
                        builder.suggest(literal.clone());
                    }
                }
                NodeKind::Argument {
                    name,
                    ty,
                    suggestions,
                } => {
                    let listed = catch_unwind(AssertUnwindSafe(|| match suggestions {
                        Some(provider) => provider(&built, &mut builder),
                        None => ty.list_suggestions(&built, &mut builder),
                    }));
                    if listed.is_err() {
                        error!(argument = %name, "suggestion provider panicked");
                        continue;
                    }
                }
            }
            collected.push(builder.build());
        }
        Suggestions::merge(full_input, collected)
    }
}
