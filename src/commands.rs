//! Built-in commands of the console server.

use std::sync::Arc;

use glam::DVec3;
use indexmap::IndexMap;
use mdcommand_core::LEVEL_GAMEMASTERS;
use mdcommand_dispatch::arguments::{get_integer, get_string, greedy_string, integer_min};
use mdcommand_dispatch::{ArgumentBuilder, CommandContext, CommandError, GrammarError, NodeId};
use mdcommand_server::arguments::{
    anchor, dimension, entities, entity, get_anchor, get_dimension, get_entity, get_entities,
    get_optional_entities, get_players, get_resource_location, get_rotation, get_vec3, players,
    resource_location, rotation, vec3,
};
use mdcommand_server::{
    argument, literal, require_level, CommandSource, Commands, Dispatcher, EntitySnapshot,
};

use crate::console::{ConsoleWorld, Gamemode, Weather, DAY_LENGTH};

type Builder = ArgumentBuilder<CommandSource>;

/// Mobs `/summon` knows how to create.
pub const SUMMONABLE: [&str; 9] = [
    "minecraft:pig",
    "minecraft:cow",
    "minecraft:sheep",
    "minecraft:chicken",
    "minecraft:villager",
    "minecraft:zombie",
    "minecraft:skeleton",
    "minecraft:spider",
    "minecraft:creeper",
];

const NAMED_TIMES: [(&str, u64); 4] = [
    ("day", 1000),
    ("noon", 6000),
    ("night", 13000),
    ("midnight", 18000),
];

/// Register every built-in command against `world`.
///
/// `functions` maps function ids to the command lines `/function` runs; bare
/// ids are placed in the `minecraft` namespace.
pub fn register_builtins(
    commands: &Commands,
    world: &Arc<ConsoleWorld>,
    functions: &IndexMap<String, Vec<String>>,
) -> Result<(), GrammarError> {
    let functions: Arc<IndexMap<String, Vec<String>>> = Arc::new(
        functions
            .iter()
            .map(|(name, lines)| (namespaced(name), lines.clone()))
            .collect(),
    );
    commands.update(|d| {
        register_help(d)?;
        register_say(d, world)?;
        register_teleport(d, world)?;
        register_time(d, world)?;
        register_weather(d, world)?;
        register_gamemode(d, world)?;
        register_summon(d, world)?;
        register_function(d, functions)?;
        register_execute(d)?;
        Ok(())
    })
}

fn namespaced(id: &str) -> String {
    if id.contains(':') {
        id.to_string()
    } else {
        format!("minecraft:{id}")
    }
}

fn register_help(d: &mut Dispatcher) -> Result<(), GrammarError> {
    d.register(
        literal("help")
            .executes_with_control(|ctx, control| {
                let usage = control.dispatcher().get_smart_usage(NodeId::ROOT, ctx.source());
                for line in usage.values() {
                    ctx.source().send_success(&format!("/{line}"), false);
                }
                Ok(usage.len() as i32)
            })
            .then(
                argument("command", greedy_string()).executes_with_control(|ctx, control| {
                    let command = get_string(ctx, "command")?;
                    let dispatcher = control.dispatcher();
                    let parse = dispatcher.parse(&command, ctx.source().clone());
                    let Some(last) = parse.context.nodes().last() else {
                        return Err(CommandError::failure(
                            "Unknown command or insufficient permissions",
                        ));
                    };
                    let usage = dispatcher.get_smart_usage(last.node, ctx.source());
                    let prefix = parse.reader.string();
                    for line in usage.values() {
                        ctx.source().send_success(&format!("/{prefix} {line}"), false);
                    }
                    Ok(usage.len() as i32)
                }),
            ),
    )?;
    Ok(())
}

fn register_say(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let world = Arc::clone(world);
    d.register(literal("say").then(argument("message", greedy_string()).executes(
        move |ctx| {
            let message = get_string(ctx, "message")?;
            world.broadcast(format!("[{}] {}", ctx.source().text_name(), message));
            Ok(1)
        },
    )))?;
    Ok(())
}

fn register_teleport(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let (w1, w2, w3, w4) = (
        Arc::clone(world),
        Arc::clone(world),
        Arc::clone(world),
        Arc::clone(world),
    );
    let teleport = d.register(
        literal("teleport")
            .requires(require_level(LEVEL_GAMEMASTERS))
            .then(argument("location", vec3()).executes(move |ctx| {
                let me = ctx.source().entity_or_error()?.clone();
                let location = get_vec3(ctx, "location")?;
                teleport_to_position(&w1, ctx.source(), &[me], location)
            }))
            .then(argument("destination", entity()).executes(move |ctx| {
                let me = ctx.source().entity_or_error()?.clone();
                let destination = get_entity(ctx, "destination")?;
                teleport_to_entity(&w2, ctx.source(), &[me], &destination)
            }))
            .then(
                argument("targets", entities())
                    .then(argument("location", vec3()).executes(move |ctx| {
                        let targets = get_entities(ctx, "targets")?;
                        let location = get_vec3(ctx, "location")?;
                        teleport_to_position(&w3, ctx.source(), &targets, location)
                    }))
                    .then(argument("destination", entity()).executes(move |ctx| {
                        let targets = get_entities(ctx, "targets")?;
                        let destination = get_entity(ctx, "destination")?;
                        teleport_to_entity(&w4, ctx.source(), &targets, &destination)
                    })),
            ),
    )?;
    d.register_alias("tp", teleport)?;
    Ok(())
}

fn teleport_to_position(
    world: &ConsoleWorld,
    source: &CommandSource,
    targets: &[EntitySnapshot],
    location: DVec3,
) -> Result<i32, CommandError> {
    for target in targets {
        world.teleport(target.id, location, source.dimension());
    }
    let who = describe(targets);
    source.send_success(
        &format!(
            "Teleported {who} to {:.2} {:.2} {:.2}",
            location.x, location.y, location.z
        ),
        true,
    );
    Ok(targets.len() as i32)
}

fn teleport_to_entity(
    world: &ConsoleWorld,
    source: &CommandSource,
    targets: &[EntitySnapshot],
    destination: &EntitySnapshot,
) -> Result<i32, CommandError> {
    for target in targets {
        world.teleport(target.id, destination.position, destination.dimension);
    }
    source.send_success(
        &format!("Teleported {} to {}", describe(targets), destination.name),
        true,
    );
    Ok(targets.len() as i32)
}

fn describe(targets: &[EntitySnapshot]) -> String {
    match targets {
        [one] => one.name.clone(),
        _ => format!("{} entities", targets.len()),
    }
}

fn register_time(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let mut set = literal("set");
    for (name, tick) in NAMED_TIMES {
        let world = Arc::clone(world);
        set = set.then(literal(name).executes(move |ctx| Ok(set_time(&world, ctx.source(), tick))));
    }
    let w = Arc::clone(world);
    set = set.then(argument("time", integer_min(0)).executes(move |ctx| {
        let tick = get_integer(ctx, "time")? as u64;
        Ok(set_time(&w, ctx.source(), tick))
    }));

    let w = Arc::clone(world);
    let add = literal("add").then(argument("time", integer_min(0)).executes(move |ctx| {
        let delta = get_integer(ctx, "time")? as u64;
        let tick = w.day_time() + delta;
        w.set_day_time(tick);
        ctx.source()
            .send_success(&format!("Time advanced by {delta} to {tick}"), true);
        Ok((tick % DAY_LENGTH) as i32)
    }));

    let (w1, w2, w3) = (Arc::clone(world), Arc::clone(world), Arc::clone(world));
    let query = literal("query")
        .then(literal("daytime").executes(move |ctx| {
            Ok(query_time(ctx, w1.day_time() % DAY_LENGTH))
        }))
        .then(literal("gametime").executes(move |ctx| {
            Ok(query_time(ctx, w2.game_time() % i32::MAX as u64))
        }))
        .then(literal("day").executes(move |ctx| {
            Ok(query_time(ctx, w3.day_time() / DAY_LENGTH))
        }));

    d.register(
        literal("time")
            .requires(require_level(LEVEL_GAMEMASTERS))
            .then(set)
            .then(add)
            .then(query),
    )?;
    Ok(())
}

fn set_time(world: &ConsoleWorld, source: &CommandSource, tick: u64) -> i32 {
    world.set_day_time(tick);
    source.send_success(&format!("Time set to tick {tick}"), true);
    (tick % DAY_LENGTH) as i32
}

fn query_time(ctx: &CommandContext<CommandSource>, value: u64) -> i32 {
    ctx.source().send_success(&format!("The time is {value}"), false);
    value as i32
}

fn register_weather(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let mut weather = literal("weather").requires(require_level(LEVEL_GAMEMASTERS));
    for state in [Weather::Clear, Weather::Rain, Weather::Thunder] {
        let world = Arc::clone(world);
        weather = weather.then(literal(state.name()).executes(move |ctx| {
            world.set_weather(state);
            ctx.source()
                .send_success(&format!("Weather set to {}", state.name()), true);
            Ok(1)
        }));
    }
    d.register(weather)?;
    Ok(())
}

fn register_gamemode(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let mut gamemode = literal("gamemode").requires(require_level(LEVEL_GAMEMASTERS));
    for (name, mode) in [("survival", Gamemode::Survival), ("creative", Gamemode::Creative)] {
        let (own, others) = (Arc::clone(world), Arc::clone(world));
        gamemode = gamemode.then(
            literal(name)
                .executes(move |ctx| {
                    let me = ctx.source().player_or_error()?.clone();
                    Ok(set_gamemode(&own, ctx.source(), &[me], mode))
                })
                .then(argument("targets", players()).executes(move |ctx| {
                    let targets = get_players(ctx, "targets")?;
                    Ok(set_gamemode(&others, ctx.source(), &targets, mode))
                })),
        );
    }
    let gamemode = d.register(gamemode)?;
    d.register_alias("gm", gamemode)?;
    Ok(())
}

fn set_gamemode(
    world: &ConsoleWorld,
    source: &CommandSource,
    targets: &[EntitySnapshot],
    mode: Gamemode,
) -> i32 {
    let mut changed = 0;
    for target in targets {
        if world.gamemode(target.id) == mode {
            continue;
        }
        world.set_gamemode(target.id, mode);
        changed += 1;
        let is_self = source.entity().is_some_and(|e| e.id == target.id);
        if is_self {
            source.send_success(&format!("Set own game mode to {}", mode.display_name()), true);
        } else {
            source.send_success(
                &format!("Set {}'s game mode to {}", target.name, mode.display_name()),
                true,
            );
        }
    }
    changed
}

fn register_summon(d: &mut Dispatcher, world: &Arc<ConsoleWorld>) -> Result<(), GrammarError> {
    let (here, there) = (Arc::clone(world), Arc::clone(world));
    d.register(
        literal("summon").requires(require_level(LEVEL_GAMEMASTERS)).then(
            argument("entity", resource_location())
                .suggests(|_, builder| {
                    builder.suggest_resources(SUMMONABLE);
                })
                .executes(move |ctx| {
                    let kind = get_resource_location(ctx, "entity")?;
                    summon(&here, ctx.source(), &kind, ctx.source().position())
                })
                .then(argument("pos", vec3()).executes(move |ctx| {
                    let kind = get_resource_location(ctx, "entity")?;
                    let pos = get_vec3(ctx, "pos")?;
                    summon(&there, ctx.source(), &kind, pos)
                })),
        ),
    )?;
    Ok(())
}

fn summon(
    world: &ConsoleWorld,
    source: &CommandSource,
    kind: &str,
    pos: DVec3,
) -> Result<i32, CommandError> {
    if !SUMMONABLE.contains(&kind) {
        return Err(CommandError::failure(format!("Unknown mob type '{kind}'")));
    }
    let dimension = source.dimension();
    let mob = world.spawn(|id| EntitySnapshot {
        dimension,
        ..EntitySnapshot::mob(id, kind, pos)
    });
    source.send_success(
        &format!("Summoned {} at {:.2} {:.2} {:.2}", mob.name, pos.x, pos.y, pos.z),
        true,
    );
    Ok(1)
}

fn register_function(
    d: &mut Dispatcher,
    functions: Arc<IndexMap<String, Vec<String>>>,
) -> Result<(), GrammarError> {
    let names = Arc::clone(&functions);
    d.register(
        literal("function").requires(require_level(LEVEL_GAMEMASTERS)).then(
            argument("name", resource_location())
                .suggests(move |_, builder| {
                    builder.suggest_resources(names.keys());
                })
                .executes_with_control(move |ctx, control| {
                    let name = get_resource_location(ctx, "name")?;
                    let Some(lines) = functions.get(&name) else {
                        return Err(CommandError::failure(format!("Unknown function '{name}'")));
                    };
                    let mut queued = 0;
                    for line in lines {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        if control.perform_command(line.trim_start_matches('/'), ctx.source()) {
                            queued += 1;
                        }
                    }
                    ctx.source()
                        .send_success(&format!("Running function {name} ({queued} commands)"), false);
                    Ok(queued)
                }),
        ),
    )?;
    Ok(())
}

fn register_execute(d: &mut Dispatcher) -> Result<(), GrammarError> {
    let execute = d.register(literal("execute").requires(require_level(LEVEL_GAMEMASTERS)))?;
    d.register(
        literal("execute")
            .requires(require_level(LEVEL_GAMEMASTERS))
            .then(literal("run").redirect(NodeId::ROOT))
            .then(literal("as").then(argument("targets", entities()).fork(execute, |ctx| {
                Ok(get_optional_entities(ctx, "targets")?
                    .into_iter()
                    .map(|e| ctx.source().with_entity(Some(e)))
                    .collect())
            })))
            .then(literal("at").then(argument("targets", entities()).fork(execute, |ctx| {
                Ok(get_optional_entities(ctx, "targets")?
                    .into_iter()
                    .map(|e| {
                        ctx.source()
                            .with_dimension(e.dimension)
                            .with_position(e.position)
                            .with_rotation(e.rotation)
                    })
                    .collect())
            })))
            .then(literal("positioned").then(argument("pos", vec3()).redirect_with(
                execute,
                |ctx| Ok(ctx.source().with_position(get_vec3(ctx, "pos")?)),
            )))
            .then(literal("rotated").then(argument("rot", rotation()).redirect_with(
                execute,
                |ctx| Ok(ctx.source().with_rotation(get_rotation(ctx, "rot")?)),
            )))
            .then(
                literal("facing")
                    .then(
                        literal("entity").then(argument("targets", entities()).then(
                            argument("anchor", anchor()).fork(execute, |ctx| {
                                let anchor = get_anchor(ctx, "anchor")?;
                                Ok(get_optional_entities(ctx, "targets")?
                                    .iter()
                                    .map(|e| ctx.source().facing_entity(e, anchor))
                                    .collect())
                            }),
                        )),
                    )
                    .then(argument("pos", vec3()).redirect_with(execute, |ctx| {
                        Ok(ctx.source().facing(get_vec3(ctx, "pos")?))
                    })),
            )
            .then(literal("in").then(argument("dimension", dimension()).redirect_with(
                execute,
                |ctx| Ok(ctx.source().with_dimension(get_dimension(ctx, "dimension")?)),
            )))
            .then(literal("anchored").then(argument("anchor", anchor()).redirect_with(
                execute,
                |ctx| Ok(ctx.source().with_anchor(get_anchor(ctx, "anchor")?)),
            )))
            .then(condition("if", true, execute))
            .then(condition("unless", false, execute)),
    )?;
    Ok(())
}

/// `if|unless entity <entities>`: report the test at the end of the line,
/// otherwise keep the source only when the test holds.
fn condition(name: &str, expected: bool, execute: NodeId) -> Builder {
    literal(name).then(
        literal("entity").then(
            argument("entities", entities())
                .executes(move |ctx| {
                    let count = get_optional_entities(ctx, "entities")?.len();
                    if (count > 0) != expected {
                        return Err(CommandError::failure("Test failed"));
                    }
                    if expected {
                        ctx.source()
                            .send_success(&format!("Test passed, count: {count}"), false);
                        Ok(count as i32)
                    } else {
                        ctx.source().send_success("Test passed", false);
                        Ok(1)
                    }
                })
                .fork(execute, move |ctx| {
                    let found = !get_optional_entities(ctx, "entities")?.is_empty();
                    Ok(if found == expected {
                        vec![ctx.source().clone()]
                    } else {
                        Vec::new()
                    })
                }),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcommand_core::DimensionId;
    use mdcommand_dispatch::ExecutionLimits;
    use mdcommand_server::{BufferedOutput, CommandHost};
    use mdcommand_testkit::RecordingCallback;

    struct Fixture {
        world: Arc<ConsoleWorld>,
        commands: Commands,
        output: Arc<BufferedOutput>,
        console: CommandSource,
    }

    fn fixture_with(limits: ExecutionLimits, functions: IndexMap<String, Vec<String>>) -> Fixture {
        let world = Arc::new(ConsoleWorld::new(["Alex", "Steve"], &IndexMap::new()));
        let commands = Commands::new(limits);
        register_builtins(&commands, &world, &functions).unwrap();
        let output = Arc::new(BufferedOutput::new());
        let console =
            CommandSource::new("Server", world.clone(), output.clone()).with_permission(4);
        Fixture {
            world,
            commands,
            output,
            console,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ExecutionLimits::default(), IndexMap::new())
    }

    #[test]
    fn grammar_has_no_redirect_cycles() {
        let f = fixture();
        let report = f.commands.validate();
        assert!(!report.has_errors(), "{:?}", report.lines());
        assert!(report.unregistered_types.is_empty());
    }

    #[test]
    fn say_broadcasts_with_the_source_name() {
        let f = fixture();
        assert!(f.commands.perform_command("say hello there", &f.console));
        assert_eq!(f.world.chat(), vec!["[Server] hello there"]);
    }

    #[test]
    fn tp_alias_moves_targets_to_block_centres() {
        let f = fixture();
        assert!(f.commands.perform_command("tp Alex 10 64 -3", &f.console));
        let alex = f.world.entity(1).unwrap();
        assert_eq!(alex.position, DVec3::new(10.5, 64.0, -2.5));
        assert_eq!(f.output.take_lines(), vec!["Teleported Alex to 10.50 64.00 -2.50"]);

        assert!(f.commands.perform_command("teleport Steve Alex", &f.console));
        assert_eq!(f.world.entity(2).unwrap().position, alex.position);
    }

    #[test]
    fn console_cannot_teleport_itself() {
        let f = fixture();
        let recorder = RecordingCallback::new();
        let console = f.console.with_callback(recorder.callback());
        assert!(f.commands.perform_command("tp 0 0 0", &console));
        assert_eq!(
            f.output.take_lines(),
            vec!["An entity is required to run this command here"]
        );
        assert_eq!(recorder.results(), vec![(false, 0)]);
    }

    #[test]
    fn time_commands_report_day_time() {
        let f = fixture();
        let recorder = RecordingCallback::new();
        let console = f.console.with_callback(recorder.callback());
        assert!(f.commands.perform_command("time set noon", &console));
        assert!(f.commands.perform_command("time add 24000", &console));
        assert!(f.commands.perform_command("time query daytime", &console));
        assert!(f.commands.perform_command("time query day", &console));
        assert_eq!(f.world.day_time(), 30000);
        assert_eq!(
            recorder.results(),
            vec![(true, 6000), (true, 6000), (true, 6000), (true, 1)]
        );
        assert!(!f.commands.perform_command("time set -5", &console));
    }

    #[test]
    fn weather_and_gamemode_change_state() {
        let f = fixture();
        assert!(f.commands.perform_command("weather thunder", &f.console));
        assert_eq!(f.world.weather(), Weather::Thunder);

        assert!(f.commands.perform_command("gm creative Steve", &f.console));
        assert_eq!(f.world.gamemode(2), Gamemode::Creative);
        assert_eq!(f.world.gamemode(1), Gamemode::Survival);
        assert_eq!(
            f.output.take_lines(),
            vec![
                "Weather set to thunder",
                "Set Steve's game mode to Creative Mode"
            ]
        );
    }

    #[test]
    fn summon_accepts_bare_and_namespaced_ids() {
        let f = fixture();
        assert!(f.commands.perform_command("summon zombie 1 2 3", &f.console));
        assert!(f.commands.perform_command("summon minecraft:cow", &f.console));
        let kinds: Vec<String> = f.world.entities().into_iter().map(|e| e.kind).collect();
        assert_eq!(&kinds[2..], ["minecraft:zombie", "minecraft:cow"]);

        let suggestions = f.commands.suggestions("summon s", &f.console);
        assert_eq!(
            suggestions.texts(),
            vec!["minecraft:sheep", "minecraft:skeleton", "minecraft:spider"]
        );

        f.output.take_lines();
        assert!(f.commands.perform_command("summon dragon", &f.console));
        assert_eq!(f.output.take_lines(), vec!["Unknown mob type 'minecraft:dragon'"]);
    }

    #[test]
    fn execute_as_forks_per_target() {
        let f = fixture();
        assert!(f.commands.perform_command("execute as @a run say hi", &f.console));
        assert_eq!(f.world.chat(), vec!["[Alex] hi", "[Steve] hi"]);
    }

    #[test]
    fn execute_in_rescales_the_position() {
        let f = fixture();
        assert!(f.commands.perform_command(
            "execute as Steve at @s in the_nether run tp @s ~ ~ ~",
            &f.console
        ));
        let steve = f.world.entity(2).unwrap();
        assert_eq!(steve.position, DVec3::new(0.5, 64.0, 0.0));
        assert_eq!(steve.dimension, DimensionId::Nether);
    }

    #[test]
    fn execute_conditions_filter_and_report() {
        let f = fixture();
        let recorder = RecordingCallback::new();
        let console = f.console.with_callback(recorder.callback());
        assert!(f.commands.perform_command("execute if entity @e[type=zombie]", &console));
        assert!(f.commands.perform_command("execute unless entity @e[type=zombie]", &console));
        assert!(f
            .commands
            .perform_command("execute if entity @e[type=zombie] run say never", &console));
        assert!(f.commands.perform_command(
            "execute unless entity @e[type=zombie] run summon zombie",
            &console
        ));
        assert!(f.commands.perform_command("execute if entity @e[type=zombie]", &console));
        assert!(f.world.chat().is_empty());
        assert_eq!(
            recorder.results(),
            vec![(false, 0), (true, 1), (true, 1), (true, 1)]
        );
        assert_eq!(f.output.lines().last().unwrap(), "Test passed, count: 1");
    }

    #[test]
    fn functions_queue_their_lines_after_the_call() {
        let mut functions = IndexMap::new();
        functions.insert(
            "setup".to_string(),
            vec![
                "# morning".to_string(),
                "time set day".to_string(),
                "/say ready".to_string(),
            ],
        );
        let f = fixture_with(ExecutionLimits::default(), functions);
        assert!(f.commands.perform_command("function minecraft:setup", &f.console));
        assert_eq!(f.world.day_time(), 1000);
        assert_eq!(f.world.chat(), vec!["[Server] ready"]);
        assert_eq!(
            f.output.take_lines(),
            vec!["Running function minecraft:setup (2 commands)", "Time set to tick 1000"]
        );

        assert!(f.commands.perform_command("function nothing", &f.console));
        assert_eq!(
            f.output.take_lines(),
            vec!["Unknown function 'minecraft:nothing'"]
        );
    }

    #[test]
    fn recursive_functions_stop_at_the_chain_limit() {
        let mut functions = IndexMap::new();
        functions.insert(
            "demo:loop".to_string(),
            vec!["say tick".to_string(), "function demo:loop".to_string()],
        );
        let limits = ExecutionLimits {
            max_chain_length: 8,
            ..ExecutionLimits::default()
        };
        let f = fixture_with(limits, functions);
        assert!(f.commands.perform_command("function demo:loop", &f.console));
        let said = f.world.chat().len();
        assert!((1..=8).contains(&said), "said {said} times");
    }

    #[test]
    fn branching_recursion_runs_out_of_budget() {
        let mut functions = IndexMap::new();
        functions.insert(
            "demo:loop".to_string(),
            vec!["function demo:loop".to_string(), "function demo:loop".to_string()],
        );
        let limits = ExecutionLimits {
            max_chain_length: 64,
            ..ExecutionLimits::default()
        };
        let f = fixture_with(limits, functions);
        assert!(f.commands.perform_command("function demo:loop", &f.console));
        let lines = f.output.take_lines();
        let runs = lines.iter().filter(|l| l.starts_with("Running function")).count();
        assert_eq!(runs, 64);
        assert!(lines.contains(&"Command chain length limit (64) reached".to_string()));
    }

    #[test]
    fn help_lists_visible_commands() {
        let f = fixture();
        let (player_output, player) = {
            let output = Arc::new(BufferedOutput::new());
            let alex = f.world.entity(1).unwrap();
            let source = CommandSource::for_entity(alex, f.world.clone(), output.clone());
            (output, source)
        };
        assert!(f.commands.perform_command("help", &player));
        assert_eq!(player_output.take_lines(), vec!["/help [<command>]", "/say <message>"]);

        assert!(f.commands.perform_command("help time", &f.console));
        assert_eq!(
            f.output.take_lines(),
            vec![
                "/time set (day|noon|night|midnight|<time>)",
                "/time add <time>",
                "/time query (daytime|gametime|day)",
            ]
        );
        assert!(f.commands.perform_command("help teleport", &player));
        assert_eq!(
            player_output.take_lines(),
            vec!["Unknown command or insufficient permissions"]
        );
    }
}
