use std::io::{self, BufRead, Write};
use std::path::Path;

use sn_core::events::{
    AI_DECISION_RESULT, BRANCH_CHOICE, DIALOGUE_CLOSED, NEXT_STEP_KEY, PLAYER_CHOICE_MADE,
};
use sn_core::{NarrativeError, Value};
use sn_tool::Session;

use crate::{
    load_session, map_cli_output, map_tool_error, map_tui_io, save_session, PlayContext,
    TuiCommandAction,
};

const HELP: &str = "commands: :help :close :choose <step> [script] :decide <step> [script] \
:accept [script] :decline [script] :emit <event> [json] :complete-task <id> :solve-puzzle <id> \
:state :save :load :restart :quit";

pub(crate) fn run_play_line_mode(
    context: &PlayContext<'_>,
    session: &mut Session,
) -> Result<i32, NarrativeError> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    run_play_line_mode_with_io(context, session, &mut reader, &mut writer)
}

pub(crate) fn run_play_line_mode_with_io(
    context: &PlayContext<'_>,
    session: &mut Session,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<i32, NarrativeError> {
    write_line(writer, "storynet play")?;
    write_line(writer, HELP)?;
    settle_and_print(session, writer)?;

    loop {
        if session.bus().active_script_ids().is_empty() {
            write_line(writer, "[END]")?;
            write_line(writer, "RESULT:OK")?;
            write_line(writer, "EVENT:END")?;
            return Ok(0);
        }

        let Some(raw) = prompt_input_from("> ", reader, writer)? else {
            write_line(writer, "RESULT:OK")?;
            write_line(writer, "EVENT:EOF")?;
            return Ok(0);
        };

        let mut lines = Vec::new();
        let mut emit = |line: String| lines.push(line);
        let action = handle_line_cmd(raw.trim(), context, session, &mut emit)?;
        for line in &lines {
            write_line(writer, line)?;
        }

        match action {
            TuiCommandAction::Continue => {}
            TuiCommandAction::Settle => settle_and_print(session, writer)?,
            TuiCommandAction::Quit => {
                write_line(writer, "RESULT:OK")?;
                write_line(writer, "EVENT:QUIT")?;
                return Ok(0);
            }
            TuiCommandAction::NotHandled => {
                write_line(writer, &format!("unknown command: {} (:help lists commands)", raw))?;
            }
        }
    }
}

/// Drains the bus, then prints the transcript and what each script waits on.
pub(crate) fn settle_and_print(session: &mut Session, writer: &mut dyn Write) -> Result<(), NarrativeError> {
    session.settle().map_err(map_tool_error)?;
    for event in session.take_events() {
        let json = serde_json::to_string(&event).map_err(map_cli_output)?;
        write_line(writer, &format!("EVENT:{}", json))?;
    }

    for script_id in session.bus().active_script_ids() {
        let Some(step) = session.bus().current_step(&script_id) else {
            continue;
        };
        write_line(
            writer,
            &format!("WAITING:{}|{}|{}", script_id, step.step_id, step.kind.tag()),
        )?;
        if !step.has_choices() {
            continue;
        }
        let presented = session.bus().present_current(&script_id).unwrap_or_default();
        for choice in presented.get("choices").and_then(Value::as_array).into_iter().flatten() {
            let label = choice.get("text").map(Value::to_text).unwrap_or_default();
            write_line(
                writer,
                &format!(
                    "CHOICE:{}|{}",
                    choice.get(NEXT_STEP_KEY).map(Value::to_text).unwrap_or_default(),
                    serde_json::to_string(&label).map_err(map_cli_output)?
                ),
            )?;
        }
    }
    Ok(())
}

pub(crate) fn handle_line_cmd(
    raw: &str,
    context: &PlayContext<'_>,
    session: &mut Session,
    emit: &mut dyn FnMut(String),
) -> Result<TuiCommandAction, NarrativeError> {
    let (command, rest) = raw
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((raw, ""));
    let mut args = rest.split_whitespace();

    match command {
        ":help" => {
            emit(HELP.to_string());
            Ok(TuiCommandAction::Continue)
        }
        ":close" => {
            session.publish(DIALOGUE_CLOSED, &Value::empty_map());
            Ok(TuiCommandAction::Settle)
        }
        ":choose" | ":decide" => {
            let Some(step) = args.next() else {
                emit(format!("usage: {} <step> [script]", command));
                return Ok(TuiCommandAction::Continue);
            };
            let script_id = args.next().unwrap_or(context.entry_script);
            let event = if command == ":choose" {
                PLAYER_CHOICE_MADE
            } else {
                AI_DECISION_RESULT
            };
            let data = Value::object([(NEXT_STEP_KEY, id_value(step))]);
            Ok(notify(session, script_id, event, &data, emit))
        }
        ":accept" | ":decline" => {
            let script_id = args.next().unwrap_or(context.entry_script);
            let choice = if command == ":accept" { "Accept" } else { "Decline" };
            let data = Value::object([("choice", Value::from(choice))]);
            Ok(notify(session, script_id, BRANCH_CHOICE, &data, emit))
        }
        ":emit" => {
            let (event, payload) = rest
                .split_once(char::is_whitespace)
                .map(|(event, payload)| (event, payload.trim()))
                .unwrap_or((rest, ""));
            if event.is_empty() {
                emit("usage: :emit <event> [json]".to_string());
                return Ok(TuiCommandAction::Continue);
            }
            let data = if payload.is_empty() {
                Value::empty_map()
            } else {
                match serde_json::from_str::<Value>(payload) {
                    Ok(data) => data,
                    Err(error) => {
                        emit(format!("invalid payload json: {}", error));
                        return Ok(TuiCommandAction::Continue);
                    }
                }
            };
            session.publish(event, &data);
            Ok(TuiCommandAction::Settle)
        }
        ":complete-task" | ":solve-puzzle" => {
            let Some(id) = args.next() else {
                emit(format!("usage: {} <id>", command));
                return Ok(TuiCommandAction::Continue);
            };
            if command == ":complete-task" {
                session.complete_task(id_value(id)).map_err(map_tool_error)?;
            } else {
                session.solve_puzzle(id_value(id)).map_err(map_tool_error)?;
            }
            Ok(TuiCommandAction::Settle)
        }
        ":state" => {
            emit(format!("STATE_JSON:{}", session.world_state().to_compact_json()));
            Ok(TuiCommandAction::Continue)
        }
        ":save" => {
            save_session(Path::new(context.save_file), session, &context.scripts.id)?;
            emit(format!("saved: {}", context.save_file));
            Ok(TuiCommandAction::Continue)
        }
        ":load" => {
            *session = load_session(Path::new(context.save_file), context)?;
            emit(format!("loaded: {}", context.save_file));
            Ok(TuiCommandAction::Settle)
        }
        ":restart" => {
            session.bus_mut().restart(context.entry_script)?;
            emit("restarted".to_string());
            Ok(TuiCommandAction::Settle)
        }
        ":quit" => {
            emit("bye".to_string());
            Ok(TuiCommandAction::Quit)
        }
        _ => Ok(TuiCommandAction::NotHandled),
    }
}

fn notify(
    session: &mut Session,
    script_id: &str,
    event: &str,
    data: &Value,
    emit: &mut dyn FnMut(String),
) -> TuiCommandAction {
    if session.notify_script(script_id, event, data) {
        TuiCommandAction::Settle
    } else {
        emit(format!("no active script: {}", script_id));
        TuiCommandAction::Continue
    }
}

/// Numeric tokens become numbers so they match numeric ids in scripts.
pub(crate) fn id_value(token: &str) -> Value {
    token
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(token))
}

fn write_line(writer: &mut dyn Write, line: &str) -> Result<(), NarrativeError> {
    writeln!(writer, "{}", line).map_err(map_tui_io)
}

/// `None` once the reader is exhausted.
pub(crate) fn prompt_input_from(
    prefix: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<String>, NarrativeError> {
    write!(writer, "{}", prefix).map_err(map_tui_io)?;
    writer.flush().map_err(map_tui_io)?;
    let mut input = String::new();
    if reader.read_line(&mut input).map_err(map_tui_io)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim_end_matches(&['\r', '\n'][..]).to_string()))
}
