use sn_core::events::{
    AI_DECISION_RESULT, BRANCH_CHOICE, DIALOGUE_CLOSED, NEXT_STEP_KEY, PLAYER_CHOICE_MADE,
    PUZZLE_SOLVED, REQUEST_AI_DECISION, REQUEST_AI_DIALOGUE, REQUEST_WORLD_STATE_UPDATE,
    SCRIPT_STEP, SYNC_DATA_TO_BACKEND, TASK_COMPLETED,
};
use sn_core::{CompiledStep, StepId, StepKind, Value};
use tracing::{debug, warn};

use super::{EngineHost, TARGET};
use crate::helpers::condition::evaluate_condition;
use crate::helpers::template::{render_template, resolve_placeholders, TemplateScope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StepOutcome {
    Goto(StepId),
    /// Step is done but names no next step.
    Completed,
    Waiting,
}

pub(super) struct StepContext<'a> {
    pub(super) script_id: &'a str,
    pub(super) step: &'a CompiledStep,
    pub(super) event: &'a str,
    pub(super) payload: &'a Value,
    /// Payload carried from the wait step that led here, else `payload`.
    pub(super) event_data: &'a Value,
    pub(super) snapshot: &'a Value,
    pub(super) action_pending: bool,
    pub(super) action_taken: bool,
    pub(super) carry: Option<Value>,
    pub(super) host: &'a mut dyn EngineHost,
}

impl StepContext<'_> {
    /// True once per visit; the step's side effect runs behind this.
    fn take_action(&mut self) -> bool {
        if !self.action_pending {
            return false;
        }
        self.action_pending = false;
        self.action_taken = true;
        true
    }

    fn is(&self, event: &str) -> bool {
        self.event == event
    }

    fn scope(&self) -> TemplateScope<'_> {
        TemplateScope::new(self.snapshot, Some(self.event_data))
    }

    fn render(&self, field: &str) -> Value {
        match self.step.field(field) {
            Some(Value::String(template)) => Value::String(render_template(template, self.scope())),
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }

    fn resolve(&self, value: &Value) -> Value {
        resolve_placeholders(value, self.scope())
    }

    fn advance(&self) -> StepOutcome {
        follow(self.step.edges.next.as_ref())
    }

    fn emit(&mut self, event: &str, payload: Value) {
        debug!(
            target: TARGET,
            script_id = self.script_id,
            step_id = %self.step.step_id,
            event,
            "step emitted event"
        );
        self.host.emit(event, payload);
    }

    fn step_ref(&self) -> [(&'static str, Value); 2] {
        [
            ("scriptId", Value::from(self.script_id)),
            ("stepId", Value::from(&self.step.step_id)),
        ]
    }
}

fn follow(target: Option<&StepId>) -> StepOutcome {
    match target {
        Some(id) => StepOutcome::Goto(id.clone()),
        None => StepOutcome::Completed,
    }
}

/// Number or non-empty string field.
fn id_field(step: &CompiledStep, name: &str) -> Option<Value> {
    step.field(name)
        .filter(|value| StepId::from_value(value).is_some())
        .cloned()
}

pub(super) trait StepHandler: Sync {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome;
}

pub(super) fn handler_for(kind: &StepKind) -> &'static dyn StepHandler {
    match kind {
        StepKind::Dialogue | StepKind::Choices => &DialogueHandler,
        StepKind::AiDialogue => &AiDialogueHandler,
        StepKind::AiDecision => &AiDecisionHandler,
        StepKind::Branch => &BranchHandler,
        StepKind::WaitForEvent => &WaitForEventHandler,
        StepKind::WaitForTaskCompleted => &WaitForTaskHandler,
        StepKind::WaitForPuzzleSolved => &WaitForPuzzleHandler,
        StepKind::TaskOffer => &TaskOfferHandler,
        StepKind::UpdateWorldState
        | StepKind::UnlockTask
        | StepKind::UnlockClue
        | StepKind::ActivatePuzzle
        | StepKind::UpdatePuzzleState
        | StepKind::DisplaySvmContent => &StateUpdateHandler,
        StepKind::TriggerDataSync => &DataSyncHandler,
        StepKind::End => &EndHandler,
        StepKind::Unknown(_) => &UnknownHandler,
    }
}

struct DialogueHandler;

impl StepHandler for DialogueHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if !cx.step.has_choices() {
            return if cx.is(DIALOGUE_CLOSED) {
                cx.advance()
            } else {
                StepOutcome::Waiting
            };
        }

        if !cx.is(PLAYER_CHOICE_MADE) {
            return StepOutcome::Waiting;
        }
        let chosen = cx.payload.get(NEXT_STEP_KEY).and_then(StepId::from_value);
        match chosen {
            Some(chosen)
                if cx
                    .step
                    .choices
                    .iter()
                    .any(|choice| choice.next_step.as_ref() == Some(&chosen)) =>
            {
                StepOutcome::Goto(chosen)
            }
            _ => {
                warn!(
                    target: TARGET,
                    script_id = cx.script_id,
                    step_id = %cx.step.step_id,
                    chosen = %cx.payload.get(NEXT_STEP_KEY).map(sn_core::Value::to_text).unwrap_or_default(),
                    "choice does not match any listed option"
                );
                StepOutcome::Waiting
            }
        }
    }
}

struct AiDialogueHandler;

impl StepHandler for AiDialogueHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if cx.is(SCRIPT_STEP) && cx.take_action() {
            let persona = cx.step.field("persona").cloned().unwrap_or_default();
            let owner = cx.step.field("owner").cloned().unwrap_or_else(|| persona.clone());
            let prompt = match cx.step.field("prompt") {
                Some(_) => cx.render("prompt"),
                None => cx.render("text"),
            };
            let mut request = cx.step_ref().to_vec();
            request.extend([
                ("prompt", prompt),
                ("persona", persona),
                ("owner", owner),
                (
                    "history",
                    cx.step
                        .field("history")
                        .filter(|history| history.as_array().is_some())
                        .cloned()
                        .unwrap_or(Value::Array(Vec::new())),
                ),
                ("audio", cx.step.field("audio").cloned().unwrap_or_default()),
            ]);
            cx.emit(REQUEST_AI_DIALOGUE, Value::object(request));
            return StepOutcome::Waiting;
        }

        if cx.is(DIALOGUE_CLOSED) {
            return cx.advance();
        }
        StepOutcome::Waiting
    }
}

struct AiDecisionHandler;

impl StepHandler for AiDecisionHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        let default_next = cx.step.field("defaultNextStep").and_then(StepId::from_value);

        if cx.is(SCRIPT_STEP) && cx.take_action() {
            let options = cx
                .step
                .field("options")
                .map(|options| cx.resolve(options))
                .unwrap_or(Value::Array(Vec::new()));
            let mut request = cx.step_ref().to_vec();
            request.extend([
                ("prompt", cx.render("prompt")),
                ("persona", cx.step.field("persona").cloned().unwrap_or_default()),
                ("options", options),
                (
                    "defaultNextStep",
                    default_next.as_ref().map(Value::from).unwrap_or_default(),
                ),
            ]);
            cx.emit(REQUEST_AI_DECISION, Value::object(request));
            return StepOutcome::Waiting;
        }

        if !cx.is(AI_DECISION_RESULT) {
            return StepOutcome::Waiting;
        }
        match cx
            .payload
            .get(NEXT_STEP_KEY)
            .and_then(StepId::from_value)
            .or(default_next)
        {
            Some(next) => StepOutcome::Goto(next),
            None => {
                warn!(
                    target: TARGET,
                    script_id = cx.script_id,
                    step_id = %cx.step.step_id,
                    "decision result carries no next step"
                );
                StepOutcome::Waiting
            }
        }
    }
}

struct BranchHandler;

impl StepHandler for BranchHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        let passed = cx
            .step
            .condition
            .as_ref()
            .is_some_and(|condition| evaluate_condition(condition, cx.snapshot, Some(cx.event_data)));
        debug!(
            target: TARGET,
            script_id = cx.script_id,
            step_id = %cx.step.step_id,
            passed,
            "branch evaluated"
        );
        if passed {
            follow(cx.step.edges.on_true.as_ref())
        } else {
            follow(cx.step.edges.on_false.as_ref())
        }
    }
}

struct WaitForEventHandler;

impl StepHandler for WaitForEventHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        let step = cx.step;
        let Some(expected) = step.text_field("eventName") else {
            if cx.take_action() {
                warn!(
                    target: TARGET,
                    script_id = cx.script_id,
                    step_id = %cx.step.step_id,
                    "waitForEvent step has no eventName"
                );
            }
            return StepOutcome::Waiting;
        };
        if !cx.is(expected) {
            return StepOutcome::Waiting;
        }
        let satisfied = match &step.condition {
            Some(condition) => evaluate_condition(condition, cx.snapshot, Some(cx.payload)),
            None => true,
        };
        if !satisfied {
            return StepOutcome::Waiting;
        }
        cx.carry = Some(cx.payload.clone());
        cx.advance()
    }
}

fn finish_wait(cx: &mut StepContext<'_>, completed: bool, by_event: bool) -> StepOutcome {
    if completed {
        if by_event {
            cx.carry = Some(cx.payload.clone());
        }
        return cx.advance();
    }
    match &cx.step.edges.on_wait {
        Some(wait) => StepOutcome::Goto(wait.clone()),
        None => StepOutcome::Waiting,
    }
}

struct WaitForTaskHandler;

impl StepHandler for WaitForTaskHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        let Some(task_id) = id_field(cx.step, "taskId") else {
            return StepOutcome::Waiting;
        };
        let by_event = cx.is(TASK_COMPLETED) && cx.payload.get("taskId") == Some(&task_id);
        let in_snapshot = cx
            .snapshot
            .get("completedTasks")
            .and_then(Value::as_array)
            .is_some_and(|tasks| {
                tasks
                    .iter()
                    .any(|task| task == &task_id || task.get("taskId") == Some(&task_id))
            });
        finish_wait(cx, by_event || in_snapshot, by_event)
    }
}

struct WaitForPuzzleHandler;

impl StepHandler for WaitForPuzzleHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        let Some(puzzle_id) = id_field(cx.step, "puzzleId") else {
            return StepOutcome::Waiting;
        };
        let by_event = cx.is(PUZZLE_SOLVED) && cx.payload.get("puzzleId") == Some(&puzzle_id);
        let in_snapshot = cx
            .snapshot
            .get("currentPuzzleState")
            .and_then(|puzzles| puzzles.get(&puzzle_id.to_text()))
            .and_then(|puzzle| puzzle.get("status"))
            .and_then(Value::as_str)
            == Some("solved");
        finish_wait(cx, by_event || in_snapshot, by_event)
    }
}

struct TaskOfferHandler;

impl StepHandler for TaskOfferHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if cx.take_action() {
            let task = cx
                .step
                .field("task")
                .map(|task| cx.resolve(task))
                .unwrap_or_default();
            let payload = Value::object(cx.step_ref().to_vec().into_iter().chain([("task", task)]));
            cx.emit(
                REQUEST_WORLD_STATE_UPDATE,
                Value::object([
                    ("target", Value::from("tasks")),
                    ("action", Value::from("offer")),
                    ("payload", payload),
                ]),
            );
        }

        if cx.step.edges.next.is_some() {
            return cx.advance();
        }
        if !cx.is(BRANCH_CHOICE) {
            return StepOutcome::Waiting;
        }
        match cx.payload.get("choice").and_then(Value::as_str) {
            Some("Accept") => follow(cx.step.edges.on_accept.as_ref()),
            Some("Decline") => follow(cx.step.edges.on_decline.as_ref()),
            _ => StepOutcome::Waiting,
        }
    }
}

struct StateUpdateHandler;

impl StepHandler for StateUpdateHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if cx.take_action() {
            match state_update_request(cx) {
                Some(request) => cx.emit(REQUEST_WORLD_STATE_UPDATE, request),
                None => warn!(
                    target: TARGET,
                    script_id = cx.script_id,
                    step_id = %cx.step.step_id,
                    kind = cx.step.kind.tag(),
                    "step is missing required fields, no update requested"
                ),
            }
        }
        cx.advance()
    }
}

fn action_request(target: &str, action: &str, payload: Value) -> Value {
    Value::object([
        ("target", Value::from(target)),
        ("action", Value::from(action)),
        ("payload", payload),
    ])
}

fn state_update_request(cx: &StepContext<'_>) -> Option<Value> {
    let step = cx.step;
    match step.kind {
        StepKind::UpdateWorldState => {
            let target = step.text_field("target")?;
            let value = cx.resolve(&step.field("value").cloned().unwrap_or_default());
            let merge = value.get("_update_") == Some(&Value::Bool(true));
            Some(Value::object([
                ("target", Value::from(target)),
                ("id", step.field("id").cloned().unwrap_or_default()),
                ("property", step.field("property").cloned().unwrap_or_default()),
                ("value", value),
                ("merge", Value::Bool(merge)),
            ]))
        }
        StepKind::UnlockTask => {
            let task_id = id_field(step, "taskId")?;
            Some(action_request("tasks", "unlock", Value::object([("taskId", task_id)])))
        }
        StepKind::UnlockClue => {
            let clue_id = id_field(step, "clueId")?;
            Some(action_request(
                "discoveredClues",
                "addById",
                Value::object([("clueId", clue_id)]),
            ))
        }
        StepKind::ActivatePuzzle => {
            let puzzle_id = id_field(step, "puzzleId")?;
            Some(action_request(
                "puzzleControl",
                "activatePuzzle",
                Value::object([("puzzleId", puzzle_id)]),
            ))
        }
        StepKind::UpdatePuzzleState => {
            let puzzle_id = id_field(step, "puzzleId")?;
            let path = step.text_field("path")?;
            let value = cx.resolve(step.field("value")?);
            Some(action_request(
                "puzzleStateProperty",
                "set",
                Value::object([
                    ("puzzleId", puzzle_id),
                    ("path", Value::from(path)),
                    ("value", value),
                ]),
            ))
        }
        StepKind::DisplaySvmContent => {
            let svm_id = id_field(step, "svmId")?;
            let content = step.text_field("contentValueOrKey")?;
            let display = match step.text_field("contentType").unwrap_or("text") {
                "text" => Value::object([
                    ("type", Value::from("text")),
                    ("content", Value::from(render_template(content, cx.scope()))),
                ]),
                kind @ ("image" | "audio") => Value::object([
                    ("type", Value::from(kind)),
                    ("mediaKey", Value::from(content)),
                ]),
                _ => return None,
            };
            Some(Value::object([
                ("target", Value::from("svm")),
                ("id", svm_id),
                ("property", Value::from("currentDisplay")),
                ("value", display),
            ]))
        }
        _ => None,
    }
}

struct DataSyncHandler;

impl StepHandler for DataSyncHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if cx.take_action() {
            let payload = cx.step.field("payload").cloned().unwrap_or_else(Value::empty_map);
            cx.emit(SYNC_DATA_TO_BACKEND, payload);
        }
        cx.advance()
    }
}

struct EndHandler;

impl StepHandler for EndHandler {
    fn handle(&self, _cx: &mut StepContext<'_>) -> StepOutcome {
        StepOutcome::Completed
    }
}

struct UnknownHandler;

impl StepHandler for UnknownHandler {
    fn handle(&self, cx: &mut StepContext<'_>) -> StepOutcome {
        if cx.take_action() {
            warn!(
                target: TARGET,
                script_id = cx.script_id,
                step_id = %cx.step.step_id,
                kind = cx.step.kind.tag(),
                "no handler for step type, pausing"
            );
        }
        StepOutcome::Waiting
    }
}
