use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{number_to_text, Value};

/// Step identifier. Numbers and their decimal string form name the same step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts a number or a non-empty string; anything else is not an id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) if number.is_finite() => Some(Self(number_to_text(*number))),
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&StepId> for Value {
    fn from(value: &StepId) -> Self {
        Value::String(value.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Dialogue,
    Choices,
    AiDialogue,
    AiDecision,
    Branch,
    WaitForEvent,
    WaitForTaskCompleted,
    WaitForPuzzleSolved,
    TaskOffer,
    UpdateWorldState,
    UnlockTask,
    UnlockClue,
    ActivatePuzzle,
    UpdatePuzzleState,
    DisplaySvmContent,
    TriggerDataSync,
    End,
    Unknown(String),
}

impl StepKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "dialogue" => Self::Dialogue,
            "choices" => Self::Choices,
            "aiDialogue" => Self::AiDialogue,
            "aiDecision" => Self::AiDecision,
            "branch" => Self::Branch,
            "waitForEvent" => Self::WaitForEvent,
            "WAIT_FOR_TASK_COMPLETED" => Self::WaitForTaskCompleted,
            "WAIT_FOR_PUZZLE_SOLVED" => Self::WaitForPuzzleSolved,
            "taskOffer" => Self::TaskOffer,
            "updateWorldState" => Self::UpdateWorldState,
            "UNLOCK_TASK" => Self::UnlockTask,
            "UNLOCK_CLUE" => Self::UnlockClue,
            "ACTIVATE_PUZZLE" => Self::ActivatePuzzle,
            "UPDATE_PUZZLE_STATE" => Self::UpdatePuzzleState,
            "DISPLAY_SVM_CONTENT" => Self::DisplaySvmContent,
            "TRIGGER_DATA_SYNC" => Self::TriggerDataSync,
            "end" => Self::End,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Choices => "choices",
            Self::AiDialogue => "aiDialogue",
            Self::AiDecision => "aiDecision",
            Self::Branch => "branch",
            Self::WaitForEvent => "waitForEvent",
            Self::WaitForTaskCompleted => "WAIT_FOR_TASK_COMPLETED",
            Self::WaitForPuzzleSolved => "WAIT_FOR_PUZZLE_SOLVED",
            Self::TaskOffer => "taskOffer",
            Self::UpdateWorldState => "updateWorldState",
            Self::UnlockTask => "UNLOCK_TASK",
            Self::UnlockClue => "UNLOCK_CLUE",
            Self::ActivatePuzzle => "ACTIVATE_PUZZLE",
            Self::UpdatePuzzleState => "UPDATE_PUZZLE_STATE",
            Self::DisplaySvmContent => "DISPLAY_SVM_CONTENT",
            Self::TriggerDataSync => "TRIGGER_DATA_SYNC",
            Self::End => "end",
            Self::Unknown(tag) => tag.as_str(),
        }
    }

    /// Interactive steps wait for an outside actor and always pause the
    /// engine after handling one event.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Self::Dialogue
                | Self::Choices
                | Self::AiDialogue
                | Self::AiDecision
                | Self::WaitForEvent
                | Self::WaitForTaskCompleted
                | Self::WaitForPuzzleSolved
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepEdges {
    pub next: Option<StepId>,
    pub on_true: Option<StepId>,
    pub on_false: Option<StepId>,
    pub on_accept: Option<StepId>,
    pub on_decline: Option<StepId>,
    pub on_wait: Option<StepId>,
}

impl StepEdges {
    pub fn named(&self) -> [(&'static str, Option<&StepId>); 6] {
        [
            ("next", self.next.as_ref()),
            ("onTrue", self.on_true.as_ref()),
            ("onFalse", self.on_false.as_ref()),
            ("onAccept", self.on_accept.as_ref()),
            ("onDecline", self.on_decline.as_ref()),
            ("onWait", self.on_wait.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    pub text: String,
    pub next_step: Option<StepId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    Unsupported(String),
}

impl Comparator {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "===" | "==" => Self::Eq,
            "!==" | "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionLeaf {
    pub target: String,
    pub id: Option<Value>,
    pub property: Option<String>,
    pub comparator: Comparator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Leaf(ConditionLeaf),
    /// Clause that could not be understood; always evaluates to false.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStep {
    pub step_id: StepId,
    pub kind: StepKind,
    pub end_script: bool,
    pub edges: StepEdges,
    pub condition: Option<Condition>,
    pub choices: Vec<ChoiceOption>,
    /// Every field of the authored step, untouched.
    pub fields: BTreeMap<String, Value>,
}

impl CompiledStep {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    /// Non-empty string field.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.end_script || self.kind == StepKind::End
    }

    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    /// All ids this step can transfer control to.
    pub fn targets(&self) -> Vec<&StepId> {
        let mut targets = self
            .edges
            .named()
            .into_iter()
            .filter_map(|(_, target)| target)
            .collect::<Vec<_>>();
        targets.extend(
            self.choices
                .iter()
                .filter_map(|choice| choice.next_step.as_ref()),
        );
        targets
    }

    /// Authored fields with the normalized id and resolved edges laid over
    /// them.
    pub fn to_value(&self) -> Value {
        let mut entries = self.fields.clone();
        entries.insert("stepId".to_string(), Value::from(&self.step_id));
        entries.insert("type".to_string(), Value::from(self.kind.tag()));
        entries.insert("endScript".to_string(), Value::Bool(self.end_script));
        for (name, target) in self.edges.named() {
            entries.insert(
                name.to_string(),
                target.map(Value::from).unwrap_or(Value::Null),
            );
        }
        Value::Map(entries)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionTree {
    pub script_id: String,
    pub title: Option<String>,
    pub trigger: Option<String>,
    pub entry: Option<StepId>,
    pub steps: BTreeMap<StepId, CompiledStep>,
    /// Step ids in authored order.
    pub order: Vec<StepId>,
}

impl ExecutionTree {
    pub fn step(&self, id: &StepId) -> Option<&CompiledStep> {
        self.steps.get(id)
    }

    pub fn contains(&self, id: &StepId) -> bool {
        self.steps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_executable(&self) -> bool {
        self.entry.as_ref().is_some_and(|entry| self.contains(entry))
    }
}
