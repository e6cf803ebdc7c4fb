use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sn_core::events::{
    REQUEST_AI_DECISION, REQUEST_AI_DIALOGUE, REQUEST_WORLD_STATE_UPDATE, SCRIPT_FINISHED,
    SCRIPT_STEP,
};
use sn_core::Value;

pub const TESTCASE_SCHEMA_V1: &str = "sn-tool-case.v1";
pub const TESTCASE_FILE: &str = "testcase.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    pub script_id: String,
    #[serde(default)]
    pub initial_state: Value,
    /// Answer AI requests with their defaults instead of waiting for actions.
    #[serde(default)]
    pub stub_ai: bool,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
    /// Path to value checks against the final world state.
    #[serde(default)]
    pub expected_state: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TestAction {
    Publish {
        event: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    Notify {
        script_id: String,
        event: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    CompleteTask { task_id: Value },
    #[serde(rename_all = "camelCase")]
    SolvePuzzle { puzzle_id: Value },
}

impl TestAction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Notify { .. } => "notify",
            Self::CompleteTask { .. } => "completeTask",
            Self::SolvePuzzle { .. } => "solvePuzzle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExpectedEvent {
    #[serde(rename_all = "camelCase")]
    Step {
        script_id: String,
        step_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Finished { script_id: String },
    StateUpdate { request: Value },
    #[serde(rename_all = "camelCase")]
    AiDialogue { step_id: String, prompt: String },
    #[serde(rename_all = "camelCase")]
    AiDecision {
        step_id: String,
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_next_step: Option<String>,
    },
}

fn text_of(data: &Value, key: &str) -> String {
    data.get(key).map(Value::to_text).unwrap_or_default()
}

fn optional_text(data: Option<&Value>) -> Option<String> {
    data.filter(|value| !value.is_null()).map(Value::to_text)
}

impl ExpectedEvent {
    /// Transcript entry for a bus event, if the event is one cases record.
    pub fn observe(event: &str, data: &Value) -> Option<Self> {
        match event {
            SCRIPT_STEP => Some(Self::Step {
                script_id: text_of(data, "scriptId"),
                step_id: text_of(data, "stepId"),
                text: optional_text(data.get("step").and_then(|step| step.get("text"))),
            }),
            SCRIPT_FINISHED => Some(Self::Finished {
                script_id: text_of(data, "scriptId"),
            }),
            REQUEST_WORLD_STATE_UPDATE => Some(Self::StateUpdate {
                request: data.clone(),
            }),
            REQUEST_AI_DIALOGUE => Some(Self::AiDialogue {
                step_id: text_of(data, "stepId"),
                prompt: text_of(data, "prompt"),
            }),
            REQUEST_AI_DECISION => Some(Self::AiDecision {
                step_id: text_of(data, "stepId"),
                prompt: text_of(data, "prompt"),
                default_next_step: optional_text(data.get("defaultNextStep")),
            }),
            _ => None,
        }
    }

    /// Events `observe` records, in subscription order.
    pub fn observed_event_names() -> [&'static str; 5] {
        [
            SCRIPT_STEP,
            SCRIPT_FINISHED,
            REQUEST_WORLD_STATE_UPDATE,
            REQUEST_AI_DIALOGUE,
            REQUEST_AI_DECISION,
        ]
    }
}
