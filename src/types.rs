use serde::{Deserialize, Serialize};

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Compaction trigger (used by PreCompact).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactTrigger {
    Manual,
    Auto,
}

/// Fields shared by all hook event inputs.
///
/// All optional: the environment can supply the same values, and a partial
/// payload must never stop a hook from running.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopInput {
    #[serde(flatten)]
    pub common: CommonInput,
}

#[derive(Debug, Deserialize)]
pub struct PreCompactInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub trigger: Option<CompactTrigger>,
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field. Events this binary doesn't handle
/// land in `Other` instead of failing to parse.
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    Stop(StopInput),
    PreCompact(PreCompactInput),
    #[serde(other)]
    Other,
}

impl HookInput {
    /// The common fields, when the event carries them.
    pub fn common(&self) -> Option<&CommonInput> {
        match self {
            Self::Stop(e) => Some(&e.common),
            Self::PreCompact(e) => Some(&e.common),
            Self::Other => None,
        }
    }
}

// ===================================================================
// Hook Output Types (written to stdout as JSON, camelCase)
// ===================================================================

/// Hook output written to stdout on exit code 0.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Message shown to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn common_fields() -> serde_json::Value {
        json!({
            "session_id": "sess-1",
            "transcript_path": "/tmp/transcript.jsonl",
            "cwd": "/home/user/project",
            "permission_mode": "default"
        })
    }

    fn merge(base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
        let mut map = base.as_object().unwrap().clone();
        map.extend(extra.as_object().unwrap().clone());
        serde_json::Value::Object(map)
    }

    #[test]
    fn deserialize_stop() {
        let input = merge(
            common_fields(),
            json!({ "hook_event_name": "Stop", "stop_hook_active": false }),
        );
        let hook: HookInput = serde_json::from_value(input).unwrap();
        match &hook {
            HookInput::Stop(e) => {
                assert_eq!(e.common.session_id.as_deref(), Some("sess-1"));
                assert_eq!(
                    e.common.transcript_path.as_deref(),
                    Some("/tmp/transcript.jsonl")
                );
            }
            other => panic!("Expected Stop, got {:?}", other),
        }
    }

    #[test]
    fn deserialize_pre_compact() {
        let input = merge(
            common_fields(),
            json!({
                "hook_event_name": "PreCompact",
                "trigger": "auto",
                "custom_instructions": ""
            }),
        );
        let hook: HookInput = serde_json::from_value(input).unwrap();
        match &hook {
            HookInput::PreCompact(e) => {
                assert_eq!(e.trigger, Some(CompactTrigger::Auto));
                assert_eq!(e.common.cwd.as_deref(), Some("/home/user/project"));
            }
            other => panic!("Expected PreCompact, got {:?}", other),
        }
    }

    #[test]
    fn deserialize_pre_compact_without_trigger() {
        let hook: HookInput =
            serde_json::from_value(json!({ "hook_event_name": "PreCompact" })).unwrap();
        match &hook {
            HookInput::PreCompact(e) => {
                assert_eq!(e.trigger, None);
                assert!(e.common.session_id.is_none());
            }
            other => panic!("Expected PreCompact, got {:?}", other),
        }
    }

    #[test]
    fn unhandled_events_parse_as_other() {
        for name in ["SessionStart", "UserPromptSubmit", "SessionEnd", "BogusEvent"] {
            let input = merge(common_fields(), json!({ "hook_event_name": name }));
            let hook: HookInput = serde_json::from_value(input).unwrap();
            assert!(matches!(hook, HookInput::Other), "{name} should be Other");
            assert!(hook.common().is_none());
        }
    }

    #[test]
    fn missing_event_name_is_error() {
        assert!(serde_json::from_value::<HookInput>(common_fields()).is_err());
    }

    #[test]
    fn serialize_output_camel_case() {
        let out = HookOutput {
            system_message: Some("hello".into()),
        };
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "systemMessage": "hello" })
        );
        assert_eq!(
            serde_json::to_value(HookOutput::default()).unwrap(),
            json!({})
        );
    }
}
