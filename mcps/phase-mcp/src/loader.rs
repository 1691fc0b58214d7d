//! Workflow definition loading
//!
//! Parses YAML or TOML workflow definitions into validated [`WorkflowGraph`]s.
//! Two transition shapes are accepted and normalized into one [`Edge`]:
//!
//! - flat: `trigger`, `to`, `instructions`, `transition_reason`
//! - nested: `trigger`, `target`, `is_modeled`, `side_effects.{instructions,transition_reason}`

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::types::{DirectTransitionRule, Edge, PhaseError, PhaseNode, PhaseResult, WorkflowGraph};

/// Built-in definitions compiled into the binary
const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("waterfall.yaml", include_str!("../workflows/waterfall.yaml")),
    ("epcc.yaml", include_str!("../workflows/epcc.yaml")),
    ("bugfix.yaml", include_str!("../workflows/bugfix.yaml")),
    ("minor.yaml", include_str!("../workflows/minor.yaml")),
];

/// Source format of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Yaml,
    Toml,
}

impl DefinitionFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

// ============================================================================
// Raw schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    name: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
    initial_state: Option<String>,
    #[serde(default, deserialize_with = "ordered_states")]
    states: Option<Vec<(String, RawState)>>,
    #[serde(default)]
    direct_transitions: Vec<RawDirectTransition>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    description: Option<String>,
    default_instructions: Option<String>,
    #[serde(default)]
    transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    trigger: String,
    to: Option<String>,
    target: Option<String>,
    instructions: Option<String>,
    transition_reason: Option<String>,
    is_modeled: Option<bool>,
    #[serde(default)]
    side_effects: RawSideEffects,
}

#[derive(Debug, Default, Deserialize)]
struct RawSideEffects {
    instructions: Option<String>,
    transition_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDirectTransition {
    #[serde(alias = "phase")]
    state: String,
    instructions: String,
    transition_reason: Option<String>,
}

/// Keep `states` in declaration order regardless of the source format
fn ordered_states<'de, D>(deserializer: D) -> Result<Option<Vec<(String, RawState)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedStates;

    impl<'de> Visitor<'de> for OrderedStates {
        type Value = Vec<(String, RawState)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of phase names to phase definitions")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut states = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, RawState>()? {
                states.push(entry);
            }
            Ok(states)
        }
    }

    deserializer.deserialize_map(OrderedStates).map(Some)
}

// ============================================================================
// Loading
// ============================================================================

/// Parse and validate a definition. `origin` names the source in errors.
pub fn load_str(content: &str, format: DefinitionFormat, origin: &str) -> PhaseResult<WorkflowGraph> {
    let raw: RawWorkflow = match format {
        DefinitionFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| PhaseError::definition(origin, e.to_string()))?,
        DefinitionFormat::Toml => {
            toml::from_str(content).map_err(|e| PhaseError::definition(origin, e.to_string()))?
        }
    };
    normalize(raw, origin)
}

/// Read and parse a definition file; format follows the extension
pub async fn load_file(path: &Path) -> PhaseResult<WorkflowGraph> {
    let origin = path.display().to_string();
    let format = DefinitionFormat::from_path(path).ok_or_else(|| {
        PhaseError::definition(&origin, "unsupported extension (expected .yaml, .yml or .toml)")
    })?;
    let content = tokio::fs::read_to_string(path).await?;
    load_str(&content, format, &origin)
}

/// Load all built-in workflows
pub fn builtin_workflows() -> PhaseResult<Vec<WorkflowGraph>> {
    BUILTIN_DEFINITIONS
        .iter()
        .map(|(origin, content)| load_str(content, DefinitionFormat::Yaml, origin))
        .collect()
}

fn required(value: Option<String>, field: &str, origin: &str) -> PhaseResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PhaseError::definition(origin, format!("missing required field `{}`", field))),
    }
}

fn normalize(raw: RawWorkflow, origin: &str) -> PhaseResult<WorkflowGraph> {
    let name = required(raw.name, "name", origin)?;
    let description = required(raw.description, "description", origin)?;
    let initial_phase = required(raw.initial_state, "initial_state", origin)?;
    let states = match raw.states {
        Some(states) if !states.is_empty() => states,
        _ => return Err(PhaseError::definition(origin, "missing required field `states`")),
    };

    let mut declared = HashSet::new();
    for (phase, _) in &states {
        if !declared.insert(phase.as_str()) {
            return Err(PhaseError::definition(origin, format!("phase '{}' declared twice", phase)));
        }
    }
    if !declared.contains(initial_phase.as_str()) {
        return Err(PhaseError::definition(
            origin,
            format!("initial_state '{}' is not a declared phase", initial_phase),
        ));
    }

    let default_instructions = |phase: &str| {
        states
            .iter()
            .find(|(name, _)| name == phase)
            .and_then(|(_, s)| s.default_instructions.clone())
    };

    let mut phases = Vec::with_capacity(states.len());
    for (phase_name, state) in &states {
        let description = state.description.clone().ok_or_else(|| {
            PhaseError::definition(origin, format!("phase '{}' has no description", phase_name))
        })?;

        let mut triggers = HashSet::new();
        let mut transitions = Vec::with_capacity(state.transitions.len());
        for t in &state.transitions {
            if !triggers.insert(t.trigger.as_str()) {
                return Err(PhaseError::definition(
                    origin,
                    format!("phase '{}' repeats trigger '{}'", phase_name, t.trigger),
                ));
            }
            transitions.push(normalize_edge(t, phase_name, &declared, &default_instructions, origin)?);
        }

        phases.push(PhaseNode {
            name: phase_name.clone(),
            description,
            default_instructions: state.default_instructions.clone(),
            transitions,
        });
    }

    let mut direct_transitions = Vec::with_capacity(raw.direct_transitions.len());
    for rule in raw.direct_transitions {
        if !declared.contains(rule.state.as_str()) {
            return Err(PhaseError::definition(
                origin,
                format!("direct transition names undeclared phase '{}'", rule.state),
            ));
        }
        direct_transitions.push(DirectTransitionRule {
            phase: rule.state,
            instructions: rule.instructions,
            transition_reason: rule.transition_reason,
        });
    }

    Ok(WorkflowGraph {
        name,
        display_name: raw.display_name,
        description,
        initial_phase,
        phases,
        direct_transitions,
    })
}

fn normalize_edge(
    t: &RawTransition,
    from: &str,
    declared: &HashSet<&str>,
    default_instructions: &dyn Fn(&str) -> Option<String>,
    origin: &str,
) -> PhaseResult<Edge> {
    let target = match (&t.to, &t.target) {
        (Some(to), Some(target)) if to != target => {
            return Err(PhaseError::definition(
                origin,
                format!(
                    "trigger '{}' in phase '{}' has conflicting `to` and `target`",
                    t.trigger, from
                ),
            ))
        }
        (Some(target), _) | (None, Some(target)) => target.clone(),
        (None, None) => {
            return Err(PhaseError::definition(
                origin,
                format!("trigger '{}' in phase '{}' has no target phase", t.trigger, from),
            ))
        }
    };

    if !declared.contains(target.as_str()) {
        return Err(PhaseError::definition(
            origin,
            format!(
                "trigger '{}' in phase '{}' targets undeclared phase '{}'",
                t.trigger, from, target
            ),
        ));
    }

    let instructions = t
        .instructions
        .clone()
        .or_else(|| t.side_effects.instructions.clone())
        .or_else(|| default_instructions(&target))
        .ok_or_else(|| {
            PhaseError::definition(
                origin,
                format!(
                    "trigger '{}' in phase '{}' has no instructions and '{}' has no default_instructions",
                    t.trigger, from, target
                ),
            )
        })?;

    let transition_reason = t
        .transition_reason
        .clone()
        .or_else(|| t.side_effects.transition_reason.clone())
        .unwrap_or_else(|| format!("{} -> {} ({})", from, target, t.trigger));

    Ok(Edge {
        trigger: t.trigger.clone(),
        is_modeled: t.is_modeled.unwrap_or(target != from),
        target,
        instructions,
        transition_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT: &str = r#"
name: demo
description: Demo workflow
initial_state: idle
states:
  idle:
    description: Waiting
    transitions:
      - trigger: new_feature_request
        to: requirements
        instructions: Gather requirements.
        transition_reason: New feature requested
  requirements:
    description: Requirements
    default_instructions: Keep refining requirements.
    transitions:
      - trigger: refine_requirements
        to: requirements
      - trigger: requirements_complete
        to: design
        instructions: Start the design.
        transition_reason: Requirements done
  design:
    description: Design
    transitions: []
direct_transitions:
  - state: design
    instructions: Jumped to design.
"#;

    const NESTED: &str = r#"
name: demo
description: Demo workflow
initial_state: idle
states:
  idle:
    description: Waiting
    transitions:
      - trigger: new_feature_request
        target: requirements
        is_modeled: true
        side_effects:
          instructions: Gather requirements.
          transition_reason: New feature requested
  requirements:
    description: Requirements
    transitions: []
"#;

    #[test]
    fn test_flat_schema() {
        let graph = load_str(FLAT, DefinitionFormat::Yaml, "flat").unwrap();

        assert_eq!(graph.initial_phase, "idle");
        assert_eq!(graph.phase_names(), vec!["idle", "requirements", "design"]);
        let req = graph.phase("requirements").unwrap();
        assert_eq!(req.transitions.len(), 2);

        // self loop without explicit flag is a refine edge using default instructions
        let refine = req.edge("refine_requirements").unwrap();
        assert!(!refine.is_modeled);
        assert_eq!(refine.instructions, "Keep refining requirements.");
        assert!(req.edge("requirements_complete").unwrap().is_modeled);
        assert_eq!(graph.direct_rule("design").unwrap().instructions, "Jumped to design.");
    }

    #[test]
    fn test_nested_and_flat_normalize_to_same_edge() {
        let flat = load_str(FLAT, DefinitionFormat::Yaml, "flat").unwrap();
        let nested = load_str(NESTED, DefinitionFormat::Yaml, "nested").unwrap();

        assert_eq!(
            flat.phase("idle").unwrap().transitions[0],
            nested.phase("idle").unwrap().transitions[0]
        );
    }

    #[test]
    fn test_toml_definition() {
        let toml = r#"
            name = "tiny"
            description = "Tiny workflow"
            initial_state = "start"

            [states.start]
            description = "Start"

            [[states.start.transitions]]
            trigger = "go"
            to = "end"
            instructions = "Go to the end."

            [states.end]
            description = "End"
        "#;

        let graph = load_str(toml, DefinitionFormat::Toml, "tiny.toml").unwrap();
        assert_eq!(graph.name, "tiny");
        assert_eq!(graph.phase("start").unwrap().edge("go").unwrap().target, "end");
        assert_eq!(
            graph.phase("start").unwrap().transitions[0].transition_reason,
            "start -> end (go)"
        );
    }

    #[test]
    fn test_rejects_undeclared_initial_phase() {
        let src = FLAT.replace("initial_state: idle", "initial_state: nowhere");
        let err = load_str(&src, DefinitionFormat::Yaml, "bad").unwrap_err();
        assert!(matches!(err, PhaseError::DefinitionInvalid { .. }));
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_rejects_undeclared_target() {
        let src = FLAT.replace("to: design", "to: deploy");
        let err = load_str(&src, DefinitionFormat::Yaml, "bad").unwrap_err();
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let src = FLAT.replace("description: Demo workflow\n", "");
        let err = load_str(&src, DefinitionFormat::Yaml, "bad").unwrap_err();
        assert!(err.to_string().contains("`description`"));

        let err = load_str("name: x\ndescription: y\ninitial_state: a\n", DefinitionFormat::Yaml, "bad")
            .unwrap_err();
        assert!(err.to_string().contains("`states`"));
    }

    #[test]
    fn test_rejects_duplicate_trigger() {
        let src = FLAT.replace("trigger: refine_requirements", "trigger: requirements_complete");
        let err = load_str(&src, DefinitionFormat::Yaml, "bad").unwrap_err();
        assert!(err.to_string().contains("repeats trigger"));
    }

    #[test]
    fn test_rejects_edge_without_instructions() {
        let src = FLAT.replace("    default_instructions: Keep refining requirements.\n", "");
        assert!(load_str(&src, DefinitionFormat::Yaml, "bad").is_err());
    }

    #[test]
    fn test_rejects_direct_rule_for_unknown_phase() {
        let src = FLAT.replace("  - state: design", "  - state: deploy");
        assert!(load_str(&src, DefinitionFormat::Yaml, "bad").is_err());
    }

    #[test]
    fn test_builtin_workflows_are_valid() {
        let workflows = builtin_workflows().unwrap();
        let names: Vec<&str> = workflows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["waterfall", "epcc", "bugfix", "minor"]);

        for graph in &workflows {
            assert!(graph.phase(&graph.initial_phase).is_some(), "{}", graph.name);
            for phase in &graph.phases {
                for edge in &phase.transitions {
                    assert!(graph.phase(&edge.target).is_some(), "{} -> {}", phase.name, edge.target);
                }
            }
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DefinitionFormat::from_path(Path::new(".vibe/workflow.yml")),
            Some(DefinitionFormat::Yaml)
        );
        assert_eq!(
            DefinitionFormat::from_path(Path::new("workflow.toml")),
            Some(DefinitionFormat::Toml)
        );
        assert_eq!(DefinitionFormat::from_path(Path::new("workflow.json")), None);
    }
}
