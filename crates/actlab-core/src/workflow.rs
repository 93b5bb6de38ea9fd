use crate::doc::{scalar_text, Doc};
use crate::error::{HarnessError, Result};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Trigger kind that marks a reusable workflow, invocable only from another
/// workflow and never directly by the runner.
pub const CALLABLE_TRIGGER: &str = "workflow_call";

/// Per-step output overrides, keyed by step id. Declaration order is
/// preserved all the way from the experiment file into the generated
/// run body.
pub type OutputMap = IndexMap<String, Value>;
pub type StepOverrides = IndexMap<String, OutputMap>;

/// True iff the workflow's `on` trigger is a mapping whose first declared
/// key is the callable-only trigger kind.
pub fn is_reusable(doc: &Doc) -> bool {
    match doc.get(&["on"]) {
        Some(Value::Mapping(m)) => m
            .iter()
            .next()
            .map(|(k, _)| k.as_str() == Some(CALLABLE_TRIGGER))
            .unwrap_or(false),
        _ => false,
    }
}

/// Rewrite the trigger declaration in place to the literal event name so the
/// runner can fire it directly. Idempotent: rewriting an already-normalized
/// document leaves a single scalar trigger, never both forms.
pub fn normalize(doc: &mut Doc, event: &str) {
    doc.set(&["on"], Value::from(event));
}

/// Replace each overridden step's body with a deterministic stand-in that
/// emits exactly the declared outputs via the runner's command-output
/// protocol, and strip its external action reference so nothing real runs.
///
/// Steps are located by `id` across all jobs; ids are treated as globally
/// unique within the document. A step id with no matching step is an error,
/// not a silent no-op. An empty override map leaves the document untouched.
pub fn apply_overrides(doc: &mut Doc, overrides: &StepOverrides) -> Result<()> {
    for (step_id, outputs) in overrides {
        let step = find_step_mut(doc, step_id)
            .ok_or_else(|| HarnessError::StepNotFound(step_id.clone()))?;
        step.remove("uses");
        step.remove("with");
        step.insert(Value::from("run"), Value::from(emission_body(outputs)));
    }
    Ok(())
}

/// One `$GITHUB_OUTPUT` append per declared output, in declaration order.
fn emission_body(outputs: &OutputMap) -> String {
    outputs
        .iter()
        .map(|(key, value)| {
            format!("echo \"{key}={}\" >> \"$GITHUB_OUTPUT\"", scalar_text(value))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn find_step_mut<'a>(doc: &'a mut Doc, step_id: &str) -> Option<&'a mut Mapping> {
    let jobs = doc.get_mut(&["jobs"])?.as_mapping_mut()?;
    for (_, job) in jobs.iter_mut() {
        let Some(steps) = job
            .as_mapping_mut()
            .and_then(|j| j.get_mut("steps"))
            .and_then(Value::as_sequence_mut)
        else {
            continue;
        };
        for step in steps.iter_mut() {
            let matches = step
                .as_mapping()
                .and_then(|s| s.get("id"))
                .and_then(Value::as_str)
                == Some(step_id);
            if matches {
                return step.as_mapping_mut();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = "\
name: CI
on:
  push:
    branches: [main]
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - id: checkout
        uses: actions/checkout@v4
      - id: build
        name: build
        uses: some/builder@v1
        with:
          flag: true
  release:
    runs-on: ubuntu-latest
    steps:
      - id: deploy
        name: deploy
        run: ./deploy.sh
";

    const REUSABLE: &str = "\
on:
  workflow_call:
    inputs:
      version:
        type: string
jobs:
  build:
    steps: []
";

    fn overrides(pairs: &[(&str, &[(&str, Value)])]) -> StepOverrides {
        pairs
            .iter()
            .map(|(id, outs)| {
                let m: OutputMap = outs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                (id.to_string(), m)
            })
            .collect()
    }

    #[test]
    fn reusable_detected_by_first_trigger_key() {
        assert!(is_reusable(&Doc::parse(REUSABLE).unwrap()));
        assert!(!is_reusable(&Doc::parse(WORKFLOW).unwrap()));
        // workflow_call present but not first → not treated as reusable
        let mixed = "on:\n  push:\n  workflow_call:\njobs: {}\n";
        assert!(!is_reusable(&Doc::parse(mixed).unwrap()));
        // scalar trigger
        let scalar = "on: push\njobs: {}\n";
        assert!(!is_reusable(&Doc::parse(scalar).unwrap()));
    }

    #[test]
    fn normalize_rewrites_trigger_to_event_literal() {
        let mut doc = Doc::parse(REUSABLE).unwrap();
        normalize(&mut doc, "pull_request");
        assert_eq!(doc.get(&["on"]).unwrap().as_str(), Some("pull_request"));
        assert!(!is_reusable(&doc));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut doc = Doc::parse(REUSABLE).unwrap();
        normalize(&mut doc, "push");
        let first = doc.to_yaml().unwrap();
        normalize(&mut doc, "push");
        assert_eq!(doc.to_yaml().unwrap(), first);
    }

    #[test]
    fn normalize_can_retarget_a_different_event() {
        let mut doc = Doc::parse(REUSABLE).unwrap();
        normalize(&mut doc, "push");
        normalize(&mut doc, "pull_request");
        assert_eq!(doc.get(&["on"]).unwrap().as_str(), Some("pull_request"));
    }

    #[test]
    fn override_strips_action_and_emits_outputs_in_order() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let ovr = overrides(&[(
            "build",
            &[
                ("result", Value::from("5")),
                ("artifact", Value::from("out.tar")),
            ],
        )]);
        apply_overrides(&mut doc, &ovr).unwrap();

        let steps = doc.get(&["jobs", "build", "steps"]).unwrap();
        let step = steps.as_sequence().unwrap()[1].as_mapping().unwrap();
        assert!(step.get("uses").is_none());
        assert!(step.get("with").is_none());
        assert_eq!(
            step.get("run").unwrap().as_str().unwrap(),
            "echo \"result=5\" >> \"$GITHUB_OUTPUT\"\n\
             echo \"artifact=out.tar\" >> \"$GITHUB_OUTPUT\""
        );
    }

    #[test]
    fn override_finds_steps_across_jobs() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let ovr = overrides(&[("deploy", &[("url", Value::from("http://x"))])]);
        apply_overrides(&mut doc, &ovr).unwrap();

        let steps = doc.get(&["jobs", "release", "steps"]).unwrap();
        let step = steps.as_sequence().unwrap()[0].as_mapping().unwrap();
        assert_eq!(
            step.get("run").unwrap().as_str().unwrap(),
            "echo \"url=http://x\" >> \"$GITHUB_OUTPUT\""
        );
    }

    #[test]
    fn override_renders_non_string_scalars() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let ovr = overrides(&[(
            "build",
            &[("count", Value::from(5)), ("ok", Value::from(true))],
        )]);
        apply_overrides(&mut doc, &ovr).unwrap();
        let run = doc.get(&["jobs", "build", "steps"]).unwrap().as_sequence().unwrap()[1]
            .as_mapping()
            .unwrap()
            .get("run")
            .unwrap()
            .as_str()
            .unwrap()
            .to_string();
        assert!(run.contains("count=5"));
        assert!(run.contains("ok=true"));
    }

    #[test]
    fn missing_step_id_is_an_error() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let ovr = overrides(&[("nonexistent", &[("a", Value::from("1"))])]);
        let err = apply_overrides(&mut doc, &ovr).unwrap_err();
        assert!(matches!(err, HarnessError::StepNotFound(id) if id == "nonexistent"));
    }

    #[test]
    fn empty_overrides_leave_document_byte_identical() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let before = doc.to_yaml().unwrap();
        apply_overrides(&mut doc, &StepOverrides::new()).unwrap();
        assert_eq!(doc.to_yaml().unwrap(), before);
    }

    #[test]
    fn untargeted_steps_keep_their_action() {
        let mut doc = Doc::parse(WORKFLOW).unwrap();
        let ovr = overrides(&[("build", &[("result", Value::from("1"))])]);
        apply_overrides(&mut doc, &ovr).unwrap();
        let checkout = doc.get(&["jobs", "build", "steps"]).unwrap().as_sequence().unwrap()[0]
            .as_mapping()
            .unwrap();
        assert_eq!(
            checkout.get("uses").unwrap().as_str(),
            Some("actions/checkout@v4")
        );
    }
}
