//! Heuristic input/output projection for pipeline-like targets (chains,
//! graphs, runnables), where the full payload is mostly noise.

use crate::attributes::{guarded, RequestParams};
use crate::payload::{upsert, CallContext, Payload};
use crate::serializer::Serializer;

const INPUT_KEY: &str = "input";

// list → type name of the last item, string → kept, anything else → skipped
fn project_entry(value: &Payload) -> Option<Payload> {
    match value {
        Payload::List(items) | Payload::Tuple(items) => {
            items.last().map(|item| Payload::from(item.type_name()))
        }
        Payload::Str(s) => Some(Payload::Str(s.clone())),
        _ => None,
    }
}

fn project_map(entries: &[(String, Payload)], out: &mut Vec<(String, Payload)>) {
    for (key, value) in entries {
        if let Some(projected) = project_entry(value) {
            upsert(out, key.clone(), projected);
        }
    }
}

/// Map of what went into a pipeline call: map args contribute their list and
/// string entries, a bare string arg becomes `input`, and every named step of
/// the instance contributes its type name.
pub fn project_inputs<I>(instance: &I, call: &CallContext) -> Payload
where
    I: RequestParams + ?Sized,
{
    let mut inputs = Vec::new();
    for arg in &call.args {
        match arg {
            Payload::Map(entries) => project_map(entries, &mut inputs),
            Payload::Str(s) => upsert(&mut inputs, INPUT_KEY.to_string(), Payload::Str(s.clone())),
            _ => {}
        }
    }
    for (name, step) in guarded(|| instance.steps()).unwrap_or_default() {
        upsert(&mut inputs, name, Payload::from(step.type_name()));
    }
    Payload::Map(inputs)
}

/// Rendered `call.outputs` for a pipeline result. A bare string is written
/// as-is; a map is projected like the inputs; anything else renders as `{}`.
pub fn project_outputs(result: &Payload, serializer: &Serializer) -> String {
    match result {
        Payload::Str(s) => s.clone(),
        Payload::Map(entries) => {
            let mut outputs = Vec::new();
            project_map(entries, &mut outputs);
            serializer.to_json_string(&Payload::Map(outputs))
        }
        _ => serializer.to_json_string(&Payload::Map(Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::NoParams;
    use crate::payload::Opaque;
    use std::fmt;

    struct Document;

    impl fmt::Display for Document {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Document(page_content=...)")
        }
    }

    impl Opaque for Document {
        fn type_name(&self) -> &str {
            "Document"
        }
    }

    #[test]
    fn map_args_keep_strings_and_name_list_items() {
        let call = CallContext::new().arg(Payload::map([
            ("question", Payload::from("what is rust?")),
            ("context", Payload::List(vec![Payload::object(Document), Payload::object(Document)])),
            ("k", Payload::Int(4)),
            ("empty", Payload::List(vec![])),
        ]));
        let projected = project_inputs(&NoParams, &call);
        assert_eq!(
            projected,
            Payload::map([("question", "what is rust?"), ("context", "Document")])
        );
    }

    #[test]
    fn bare_string_arg_becomes_input() {
        let call = CallContext::new().arg("hello").arg(3i64);
        assert_eq!(project_inputs(&NoParams, &call), Payload::map([("input", "hello")]));
    }

    #[test]
    fn list_item_type_is_taken_from_the_last_item() {
        let call = CallContext::new().arg(Payload::map([(
            "mixed",
            Payload::List(vec![Payload::object(Document), Payload::from("tail")]),
        )]));
        assert_eq!(project_inputs(&NoParams, &call), Payload::map([("mixed", "str")]));
    }

    #[test]
    fn outputs_projection() {
        let ser = Serializer::default();
        let result = Payload::map([
            ("answer", Payload::from("42")),
            ("docs", Payload::List(vec![Payload::object(Document)])),
            ("score", Payload::Float(0.9)),
        ]);
        assert_eq!(
            project_outputs(&result, &ser),
            r#"{"answer": "42", "docs": "Document"}"#
        );
        assert_eq!(project_outputs(&Payload::from("  raw text "), &ser), "  raw text ");
        assert_eq!(project_outputs(&Payload::Int(1), &ser), "{}");
    }
}
