//! Ordered case evaluation with optional fallthrough.
//!
//! Cases are evaluated top to bottom; the first matching case runs its
//! chain, then evaluation stops unless the case sets `fallthrough`, in
//! which case the next case is considered against the chain's output.
//! With no matching case the message passes through unchanged.

use std::sync::Arc;

use datatypes::Message;
use serde::Deserialize;

use crate::component::{ComponentConfig, ComponentError};
use crate::condition::{new_condition, Condition};
use crate::processor::{execute_all, Processor, ProcessorOutput};
use crate::registry;
use crate::resources::Resources;
use crate::transaction::Response;

#[derive(Debug, Deserialize)]
struct SwitchOptions {
    #[serde(default)]
    cases: Vec<CaseOptions>,
}

#[derive(Debug, Deserialize)]
struct CaseOptions {
    condition: ComponentConfig,
    #[serde(default)]
    processors: Vec<ComponentConfig>,
    #[serde(default)]
    fallthrough: bool,
}

pub struct SwitchCase {
    pub condition: Arc<dyn Condition>,
    pub processors: Vec<Arc<dyn Processor>>,
    pub fallthrough: bool,
}

pub struct SwitchProcessor {
    cases: Vec<SwitchCase>,
}

impl SwitchProcessor {
    pub fn new(cases: Vec<SwitchCase>) -> Self {
        Self { cases }
    }

    pub fn from_config(
        conf: &ComponentConfig,
        resources: &Arc<dyn Resources>,
    ) -> Result<Self, ComponentError> {
        let opts: SwitchOptions = conf.parse_options("processor")?;
        let cases = opts
            .cases
            .iter()
            .map(|case| {
                Ok(SwitchCase {
                    condition: new_condition(&case.condition, resources)?,
                    processors: case
                        .processors
                        .iter()
                        .map(|p| registry::new_processor(p, resources))
                        .collect::<Result<Vec<_>, ComponentError>>()?,
                    fallthrough: case.fallthrough,
                })
            })
            .collect::<Result<Vec<_>, ComponentError>>()?;
        Ok(Self::new(cases))
    }
}

impl Processor for SwitchProcessor {
    fn kind(&self) -> &'static str {
        "switch"
    }

    fn process(&self, message: Message) -> ProcessorOutput {
        let mut working = vec![message];
        let mut matched = false;
        let mut short_circuit: Option<Response> = None;

        for case in &self.cases {
            // After a non-fallthrough match evaluation stops; fallthrough
            // re-tests the case condition against the chain's output.
            let hit = working.iter().any(|m| case.condition.check(m));
            if !hit {
                if matched {
                    break;
                }
                continue;
            }
            matched = true;
            let mut next = Vec::new();
            for msg in working {
                let (messages, response) = execute_all(&case.processors, msg);
                next.extend(messages);
                if short_circuit.is_none() {
                    short_circuit = response;
                }
            }
            working = next;
            if working.is_empty() || !case.fallthrough {
                break;
            }
        }

        if working.is_empty() {
            return ProcessorOutput {
                messages: Vec::new(),
                response: Some(short_circuit.unwrap_or(Response::Ack)),
            };
        }
        ProcessorOutput::messages(working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{TextCondition, TextOperator};
    use crate::processor::text::{TextProcessor, TextProcessorOperator};

    fn case(prefix: &str, op: TextProcessorOperator, fallthrough: bool) -> SwitchCase {
        SwitchCase {
            condition: Arc::new(TextCondition::new(TextOperator::Prefix, 0, prefix)),
            processors: vec![Arc::new(TextProcessor::new(op, vec![]))],
            fallthrough,
        }
    }

    #[test]
    fn first_matching_case_wins() {
        let switch = SwitchProcessor::new(vec![
            case("a", TextProcessorOperator::ToUpper, false),
            case("A", TextProcessorOperator::ToLower, false),
        ]);
        let out = switch.process(Message::from_bytes(["abc".as_bytes().to_vec()]));
        assert_eq!(
            out.messages[0].get(0).expect("part").as_bytes(),
            b"ABC",
            "second case must not run without fallthrough"
        );
    }

    #[test]
    fn fallthrough_continues_to_next_case() {
        let switch = SwitchProcessor::new(vec![
            case("a", TextProcessorOperator::ToUpper, true),
            case("A", TextProcessorOperator::ToLower, false),
        ]);
        let out = switch.process(Message::from_bytes(["abc".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"abc");
    }

    #[test]
    fn no_match_passes_through() {
        let switch = SwitchProcessor::new(vec![case("z", TextProcessorOperator::ToUpper, false)]);
        let out = switch.process(Message::from_bytes(["abc".as_bytes().to_vec()]));
        assert_eq!(out.messages[0].get(0).expect("part").as_bytes(), b"abc");
    }
}
