//! Test support: a scripted, recording [`CommandRunner`].
//!
//! Used by this crate's unit and integration tests. Exported so
//! downstream consumers can drive the orchestrator against deterministic
//! fake host tools instead of real ones.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::cmd::{render_command, CommandRunner};
use crate::errors::{NodeupError, NodeupResult};

enum Outcome {
    Ok(Vec<u8>),
    Err(String),
    /// Fail `remaining` matching invocations, then stop matching.
    FailTimes { detail: String, remaining: u32 },
}

struct Rule {
    program: String,
    /// Matches when the invocation's args start with this prefix.
    prefix: Vec<String>,
    outcome: Outcome,
}

/// A [`CommandRunner`] that replays scripted responses and records every
/// invocation.
///
/// Rules are matched in registration order against the program name and a
/// prefix of the argument list. An unmatched invocation fails, so a test
/// that forgets to script a command surfaces immediately.
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful response for invocations of `program` whose
    /// args start with `prefix`.
    pub fn on_ok(&self, program: &str, prefix: &[&str], output: &[u8]) {
        self.push_rule(program, prefix, Outcome::Ok(output.to_vec()));
    }

    /// Script a failing response.
    pub fn on_err(&self, program: &str, prefix: &[&str], detail: &str) {
        self.push_rule(program, prefix, Outcome::Err(detail.to_string()));
    }

    /// Script `times` failures, after which this rule stops matching and
    /// later rules apply.
    pub fn fail_times(&self, program: &str, prefix: &[&str], times: u32, detail: &str) {
        self.push_rule(
            program,
            prefix,
            Outcome::FailTimes {
                detail: detail.to_string(),
                remaining: times,
            },
        );
    }

    fn push_rule(&self, program: &str, prefix: &[&str], outcome: Outcome) {
        self.rules.lock().expect("rules lock").push(Rule {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            outcome,
        });
    }

    /// All recorded invocations, in order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Number of recorded invocations of `program` whose args start with
    /// `prefix`.
    pub fn count(&self, program: &str, prefix: &[&str]) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(p, args)| {
                p == program
                    && args.len() >= prefix.len()
                    && args.iter().zip(prefix.iter()).all(|(a, b)| a == b)
            })
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[&str]) -> NodeupResult<Vec<u8>> {
        self.calls.lock().expect("calls lock").push((
            program.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));

        let mut rules = self.rules.lock().expect("rules lock");
        for rule in rules.iter_mut() {
            if rule.program != program {
                continue;
            }
            if args.len() < rule.prefix.len()
                || !args.iter().zip(rule.prefix.iter()).all(|(a, b)| a == b)
            {
                continue;
            }
            match &mut rule.outcome {
                Outcome::Ok(output) => return Ok(output.clone()),
                Outcome::Err(detail) => {
                    return Err(NodeupError::Command {
                        command: render_command(program, args),
                        detail: detail.clone(),
                    })
                }
                Outcome::FailTimes { detail, remaining } => {
                    if *remaining == 0 {
                        continue;
                    }
                    *remaining -= 1;
                    return Err(NodeupError::Command {
                        command: render_command(program, args),
                        detail: detail.clone(),
                    });
                }
            }
        }

        Err(NodeupError::Command {
            command: render_command(program, args),
            detail: "no scripted response for this invocation".to_string(),
        })
    }
}
