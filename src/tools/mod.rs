//! Evidence tools consulted before diagnosis and coaching.
//!
//! Tools form a closed set ([`Tool`]) registered by name in a
//! [`ToolRegistry`]. Each one takes JSON arguments and returns JSON, so the
//! same dispatch works for direct calls and for the evidence context that
//! is embedded in generator prompts.

pub mod breakdown;
pub mod drills;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Evaluation, UserProfile};

pub use breakdown::{IssueCount, ScoreSummary, TechniqueBreakdown, TechniqueBreakdownTool};
pub use drills::{Drill, DrillLookupTool, DrillSuggestions};

/// How many of the most frequent issues get drill lookups
pub const DRILL_LOOKUP_ISSUES: usize = 3;

/// Issue used for the drill lookup when evaluations report none
pub const PLACEHOLDER_ISSUE: &str = "overall technique";

/// Errors raised by tool dispatch
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not registered")]
    NotFound(String),

    #[error("Invalid arguments for tool '{tool}': {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize output of tool '{tool}': {source}")]
    Output {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The built-in tool kinds
#[derive(Debug, Clone, Copy)]
pub enum Tool {
    TechniqueBreakdown(TechniqueBreakdownTool),
    DrillLookup(DrillLookupTool),
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::TechniqueBreakdown(_) => breakdown::NAME,
            Tool::DrillLookup(_) => drills::NAME,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::TechniqueBreakdown(_) => breakdown::DESCRIPTION,
            Tool::DrillLookup(_) => drills::DESCRIPTION,
        }
    }

    /// Decode `args`, run the tool, and encode its output
    pub fn invoke(&self, args: &Value) -> Result<Value, ToolError> {
        let tool = self.name();
        let decode_err = |source| ToolError::InvalidArguments { tool, source };
        let encode_err = |source| ToolError::Output { tool, source };

        match self {
            Tool::TechniqueBreakdown(inner) => {
                let args: breakdown::BreakdownArgs =
                    serde_json::from_value(args.clone()).map_err(decode_err)?;
                serde_json::to_value(inner.run(&args.evaluations)).map_err(encode_err)
            }
            Tool::DrillLookup(inner) => {
                let args: drills::DrillArgs =
                    serde_json::from_value(args.clone()).map_err(decode_err)?;
                serde_json::to_value(inner.run(&args.issue, args.skill_level.as_deref()))
                    .map_err(encode_err)
            }
        }
    }
}

/// Tool name -> that tool's output(s), built fresh for every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceContext(BTreeMap<String, Value>);

impl EvidenceContext {
    pub fn get(&self, tool: &str) -> Option<&Value> {
        self.0.get(tool)
    }

    pub fn insert(&mut self, tool: impl Into<String>, output: Value) {
        self.0.insert(tool.into(), output);
    }

    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Name-keyed registry of tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Tool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Registry with the built-in tools
    pub fn new() -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
        };
        registry.register(Tool::TechniqueBreakdown(TechniqueBreakdownTool));
        registry.register(Tool::DrillLookup(DrillLookupTool));
        registry
    }

    /// Add or replace a tool under its name
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    /// Dispatch by exact name
    pub fn invoke(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        debug!(tool = name, "Invoking tool");
        tool.invoke(args)
    }

    /// Run the registered tools over an evaluation batch.
    ///
    /// The breakdown runs once over the whole batch. Drill lookup runs once
    /// per issue among the most frequent few, or once for a placeholder
    /// issue when there are none.
    pub fn gather_context(
        &self,
        evaluations: &[Evaluation],
        profile: &UserProfile,
    ) -> Result<EvidenceContext, ToolError> {
        let ranking = breakdown::rank_issues(evaluations);
        let mut context = EvidenceContext::default();

        for (name, tool) in &self.tools {
            let output = match tool {
                Tool::TechniqueBreakdown(_) => {
                    tool.invoke(&serde_json::json!({ "evaluations": evaluations }))?
                }
                Tool::DrillLookup(_) => {
                    let mut issues: Vec<&str> = ranking
                        .iter()
                        .take(DRILL_LOOKUP_ISSUES)
                        .map(|c| c.issue.as_str())
                        .collect();
                    if issues.is_empty() {
                        issues.push(PLACEHOLDER_ISSUE);
                    }

                    let entries = issues
                        .into_iter()
                        .map(|issue| {
                            tool.invoke(&serde_json::json!({
                                "issue": issue,
                                "skill_level": profile.get_str("level"),
                            }))
                        })
                        .collect::<Result<Vec<Value>, ToolError>>()?;
                    Value::Array(entries)
                }
            };
            context.insert(*name, output);
        }

        Ok(context)
    }
}
