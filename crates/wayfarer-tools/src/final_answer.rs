//! Terminal answer tool.
//!
//! The stop predicate treats a successful call to this tool as "the task is
//! answered". The actual user-facing text is synthesized afterwards by the
//! execution mode; this tool just seals the gathered material.

use async_trait::async_trait;
use std::time::Duration;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "final_answer".into(),
            description: "标记已收集到足够信息，可以生成最终回答。".into(),
            params: vec![ParamSpec::optional(
                "summary",
                ParamKind::String,
                "对已收集信息的一句话总结",
            )],
            timeout: Duration::from_secs(2),
            category: "answer".into(),
            tags: vec![],
            terminal: true,
        }
    }

    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let summary = params["summary"].as_str().unwrap_or("ready").to_string();
        Ok(serde_json::json!({
            "success": true,
            "ready": true,
            "summary": summary,
        }))
    }
}
