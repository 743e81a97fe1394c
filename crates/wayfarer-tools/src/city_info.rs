//! Full city record lookup.

use crate::travel_data;
use async_trait::async_trait;
use std::time::Duration;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

pub struct CityInfoTool;

#[async_trait]
impl Tool for CityInfoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_city_info".into(),
            description: "获取城市的完整信息：简介、兴趣标签、预算区间、适宜季节和景点列表。"
                .into(),
            params: vec![ParamSpec::required("city", ParamKind::String, "城市名称")],
            timeout: Duration::from_secs(5),
            category: "travel".into(),
            tags: vec!["city".into()],
            terminal: false,
        }
    }

    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let name = params["city"].as_str().unwrap_or_default();
        let city = travel_data::find_city(name).ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "get_city_info".into(),
            message: format!("未收录的城市: {name}"),
        })?;

        Ok(serde_json::json!({
            "success": true,
            "city": city.city,
            "region": city.region,
            "description": city.description,
            "tags": city.tags,
            "daily_budget": { "low": city.daily_budget.0, "high": city.daily_budget.1 },
            "best_seasons": city.best_seasons,
            "attractions": city.attractions,
        }))
    }
}
