//! Attraction lookup across one or more cities.

use crate::travel_data;
use async_trait::async_trait;
use std::time::Duration;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::{ParamKind, ParamSpec, Tool, ToolDescriptor};

pub struct QueryAttractionsTool;

#[async_trait]
impl Tool for QueryAttractionsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "query_attractions".into(),
            description: "查询一个或多个城市的景点信息，包括简介、门票价格和建议游玩时长。"
                .into(),
            params: vec![ParamSpec::required(
                "cities",
                ParamKind::Array,
                "城市名称列表，如 [\"北京\", \"西安\"]",
            )],
            timeout: Duration::from_secs(5),
            category: "travel".into(),
            tags: vec!["attraction".into()],
            terminal: false,
        }
    }

    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let cities = params["cities"]
            .as_array()
            .ok_or_else(|| ToolError::InvalidParams {
                tool_name: "query_attractions".into(),
                message: "cities must be an array of city names".into(),
            })?;

        let mut found = serde_json::Map::new();
        let mut unknown: Vec<&str> = Vec::new();

        for city in cities.iter().filter_map(|v| v.as_str()) {
            match travel_data::find_city(city) {
                Some(record) => {
                    found.insert(
                        city.to_string(),
                        serde_json::to_value(record.attractions).unwrap_or_default(),
                    );
                }
                None => unknown.push(city),
            }
        }

        Ok(serde_json::json!({
            "success": true,
            "attractions": found,
            "unknown_cities": unknown,
        }))
    }
}
