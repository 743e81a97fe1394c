//! Thought engine — produces structured reasoning artifacts.
//!
//! Two distinguished entry points drive the loop: `analyze_task` (intent
//! classification and entity extraction, one blocking LLM round with a
//! rule-based fallback) and `plan_actions` (intent → ordered tool calls).
//! Execution-phase thoughts summarize observations; the final thought marks
//! readiness to answer. The engine holds no task state: every method is a
//! pure function of its inputs plus the (optional) LLM capability.

use std::sync::Arc;
use tracing::{debug, warn};
use wayfarer_core::provider::{ChatTurn, Provider, ProviderRequest};
use wayfarer_core::thought::{
    Action, Decision, Observation, Phase, PlannedCall, Thought, ThoughtKind,
};
use wayfarer_core::tool::ToolRegistry;

/// Coarse intent classification, drawn from a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CityRecommendation,
    AttractionQuery,
    RoutePlanning,
    PreferenceUpdate,
    GeneralChat,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CityRecommendation => "city_recommendation",
            Self::AttractionQuery => "attraction_query",
            Self::RoutePlanning => "route_planning",
            Self::PreferenceUpdate => "preference_update",
            Self::GeneralChat => "general_chat",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "city_recommendation" => Some(Self::CityRecommendation),
            "attraction_query" => Some(Self::AttractionQuery),
            "route_planning" => Some(Self::RoutePlanning),
            "preference_update" => Some(Self::PreferenceUpdate),
            "general_chat" => Some(Self::GeneralChat),
            _ => None,
        }
    }
}

/// Surface entities extracted from the user input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    pub cities: Vec<String>,
    pub interests: Vec<String>,
    pub days: Option<u32>,
    pub season: Option<String>,
}

/// The structured product of task analysis.
#[derive(Debug, Clone)]
pub struct TaskAnalysis {
    pub intent: Intent,
    pub entities: Entities,
}

/// Interest tags the rule-based extractor recognizes.
const INTEREST_LEXICON: &[&str] = &[
    "美食", "历史文化", "自然风光", "现代都市", "艺术", "购物", "休闲",
];

/// City names the rule-based extractor recognizes.
const CITY_LEXICON: &[&str] = &[
    "北京", "上海", "西安", "杭州", "成都", "广州", "深圳", "重庆", "三亚", "南京",
];

const SEASONS: &[&str] = &["春季", "夏季", "秋季", "冬季"];

/// Produces [`Thought`] values for the loop.
pub struct ThoughtEngine {
    /// LLM capability for the analysis round; `None` means rule-based only.
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f32,
}

impl ThoughtEngine {
    pub fn new(provider: Option<Arc<dyn Provider>>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    /// Rule-based engine with no LLM round. Fully deterministic.
    pub fn rule_based() -> Self {
        Self::new(None, "", 0.0)
    }

    // ── Analysis ──────────────────────────────────────────────────────────

    /// Classify the task and extract entities.
    ///
    /// Tries one blocking LLM round with a JSON task-analysis prompt; any
    /// provider failure or unparseable reply falls back to the rule-based
    /// classifier (which itself fails open to general chat).
    pub async fn analyze_task(&self, user_input: &str, context: &str) -> (Thought, TaskAnalysis) {
        let (analysis, via_llm) = match &self.provider {
            Some(provider) => match self.llm_analysis(provider.as_ref(), user_input, context).await {
                Ok(analysis) => (analysis, true),
                Err(reason) => {
                    warn!(%reason, "LLM task analysis failed, using rule-based classifier");
                    (rule_based_analysis(user_input), false)
                }
            },
            None => (rule_based_analysis(user_input), false),
        };

        let confidence = if via_llm { 0.85 } else { 0.7 };
        let content = format!(
            "意图识别: {}；城市: {:?}；兴趣: {:?}{}{}",
            analysis.intent.as_str(),
            analysis.entities.cities,
            analysis.entities.interests,
            analysis
                .entities
                .days
                .map(|d| format!("；天数: {d}"))
                .unwrap_or_default(),
            analysis
                .entities
                .season
                .as_deref()
                .map(|s| format!("；季节: {s}"))
                .unwrap_or_default(),
        );

        let thought = Thought::new(ThoughtKind::Analysis, Phase::Understanding, content, confidence);
        (thought, analysis)
    }

    async fn llm_analysis(
        &self,
        provider: &dyn Provider,
        user_input: &str,
        context: &str,
    ) -> Result<TaskAnalysis, String> {
        let prompt = format!(
            "分析下面的旅行助手用户请求，只输出一个JSON对象，不要输出其它文字。\n\
             字段: intent (取值: city_recommendation | attraction_query | route_planning | \
             preference_update | general_chat), cities (字符串数组), interests (字符串数组), \
             days (整数或null), season (字符串或null)。\n\
             对话背景: {context}\n用户请求: {user_input}"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![ChatTurn::user(prompt)],
            temperature: self.temperature.min(0.3),
            max_tokens: Some(300),
            stream: false,
            stop: vec![],
        };

        let response = provider
            .complete(request)
            .await
            .map_err(|e| e.to_string())?;

        let parsed: serde_json::Value =
            serde_json::from_str(strip_code_fences(&response.content))
                .map_err(|e| format!("unparseable analysis: {e}"))?;

        // Fail open: an unknown intent string degrades to general chat.
        let intent = parsed["intent"]
            .as_str()
            .and_then(Intent::from_str)
            .unwrap_or(Intent::GeneralChat);

        let str_vec = |v: &serde_json::Value| -> Vec<String> {
            v.as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|s| s.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(TaskAnalysis {
            intent,
            entities: Entities {
                cities: str_vec(&parsed["cities"]),
                interests: str_vec(&parsed["interests"]),
                days: parsed["days"].as_u64().map(|d| d as u32),
                season: parsed["season"].as_str().map(str::to_string),
            },
        })
    }

    // ── Planning ──────────────────────────────────────────────────────────

    /// Map the analysis to an ordered list of proposed tool calls.
    ///
    /// Plans end with the terminal tool; intents with nothing to look up
    /// yield an empty decision, which the loop resolves as a direct answer.
    pub fn plan_actions(&self, analysis: &TaskAnalysis, registry: &ToolRegistry) -> Thought {
        let entities = &analysis.entities;
        let mut calls: Vec<PlannedCall> = Vec::new();

        match analysis.intent {
            Intent::CityRecommendation => {
                calls.push(PlannedCall::new("search_cities", search_params(entities)));
                calls.push(final_answer_call("已完成城市检索"));
            }
            Intent::AttractionQuery => {
                if entities.cities.is_empty() {
                    calls.push(PlannedCall::new("search_cities", search_params(entities)));
                } else {
                    calls.push(PlannedCall::new(
                        "query_attractions",
                        serde_json::json!({ "cities": entities.cities }),
                    ));
                }
                calls.push(final_answer_call("已完成景点查询"));
            }
            Intent::RoutePlanning => {
                if let Some(city) = entities.cities.first() {
                    let days = entities.days.unwrap_or(3);
                    calls.push(PlannedCall::new(
                        "get_city_info",
                        serde_json::json!({ "city": city }),
                    ));
                    calls.push(PlannedCall::new(
                        "query_attractions",
                        serde_json::json!({ "cities": [city] }),
                    ));
                    calls.push(PlannedCall::new(
                        "calculate_budget",
                        serde_json::json!({ "city": city, "days": days }),
                    ));
                } else {
                    calls.push(PlannedCall::new("search_cities", search_params(entities)));
                }
                calls.push(final_answer_call("已收集行程规划所需信息"));
            }
            Intent::PreferenceUpdate | Intent::GeneralChat => {}
        }

        // Only propose tools the registry actually has.
        let before = calls.len();
        calls.retain(|c| registry.describe(&c.tool).is_some());
        if calls.len() != before {
            debug!(dropped = before - calls.len(), "Planner dropped unregistered tools");
        }

        let content = if calls.is_empty() {
            "无需调用工具，直接生成回答".to_string()
        } else {
            format!(
                "规划 {} 步: {}",
                calls.len(),
                calls
                    .iter()
                    .map(|c| c.tool.as_str())
                    .collect::<Vec<_>>()
                    .join(" → ")
            )
        };

        Thought::new(ThoughtKind::Planning, Phase::Planning, content, 0.75).with_decision(
            Decision {
                calls,
                rationale: Some(format!("意图: {}", analysis.intent.as_str())),
            },
        )
    }

    // ── Execution-phase thoughts ──────────────────────────────────────────

    /// Summarize the last observation and point at the next planned call.
    pub fn infer_step(
        &self,
        observation: &Observation<'_>,
        next: Option<&PlannedCall>,
        confidence: f32,
    ) -> Thought {
        let last = observation
            .last_action
            .map(|a| {
                if a.succeeded() {
                    format!("上一步 {} 成功", a.tool_name)
                } else {
                    format!("上一步 {} 未产生结果", a.tool_name)
                }
            })
            .unwrap_or_else(|| "尚无工具结果".into());

        let (content, decision) = match next {
            Some(call) => (
                format!("{last}；接下来调用 {}", call.tool),
                Some(Decision {
                    calls: vec![call.clone()],
                    rationale: None,
                }),
            ),
            None => (format!("{last}；计划已执行完毕"), None),
        };

        let mut thought =
            Thought::new(ThoughtKind::Inference, Phase::Execution, content, confidence);
        if let Some(decision) = decision {
            thought = thought.with_decision(decision);
        }
        thought
    }

    /// Revise after a failed action. The failed pair is never retried; the
    /// plan continues with the remaining steps.
    pub fn reflect(
        &self,
        failed: &Action,
        next: Option<&PlannedCall>,
        confidence: f32,
    ) -> Thought {
        let reason = failed.error.as_deref().unwrap_or("unknown");
        let (content, decision) = match next {
            Some(call) => (
                format!(
                    "{} 失败（{reason}）；不重试该调用，改为执行 {}",
                    failed.tool_name, call.tool
                ),
                Some(Decision {
                    calls: vec![call.clone()],
                    rationale: Some("失败后降级到后续步骤".into()),
                }),
            ),
            None => (
                format!("{} 失败（{reason}）；无后续步骤，基于已有信息作答", failed.tool_name),
                None,
            ),
        };

        let mut thought =
            Thought::new(ThoughtKind::Reflection, Phase::Execution, content, confidence);
        if let Some(decision) = decision {
            thought = thought.with_decision(decision);
        }
        thought
    }

    /// The final thought marking readiness to answer.
    pub fn decide(&self, confidence: f32) -> Thought {
        Thought::new(
            ThoughtKind::Decision,
            Phase::Generation,
            "已收集到足够信息，准备生成最终回答",
            confidence.max(0.95),
        )
    }
}

fn final_answer_call(summary: &str) -> PlannedCall {
    PlannedCall::new("final_answer", serde_json::json!({ "summary": summary }))
}

fn search_params(entities: &Entities) -> serde_json::Value {
    let mut params = serde_json::Map::new();
    if !entities.interests.is_empty() {
        params.insert("interests".into(), serde_json::json!(entities.interests));
    }
    if let Some(season) = &entities.season {
        params.insert("season".into(), serde_json::json!(season));
    }
    serde_json::Value::Object(params)
}

/// Strip optional markdown code fences around a JSON payload.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

// ── Rule-based classifier ─────────────────────────────────────────────────

/// Keyword classifier used when the LLM round is unavailable or fails.
/// Fails open to general chat.
pub fn rule_based_analysis(user_input: &str) -> TaskAnalysis {
    let entities = extract_entities(user_input);

    let has = |keywords: &[&str]| keywords.iter().any(|k| user_input.contains(k));

    let intent = if has(&["喜欢", "偏好", "不喜欢", "记住我"]) {
        Intent::PreferenceUpdate
    } else if has(&["规划", "行程", "路线", "日游", "天游"]) || entities.days.is_some() {
        Intent::RoutePlanning
    } else if has(&["景点", "好玩", "玩什么", "有什么看"]) {
        Intent::AttractionQuery
    } else if has(&["推荐", "去哪", "哪个城市", "适合"]) {
        Intent::CityRecommendation
    } else {
        Intent::GeneralChat
    };

    TaskAnalysis { intent, entities }
}

fn extract_entities(user_input: &str) -> Entities {
    let cities = CITY_LEXICON
        .iter()
        .filter(|c| user_input.contains(*c))
        .map(|c| c.to_string())
        .collect();
    let interests = INTEREST_LEXICON
        .iter()
        .filter(|t| user_input.contains(*t))
        .map(|t| t.to_string())
        .collect();
    let season = SEASONS
        .iter()
        .find(|s| user_input.contains(*s))
        .map(|s| s.to_string());

    Entities {
        cities,
        interests,
        days: extract_days(user_input),
        season,
    }
}

/// Find a day count written as "N日" or "N天".
fn extract_days(text: &str) -> Option<u32> {
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c == '日' || *c == '天' {
            let digits: String = chars[..i]
                .iter()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if !digits.is_empty() {
                if let Ok(days) = digits.parse() {
                    return Some(days);
                }
            }
        }
    }
    None
}
