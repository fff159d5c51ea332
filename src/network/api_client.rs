use std::fmt;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

use crate::models::{
    ChatRequest, ChatResult, ExampleWorkflowResponse, FileListResponse, HealthResponse,
    ManualFlowRequest, ManualFlowResponse, WorkflowStatusResponse,
};
use super::ui_updates::flash_activity;

/// Typed failure for REST calls. `Http` carries the status and body text so
/// callers can surface what the backend actually said.
#[derive(Debug, Clone)]
pub enum ApiError {
    Http { status: u16, body: String },
    Network(String),
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            ApiError::Network(msg) => write!(f, "network error: {}", msg),
            ApiError::Parse(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Parse(e.to_string())
    }
}

fn js_error(e: JsValue) -> ApiError {
    ApiError::Network(format!("{:?}", e))
}

// REST client for the orchestration backend
pub struct ApiClient;

impl ApiClient {
    fn api_base_url() -> String {
        super::get_api_base_url()
    }

    fn online_base_url() -> String {
        super::get_online_base_url()
    }

    /// Lightweight health probe. Returns false on any failure; never
    /// surfaces an error to the caller.
    pub async fn test_connection() -> bool {
        let url = format!("{}/health", Self::api_base_url());
        match Self::fetch_text(&url, "GET", None).await {
            Ok(body) => serde_json::from_str::<HealthResponse>(&body)
                .map(|h| h.status == "healthy")
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    /// Runs the default coordinator/coder/tester/runner pipeline.
    pub async fn send_prompt(
        prompt: &str,
        conversation_id: Option<String>,
    ) -> Result<ChatResult, ApiError> {
        let url = format!("{}/chat", Self::api_base_url());
        let request = ChatRequest {
            prompt: prompt.to_string(),
            conversation_id,
        };
        let body = serde_json::to_string(&request)?;
        let text = Self::fetch_text(&url, "POST", Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Executes a manually designed workflow from the canvas wiring.
    pub async fn run_manual_flow(
        request: &ManualFlowRequest,
    ) -> Result<ManualFlowResponse, ApiError> {
        let url = format!("{}/run-manual-flow", Self::api_base_url());
        let body = serde_json::to_string(request)?;
        let text = Self::fetch_text(&url, "POST", Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    // The backend takes these as query parameters, not a JSON body
    pub async fn update_agent_model(agent_id: &str, model_name: &str) -> Result<(), ApiError> {
        let url = format!(
            "{}/update-agent-model?agent_id={}&model_name={}",
            Self::api_base_url(),
            urlencode(agent_id),
            urlencode(model_name),
        );
        let _ = Self::fetch_text(&url, "POST", None).await?;
        Ok(())
    }

    pub async fn list_files() -> Result<FileListResponse, ApiError> {
        let url = format!("{}/list-files", Self::api_base_url());
        let text = Self::fetch_text(&url, "GET", None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Generated files are served as plain text, not JSON.
    pub async fn get_generated_file(filename: &str) -> Result<String, ApiError> {
        let url = format!("{}/generated/{}", Self::api_base_url(), urlencode(filename));
        Self::fetch_text(&url, "GET", None).await
    }

    pub async fn delete_generated_file(filename: &str) -> Result<(), ApiError> {
        let url = format!("{}/generated/{}", Self::api_base_url(), urlencode(filename));
        let _ = Self::fetch_text(&url, "DELETE", None).await?;
        Ok(())
    }

    pub async fn example_workflow() -> Result<ExampleWorkflowResponse, ApiError> {
        let url = format!("{}/example-workflow", Self::api_base_url());
        let text = Self::fetch_text(&url, "GET", None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Runs the default pipeline over a custom agent list; used when boxes
    /// carry non-default models that `/chat` would ignore.
    pub async fn run_workflow(
        request: &crate::models::WorkflowRequest,
    ) -> Result<crate::models::WorkflowRunResponse, ApiError> {
        let url = format!("{}/run-workflow", Self::api_base_url());
        let body = serde_json::to_string(request)?;
        let text = Self::fetch_text(&url, "POST", Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    // ---------------- Online model service ----------------

    /// Model catalog from the online service, flattened to ids.
    pub async fn fetch_online_models() -> Result<Vec<String>, ApiError> {
        let url = format!("{}/models", Self::online_base_url());
        let text = Self::fetch_text(&url, "GET", None).await?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let mut models: Vec<String> = value
            .get("available_models")
            .and_then(|m| m.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        models.sort();
        Ok(models)
    }

    /// Runs a workflow through the online model service instead of the
    /// local one; used when any box is assigned an online model.
    pub async fn run_online_workflow(
        request: &crate::models::OnlineWorkflowRequest,
    ) -> Result<crate::models::OnlineWorkflowResponse, ApiError> {
        let url = format!("{}/run-workflow", Self::online_base_url());
        let body = serde_json::to_string(request)?;
        let text = Self::fetch_text(&url, "POST", Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Polling fallback for workflow progress when push events are not
    /// flowing.
    pub async fn workflow_status(workflow_id: &str) -> Result<WorkflowStatusResponse, ApiError> {
        let url = format!(
            "{}/workflow-status/{}",
            Self::online_base_url(),
            urlencode(workflow_id)
        );
        let text = Self::fetch_text(&url, "GET", None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    // Helper to make fetch requests; reads the body text either way so
    // HTTP failures can carry what the server said.
    pub async fn fetch_text(url: &str, method: &str, body: Option<&str>) -> Result<String, ApiError> {
        flash_activity();

        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);

        let headers = Headers::new().map_err(js_error)?;
        if let Some(data) = body {
            opts.set_body(&JsValue::from_str(data));
            headers.append("Content-Type", "application/json").map_err(js_error)?;
        }
        opts.set_headers(&headers);

        let request = Request::new_with_str_and_init(url, &opts).map_err(js_error)?;

        let window = web_sys::window().ok_or_else(|| ApiError::Network("no window".to_string()))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_error)?;
        let resp: Response = resp_value.dyn_into().map_err(js_error)?;

        let text_promise = resp.text().map_err(js_error)?;
        let text = JsFuture::from(text_promise)
            .await
            .map_err(js_error)?
            .as_string()
            .unwrap_or_default();

        if !resp.ok() {
            return Err(ApiError::Http {
                status: resp.status(),
                body: text,
            });
        }

        Ok(text)
    }
}

fn urlencode(s: &str) -> String {
    js_sys::encode_uri_component(s).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Http {
            status: 422,
            body: "Task cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 422: Task cannot be empty");

        let err = ApiError::Network("fetch rejected".to_string());
        assert!(err.to_string().contains("fetch rejected"));
    }

    #[test]
    fn test_parse_error_from_serde() {
        let parse_failure = serde_json::from_str::<ChatResult>("not json").unwrap_err();
        let err: ApiError = parse_failure.into();
        assert!(matches!(err, ApiError::Parse(_)));
    }
}
