//! Runs the side effects the reducer hands back. Every async failure is
//! caught here and folded back into state via messages; nothing escapes to
//! the unhandled-rejection handler.

use wasm_bindgen_futures::spawn_local;

use crate::messages::{Command, Message};
use crate::models::{
    ChatResult, ManualFlowRequest, OnlineWorkflowRequest, WorkflowAgentSpec, WorkflowRequest,
};
use crate::network::{messages as ws_messages, ApiClient};
use crate::state::{dispatch_global_message, APP_STATE};

pub fn execute(cmd: Command) {
    match cmd {
        Command::SendMessage(msg) => dispatch_global_message(msg),

        Command::CheckHealth => {
            spawn_local(async {
                let ok = ApiClient::test_connection().await;
                dispatch_global_message(Message::HealthChecked(ok));
            });
        }

        Command::SendChatPrompt { run_id, prompt } => {
            spawn_local(async move {
                match ApiClient::send_prompt(&prompt, None).await {
                    Ok(result) => {
                        dispatch_global_message(Message::RunCompleted { run_id, result });
                    }
                    Err(e) => {
                        web_sys::console::error_1(&format!("Chat request failed: {}", e).into());
                        dispatch_global_message(Message::RunFailed {
                            run_id,
                            error: e.to_string(),
                        });
                    }
                }
            });
        }

        Command::RunAgentWorkflow {
            run_id,
            task,
            agents,
        } => {
            let request = WorkflowRequest { task, agents };
            spawn_local(async move {
                match ApiClient::run_workflow(&request).await {
                    Ok(resp) => {
                        let result = ChatResult {
                            kind: (if resp.success { "coding" } else { "error" }).to_string(),
                            message: resp
                                .message
                                .or(resp.error)
                                .unwrap_or_else(|| "Workflow complete".to_string()),
                            code: None,
                            tests: None,
                            test_results: None,
                            tests_passed: None,
                            success: resp.success,
                        };
                        dispatch_global_message(Message::RunCompleted { run_id, result });
                    }
                    Err(e) => {
                        web_sys::console::error_1(&format!("Workflow failed: {}", e).into());
                        dispatch_global_message(Message::RunFailed {
                            run_id,
                            error: e.to_string(),
                        });
                    }
                }
            });
        }

        Command::RunManualFlow { run_id, payload } => {
            if payload.boxes.iter().any(|b| is_online_model(&b.model)) {
                run_online_flow(run_id, payload);
            } else {
                run_local_flow(run_id, payload);
            }
        }

        Command::UpdateAgentModel { agent_id, model } => {
            spawn_local(async move {
                if let Err(e) = ApiClient::update_agent_model(&agent_id, &model).await {
                    web_sys::console::warn_1(
                        &format!("Failed to update model for {}: {}", agent_id, e).into(),
                    );
                }
            });
        }

        Command::FetchModels => {
            spawn_local(async {
                match ApiClient::fetch_online_models().await {
                    Ok(models) => dispatch_global_message(Message::ModelsFetched(models)),
                    // Leave the default catalog in place when the online
                    // service is down
                    Err(e) => web_sys::console::warn_1(&format!("Model fetch failed: {}", e).into()),
                }
            });
        }

        Command::FetchFiles => {
            spawn_local(async {
                match ApiClient::list_files().await {
                    Ok(resp) => dispatch_global_message(Message::FilesFetched(resp.files)),
                    Err(e) => web_sys::console::warn_1(&format!("File list failed: {}", e).into()),
                }
            });
        }

        Command::LoadGeneratedFile { filename } => {
            spawn_local(async move {
                match ApiClient::get_generated_file(&filename).await {
                    Ok(code) => {
                        dispatch_global_message(Message::GeneratedFileLoaded { filename, code })
                    }
                    Err(e) => crate::toast::error(&format!("Could not load {}: {}", filename, e)),
                }
            });
        }

        Command::DeleteGeneratedFile { filename } => {
            spawn_local(async move {
                match ApiClient::delete_generated_file(&filename).await {
                    Ok(()) => {
                        crate::toast::success(&format!("Deleted {}", filename));
                        dispatch_global_message(Message::FileDeleted(filename));
                    }
                    Err(e) => crate::toast::error(&format!("Could not delete {}: {}", filename, e)),
                }
            });
        }

        Command::FetchExampleWorkflow => {
            spawn_local(async {
                match ApiClient::example_workflow().await {
                    Ok(resp) => {
                        dispatch_global_message(Message::ExampleWorkflowLoaded(resp.agents))
                    }
                    Err(e) => crate::toast::error(&format!("Example workflow failed: {}", e)),
                }
            });
        }

        Command::PollWorkflowStatus { workflow_id } => {
            spawn_local(async move {
                match ApiClient::workflow_status(&workflow_id).await {
                    Ok(resp) => dispatch_global_message(Message::WorkflowStatusPolled {
                        status: resp.status,
                    }),
                    Err(e) => {
                        web_sys::console::warn_1(&format!("Status poll failed: {}", e).into())
                    }
                }
            });
        }

        Command::EmitFileEvent {
            kind,
            filename,
            code,
        } => {
            crate::components::file_panel::emit_file_event(kind, &filename, &code);
        }

        Command::DownloadSnapshot { filename, json } => {
            if let Err(e) = crate::storage::download_json(&filename, &json) {
                web_sys::console::error_1(&format!("Download failed: {:?}", e).into());
            }
        }

        Command::SaveLocal => {
            APP_STATE.with(|state| {
                let state = state.borrow();
                if let Err(e) = crate::storage::save_snapshot_local(&state) {
                    web_sys::console::warn_1(&format!("Local save failed: {:?}", e).into());
                }
            });
        }

        Command::Alert(message) => {
            if let Some(window) = web_sys::window() {
                let _ = window.alert_with_message(&message);
            }
        }

        Command::NoOp => {}
    }
}

/// Online model ids as served by the online service catalog; everything
/// else runs through the local backend.
fn is_online_model(model: &str) -> bool {
    model.starts_with("gpt-") || model.starts_with("gemini-") || model.starts_with("mistral-")
}

fn run_local_flow(run_id: u32, payload: ManualFlowRequest) {
    spawn_local(async move {
        match ApiClient::run_manual_flow(&payload).await {
            Ok(resp) => {
                let now = js_sys::Date::now();
                let messages = resp
                    .messages
                    .iter()
                    .map(|m| ws_messages::flow_payload_to_agent_message(m, now))
                    .collect();
                dispatch_global_message(Message::FlowMessagesReceived { run_id, messages });

                let result = ChatResult {
                    kind: (if resp.success { "coding" } else { "error" }).to_string(),
                    message: resp
                        .error
                        .clone()
                        .unwrap_or_else(|| "Workflow complete".to_string()),
                    code: None,
                    tests: None,
                    test_results: None,
                    tests_passed: None,
                    success: resp.success,
                };
                dispatch_global_message(Message::RunCompleted { run_id, result });
            }
            Err(e) => {
                web_sys::console::error_1(&format!("Manual flow failed: {}", e).into());
                dispatch_global_message(Message::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
            }
        }
    });
}

fn run_online_flow(run_id: u32, payload: ManualFlowRequest) {
    let request = OnlineWorkflowRequest {
        task: payload.prompt.clone(),
        agents: payload
            .boxes
            .iter()
            .map(|b| WorkflowAgentSpec {
                id: b.id.clone(),
                kind: b.agent_type.clone(),
                role: b.role.clone(),
                model: b.model.clone(),
            })
            .collect(),
    };

    spawn_local(async move {
        match ApiClient::run_online_workflow(&request).await {
            Ok(resp) => {
                if let Some(workflow_id) = &resp.workflow_id {
                    dispatch_global_message(Message::ReceiveWorkflowStatus {
                        workflow_id: Some(workflow_id.clone()),
                        status: "running".to_string(),
                    });
                }
                let now = js_sys::Date::now();
                let messages = resp
                    .messages
                    .iter()
                    .map(|m| ws_messages::flow_payload_to_agent_message(m, now))
                    .collect();
                dispatch_global_message(Message::FlowMessagesReceived { run_id, messages });

                let result = ChatResult {
                    kind: (if resp.success { "coding" } else { "error" }).to_string(),
                    message: resp
                        .error
                        .clone()
                        .unwrap_or_else(|| "Workflow complete".to_string()),
                    code: None,
                    tests: None,
                    test_results: None,
                    tests_passed: None,
                    success: resp.success,
                };
                dispatch_global_message(Message::RunCompleted { run_id, result });
            }
            Err(e) => {
                web_sys::console::error_1(&format!("Online workflow failed: {}", e).into());
                dispatch_global_message(Message::RunFailed {
                    run_id,
                    error: e.to_string(),
                });
            }
        }
    });
}
