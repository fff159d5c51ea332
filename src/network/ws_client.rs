use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, WebSocket};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use js_sys::Array;
use serde_json::Value;

use super::event_types::EventType;
use super::messages::{self, builders, WsEvent};
use crate::messages::Message;
use crate::state::dispatch_global_message;

/// Represents the current state of the WebSocket connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Configuration for the WebSocket client
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Maximum number of reconnection attempts (None for infinite)
    pub max_reconnect_attempts: Option<u32>,
    pub initial_backoff_ms: u32,
    pub max_backoff_ms: u32,
    /// Ping interval in milliseconds (None to disable)
    pub ping_interval_ms: Option<u32>,
}

impl WsConfig {
    pub fn for_url(url: String) -> Self {
        Self {
            url,
            max_reconnect_attempts: None,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
            ping_interval_ms: Some(30000),
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self::for_url(super::get_ws_url())
    }
}

type Subscriber = Rc<RefCell<dyn FnMut(&Value)>>;
type SubscriberMap = Rc<RefCell<HashMap<EventType, Vec<(u32, Subscriber)>>>>;

/// Reconnecting WebSocket client exposing a small named-event bus.
/// Consumers subscribe by event name and handler id; every socket message
/// is delivered to each subscriber at most once.
pub struct WsClient {
    config: WsConfig,
    websocket: Option<WebSocket>,
    state: Rc<RefCell<ConnectionState>>,
    reconnect_attempt: Rc<RefCell<u32>>,
    ping_interval: Option<i32>,
    reconnect_timeout: Rc<RefCell<Option<i32>>>,
    subscribers: SubscriberMap,
    next_subscriber_id: Rc<RefCell<u32>>,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            websocket: None,
            state: Rc::new(RefCell::new(ConnectionState::Disconnected)),
            reconnect_attempt: Rc::new(RefCell::new(0)),
            ping_interval: None,
            reconnect_timeout: Rc::new(RefCell::new(None)),
            subscribers: Rc::new(RefCell::new(HashMap::new())),
            next_subscriber_id: Rc::new(RefCell::new(0)),
        }
    }

    pub fn new_default() -> Self {
        Self::new(WsConfig::default())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Registers a handler for a named event; returns an id for
    /// `unsubscribe`.
    pub fn subscribe<F>(&self, event: EventType, callback: F) -> u32
    where
        F: FnMut(&Value) + 'static,
    {
        let id = {
            let mut next = self.next_subscriber_id.borrow_mut();
            *next = next.wrapping_add(1);
            *next
        };
        self.subscribers
            .borrow_mut()
            .entry(event)
            .or_default()
            .push((id, Rc::new(RefCell::new(callback))));
        id
    }

    /// Removes one handler; returns whether anything was removed.
    pub fn unsubscribe(&self, event: EventType, id: u32) -> bool {
        let mut map = self.subscribers.borrow_mut();
        if let Some(list) = map.get_mut(&event) {
            let before = list.len();
            list.retain(|(sub_id, _)| *sub_id != id);
            return list.len() != before;
        }
        false
    }

    fn emit(subscribers: &SubscriberMap, event: EventType, payload: &Value) {
        // Collect first so a handler that re-subscribes cannot deadlock the
        // borrow, and so each handler runs exactly once per message
        let handlers: Vec<Subscriber> = subscribers
            .borrow()
            .get(&event)
            .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            (handler.borrow_mut())(payload);
        }
    }

    /// Calculate the backoff delay for reconnection attempts
    fn get_backoff_ms(&self) -> u32 {
        let attempt = *self.reconnect_attempt.borrow();
        let base_delay = self.config.initial_backoff_ms;
        let max_delay = self.config.max_backoff_ms;
        let delay = base_delay.saturating_mul(2_u32.pow(attempt.min(10)));
        delay.min(max_delay)
    }

    fn setup_ping_interval(&mut self) {
        if let Some(interval_ms) = self.config.ping_interval_ms {
            let window = match web_sys::window() {
                Some(w) => w,
                None => return,
            };
            let ws_clone = self.websocket.clone();

            let ping_callback = Closure::wrap(Box::new(move || {
                if let Some(ws) = &ws_clone {
                    let ping = builders::create_ping();
                    if let Ok(json) = serde_json::to_string(&ping) {
                        if let Err(e) = ws.send_with_str(&json) {
                            web_sys::console::error_1(&format!("Failed to send ping: {:?}", e).into());
                        }
                    }
                }
            }) as Box<dyn FnMut()>);

            if let Ok(interval_id) = window.set_interval_with_callback_and_timeout_and_arguments(
                ping_callback.as_ref().unchecked_ref(),
                interval_ms as i32,
                &Array::new(),
            ) {
                self.ping_interval = Some(interval_id);
            }
            ping_callback.forget();
        }
    }

    fn clear_ping_interval(&mut self) {
        if let Some(interval_id) = self.ping_interval.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(interval_id);
            }
        }
    }

    /// Creates the actual WebSocket connection and attaches handlers.
    fn establish_connection(&mut self) -> Result<WebSocket, JsValue> {
        let ws = WebSocket::new(&self.config.url)?;

        let state_clone = self.state.clone();
        let reconnect_attempt_clone = self.reconnect_attempt.clone();
        let subscribers_open = self.subscribers.clone();
        let config_clone = self.config.clone();
        let client_clone_for_reconnect = self.clone();

        // Open handler
        let onopen_closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
            web_sys::console::log_1(&"WebSocket connected".into());
            *state_clone.borrow_mut() = ConnectionState::Connected;
            *reconnect_attempt_clone.borrow_mut() = 0;
            Self::emit(&subscribers_open, EventType::Connected, &Value::Null);
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onopen(Some(onopen_closure.as_ref().unchecked_ref()));
        onopen_closure.forget();

        // Error handler; the close handler owns the state change
        let onerror_closure = Closure::wrap(Box::new(move |e: web_sys::Event| {
            web_sys::console::error_1(&format!("WebSocket error: {:?}", e).into());
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onerror(Some(onerror_closure.as_ref().unchecked_ref()));
        onerror_closure.forget();

        // Close handler: flag disconnect and schedule reconnection
        let state_clone = self.state.clone();
        let reconnect_attempt_clone = self.reconnect_attempt.clone();
        let subscribers_close = self.subscribers.clone();
        let onclose_closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
            web_sys::console::log_1(&"WebSocket closed".into());
            *state_clone.borrow_mut() = ConnectionState::Disconnected;
            Self::emit(&subscribers_close, EventType::Disconnected, &Value::Null);

            let current_attempt = *reconnect_attempt_clone.borrow();
            if config_clone
                .max_reconnect_attempts
                .map_or(true, |max| current_attempt < max)
            {
                *reconnect_attempt_clone.borrow_mut() = current_attempt + 1;
                client_clone_for_reconnect.schedule_reconnect();
            } else {
                web_sys::console::log_1(&"Max reconnection attempts reached".into());
            }
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onclose(Some(onclose_closure.as_ref().unchecked_ref()));
        onclose_closure.forget();

        // Message handler: parse once, validate the envelope, fan out by
        // event name
        let subscribers_msg = self.subscribers.clone();
        let onmessage_closure = Closure::wrap(Box::new(move |event: MessageEvent| {
            let text = match event.data().dyn_into::<js_sys::JsString>() {
                Ok(t) => t,
                Err(_) => {
                    web_sys::console::warn_1(&"Received non-text WebSocket message".into());
                    return;
                }
            };
            let msg_str = match text.as_string() {
                Some(s) => s,
                None => return,
            };
            let parsed: Value = match serde_json::from_str(&msg_str) {
                Ok(v) => v,
                Err(_) => {
                    web_sys::console::error_1(
                        &format!("Failed to parse incoming WebSocket message as JSON: {}", msg_str)
                            .into(),
                    );
                    return;
                }
            };
            if !messages::validate_envelope(&parsed) {
                web_sys::console::error_1(&"Dropping malformed WebSocket envelope".into());
                return;
            }
            let kind = parsed
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown");
            Self::emit(&subscribers_msg, EventType::parse(kind), &parsed);
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(onmessage_closure.as_ref().unchecked_ref()));
        onmessage_closure.forget();

        Ok(ws)
    }

    /// Schedule a reconnection attempt with exponential backoff
    fn schedule_reconnect(&self) {
        let window = match web_sys::window() {
            Some(w) => w,
            None => return,
        };
        let state_clone = self.state.clone();
        let delay = self.get_backoff_ms();
        let mut client_clone = self.clone();

        let reconnect_callback = Closure::once(Box::new(move || {
            if *state_clone.borrow() == ConnectionState::Disconnected {
                web_sys::console::log_1(
                    &format!(
                        "Attempting reconnection (attempt {})",
                        *client_clone.reconnect_attempt.borrow()
                    )
                    .into(),
                );
                *state_clone.borrow_mut() = ConnectionState::Connecting;

                match client_clone.establish_connection() {
                    Ok(ws) => {
                        client_clone.websocket = Some(ws);
                        client_clone.setup_ping_interval();
                    }
                    Err(e) => {
                        web_sys::console::error_1(
                            &format!("Failed to create WebSocket during reconnect: {:?}", e).into(),
                        );
                        *state_clone.borrow_mut() = ConnectionState::Disconnected;
                        client_clone.schedule_reconnect();
                    }
                }
            }
        }) as Box<dyn FnOnce()>);

        if let Ok(timeout_id) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            reconnect_callback.as_ref().unchecked_ref(),
            delay as i32,
        ) {
            *self.reconnect_timeout.borrow_mut() = Some(timeout_id);
        }
        reconnect_callback.forget();
    }

    /// Connect to the WebSocket server for the first time.
    pub fn connect(&mut self) -> Result<(), JsValue> {
        web_sys::console::log_1(&"Initiating WebSocket connection...".into());
        *self.reconnect_attempt.borrow_mut() = 0;
        self.clear_ping_interval();
        *self.state.borrow_mut() = ConnectionState::Connecting;

        let ws = self.establish_connection()?;

        // A successful manual connect cancels any pending reconnect timer
        if let Some(timeout_id) = self.reconnect_timeout.borrow_mut().take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(timeout_id);
            }
        }

        self.websocket = Some(ws);
        self.setup_ping_interval();
        Ok(())
    }

    pub fn send_serialized_message(&self, message_json: &str) -> Result<(), JsValue> {
        match &self.websocket {
            Some(ws) if *self.state.borrow() == ConnectionState::Connected => {
                ws.send_with_str(message_json)
            }
            Some(_) => {
                web_sys::console::warn_1(
                    &"Attempted to send message while WebSocket is not connected".into(),
                );
                Err(JsValue::from_str("WebSocket is not connected"))
            }
            None => Err(JsValue::from_str("WebSocket is not initialized")),
        }
    }

    pub fn close(&mut self) -> Result<(), JsValue> {
        self.clear_ping_interval();
        *self.state.borrow_mut() = ConnectionState::Disconnected;
        if let Some(ws) = self.websocket.take() {
            let _ = ws.close_with_code(1000);
        }
        Ok(())
    }
}

impl Clone for WsClient {
    fn clone(&self) -> Self {
        // Shares connection state and the subscriber registry; the socket
        // handle and timer ids stay with the original
        Self {
            config: self.config.clone(),
            websocket: None,
            state: self.state.clone(),
            reconnect_attempt: self.reconnect_attempt.clone(),
            ping_interval: None,
            reconnect_timeout: self.reconnect_timeout.clone(),
            subscribers: self.subscribers.clone(),
            next_subscriber_id: self.next_subscriber_id.clone(),
        }
    }
}

thread_local! {
    pub static WS_CLIENT: RefCell<Option<WsClient>> = RefCell::new(None);
}

/// Creates the global client, wires its events into the dispatch loop, and
/// opens the connection.
pub fn setup_websocket() -> Result<(), JsValue> {
    let mut client = WsClient::new_default();

    client.subscribe(EventType::Connected, |_| {
        dispatch_global_message(Message::WsConnected);
    });
    client.subscribe(EventType::Disconnected, |_| {
        dispatch_global_message(Message::WsDisconnected);
    });
    client.subscribe(EventType::AgentMessage, |payload| {
        match messages::parse_event(payload) {
            Ok(WsEvent::AgentMessage(event)) => {
                let message = event.into_agent_message(js_sys::Date::now());
                dispatch_global_message(Message::ReceiveAgentMessage(message));
            }
            Ok(_) => {}
            Err(e) => web_sys::console::warn_1(&e.into()),
        }
    });
    client.subscribe(EventType::WorkflowStatus, |payload| {
        match messages::parse_event(payload) {
            Ok(WsEvent::WorkflowStatus(event)) => {
                dispatch_global_message(Message::ReceiveWorkflowStatus {
                    workflow_id: event.workflow_id,
                    status: event.status,
                });
            }
            Ok(_) => {}
            Err(e) => web_sys::console::warn_1(&e.into()),
        }
    });
    client.subscribe(EventType::TestResponse, |payload| {
        match messages::parse_event(payload) {
            Ok(WsEvent::TestResponse(event)) => {
                let timestamp_ms =
                    messages::parse_timestamp_ms(event.timestamp.as_ref(), js_sys::Date::now());
                dispatch_global_message(Message::ReceiveTestResponse {
                    passed: event.tests_passed,
                    output: event.output(),
                    timestamp_ms,
                });
            }
            Ok(_) => {}
            Err(e) => web_sys::console::warn_1(&e.into()),
        }
    });

    client.connect()?;

    WS_CLIENT.with(|cell| {
        *cell.borrow_mut() = Some(client);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> WsConfig {
        WsConfig {
            url: "ws://localhost/placeholder".to_string(),
            max_reconnect_attempts: None,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
            ping_interval_ms: None,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = WsClient::new(test_config());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_backoff_calculation() {
        let client = WsClient::new(test_config());

        assert_eq!(*client.reconnect_attempt.borrow(), 0);
        assert_eq!(client.get_backoff_ms(), 1000);

        *client.reconnect_attempt.borrow_mut() = 1;
        assert_eq!(client.get_backoff_ms(), 2000);

        // Capped at max_backoff_ms
        *client.reconnect_attempt.borrow_mut() = 10;
        assert_eq!(client.get_backoff_ms(), 30000);
    }

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let client = WsClient::new(test_config());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let id = client.subscribe(EventType::AgentMessage, move |payload| {
            seen_clone.borrow_mut().push(payload.clone());
        });

        let frame = json!({"type": "agent_message", "content": "hi"});
        WsClient::emit(&client.subscribers, EventType::AgentMessage, &frame);
        // Other event names never reach this subscriber
        WsClient::emit(&client.subscribers, EventType::WorkflowStatus, &frame);
        assert_eq!(seen.borrow().len(), 1);

        assert!(client.unsubscribe(EventType::AgentMessage, id));
        WsClient::emit(&client.subscribers, EventType::AgentMessage, &frame);
        assert_eq!(seen.borrow().len(), 1);

        // Double unsubscribe reports nothing removed
        assert!(!client.unsubscribe(EventType::AgentMessage, id));
    }

    #[test]
    fn test_emit_delivers_at_most_once_per_subscriber() {
        let client = WsClient::new(test_config());
        let count_a = Rc::new(RefCell::new(0));
        let count_b = Rc::new(RefCell::new(0));

        let a = count_a.clone();
        client.subscribe(EventType::TestResponse, move |_| *a.borrow_mut() += 1);
        let b = count_b.clone();
        client.subscribe(EventType::TestResponse, move |_| *b.borrow_mut() += 1);

        let frame = json!({"type": "test_response"});
        WsClient::emit(&client.subscribers, EventType::TestResponse, &frame);

        assert_eq!(*count_a.borrow(), 1);
        assert_eq!(*count_b.borrow(), 1);
    }
}
