//! Page-side host bridge and decoding of the messages it posts.

use serde_json::Value;

/// Messages larger than this (in bytes of JSON) are dropped.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Runs before any page script. Defines `window.external.sendMessage` and
/// `window.external.receiveMessage` over the runtime's message channel.
pub const BRIDGE_SCRIPT: &str = "window.external={\
sendMessage:function(message){window.chrome.webview.postMessage(message);},\
receiveMessage:function(callback){window.chrome.webview.addEventListener('message',function(e){callback(e.data);});}\
};";

/// Turn the JSON form of a web message into the text handed to the host.
/// A JSON string yields its contents; any other value is passed on as JSON.
pub fn decode_web_message(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::String(text)) => text,
        _ => json.to_string(),
    }
}
