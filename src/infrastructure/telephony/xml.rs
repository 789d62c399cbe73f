//! Provider response documents
//!
//! On an answered call the webhook endpoint replies with a small XML
//! document instructing the provider to open a bidirectional media stream
//! and keep the call alive for a bounded wait.

use crate::domain::shared::value_objects::CallId;

/// Streaming directive returned from the answer webhook
#[derive(Debug, Clone)]
pub struct StreamDirective {
    agent_prompt: String,
    call_id: CallId,
    wait_secs: u32,
}

impl StreamDirective {
    pub fn new(agent_prompt: impl Into<String>, call_id: CallId) -> Self {
        Self {
            agent_prompt: agent_prompt.into(),
            call_id,
            wait_secs: 300,
        }
    }

    /// Override the bounded wait appended after the stream element
    pub fn wait_secs(mut self, secs: u32) -> Self {
        self.wait_secs = secs;
        self
    }

    /// Render the provider XML document
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                "<Response>\n",
                "    <Stream bidirectional=\"true\" keepCallAlive=\"true\">\n",
                "        <Parameter name=\"agent_prompt\" value=\"{prompt}\" />\n",
                "        <Parameter name=\"call_id\" value=\"{call_id}\" />\n",
                "    </Stream>\n",
                "    <Wait length=\"{wait}\" />\n",
                "</Response>\n",
            ),
            prompt = escape_attribute(&self.agent_prompt),
            call_id = self.call_id,
            wait = self.wait_secs,
        )
    }
}

/// Escape text for use inside an XML attribute value
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
