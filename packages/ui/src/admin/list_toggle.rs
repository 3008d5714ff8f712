//! Toggle cell for boolean fields in list views.

use api::ToggleTarget;
use dioxus::prelude::*;

/// How a toggle column renders. Passed to each render; nothing is shared
/// between lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleConfig {
    pub target: ToggleTarget,
    pub on_label: String,
    pub off_label: String,
    /// Show the value without letting it be changed.
    pub read_only: bool,
}

impl ToggleConfig {
    pub fn new(target: ToggleTarget) -> Self {
        Self {
            target,
            on_label: "Yes".to_string(),
            off_label: "No".to_string(),
            read_only: false,
        }
    }

    pub fn labels(mut self, on: impl Into<String>, off: impl Into<String>) -> Self {
        self.on_label = on.into();
        self.off_label = off.into();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Props for ListToggle component.
#[derive(Props, Clone, PartialEq)]
pub struct ListToggleProps {
    pub config: ToggleConfig,
    /// Id of the record the field belongs to.
    pub id: String,
    pub value: bool,
    /// Called with the stored value after a successful toggle.
    pub on_change: EventHandler<bool>,
    /// Called with the server's message when a toggle is refused.
    pub on_error: EventHandler<String>,
}

/// Clickable yes/no cell.
#[component]
pub fn ListToggle(props: ListToggleProps) -> Element {
    let mut busy = use_signal(|| false);
    let config = props.config.clone();
    let label = if props.value {
        config.on_label.clone()
    } else {
        config.off_label.clone()
    };
    let state_class = if props.value { "toggle-on" } else { "toggle-off" };
    let disabled = config.read_only || busy();

    let id = props.id.clone();
    let value = props.value;
    let on_click = move |e: MouseEvent| {
        e.stop_propagation();
        let id = id.clone();
        let target = config.target;
        busy.set(true);
        spawn(async move {
            let result = api::toggle_field(
                target.entity().to_string(),
                target.field().to_string(),
                id,
                !value,
            )
            .await;
            busy.set(false);
            match result {
                Ok(stored) => props.on_change.call(stored),
                Err(e) => props.on_error.call(e.to_string()),
            }
        });
    };

    rsx! {
        button {
            class: "list-toggle {state_class}",
            disabled,
            onclick: on_click,
            "{label}"
        }
    }
}
