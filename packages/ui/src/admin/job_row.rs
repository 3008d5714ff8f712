//! Job row component for displaying a single job in a table.

use api::ToggleTarget;
use dioxus::prelude::*;
use jobs_core::{Job, TrackedJob};

use super::{ListToggle, ProgressBar, StatusBadge, ToggleConfig};

/// Props for JobRow component.
#[derive(Props, Clone, PartialEq)]
pub struct JobRowProps {
    pub job: Job,
    /// Live progress; the record itself is used until the first poll.
    pub tracked: Option<TrackedJob>,
    pub selected: bool,
    pub on_select: EventHandler<bool>,
    pub on_force_cancel: EventHandler<Job>,
    pub on_error: EventHandler<String>,
}

/// Table row component for displaying a single job.
#[component]
pub fn JobRow(props: JobRowProps) -> Element {
    let job = props.job.clone();
    let tracked = props
        .tracked
        .clone()
        .unwrap_or_else(|| TrackedJob::from_job(&job));
    let created = job.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let owner = job.owner.clone().unwrap_or_else(|| "-".to_string());

    let mut canceled = use_signal(|| job.is_canceled);
    let cancel_config = ToggleConfig::new(ToggleTarget::JobCanceled)
        .labels("Requested", "Cancel")
        .read_only(canceled() || !tracked.show_progress);

    let job_for_stop = job.clone();

    rsx! {
        tr { class: "job-row",
            td { class: "job-select",
                input {
                    r#type: "checkbox",
                    checked: props.selected,
                    onchange: move |e| props.on_select.call(e.checked()),
                }
            }
            td { class: "job-label",
                Link { to: "/admin/jobs/{job.id}", "{job.label}" }
            }
            td { class: "job-status",
                StatusBadge { code: tracked.status_code }
            }
            td { class: "job-progress",
                ProgressBar { job: tracked.clone() }
            }
            td { class: "job-owner", "{owner}" }
            td { class: "job-created tabular-nums", "{created}" }
            td { class: "job-actions",
                if tracked.show_progress {
                    ListToggle {
                        config: cancel_config,
                        id: job.id.to_string(),
                        value: canceled(),
                        on_change: move |stored| canceled.set(stored),
                        on_error: props.on_error,
                    }
                    button {
                        class: "btn btn-small btn-cancel",
                        onclick: move |_| props.on_force_cancel.call(job_for_stop.clone()),
                        "Stop now"
                    }
                }
            }
        }
    }
}
