//! Status badge component.

use dioxus::prelude::*;
use jobs_core::JobStatus;

/// Badge for a job status code.
#[component]
pub fn StatusBadge(code: u8) -> Element {
    let bg_class = match JobStatus::from_code(code) {
        Ok(JobStatus::Queued) => "badge-pending",
        Ok(JobStatus::InProgress) => "badge-running",
        Ok(JobStatus::Complete) => "badge-completed",
        Ok(JobStatus::Error) => "badge-failed",
        Ok(JobStatus::Stopped) => "badge-cancelled",
        Err(_) => "badge-default",
    };
    let text = JobStatus::label_for_code(code);

    rsx! {
        span {
            class: "status-badge {bg_class}",
            {text}
        }
    }
}
